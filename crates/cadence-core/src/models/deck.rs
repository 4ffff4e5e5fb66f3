//! Deck and deck series models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeckId, ItemId, Reviewable, SeriesId};

/// A deck owning a list of reviewable items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<Reviewable>,
    pub created_at: DateTime<Utc>,
    /// Modification marker compared during sync
    pub updated_at: DateTime<Utc>,
    /// Soft delete tombstone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
}

impl Deck {
    #[must_use]
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: DeckId::new(),
            name: name.into(),
            description: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            archived: false,
        }
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Visible decks are neither tombstoned nor archived
    pub const fn is_active(&self) -> bool {
        !self.is_deleted() && !self.archived
    }

    pub fn item(&self, id: &ItemId) -> Option<&Reviewable> {
        self.items.iter().find(|item| item.id == *id)
    }

    pub fn item_mut(&mut self, id: &ItemId) -> Option<&mut Reviewable> {
        self.items.iter_mut().find(|item| item.id == *id)
    }
}

/// One ordered level of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesLevel {
    pub title: String,
    /// Decks referenced by id; membership, not containment
    #[serde(default)]
    pub deck_ids: Vec<DeckId>,
}

/// Ordered levels of decks studied in sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSeries {
    pub id: SeriesId,
    pub name: String,
    #[serde(default)]
    pub levels: Vec<SeriesLevel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
}

impl DeckSeries {
    #[must_use]
    pub fn new(name: impl Into<String>, levels: Vec<SeriesLevel>, now: DateTime<Utc>) -> Self {
        Self {
            id: SeriesId::new(),
            name: name.into(),
            levels,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            archived: false,
        }
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn contains_deck(&self, deck_id: &DeckId) -> bool {
        self.levels
            .iter()
            .any(|level| level.deck_ids.contains(deck_id))
    }

    /// Drop a deck id from every level. Returns whether anything changed.
    pub fn remove_deck(&mut self, deck_id: &DeckId) -> bool {
        let mut removed = false;
        for level in &mut self.levels {
            let before = level.deck_ids.len();
            level.deck_ids.retain(|id| id != deck_id);
            removed |= level.deck_ids.len() != before;
        }
        removed
    }
}
