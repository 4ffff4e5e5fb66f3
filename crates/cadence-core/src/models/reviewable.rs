//! Reviewable item model

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ItemId;

/// Ease factor assigned to items that have never been reviewed
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lowest ease factor any stored item may carry
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Longest interval accepted in a snapshot (100 years)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Kind of schedulable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Front/back flashcard
    #[default]
    Flashcard,
    /// Quiz question
    Question,
}

/// Any schedulable unit owned by exactly one deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewable {
    pub id: ItemId,
    #[serde(default)]
    pub kind: ItemKind,
    pub front: String,
    #[serde(default)]
    pub back: String,
    pub due_date: DateTime<Utc>,
    /// Current interval in days
    pub interval: u32,
    pub ease_factor: f64,
    /// Failed reviews; only `reset_progress` lowers it
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub review_count: u32,
    /// Mastery computed at the last review, in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mastery_level: Option<f64>,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<DateTime<Utc>>,
    /// Informational only
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Free-form metadata, passed through untouched
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Reviewable {
    /// Create a never-reviewed item that is due immediately.
    #[must_use]
    pub fn new(front: impl Into<String>, back: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            kind: ItemKind::Flashcard,
            front: front.into(),
            back: back.into(),
            due_date: now,
            interval: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            lapses: 0,
            review_count: 0,
            mastery_level: None,
            suspended: false,
            last_reviewed: None,
            tags: BTreeSet::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Whether the item has never received a rating
    pub const fn is_new(&self) -> bool {
        self.last_reviewed.is_none()
    }

    /// Reset all scheduling progress.
    ///
    /// This is the only path that lowers `lapses`.
    pub fn reset_progress(&mut self, now: DateTime<Utc>) {
        self.interval = 0;
        self.ease_factor = DEFAULT_EASE_FACTOR;
        self.lapses = 0;
        self.review_count = 0;
        self.due_date = now;
        self.mastery_level = None;
        self.last_reviewed = None;
    }
}
