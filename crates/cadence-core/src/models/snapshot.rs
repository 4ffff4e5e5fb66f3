//! Whole-collection snapshot, the unit of persistence and sync

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reviewable::{MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};
use super::{Deck, DeckId, DeckSeries, ItemId, Reviewable, ReviewLog, SeriesId};
use crate::error::{Error, Result};

/// Current snapshot schema version
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// The full exportable state of one user's collection.
///
/// Progress is kept as plain id lists so the persisted form never depends on
/// an in-memory set's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,
    #[serde(default)]
    pub decks: Vec<Deck>,
    #[serde(default)]
    pub deck_series: Vec<DeckSeries>,
    /// Completed deck ids per series
    #[serde(default)]
    pub series_progress: BTreeMap<SeriesId, Vec<DeckId>>,
    #[serde(default)]
    pub reviews: Vec<ReviewLog>,
    pub last_modified: DateTime<Utc>,
}

impl Snapshot {
    /// An empty collection stamped at `now`
    #[must_use]
    pub const fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            decks: Vec::new(),
            deck_series: Vec::new(),
            series_progress: BTreeMap::new(),
            reviews: Vec::new(),
            last_modified: now,
        }
    }

    pub fn deck(&self, id: &DeckId) -> Option<&Deck> {
        self.decks.iter().find(|deck| deck.id == *id)
    }

    pub fn deck_mut(&mut self, id: &DeckId) -> Option<&mut Deck> {
        self.decks.iter_mut().find(|deck| deck.id == *id)
    }

    pub fn series(&self, id: &SeriesId) -> Option<&DeckSeries> {
        self.deck_series.iter().find(|series| series.id == *id)
    }

    pub fn series_mut(&mut self, id: &SeriesId) -> Option<&mut DeckSeries> {
        self.deck_series.iter_mut().find(|series| series.id == *id)
    }

    /// Locate an item and the deck that owns it
    pub fn find_item(&self, id: &ItemId) -> Option<(&Deck, &Reviewable)> {
        self.decks
            .iter()
            .find_map(|deck| deck.item(id).map(|item| (deck, item)))
    }

    /// First live series that references the deck in any level
    pub fn series_for_deck(&self, deck_id: &DeckId) -> Option<SeriesId> {
        self.deck_series
            .iter()
            .find(|series| !series.is_deleted() && series.contains_deck(deck_id))
            .map(|series| series.id)
    }

    /// Completed deck ids for a series (empty when none recorded)
    pub fn completed_decks(&self, series_id: &SeriesId) -> &[DeckId] {
        self.series_progress
            .get(series_id)
            .map_or(&[], Vec::as_slice)
    }

    /// Reject malformed snapshots before they reach diff or merge.
    ///
    /// Values are never coerced; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        if self.version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Error::Validation(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_SCHEMA_VERSION
            )));
        }

        let mut deck_ids = HashSet::new();
        let mut item_ids = HashSet::new();
        for deck in &self.decks {
            if !deck_ids.insert(deck.id) {
                return Err(Error::Validation(format!("duplicate deck id {}", deck.id)));
            }
            if deck.name.trim().is_empty() {
                return Err(Error::Validation(format!("deck {} has an empty name", deck.id)));
            }
            for item in &deck.items {
                if !item_ids.insert(item.id) {
                    return Err(Error::Validation(format!("duplicate item id {}", item.id)));
                }
                validate_item(item)?;
            }
        }

        let mut series_ids = HashSet::new();
        for series in &self.deck_series {
            if !series_ids.insert(series.id) {
                return Err(Error::Validation(format!(
                    "duplicate series id {}",
                    series.id
                )));
            }
        }

        let mut review_ids = HashSet::new();
        for log in &self.reviews {
            if !review_ids.insert(log.id) {
                return Err(Error::Validation(format!("duplicate review id {}", log.id)));
            }
            if !log.ease_factor.is_finite() || log.ease_factor < MIN_EASE_FACTOR {
                return Err(Error::Validation(format!(
                    "review {} has ease factor {} below {MIN_EASE_FACTOR}",
                    log.id, log.ease_factor
                )));
            }
            if !is_unit_interval(log.mastery) {
                return Err(Error::Validation(format!(
                    "review {} has mastery {} outside [0, 1]",
                    log.id, log.mastery
                )));
            }
        }

        Ok(())
    }
}

fn validate_item(item: &Reviewable) -> Result<()> {
    if item.interval > MAX_INTERVAL_DAYS {
        return Err(Error::Validation(format!(
            "item {} has interval {} beyond {MAX_INTERVAL_DAYS} days",
            item.id, item.interval
        )));
    }
    if !item.ease_factor.is_finite() || item.ease_factor < MIN_EASE_FACTOR {
        return Err(Error::Validation(format!(
            "item {} has ease factor {} below {MIN_EASE_FACTOR}",
            item.id, item.ease_factor
        )));
    }
    if let Some(mastery) = item.mastery_level {
        if !is_unit_interval(mastery) {
            return Err(Error::Validation(format!(
                "item {} has mastery {mastery} outside [0, 1]",
                item.id
            )));
        }
    }
    Ok(())
}

fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewId;

    fn sample() -> Snapshot {
        let now = Utc::now();
        let mut snapshot = Snapshot::empty(now);
        let mut deck = Deck::new("Kanji", now);
        deck.items.push(Reviewable::new("日", "sun", now));
        snapshot.decks.push(deck);
        snapshot
    }

    #[test]
    fn test_empty_snapshot_is_valid() {
        assert!(Snapshot::empty(Utc::now()).validate().is_ok());
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_version() {
        let mut snapshot = sample();
        snapshot.version = 7;
        let error = snapshot.validate().unwrap_err();
        assert!(error.to_string().contains("version"));
    }

    #[test]
    fn test_validate_rejects_ease_below_floor() {
        let mut snapshot = sample();
        snapshot.decks[0].items[0].ease_factor = 1.1;
        assert!(matches!(snapshot.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_interval_and_mastery() {
        let mut snapshot = sample();
        snapshot.decks[0].items[0].interval = MAX_INTERVAL_DAYS + 1;
        assert!(matches!(snapshot.validate(), Err(Error::Validation(_))));

        let mut snapshot = sample();
        snapshot.decks[0].items[0].mastery_level = Some(1.5);
        assert!(matches!(snapshot.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut snapshot = sample();
        let duplicate = snapshot.decks[0].clone();
        snapshot.decks.push(duplicate);
        let error = snapshot.validate().unwrap_err();
        assert!(error.to_string().contains("duplicate deck id"));
    }

    #[test]
    fn test_validate_rejects_duplicate_review_ids() {
        let mut snapshot = sample();
        let (deck, item) = (&snapshot.decks[0], &snapshot.decks[0].items[0]);
        let log = ReviewLog {
            id: ReviewId::new(),
            item_id: item.id,
            deck_id: deck.id,
            series_id: None,
            reviewed_at: Utc::now(),
            rating: None,
            interval: 0,
            ease_factor: 2.5,
            mastery: 0.0,
        };
        snapshot.reviews.push(log.clone());
        snapshot.reviews.push(log);
        assert!(matches!(snapshot.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_find_item_and_series_lookup() {
        let mut snapshot = sample();
        let deck_id = snapshot.decks[0].id;
        let item_id = snapshot.decks[0].items[0].id;
        let series = DeckSeries::new(
            "Course",
            vec![crate::models::SeriesLevel {
                title: "N5".to_string(),
                deck_ids: vec![deck_id],
            }],
            Utc::now(),
        );
        let series_id = series.id;
        snapshot.deck_series.push(series);

        let (deck, item) = snapshot.find_item(&item_id).unwrap();
        assert_eq!(deck.id, deck_id);
        assert_eq!(item.front, "日");
        assert_eq!(snapshot.series_for_deck(&deck_id), Some(series_id));
        assert!(snapshot.completed_decks(&series_id).is_empty());
    }

    #[test]
    fn test_schema_uses_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("deckSeries").is_some());
        assert!(json.get("seriesProgress").is_some());
        assert!(json.get("lastModified").is_some());
    }
}
