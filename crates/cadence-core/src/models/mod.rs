//! Data models for Cadence

mod deck;
mod ids;
mod review_log;
mod reviewable;
mod snapshot;

pub use deck::{Deck, DeckSeries, SeriesLevel};
pub use ids::{DeckId, ItemId, ReviewId, SeriesId};
pub use review_log::{parse_review_action, Rating, ReviewLog};
pub use reviewable::{
    ItemKind, Reviewable, DEFAULT_EASE_FACTOR, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR,
};
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
