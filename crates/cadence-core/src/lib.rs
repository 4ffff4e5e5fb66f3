//! cadence-core - Core library for Cadence
//!
//! Spaced-repetition scheduling over a whole-collection snapshot, plus the
//! offline diff/merge machinery that keeps several devices' snapshots in
//! agreement. Front ends drive it through collection operations, the due
//! query, and the sync orchestrator.

pub mod collection;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod remote;
pub mod scheduling;
pub mod services;
pub mod storage;
pub mod sync;
pub mod util;

pub use collection::{due_items, DueItem};
pub use config::StudyConfig;
pub use error::{Error, Result};
pub use models::{Deck, DeckId, ItemId, Rating, Reviewable, SeriesId, Snapshot};
pub use scheduling::Scheduler;
pub use services::DatabaseService;
