//! Offline snapshot sync: differ, merge engine, and orchestrator.

mod diff;
mod merge;
mod orchestrator;

pub use diff::{diff, Change, ChangeKind, Conflict, Entity, EntityId, MergeReport, Side};
pub use merge::{merge, Resolution, UserResolution};
pub use orchestrator::{ComparisonMode, SyncAttempt, SyncOrchestrator, SyncOutcome, SyncPhase};
