//! Snapshot storage abstractions.
//!
//! A store holds two whole snapshots: the user's current collection and the
//! baseline last shared with the remote. Loads and saves are atomic per
//! snapshot; `commit_sync` replaces both in one step, and only while the
//! current slot still holds what the sync started from.

mod lease;
mod memory;

pub use lease::{lock_path_for, SyncLease};
pub use memory::MemorySnapshotStore;

use std::fmt;

use crate::error::Result;
use crate::models::Snapshot;

/// Which stored snapshot an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSlot {
    Current,
    Baseline,
}

impl SnapshotSlot {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Baseline => "baseline",
        }
    }
}

impl fmt::Display for SnapshotSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-snapshot persistence (async)
#[allow(async_fn_in_trait)]
pub trait SnapshotStore {
    /// Load a snapshot; `Error::NotFound` when the slot is empty
    async fn load(&self, slot: SnapshotSlot) -> Result<Snapshot>;

    /// Replace the snapshot in a slot
    async fn save(&self, slot: SnapshotSlot, snapshot: &Snapshot) -> Result<()>;

    /// Store `merged` as both current and baseline, atomically.
    ///
    /// `expected_current` is the current snapshot the merge was computed
    /// from (`None` for an empty slot). When the slot no longer matches,
    /// nothing is written and the call fails with `Error::LocalChanged`.
    async fn commit_sync(
        &self,
        expected_current: Option<&Snapshot>,
        merged: &Snapshot,
    ) -> Result<()>;

    /// Take the exclusive sync lease; `Error::SyncInProgress` when held
    fn try_acquire_sync_lease(&self) -> Result<SyncLease>;

    /// Load a slot, mapping an empty slot to `None`
    async fn load_optional(&self, slot: SnapshotSlot) -> Result<Option<Snapshot>> {
        match self.load(slot).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(crate::Error::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}
