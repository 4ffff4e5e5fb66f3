//! In-memory snapshot store

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{SnapshotSlot, SnapshotStore, SyncLease};
use crate::error::{Error, Result};
use crate::models::Snapshot;

/// Snapshot store kept in process memory, cloneable across tasks
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slots: Arc<Mutex<HashMap<SnapshotSlot, Snapshot>>>,
    sync_guard: Arc<Mutex<()>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose current slot already holds `snapshot`
    pub fn with_current(snapshot: Snapshot) -> Self {
        let mut slots = HashMap::new();
        slots.insert(SnapshotSlot::Current, snapshot);
        Self {
            slots: Arc::new(Mutex::new(slots)),
            sync_guard: Arc::default(),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, slot: SnapshotSlot) -> Result<Snapshot> {
        self.slots
            .lock()
            .await
            .get(&slot)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{slot} snapshot")))
    }

    async fn save(&self, slot: SnapshotSlot, snapshot: &Snapshot) -> Result<()> {
        self.slots.lock().await.insert(slot, snapshot.clone());
        Ok(())
    }

    async fn commit_sync(
        &self,
        expected_current: Option<&Snapshot>,
        merged: &Snapshot,
    ) -> Result<()> {
        let mut slots = self.slots.lock().await;
        if slots.get(&SnapshotSlot::Current) != expected_current {
            return Err(Error::LocalChanged);
        }
        slots.insert(SnapshotSlot::Current, merged.clone());
        slots.insert(SnapshotSlot::Baseline, merged.clone());
        Ok(())
    }

    fn try_acquire_sync_lease(&self) -> Result<SyncLease> {
        SyncLease::try_acquire(&self.sync_guard, None)
    }
}
