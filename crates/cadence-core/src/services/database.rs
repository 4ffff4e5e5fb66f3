//! Shared database service wrapper used by front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlSnapshotRepository, SnapshotRepository};
use crate::models::Snapshot;
use crate::storage::{lock_path_for, SnapshotSlot, SnapshotStore, SyncLease};
use crate::{Error, Result};

/// Thread-safe libSQL-backed snapshot store.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
    sync_guard: Arc<Mutex<()>>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one created.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Moving it aside.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        tracing::info!("Opened snapshot database at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
            sync_guard: Arc::default(),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
            sync_guard: Arc::default(),
        })
    }

    /// Filesystem location, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        error
            .to_string()
            .to_ascii_lowercase()
            .contains("file is not a database")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "cadence.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale database sidecar {}", path.display());
            }
        }

        Ok(())
    }
}

impl SnapshotStore for DatabaseService {
    async fn load(&self, slot: SnapshotSlot) -> Result<Snapshot> {
        let db = self.db.lock().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        repo.get(slot)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{slot} snapshot")))
    }

    async fn save(&self, slot: SnapshotSlot, snapshot: &Snapshot) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        repo.put(slot, snapshot).await
    }

    async fn commit_sync(
        &self,
        expected_current: Option<&Snapshot>,
        merged: &Snapshot,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());
        repo.put_all_if_current(
            expected_current,
            &[SnapshotSlot::Current, SnapshotSlot::Baseline],
            merged,
        )
        .await?;
        tracing::info!("Committed merged snapshot as current and baseline");
        Ok(())
    }

    fn try_acquire_sync_lease(&self) -> Result<SyncLease> {
        let lock_path = self.db_path.as_deref().map(lock_path_for);
        SyncLease::try_acquire(&self.sync_guard, lock_path.as_deref())
    }
}
