//! Exclusive sync lease
//!
//! A lease pairs an in-process guard with an optional advisory lock file, so
//! two stores opened on the same database file (in one process or several)
//! cannot run sync attempts at the same time.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};

/// Held for the lifetime of one sync attempt; released on drop
#[derive(Debug)]
pub struct SyncLease {
    _local: OwnedMutexGuard<()>,
    _file: Option<LockFile>,
}

impl SyncLease {
    /// Take the lease without waiting.
    ///
    /// Fails with [`Error::SyncInProgress`] when `local` is held or when
    /// another handle holds the lock at `lock_path`.
    pub fn try_acquire(local: &Arc<Mutex<()>>, lock_path: Option<&Path>) -> Result<Self> {
        let local = Arc::clone(local)
            .try_lock_owned()
            .map_err(|_| Error::SyncInProgress)?;
        let file = lock_path.map(LockFile::try_acquire).transpose()?;
        Ok(Self {
            _local: local,
            _file: file,
        })
    }
}

#[derive(Debug)]
struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    fn try_acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Self {
                file,
                path: path.to_path_buf(),
            }),
            Err(error) if is_contended(&error) => {
                tracing::info!("Sync lock at {} is held elsewhere", path.display());
                Err(Error::SyncInProgress)
            }
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release sync lock {}: {}", self.path.display(), error);
        }
    }
}

fn is_contended(error: &io::Error) -> bool {
    error.kind() == fs2::lock_contended_error().kind()
}

/// Lock file path used for the database at `db_path`
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let name = db_path
        .file_name()
        .map_or_else(|| "cadence.db".into(), |name| name.to_string_lossy());
    db_path.with_file_name(format!("{name}.sync.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lock_path_sits_next_to_the_database() {
        assert_eq!(
            lock_path_for(Path::new("/data/cadence/cadence.db")),
            PathBuf::from("/data/cadence/cadence.db.sync.lock")
        );
    }

    #[test]
    fn local_guard_is_exclusive_until_dropped() {
        let local = Arc::new(Mutex::new(()));
        let first = SyncLease::try_acquire(&local, None).unwrap();
        assert!(matches!(
            SyncLease::try_acquire(&local, None),
            Err(Error::SyncInProgress)
        ));
        drop(first);
        assert!(SyncLease::try_acquire(&local, None).is_ok());
    }

    #[test]
    fn lock_file_excludes_independent_handles() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cadence.db.sync.lock");
        let first_local = Arc::new(Mutex::new(()));
        let second_local = Arc::new(Mutex::new(()));

        let first = SyncLease::try_acquire(&first_local, Some(&path)).unwrap();
        assert!(matches!(
            SyncLease::try_acquire(&second_local, Some(&path)),
            Err(Error::SyncInProgress)
        ));
        drop(first);
        assert!(SyncLease::try_acquire(&second_local, Some(&path)).is_ok());
    }
}
