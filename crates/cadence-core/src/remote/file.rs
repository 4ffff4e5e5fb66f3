//! Snapshot file in a shared folder

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{RemoteSnapshot, RemoteSnapshotSource};
use crate::error::{Error, Result};
use crate::models::Snapshot;

/// Remote backed by a JSON file, e.g. inside a synced folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRemote {
    path: PathBuf,
}

impl FileRemote {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn fetch_error(&self, error: &std::io::Error) -> Error {
        if error.kind() == ErrorKind::NotFound {
            Error::NotFound(format!("remote snapshot {}", self.path.display()))
        } else {
            Error::RemoteFetch(format!("{}: {error}", self.path.display()))
        }
    }
}

impl RemoteSnapshotSource for FileRemote {
    async fn fetch_remote(&self) -> Result<RemoteSnapshot> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|error| self.fetch_error(&error))?;
        let metadata = tokio::fs::metadata(&self.path)
            .await
            .map_err(|error| self.fetch_error(&error))?;

        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|error| {
            Error::RemoteFetch(format!(
                "{} is not a snapshot: {error}",
                self.path.display()
            ))
        })?;
        let modified_at = metadata
            .modified()
            .map_or(snapshot.last_modified, DateTime::<Utc>::from);

        tracing::debug!("Fetched remote snapshot from {}", self.path.display());
        Ok(RemoteSnapshot {
            snapshot,
            modified_at,
        })
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_string_pretty(snapshot)?;
        let publish_error =
            |error: std::io::Error| Error::RemoteFetch(format!("{}: {error}", self.path.display()));

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(publish_error)?;
        }
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, body)
            .await
            .map_err(publish_error)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(publish_error)?;

        tracing::info!("Published snapshot to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
