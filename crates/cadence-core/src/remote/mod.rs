//! Remote snapshot sources.
//!
//! A remote holds the snapshot another device last published. Transport
//! failures surface as [`Error::RemoteFetch`](crate::Error::RemoteFetch);
//! a remote with nothing published yet reports
//! [`Error::NotFound`](crate::Error::NotFound). Nothing here retries.

mod file;
mod http;

pub use file::FileRemote;
pub use http::HttpRemote;

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::Snapshot;
use crate::util::is_http_url;

/// A fetched remote snapshot and when the remote copy last changed
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    pub snapshot: Snapshot,
    pub modified_at: DateTime<Utc>,
}

/// Where the shared snapshot lives (async)
#[allow(async_fn_in_trait)]
pub trait RemoteSnapshotSource {
    /// Fetch the latest published snapshot
    async fn fetch_remote(&self) -> Result<RemoteSnapshot>;

    /// Replace the published snapshot
    async fn publish(&self, snapshot: &Snapshot) -> Result<()>;

    /// Human-readable location for logs and prompts
    fn describe(&self) -> String;
}

/// A remote chosen at runtime from a path or URL
#[derive(Debug, Clone)]
pub enum Remote {
    File(FileRemote),
    Http(HttpRemote),
}

impl Remote {
    /// `http(s)://` locations use HTTP, anything else is a file path.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if is_http_url(location) {
            Ok(Self::Http(HttpRemote::new(location, None)?))
        } else {
            Ok(Self::File(FileRemote::new(PathBuf::from(location))))
        }
    }

    /// Attach a bearer token to HTTP remotes; file remotes ignore it
    #[must_use]
    pub fn with_token(self, token: Option<String>) -> Self {
        match self {
            Self::Http(remote) => Self::Http(remote.with_token(token)),
            file @ Self::File(_) => file,
        }
    }
}

impl RemoteSnapshotSource for Remote {
    async fn fetch_remote(&self) -> Result<RemoteSnapshot> {
        match self {
            Self::File(remote) => remote.fetch_remote().await,
            Self::Http(remote) => remote.fetch_remote().await,
        }
    }

    async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        match self {
            Self::File(remote) => remote.publish(snapshot).await,
            Self::Http(remote) => remote.publish(snapshot).await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::File(remote) => remote.describe(),
            Self::Http(remote) => remote.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_picks_transport_from_location() {
        assert!(matches!(
            Remote::parse("https://sync.example.com/snapshot").unwrap(),
            Remote::Http(_)
        ));
        assert!(matches!(
            Remote::parse("/mnt/shared/cadence.json").unwrap(),
            Remote::File(_)
        ));
    }
}
