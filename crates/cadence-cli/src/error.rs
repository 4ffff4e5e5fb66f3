use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] cadence_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{kind} not found for id/prefix/name: {query}")]
    NotFound { kind: &'static str, query: String },
    #[error("{0}")]
    Ambiguous(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync cancelled with {0} unresolved conflict(s). Re-run on a terminal or pass --resolve-all local|remote."
    )]
    UnresolvedConflicts(usize),
    #[error("Sync cancelled")]
    SyncCancelled,
}
