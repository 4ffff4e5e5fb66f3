//! Error types for cadence-core

use thiserror::Error;

/// Result type alias using cadence-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cadence-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed snapshot or out-of-range field, rejected before merge
    #[error("Validation error: {0}")]
    Validation(String),

    /// Merge invoked while a conflict has no matching resolution
    #[error("Conflict for {0} has no resolution")]
    ConflictUnresolved(String),

    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Remote snapshot could not be fetched or published
    #[error("Remote fetch error: {0}")]
    RemoteFetch(String),

    /// Baseline is not a common ancestor of both snapshots
    #[error("Cannot determine conflicts safely: {0}")]
    StaleBaseline(String),

    /// Rating value outside the four ordinal levels
    #[error("Invalid rating: {0}")]
    InvalidRating(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entity or stored snapshot not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another sync attempt already holds the in-flight slot
    #[error("A sync is already in progress")]
    SyncInProgress,

    /// Local collection was written after the sync attempt read it
    #[error("Local collection changed during sync; run sync again")]
    LocalChanged,

    /// Sync attempt moved through the state machine out of order
    #[error("Invalid sync transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error came from an I/O boundary (storage or network).
    ///
    /// Failed sync attempts log these as retryable; the pure engines never
    /// produce them.
    pub const fn is_io_boundary(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::RemoteFetch(_) | Self::LibSql(_) | Self::Io(_)
        )
    }
}
