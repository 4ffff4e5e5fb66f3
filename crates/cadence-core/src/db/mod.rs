//! Database layer for Cadence

mod connection;
mod migrations;
mod snapshot_repository;

pub use connection::Database;
pub use snapshot_repository::{LibSqlSnapshotRepository, SnapshotRepository};
