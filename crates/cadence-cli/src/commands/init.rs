use std::path::Path;

use cadence_core::storage::{SnapshotSlot, SnapshotStore};
use cadence_core::Snapshot;
use chrono::Utc;

use crate::commands::common::{open_store, save_current};
use crate::error::CliError;

pub async fn run_init(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    if store.load_optional(SnapshotSlot::Current).await?.is_some() {
        println!("Collection already initialized at {}", db_path.display());
        return Ok(());
    }

    save_current(&store, &Snapshot::empty(Utc::now())).await?;
    println!("Initialized empty collection at {}", db_path.display());
    Ok(())
}
