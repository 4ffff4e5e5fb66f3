use std::path::{Path, PathBuf};

use cadence_core::export::{export_snapshot, import_snapshot, suggested_export_file_name};
use chrono::Utc;

use crate::commands::common::{load_current, open_store, save_current};
use crate::error::CliError;

pub async fn run_export(output_path: Option<&Path>, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let rendered = export_snapshot(&snapshot)?;

    if let Some(path) = output_path {
        let path = export_target(path, Utc::now().timestamp_millis());
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

/// A directory target gets a timestamped file name inside it.
pub fn export_target(path: &Path, timestamp_ms: i64) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(timestamp_ms))
    } else {
        path.to_path_buf()
    }
}

pub async fn run_import(input_path: &Path, force: bool, db_path: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(input_path)?;
    let imported = import_snapshot(&raw)?;

    let store = open_store(db_path).await?;
    let current = load_current(&store).await?;
    if !force && !(current.decks.is_empty() && current.deck_series.is_empty()) {
        return Err(CliError::InvalidArgument(
            "the local collection is not empty; pass --force to replace it".to_string(),
        ));
    }

    save_current(&store, &imported).await?;
    println!(
        "Imported {} deck(s) and {} series from {}",
        imported.decks.iter().filter(|deck| !deck.is_deleted()).count(),
        imported
            .deck_series
            .iter()
            .filter(|series| !series.is_deleted())
            .count(),
        input_path.display()
    );
    Ok(())
}
