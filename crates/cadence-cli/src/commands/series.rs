use std::path::Path;

use cadence_core::collection;
use chrono::Utc;

use crate::cli::SeriesCommands;
use crate::commands::common::{
    load_current, open_store, parse_level_spec, resolve_deck, resolve_series, save_current,
    short_id,
};
use crate::error::CliError;

pub async fn run_series(command: SeriesCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        SeriesCommands::Add { name, levels } => run_series_add(&name, &levels, db_path).await,
        SeriesCommands::Delete { series } => run_series_delete(&series, db_path).await,
        SeriesCommands::Complete { series, deck } => {
            run_series_complete(&series, &deck, db_path).await
        }
    }
}

pub async fn run_series_add(name: &str, level_specs: &[String], db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;

    let levels = level_specs
        .iter()
        .map(|spec| parse_level_spec(spec, &snapshot))
        .collect::<Result<Vec<_>, _>>()?;
    let level_count = levels.len();

    let (next, series_id) = collection::add_series(&snapshot, name, levels, Utc::now())?;
    save_current(&store, &next).await?;

    println!(
        "Created series {} ({}) with {level_count} level(s)",
        name.trim(),
        short_id(&series_id)
    );
    Ok(())
}

pub async fn run_series_delete(query: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let series = resolve_series(&snapshot, query)?;
    let (series_id, name) = (series.id, series.name.clone());

    let next = collection::delete_series(&snapshot, &series_id, Utc::now())?;
    save_current(&store, &next).await?;

    println!("Deleted series {name} ({})", short_id(&series_id));
    Ok(())
}

pub async fn run_series_complete(
    series_query: &str,
    deck_query: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let series = resolve_series(&snapshot, series_query)?;
    let deck = resolve_deck(&snapshot, deck_query)?;
    let (series_id, deck_id) = (series.id, deck.id);
    let (series_name, deck_name) = (series.name.clone(), deck.name.clone());

    let next = collection::complete_series_deck(&snapshot, &series_id, &deck_id, Utc::now())?;
    save_current(&store, &next).await?;

    let completed = next.completed_decks(&series_id).len();
    let total = next
        .series(&series_id)
        .map_or(0, |series| series.levels.iter().map(|level| level.deck_ids.len()).sum());
    println!("Completed {deck_name} in {series_name} ({completed}/{total} decks)");
    Ok(())
}
