use std::path::Path;

use cadence_core::collection;
use cadence_core::util::normalize_text_option;
use chrono::Utc;

use crate::cli::DeckCommands;
use crate::commands::common::{
    deck_to_list_item, format_deck_lines, load_current, open_store, resolve_deck, save_current,
    short_id, DeckListItem,
};
use crate::error::CliError;

pub async fn run_deck(command: DeckCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        DeckCommands::Add { name, description } => run_deck_add(&name, description, db_path).await,
        DeckCommands::Delete { deck } => run_deck_delete(&deck, db_path).await,
        DeckCommands::Archive { deck, undo } => run_deck_archive(&deck, !undo, db_path).await,
        DeckCommands::List { all, json } => run_deck_list(all, json, db_path).await,
    }
}

pub async fn run_deck_add(
    name: &str,
    description: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let now = Utc::now();

    let (mut next, deck_id) = collection::add_deck(&snapshot, name, now)?;
    if let Some(deck) = next.deck_mut(&deck_id) {
        deck.description = normalize_text_option(description);
    }
    save_current(&store, &next).await?;

    println!("Created deck {} ({})", name.trim(), short_id(&deck_id));
    Ok(())
}

pub async fn run_deck_delete(query: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let deck = resolve_deck(&snapshot, query)?;
    let (deck_id, name) = (deck.id, deck.name.clone());

    let next = collection::delete_deck(&snapshot, &deck_id, Utc::now())?;
    save_current(&store, &next).await?;

    println!("Deleted deck {name} ({})", short_id(&deck_id));
    Ok(())
}

pub async fn run_deck_archive(query: &str, archived: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let deck = resolve_deck(&snapshot, query)?;
    let (deck_id, name) = (deck.id, deck.name.clone());

    let next = collection::set_deck_archived(&snapshot, &deck_id, archived, Utc::now())?;
    save_current(&store, &next).await?;

    let verb = if archived { "Archived" } else { "Unarchived" };
    println!("{verb} deck {name} ({})", short_id(&deck_id));
    Ok(())
}

pub async fn run_deck_list(include_archived: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let now = Utc::now();

    let items = snapshot
        .decks
        .iter()
        .filter(|deck| !deck.is_deleted() && (include_archived || !deck.archived))
        .map(|deck| deck_to_list_item(&snapshot, deck, now))
        .collect::<Vec<DeckListItem>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No decks yet. Create one with `cadence deck add <name>`.");
    } else {
        for line in format_deck_lines(&items) {
            println!("{line}");
        }
    }

    Ok(())
}
