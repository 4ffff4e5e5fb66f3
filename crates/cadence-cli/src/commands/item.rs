use std::path::Path;

use cadence_core::models::ItemKind;
use cadence_core::{collection, Reviewable};
use chrono::Utc;

use crate::cli::ItemCommands;
use crate::commands::common::{load_current, open_store, resolve_deck, save_current, short_id};
use crate::error::CliError;

pub async fn run_item(command: ItemCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        ItemCommands::Add {
            deck,
            front,
            back,
            kind,
            tags,
        } => run_item_add(&deck, &front, &back, kind.into(), &tags, db_path).await,
    }
}

pub async fn run_item_add(
    deck_query: &str,
    front: &str,
    back: &str,
    kind: ItemKind,
    tags: &[String],
    db_path: &Path,
) -> Result<(), CliError> {
    let item = build_item(front, back, kind, tags)?;
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let deck = resolve_deck(&snapshot, deck_query)?;
    let (deck_id, deck_name) = (deck.id, deck.name.clone());
    let item_id = item.id;

    let next = collection::add_item(&snapshot, &deck_id, item, Utc::now())?;
    save_current(&store, &next).await?;

    println!("Added item {} to {deck_name}", short_id(&item_id));
    Ok(())
}

pub fn build_item(
    front: &str,
    back: &str,
    kind: ItemKind,
    tags: &[String],
) -> Result<Reviewable, CliError> {
    let front = front.trim();
    if front.is_empty() {
        return Err(CliError::InvalidArgument(
            "item front cannot be empty".to_string(),
        ));
    }

    let mut item = Reviewable::new(front, back.trim(), Utc::now());
    item.kind = kind;
    item.tags.extend(
        tags.iter()
            .map(|tag| tag.trim().trim_start_matches('#').to_ascii_lowercase())
            .filter(|tag| !tag.is_empty()),
    );
    Ok(item)
}
