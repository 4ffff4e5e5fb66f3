use std::path::Path;

use cadence_core::{due_items, Scheduler};
use chrono::Utc;

use crate::commands::common::{
    due_to_list_item, format_due_lines, load_config, load_current, open_store, DueListItem,
};
use crate::error::CliError;

pub async fn run_due(
    limit: Option<usize>,
    as_json: bool,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let now = Utc::now();

    let mut due = due_items(&snapshot, now);
    due.sort_by(|a, b| {
        a.item
            .due_date
            .cmp(&b.item.due_date)
            .then_with(|| a.deck.name.cmp(&b.deck.name))
    });
    let total = due.len();
    if let Some(limit) = limit {
        due.truncate(limit);
    }

    if as_json {
        let scheduler = Scheduler::from_config(&config);
        let json_items = due
            .iter()
            .map(|entry| due_to_list_item(*entry, &scheduler))
            .collect::<Vec<DueListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if due.is_empty() {
        println!("Nothing due today.");
        return Ok(());
    }

    for line in format_due_lines(&due, now) {
        println!("{line}");
    }
    if total > due.len() {
        println!("... and {} more", total - due.len());
    }
    Ok(())
}
