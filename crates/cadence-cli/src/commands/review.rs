use std::path::Path;

use cadence_core::collection::{self, ReviewReceipt};
use cadence_core::models::parse_review_action;
use cadence_core::scheduling::{format_interval, LeechOutcome, LEECH_TAG};
use cadence_core::Scheduler;
use chrono::Utc;

use crate::commands::common::{
    format_timestamp, load_config, load_current, open_store, preview_text, resolve_item,
    save_current, truncate,
};
use crate::error::CliError;

pub async fn run_review(
    item_query: &str,
    rating: &str,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let rating = parse_review_action(rating)?;
    let config = load_config(config_path)?;
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let item_id = resolve_item(&snapshot, item_query)?.item.id;

    let (next, receipt) =
        collection::record_review(&snapshot, &item_id, rating, &config, Utc::now())?;
    save_current(&store, &next).await?;

    for line in review_summary(&receipt) {
        println!("{line}");
    }
    if rating.is_some() && !receipt.item.suspended {
        let preview = Scheduler::from_config(&config).preview_intervals(&receipt.item);
        println!("Next time: {}", preview_text(preview));
    }
    Ok(())
}

pub fn review_summary(receipt: &ReviewReceipt) -> Vec<String> {
    let front = truncate(&receipt.item.front, 40);
    let mut lines = vec![match receipt.log.rating {
        Some(rating) => format!(
            "Rated '{front}' {rating}: next review in {} ({})",
            format_interval(receipt.item.interval),
            format_timestamp(receipt.item.due_date)
        ),
        None => format!("Suspended '{front}'"),
    }];

    if let Some(outcome) = receipt.leech {
        let lapses = receipt.item.lapses;
        lines.push(match outcome {
            LeechOutcome::Suspended => {
                format!("Leech after {lapses} lapses: item suspended")
            }
            LeechOutcome::Tagged => {
                format!("Leech after {lapses} lapses: tagged '{LEECH_TAG}'")
            }
            LeechOutcome::Warned => {
                format!("Leech after {lapses} lapses: consider rewriting this item")
            }
        });
    }
    lines
}

pub async fn run_reset(item_query: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;
    let entry = resolve_item(&snapshot, item_query)?;
    let (item_id, front) = (entry.item.id, truncate(&entry.item.front, 40));

    let next = collection::reset_progress(&snapshot, &item_id, Utc::now())?;
    save_current(&store, &next).await?;

    println!("Reset progress for '{front}'; it is due now");
    Ok(())
}
