use std::path::Path;

use cadence_core::scheduling::{observed_retention, simulate, DayLoad, SimulationRequest};
use cadence_core::{Reviewable, Scheduler, Snapshot, StudyConfig};
use chrono::Utc;
use serde::Serialize;

use crate::commands::common::{load_config, load_current, open_store};
use crate::error::CliError;

/// Overrides from the command line on top of the config's simulation defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulateOptions {
    pub days: u32,
    pub new_per_day: Option<u32>,
    pub retention: Option<f64>,
    pub from_history: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SimulationSummary<'a> {
    seed: u64,
    retention: f64,
    new_items_per_day: u32,
    peak_load: u32,
    mean_load: f64,
    total_reviews: u64,
    days: &'a [DayLoad],
}

pub async fn run_simulate(
    options: SimulateOptions,
    as_json: bool,
    db_path: &Path,
    config_path: &Path,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let store = open_store(db_path).await?;
    let snapshot = load_current(&store).await?;

    let request = build_request(&config, &snapshot, options)?;
    let items = active_items(&snapshot);
    let projection = simulate(
        &items,
        &request,
        &Scheduler::from_config(&config),
        Utc::now(),
    )?;

    if as_json {
        let summary = SimulationSummary {
            seed: request.seed,
            retention: request.retention,
            new_items_per_day: request.new_items_per_day,
            peak_load: projection.peak_load(),
            mean_load: projection.mean_load(),
            total_reviews: projection.total_reviews(),
            days: &projection.days,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    for day in &projection.days {
        println!(
            "{}  {:>5} reviews  {:>3} new  {:>5} total  mastery {:.2}",
            day.date, day.reviews, day.new_items, day.total, day.mean_mastery
        );
    }
    println!(
        "Peak {} / mean {:.1} per day over {} days (retention {:.2}, seed {})",
        projection.peak_load(),
        projection.mean_load(),
        projection.days.len(),
        request.retention,
        request.seed
    );
    Ok(())
}

pub fn build_request(
    config: &StudyConfig,
    snapshot: &Snapshot,
    options: SimulateOptions,
) -> Result<SimulationRequest, CliError> {
    let mut request = SimulationRequest::from_config(&config.simulation, options.days);
    if let Some(new_per_day) = options.new_per_day {
        request.new_items_per_day = new_per_day;
    }
    if let Some(seed) = options.seed {
        request.seed = seed;
    }
    if options.from_history {
        request.retention = observed_retention(&snapshot.reviews).ok_or_else(|| {
            CliError::InvalidArgument(
                "no rated reviews yet; pass --retention instead of --from-history".to_string(),
            )
        })?;
    } else if let Some(retention) = options.retention {
        request.retention = retention;
    }
    Ok(request)
}

fn active_items(snapshot: &Snapshot) -> Vec<Reviewable> {
    snapshot
        .decks
        .iter()
        .filter(|deck| deck.is_active())
        .flat_map(|deck| deck.items.iter().cloned())
        .collect()
}
