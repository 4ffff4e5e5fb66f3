//! Cadence CLI - spaced repetition from the command line
//!
//! Drives the core against a local libSQL database and syncs through a
//! shared snapshot file or HTTP endpoint.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_config_path, resolve_db_path};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::deck::run_deck;
use crate::commands::due::run_due;
use crate::commands::export::{run_export, run_import};
use crate::commands::init::run_init;
use crate::commands::item::run_item;
use crate::commands::review::{run_reset, run_review};
use crate::commands::series::run_series;
use crate::commands::simulate::{run_simulate, SimulateOptions};
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "cadence=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        command,
        db_path,
        config,
    } = Cli::parse();

    match command {
        Commands::Init => run_init(&resolve_db_path(db_path)?).await?,
        Commands::Deck { command } => run_deck(command, &resolve_db_path(db_path)?).await?,
        Commands::Item { command } => run_item(command, &resolve_db_path(db_path)?).await?,
        Commands::Series { command } => run_series(command, &resolve_db_path(db_path)?).await?,
        Commands::Due { limit, json } => {
            run_due(
                limit,
                json,
                &resolve_db_path(db_path)?,
                &resolve_config_path(config)?,
            )
            .await?;
        }
        Commands::Review { item, rating } => {
            run_review(
                &item,
                &rating,
                &resolve_db_path(db_path)?,
                &resolve_config_path(config)?,
            )
            .await?;
        }
        Commands::Reset { item } => run_reset(&item, &resolve_db_path(db_path)?).await?,
        Commands::Simulate {
            days,
            new_per_day,
            retention,
            from_history,
            seed,
            json,
        } => {
            let options = SimulateOptions {
                days,
                new_per_day,
                retention,
                from_history,
                seed,
            };
            run_simulate(
                options,
                json,
                &resolve_db_path(db_path)?,
                &resolve_config_path(config)?,
            )
            .await?;
        }
        Commands::Sync {
            remote,
            resolve_all,
            token,
            full,
        } => run_sync(&remote, resolve_all, token, full, &resolve_db_path(db_path)?).await?,
        Commands::Export { output } => {
            run_export(output.as_deref(), &resolve_db_path(db_path)?).await?;
        }
        Commands::Import { path, force } => {
            run_import(&path, force, &resolve_db_path(db_path)?).await?;
        }
        Commands::Config { command } => run_config(&command, &resolve_config_path(config)?)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
