use std::path::Path;

use cadence_core::StudyConfig;

use crate::cli::ConfigCommands;
use crate::commands::common::load_config;
use crate::error::CliError;

pub fn run_config(command: &ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_config_show(config_path),
        ConfigCommands::Init { force } => run_config_init(*force, config_path),
    }
}

pub fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };

    println!("# {source}");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn run_config_init(force: bool, config_path: &Path) -> Result<(), CliError> {
    if config_path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        )));
    }

    StudyConfig::default().save_to_path(config_path)?;
    println!("{}", config_path.display());
    Ok(())
}
