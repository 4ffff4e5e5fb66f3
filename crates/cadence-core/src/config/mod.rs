//! Study configuration.
//!
//! A closed, explicitly enumerated set of engine knobs: leech policy,
//! simulation assumptions, and scheduler constants. Serialized as JSON and
//! shared by every client.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{DEFAULT_EASE_FACTOR, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR};

const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Remediation applied by the scheduler's caller when an item becomes a leech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeechAction {
    /// Suspend the item
    Suspend,
    /// Add the `leech` tag
    #[default]
    Tag,
    /// Only report it
    Warn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeechConfig {
    /// Lapse count at which an item is a leech (>= 1)
    #[serde(default = "default_leech_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub action: LeechAction,
}

impl Default for LeechConfig {
    fn default() -> Self {
        Self {
            threshold: default_leech_threshold(),
            action: LeechAction::default(),
        }
    }
}

const fn default_leech_threshold() -> u32 {
    8
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Probability that a due item is recalled, in (0, 1]
    #[serde(default = "default_retention")]
    pub retention: f64,
    #[serde(default = "default_new_items_per_day")]
    pub new_items_per_day: u32,
    /// Fixed seed for reproducible projections
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            new_items_per_day: default_new_items_per_day(),
            seed: None,
        }
    }
}

const fn default_retention() -> f64 {
    0.9
}

const fn default_new_items_per_day() -> u32 {
    10
}

/// SM-2 family constants used by the scheduling engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerParams {
    pub starting_ease: f64,
    pub ease_floor: f64,
    pub fail_penalty: f64,
    pub hard_penalty: f64,
    pub easy_gain: f64,
    pub hard_multiplier: f64,
    pub easy_bonus: f64,
    /// Interval assigned after a failed review
    pub relearn_interval: u32,
    /// Weight of the rating target when blending mastery
    pub mastery_weight: f64,
    pub max_interval: u32,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            starting_ease: DEFAULT_EASE_FACTOR,
            ease_floor: MIN_EASE_FACTOR,
            fail_penalty: 0.20,
            hard_penalty: 0.15,
            easy_gain: 0.15,
            hard_multiplier: 1.2,
            easy_bonus: 1.3,
            relearn_interval: 1,
            mastery_weight: 0.4,
            max_interval: MAX_INTERVAL_DAYS,
        }
    }
}

impl SchedulerParams {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.starting_ease,
            self.ease_floor,
            self.fail_penalty,
            self.hard_penalty,
            self.easy_gain,
            self.hard_multiplier,
            self.easy_bonus,
            self.mastery_weight,
        ];
        if finite.iter().any(|value| !value.is_finite()) {
            return invalid("scheduler parameters must be finite numbers");
        }
        if self.ease_floor < MIN_EASE_FACTOR {
            return invalid(&format!("scheduler.ease_floor must be >= {MIN_EASE_FACTOR}"));
        }
        if self.starting_ease < self.ease_floor {
            return invalid("scheduler.starting_ease must be >= scheduler.ease_floor");
        }
        if self.fail_penalty < 0.0 || self.hard_penalty < 0.0 || self.easy_gain < 0.0 {
            return invalid("scheduler ease adjustments must be non-negative");
        }
        if self.hard_multiplier < 1.0 || self.easy_bonus < 1.0 {
            return invalid("scheduler.hard_multiplier and easy_bonus must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.mastery_weight) {
            return invalid("scheduler.mastery_weight must be within [0, 1]");
        }
        if self.max_interval == 0 || self.max_interval > MAX_INTERVAL_DAYS {
            return invalid(&format!(
                "scheduler.max_interval must be within 1..={MAX_INTERVAL_DAYS}"
            ));
        }
        if self.relearn_interval > self.max_interval {
            return invalid("scheduler.relearn_interval must not exceed max_interval");
        }
        Ok(())
    }
}

/// Engine-relevant configuration surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub leech: LeechConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub scheduler: SchedulerParams,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_SCHEMA_VERSION,
            leech: LeechConfig::default(),
            simulation: SimulationConfig::default(),
            scheduler: SchedulerParams::default(),
        }
    }
}

const fn default_config_version() -> u32 {
    CONFIG_SCHEMA_VERSION
}

impl StudyConfig {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config = Self::parse(&raw)?;
        tracing::debug!("Loaded study config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a JSON payload
    pub fn parse(raw: &str) -> Result<Self> {
        let config = serde_json::from_str::<Self>(raw)
            .map_err(|error| Error::InvalidConfig(format!("invalid config JSON: {error}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_SCHEMA_VERSION {
            return invalid(&format!(
                "unsupported config version {} (expected {CONFIG_SCHEMA_VERSION})",
                self.version
            ));
        }
        if self.leech.threshold == 0 {
            return invalid("leech.threshold must be >= 1");
        }
        validate_retention(self.simulation.retention)?;
        self.scheduler.validate()
    }
}

/// Retention must be a probability strictly above zero
pub fn validate_retention(retention: f64) -> Result<()> {
    if retention.is_finite() && retention > 0.0 && retention <= 1.0 {
        Ok(())
    } else {
        invalid(&format!("retention {retention} must be within (0, 1]"))
    }
}

fn invalid<T>(message: &str) -> Result<T> {
    Err(Error::InvalidConfig(message.to_string()))
}
