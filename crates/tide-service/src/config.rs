//! Service configuration.
//!
//! [`StakingConfig`] is assembled from three layers, later ones winning:
//! built-in defaults, an optional TOML file, and `TIDE_*` environment
//! variables (e.g. `TIDE_MAX_ADVANCE_DAYS=30`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tide_core::constants::DEFAULT_DAY_LENGTH_SECS;

use crate::error::ServiceError;

/// Configuration for a staking service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Length of one staking day in seconds.
    pub day_length_secs: u64,
    /// Most days a single operation may finalize; `None` for no limit.
    pub max_advance_days: Option<u64>,
    /// Log level filter string (e.g. "info", "tide_staking=debug").
    pub log_level: String,
    /// Log output format, "text" or "json".
    pub log_format: String,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
    /// Where checkpoints are written.
    pub checkpoint_path: PathBuf,
}

impl Default for StakingConfig {
    fn default() -> Self {
        let checkpoint_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tide")
            .join("staking.bin");

        Self {
            day_length_secs: DEFAULT_DAY_LENGTH_SECS,
            max_advance_days: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            event_capacity: 1024,
            checkpoint_path,
        }
    }
}

impl StakingConfig {
    /// Defaults, then `file` if it exists, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ServiceError> {
        Self::load_from(file, None)
    }

    /// Like [`load`](Self::load) but reading variables from `env` instead of
    /// the process environment when given.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, ServiceError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder = builder.add_source(Environment::with_prefix("TIDE").try_parsing(true).source(env));
        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.day_length_secs == 0 {
            return Err(ServiceError::InvalidConfig("day_length_secs must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(ServiceError::InvalidConfig("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
