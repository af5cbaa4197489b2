use crate::end_date::DEFAULT_HORIZON_DAYS;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "MAINTENANCE_CALENDAR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] io::Error),
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DelayToleranceSettings {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    #[serde(alias = "delayToleranceSettings")]
    pub delay_tolerance: DelayToleranceSettings,
    /// Days the end-date walk (and the exception fetch behind it) may cover.
    pub lookahead_horizon_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delay_tolerance: DelayToleranceSettings::default(),
            lookahead_horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: EngineConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file named by `MAINTENANCE_CALENDAR_CONFIG`, defaults when
    /// the variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!(%path, "loading engine configuration");
                Self::from_json_file(path)
            }
            Err(_) => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lookahead_horizon_days == 0 {
            return Err(ConfigError::Invalid(
                "lookaheadHorizonDays must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
