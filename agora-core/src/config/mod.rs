//! Hub configuration.
//!
//! All fields have defaults so the hub can run without a config file; a TOML
//! file can override any subset of them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogLevel;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hub: HubConfig,
    pub logging: LoggingConfig,
}

/// Tuning knobs for the hub's dispatcher and worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Maximum number of inbound messages processed concurrently.
    pub num_workers: usize,

    /// Capacity of the inbound queue in front of the worker pool. Capacity 1
    /// makes saturation visible at the dispatch call, which is the intended
    /// backpressure point.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            num_workers: 10,
            queue_capacity: 1,
        }
    }
}

/// Logging section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info.as_str().to_string(),
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the hub cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.num_workers == 0 {
            return Err(ConfigError::Invalid(
                "hub.num_workers must be at least 1".to_string(),
            ));
        }
        if self.hub.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "hub.queue_capacity must be at least 1".to_string(),
            ));
        }
        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.hub.num_workers, 10);
        assert_eq!(config.hub.queue_capacity, 1);
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_overrides() {
        let config: Config = toml::from_str(
            r#"
            [hub]
            num_workers = 4

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.hub.num_workers, 4);
        assert_eq!(config.hub.queue_capacity, 1);
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn zero_workers_rejected() {
        let config: Config = toml::from_str("[hub]\nnum_workers = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn bad_log_level_rejected() {
        let config: Config = toml::from_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
