//! Herdstore configuration module.
//!
//! Provides configuration file support via `herdstore.toml`, environment
//! variables, and runtime overrides.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`HERDSTORE_*`)
//! 2. Configuration file (`herdstore.toml`)
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Farm (snapshot archive) configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Archive root directory.
    pub root: String,
    /// Worker threads for save/load (0 = one per core).
    pub workers: usize,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            root: "./herdstore_farm".to_string(),
            workers: 0,
        }
    }
}

/// KV (object storage) configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Replica count for created hyper volumes and objects.
    pub nr_copies: u8,
    /// Replication policy (0 = full copies).
    pub copy_policy: u8,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            nr_copies: 3,
            copy_policy: 0,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace.
    pub level: String,
    /// Log format: text or json.
    pub format: String,
    /// Log file path (empty = stdout).
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: String::new(),
        }
    }
}

/// Main herdstore configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HerdConfig {
    /// Farm configuration.
    pub farm: FarmConfig,
    /// KV configuration.
    pub kv: KvConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl HerdConfig {
    /// Loads configuration from default sources.
    ///
    /// Priority: defaults < file < environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("herdstore.toml")
    }

    /// Loads configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration parsing fails.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HERDSTORE_").split("_").lowercase(false));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Creates a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.farm.root.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "farm.root".to_string(),
                message: "archive root must not be empty".to_string(),
            });
        }

        if self.farm.workers > 1024 {
            return Err(ConfigError::InvalidValue {
                key: "farm.workers".to_string(),
                message: format!("value {} is out of range [0, 1024]", self.farm.workers),
            });
        }

        if !(1..=8).contains(&self.kv.nr_copies) {
            return Err(ConfigError::InvalidValue {
                key: "kv.nr_copies".to_string(),
                message: format!("value {} is out of range [1, 8]", self.kv.nr_copies),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                message: format!("unknown level '{}'", self.logging.level),
            });
        }

        Ok(())
    }
}
