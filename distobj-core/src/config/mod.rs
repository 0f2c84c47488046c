//! Configuration for the distributed object store
//!
//! Restore defaults to 5000 rounds, 100ms apart. Values can be overridden
//! from the environment or a TOML file.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store identity
    pub store: StoreConfig,

    /// Restore (full sync) loop
    pub restore: RestoreConfig,

    /// Remote cache bridge
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Store identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Owning application's bundle name, used as the cache namespace
    pub bundle_name: String,
}

/// Restore loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Maximum number of polling rounds before giving up
    pub max_rounds: u32,

    /// Pause between rounds
    #[serde(with = "humantime_serde")]
    pub round_interval: Duration,
}

/// Remote cache bridge tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a save/revoke waits for the remote callback
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Describe and record metrics
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bundle_name: "com.example.distobj".to_string(),
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5000,
            round_interval: Duration::from_millis(100),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: DISTOBJ_<SECTION>_<KEY>
    /// Example: DISTOBJ_RESTORE_MAX_ROUNDS=100
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.bundle_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "bundle_name must not be empty".to_string(),
            ));
        }

        if self.restore.max_rounds == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_rounds must be greater than 0".to_string(),
            ));
        }

        if self.cache.timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "cache timeout must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(bundle) = lookup("DISTOBJ_STORE_BUNDLE_NAME") {
            self.store.bundle_name = bundle;
        }

        if let Some(rounds) = lookup("DISTOBJ_RESTORE_MAX_ROUNDS") {
            self.restore.max_rounds = rounds
                .parse()
                .map_err(|e| ConfigError::invalid_env("DISTOBJ_RESTORE_MAX_ROUNDS", e))?;
        }
        if let Some(interval) = lookup("DISTOBJ_RESTORE_ROUND_INTERVAL") {
            self.restore.round_interval = humantime::parse_duration(&interval)
                .map_err(|e| ConfigError::invalid_env("DISTOBJ_RESTORE_ROUND_INTERVAL", e))?;
        }

        if let Some(timeout) = lookup("DISTOBJ_CACHE_TIMEOUT") {
            self.cache.timeout = humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::invalid_env("DISTOBJ_CACHE_TIMEOUT", e))?;
        }

        if let Some(level) = lookup("DISTOBJ_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("DISTOBJ_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::invalid_env("DISTOBJ_LOG_JSON", e))?;
        }

        if let Some(enabled) = lookup("DISTOBJ_METRICS_ENABLED") {
            self.metrics.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::invalid_env("DISTOBJ_METRICS_ENABLED", e))?;
        }

        Ok(())
    }
}
