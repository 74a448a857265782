//! Configuration management for georun.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "georun";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "tracks.db";

/// Path value meaning "read fixes from standard input".
pub const STDIN_SOURCE: &str = "-";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GEORUN_`)
/// 2. TOML config file at `~/.config/georun/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Location source configuration.
    pub location: LocationConfig,
    /// Output configuration.
    pub display: DisplayConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/georun/tracks.db`
    pub database_path: Option<PathBuf>,
}

/// Location source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// File to read JSON-lines fixes from, or `-` for standard input.
    pub source: PathBuf,
    /// Delay between replayed fixes in milliseconds. 0 delivers them as fast
    /// as they can be read.
    pub replay_interval_ms: u64,
    /// Capacity of the channel between the source and the recorder.
    pub channel_capacity: usize,
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// `chrono` format string used for session times (local time zone).
    pub time_format: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from(STDIN_SOURCE),
            replay_interval_ms: 0,
            channel_capacity: 64,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: "%H:%M:%S %d-%m-%Y".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `GEORUN_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("GEORUN_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.location.channel_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "channel_capacity must be greater than 0".to_string(),
            });
        }

        if self.location.source.as_os_str().is_empty() {
            return Err(Error::ConfigValidation {
                message: format!("location source must be a file path or '{STDIN_SOURCE}'"),
            });
        }

        if self.display.time_format.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "time_format cannot be empty".to_string(),
            });
        }

        if StrftimeItems::new(&self.display.time_format).any(|item| matches!(item, Item::Error)) {
            return Err(Error::ConfigValidation {
                message: format!("invalid time_format: {}", self.display.time_format),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the replay interval, `None` when fixes are not paced.
    #[must_use]
    pub fn replay_interval(&self) -> Option<Duration> {
        if self.location.replay_interval_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.location.replay_interval_ms))
        }
    }
}
