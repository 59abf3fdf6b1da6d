//! Engine configuration
//!
//! Loaded from a TOML file and then overridden by `MULTISTEP_*`
//! environment variables:
//!
//! ```toml
//! log_level = "multistep=debug"
//! verbose = 1
//! debug = false
//!
//! [retry]
//! tries = 11
//! start_timeout = "5m"
//! ```

use crate::logging;
use crate::retry::RetrySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

pub const ENV_LOG_LEVEL: &str = "MULTISTEP_LOG_LEVEL";
pub const ENV_VERBOSE: &str = "MULTISTEP_VERBOSE";
pub const ENV_DEBUG: &str = "MULTISTEP_DEBUG";
pub const ENV_RETRY_TRIES: &str = "MULTISTEP_RETRY_TRIES";
pub const ENV_RETRY_START_TIMEOUT: &str = "MULTISTEP_RETRY_START_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value {value:?} for {key}: expected {expected}")]
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Explicit tracing filter; overrides `verbose` when set
    pub log_level: Option<String>,

    pub verbose: u8,

    /// Pause for confirmation between steps; applied by
    /// [`crate::Runner::from_config`]
    pub debug: bool,

    /// Default retry policy for steps that do not set their own
    pub retry: RetrySettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: None,
            verbose: 0,
            debug: false,
            retry: RetrySettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            origin: "string".to_string(),
            source,
        })
    }

    /// Read `path` and apply environment overrides
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        debug!("Loaded engine config from {}", path.display());

        config.merge_env_vars()?;
        Ok(config)
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if fs::try_exists(path).await.unwrap_or(false) {
            return Self::load(path).await;
        }

        debug!("No engine config at {}, using defaults", path.display());
        let mut config = Self::default();
        config.merge_env_vars()?;
        Ok(config)
    }

    pub fn merge_env_vars(&mut self) -> Result<(), ConfigError> {
        self.merge_from(|key| std::env::var(key).ok())
    }

    fn merge_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = Some(level);
        }

        if let Some(value) = lookup(ENV_VERBOSE) {
            self.verbose = parse_env(ENV_VERBOSE, &value, "an integer from 0 to 255", |v| {
                v.parse().ok()
            })?;
        }

        if let Some(value) = lookup(ENV_DEBUG) {
            self.debug = parse_env(ENV_DEBUG, &value, "true or false", |v| v.parse().ok())?;
        }

        if let Some(value) = lookup(ENV_RETRY_TRIES) {
            self.retry.tries = parse_env(ENV_RETRY_TRIES, &value, "a number of attempts", |v| {
                v.parse().ok()
            })?;
        }

        if let Some(value) = lookup(ENV_RETRY_START_TIMEOUT) {
            self.retry.start_timeout = parse_env(
                ENV_RETRY_START_TIMEOUT,
                &value,
                "a duration such as \"5m\"",
                parse_duration,
            )?;
        }

        Ok(())
    }

    /// Tracing filter directive for this config
    pub fn log_filter(&self) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| logging::log_filter(self.verbose).to_string())
    }
}

fn parse_duration(value: &str) -> Option<Duration> {
    humantime_serde::re::humantime::parse_duration(value).ok()
}

fn parse_env<T>(
    key: &str,
    value: &str,
    expected: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    parse(value.trim()).ok_or_else(|| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}
