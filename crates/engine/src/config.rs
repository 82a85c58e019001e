//! Configuration via `grantsync.toml`
//!
//! The file is optional. When it is missing every setting takes its default;
//! `grantsync init-config` writes a commented default file to start from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use grantsync_core::{Error, Result};

use crate::retry::RetryConfig;

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "grantsync.toml";

/// `[executor]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Retries of the whole batch on `lock_not_available`
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Fixed sleep between attempts, in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// `SET LOCAL lock_timeout` issued at the start of each attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_interval_ms() -> u64 {
    500
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            lock_timeout_ms: None,
        }
    }
}

impl ExecutorConfig {
    /// The retry settings as a [`RetryConfig`]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_retry_interval(Duration::from_millis(self.retry_interval_ms))
    }

    /// The lock timeout, if configured
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Settings loaded from `grantsync.toml`
///
/// # Example
///
/// ```toml
/// contract = "contract.json"
///
/// [executor]
/// max_retries = 3
/// retry_interval_ms = 500
/// lock_timeout_ms = 2000
///
/// [logging]
/// filter = "info,grantsync::executor=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantsyncConfig {
    /// Contract file used when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<PathBuf>,
    /// Executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GrantsyncConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# grantsync configuration
#
# Contract used when --contract is not given.
# contract = "contract.json"

[executor]
# Retries of a whole apply() when PostgreSQL reports lock_not_available (55P03).
max_retries = 3
# Fixed pause between attempts, in milliseconds.
retry_interval_ms = 500
# Optional: SET LOCAL lock_timeout at the start of every attempt, so lock
# waits fail fast and enter the retry loop.
# lock_timeout_ms = 2000

[logging]
# tracing filter directive; RUST_LOG takes precedence.
filter = "info"
"#
    }

    /// Parse config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `true` if the file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|e| {
            Error::config(format!(
                "failed to write default config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
