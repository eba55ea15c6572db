//! Configuration management for homewatch.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//! Paths are resolved once into [`AgentPaths`] and passed down as plain
//! values from then on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::{default_exclude_words, default_include_processes, FilterPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "homewatch";

/// Default directory for day partitions, under the data directory.
const LOG_DIR_NAME: &str = "data";

/// Default key file name.
const KEY_FILE_NAME: &str = "encryption.key";

/// Default error log file name.
const ERROR_LOG_FILE_NAME: &str = "error.log";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `HOMEWATCH_`)
/// 2. TOML config file at `~/.config/homewatch/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Capture configuration.
    pub capture: CaptureConfig,
    /// Keyword filter configuration.
    pub filters: FilterConfig,
    /// Consent configuration.
    pub consent: ConsentConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for day partitions.
    /// Defaults to `~/.local/share/homewatch/data`
    pub log_directory: Option<PathBuf>,
    /// Path to the encryption key file.
    /// Defaults to `~/.local/share/homewatch/encryption.key`
    pub key_file: Option<PathBuf>,
    /// Path to the unencrypted error/event log.
    /// Defaults to `~/.local/share/homewatch/error.log`
    pub error_log: Option<PathBuf>,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Enable keyword capture from keystrokes.
    pub keystrokes_enabled: bool,
    /// Enable periodic screenshots.
    pub screenshots_enabled: bool,
    /// Minutes between screenshots. Fractions are allowed.
    pub screenshot_interval_minutes: f64,
    /// Seconds without a keystroke before a partial word is flushed.
    pub buffer_timeout_seconds: u64,
    /// Longest word kept in the buffer before it is force-flushed.
    pub max_word_length: usize,
}

/// Keyword filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Process name substrings to log from. Empty logs from every process.
    pub include_processes: Vec<String>,
    /// Substrings that veto any word containing them.
    pub exclude_words: Vec<String>,
}

/// Consent configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Whether the end-user license agreement has been accepted.
    pub eula_accepted: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            keystrokes_enabled: true,
            screenshots_enabled: true,
            screenshot_interval_minutes: 5.0,
            buffer_timeout_seconds: 5,
            max_word_length: 256,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_processes: default_include_processes()
                .into_iter()
                .map(String::from)
                .collect(),
            exclude_words: default_exclude_words()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Fully resolved filesystem locations, computed once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentPaths {
    /// Base directory holding one directory per day.
    pub log_directory: PathBuf,
    /// Encryption key file.
    pub key_file: PathBuf,
    /// Unencrypted error/event log.
    pub error_log: PathBuf,
}

impl Config {
    /// Load configuration from all sources.
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
            .merge(Env::prefixed("HOMEWATCH_").split("__"));

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
    /// A non-positive screenshot interval is accepted here; the scheduler
    /// refuses to start on it and the keystroke side keeps running.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capture.buffer_timeout_seconds == 0 {
            return Err(Error::ConfigValidation {
                message: "buffer_timeout_seconds must be greater than 0".to_string(),
            });
        }

        if self.capture.max_word_length < 2 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "max_word_length ({}) must be at least 2",
                    self.capture.max_word_length
                ),
            });
        }

        let paths = self.resolve_paths();
        if paths.error_log.starts_with(&paths.log_directory) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "error_log ({}) must be outside log_directory ({})",
                    paths.error_log.display(),
                    paths.log_directory.display()
                ),
            });
        }

        if paths.key_file.starts_with(&paths.log_directory) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "key_file ({}) must be outside log_directory ({})",
                    paths.key_file.display(),
                    paths.log_directory.display()
                ),
            });
        }

        Ok(())
    }

    /// Check that monitoring has been agreed to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConsentRequired`] naming the file to edit.
    pub fn require_consent(&self, config_path: &Path) -> Result<()> {
        if self.consent.eula_accepted {
            Ok(())
        } else {
            Err(Error::ConsentRequired {
                path: config_path.to_path_buf(),
            })
        }
    }

    /// Resolve every storage path, filling in defaults.
    ///
    /// Relative paths are made absolute against the current directory, so
    /// the result does not change if the process later changes directory.
    #[must_use]
    pub fn resolve_paths(&self) -> AgentPaths {
        let cwd = std::env::current_dir().ok();
        let data_dir = Self::default_data_dir();
        let resolve = |configured: &Option<PathBuf>, default_name: &str| {
            let path = configured
                .clone()
                .unwrap_or_else(|| data_dir.join(default_name));
            absolutize(path, cwd.as_deref())
        };
        AgentPaths {
            log_directory: resolve(&self.storage.log_directory, LOG_DIR_NAME),
            key_file: resolve(&self.storage.key_file, KEY_FILE_NAME),
            error_log: resolve(&self.storage.error_log, ERROR_LOG_FILE_NAME),
        }
    }

    /// Build the keyword filter policy.
    #[must_use]
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy::new(&self.filters.include_processes, &self.filters.exclude_words)
    }

    /// Get the inactivity timeout as a Duration.
    #[must_use]
    pub fn buffer_timeout(&self) -> Duration {
        Duration::from_secs(self.capture.buffer_timeout_seconds)
    }
}

/// Join a relative `path` onto `base`. Left as is if there is no base.
fn absolutize(path: PathBuf, base: Option<&Path>) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}
