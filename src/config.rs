//! Configuration file parser for ~/.config/feedpull/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as a warning, since they are usually
//! typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::DEFAULT_USER_AGENT;
use crate::pull::PullerSettings;

/// Environment variable overriding `database_path`.
pub const DB_PATH_ENV: &str = "FEEDPULL_DB";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `None` means the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Minimum minutes between pulls of one feed, and the sweep period.
    pub pull_interval_minutes: u64,

    /// Per-feed deadline covering fetch and persistence.
    pub feed_timeout_secs: u64,

    /// Maximum concurrent feed pulls in a sweep.
    pub max_workers: usize,

    /// `User-Agent` header sent with feed requests.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            pull_interval_minutes: 30,
            feed_timeout_secs: 30,
            max_workers: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Longest accepted pull interval: one year.
    const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

    /// Longest accepted per-feed deadline: one hour.
    const MAX_FEED_TIMEOUT_SECS: u64 = 3600;

    const KNOWN_KEYS: [&'static str; 5] = [
        "database_path",
        "pull_interval_minutes",
        "feed_timeout_secs",
        "max_workers",
        "user_agent",
    ];

    /// Default config location, `~/.config/feedpull/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("feedpull")
                .join("config.toml")
        })
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// The result is not validated; call [`Config::validate`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            interval_minutes = config.pull_interval_minutes,
            max_workers = config.max_workers,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Apply environment overrides (`FEEDPULL_DB`).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Reject values the puller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pull_interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "pull_interval_minutes must be greater than 0".into(),
            ));
        }
        if self.pull_interval_minutes > Self::MAX_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "pull_interval_minutes must be at most {}",
                Self::MAX_INTERVAL_MINUTES
            )));
        }
        if self.feed_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "feed_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.feed_timeout_secs > Self::MAX_FEED_TIMEOUT_SECS {
            return Err(ConfigError::Invalid(format!(
                "feed_timeout_secs must be at most {}",
                Self::MAX_FEED_TIMEOUT_SECS
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        Ok(())
    }

    /// Database file, falling back to `~/.local/share/feedpull/feedpull.db`.
    pub fn resolve_database_path(&self) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".local").join("share").join("feedpull"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedpull.db")
    }

    pub fn puller_settings(&self) -> PullerSettings {
        PullerSettings {
            interval: Duration::from_secs(self.pull_interval_minutes.saturating_mul(60)),
            feed_timeout: Duration::from_secs(self.feed_timeout_secs),
            max_workers: self.max_workers,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
