//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/chanstat/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/chanstat/` (~/.config/chanstat/)
//! - Data: `$XDG_DATA_HOME/chanstat/` (~/.local/share/chanstat/)
//! - State/Logs: `$XDG_STATE_HOME/chanstat/` (~/.local/state/chanstat/)

use crate::error::{Error, Result};
use crate::ingest::formats::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upper bound for nick lengths; matches the width of the nick columns.
pub const NICK_LENGTH_LIMIT: usize = 255;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Parser and aggregation settings
    #[serde(default)]
    pub parser: ParserConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings that shape how log lines are aggregated
#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    /// Consecutive lines from one nick needed to count as a monologue
    #[serde(default = "default_minstreak")]
    pub minstreak: u32,

    /// Shortest nick accepted by validation
    #[serde(default = "default_nick_minlen")]
    pub nick_minlen: usize,

    /// Longest nick accepted by validation
    #[serde(default = "default_nick_maxlen")]
    pub nick_maxlen: usize,

    /// Quotes this long (in bytes) or longer are stored as "long" examples
    #[serde(default = "default_quote_preflen")]
    pub quote_preflen: usize,

    /// Register words in the word dictionary
    #[serde(default = "default_wordtracking")]
    pub wordtracking: bool,

    /// Log format grammar
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            minstreak: default_minstreak(),
            nick_minlen: default_nick_minlen(),
            nick_maxlen: default_nick_maxlen(),
            quote_preflen: default_quote_preflen(),
            wordtracking: default_wordtracking(),
            format: LogFormat::default(),
        }
    }
}

impl ParserConfig {
    /// Inclusive nick length bounds used by validation.
    ///
    /// Both settings are clamped into `[1, 255]` first; the lower bound never
    /// exceeds the upper one.
    pub fn nick_length_bounds(&self) -> (usize, usize) {
        let minlen = self.nick_minlen.clamp(1, NICK_LENGTH_LIMIT);
        let maxlen = self.nick_maxlen.clamp(1, NICK_LENGTH_LIMIT);
        (minlen.min(maxlen), maxlen)
    }
}

fn default_minstreak() -> u32 {
    5
}

fn default_nick_minlen() -> usize {
    1
}

fn default_nick_maxlen() -> usize {
    NICK_LENGTH_LIMIT
}

fn default_quote_preflen() -> usize {
    25
}

fn default_wordtracking() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/chanstat/config.toml` (~/.config/chanstat/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("chanstat").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("chanstat")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("chanstat")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/chanstat/data.db` (~/.local/share/chanstat/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("chanstat.log")
    }
}
