//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/tandem/config.toml)
//! 3. Environment variables (TANDEM_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "TANDEM";

/// Default remote poll interval (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite database, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the local database (file is `<data_dir>/<name>.db`)
    #[serde(default = "default_database_name")]
    pub database_name: String,

    /// GraphQL endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static API key sent as `x-api-key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whether the remote list is polled while online
    #[serde(default = "default_true")]
    pub polling_enabled: bool,

    /// Poll interval in milliseconds (0 disables polling)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Record tombstones for local deletes and honour them during sync
    #[serde(default = "default_true")]
    pub tombstones_enabled: bool,

    /// Push pending local records as soon as a local change is written.
    /// When off, they go out on reconnect, at startup, or with `tandem sync`
    #[serde(default = "default_true")]
    pub push_on_change: bool,

    /// Connectivity state at startup
    #[serde(default = "default_true")]
    pub start_online: bool,

    /// Timeout for a single GraphQL request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log file used by the TUI (defaults to `<data_dir>/debug.log`)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_name: default_database_name(),
            endpoint: None,
            api_key: None,
            polling_enabled: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            tombstones_enabled: true,
            push_on_change: true,
            start_online: true,
            request_timeout_secs: default_request_timeout_secs(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TANDEM_DATA_DIR, TANDEM_ENDPOINT, ...)
    /// 2. Config file (~/.config/tandem/config.toml or TANDEM_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_ENDPOINT", ENV_PREFIX)) {
            self.endpoint = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_KEY", ENV_PREFIX)) {
            self.api_key = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_POLL_INTERVAL_MS", ENV_PREFIX)) {
            match val.parse() {
                Ok(ms) => self.poll_interval_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid {}_POLL_INTERVAL_MS: {}", ENV_PREFIX, val),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_POLLING_ENABLED", ENV_PREFIX)) {
            self.polling_enabled = parse_flag(&val);
        }

        if let Ok(val) = std::env::var(format!("{}_TOMBSTONES_ENABLED", ENV_PREFIX)) {
            self.tombstones_enabled = parse_flag(&val);
        }

        if let Ok(val) = std::env::var(format!("{}_PUSH_ON_CHANGE", ENV_PREFIX)) {
            self.push_on_change = parse_flag(&val);
        }

        // TANDEM_OFFLINE=1 starts the connectivity monitor offline
        if let Ok(val) = std::env::var(format!("{}_OFFLINE", ENV_PREFIX)) {
            if parse_flag(&val) {
                self.start_online = false;
            }
        }
    }

    /// Ensure data directory exists
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TANDEM_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tandem")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.database_name))
    }

    /// Get the path used for TUI logging
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    /// Effective poll interval, `None` when polling is disabled
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.polling_enabled && self.poll_interval_ms > 0 {
            Some(Duration::from_millis(self.poll_interval_ms))
        } else {
            None
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether a remote endpoint is configured
    pub fn has_remote(&self) -> bool {
        self.endpoint.is_some()
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_database_name() -> String {
    "tandem".to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
}
