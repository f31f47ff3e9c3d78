//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/trackline/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/trackline/` (~/.config/trackline/)
//! - Data: `$XDG_DATA_HOME/trackline/` (~/.local/share/trackline/)
//! - State/Logs: `$XDG_STATE_HOME/trackline/` (~/.local/state/trackline/)

use crate::dispatch::DispatchMode;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default pause between dispatch passes (120s)
pub const DEFAULT_DISPATCH_INTERVAL_MS: i64 = 120 * 1000;

/// Default connect/read timeout for one transmission (5s)
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5 * 1000;

/// Default session window (30min)
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30 * 60 * 1000;

/// Default maximum age of events kept in the offline cache (24h)
pub const DEFAULT_OFFLINE_CACHE_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// Default maximum size of the offline cache (4MB)
pub const DEFAULT_OFFLINE_CACHE_SIZE: i64 = 4 * 1024 * 1024;

/// Default number of records drained per dispatch pass
pub const DEFAULT_MAX_DRAIN: usize = 1000;

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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Collector endpoint and tracker identity
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Dispatcher behavior
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Session window
    #[serde(default)]
    pub session: SessionConfig,

    /// Offline cache ceilings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracker identity
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Tracking HTTP API endpoint, e.g. `https://analytics.example.com/matomo.php`
    pub api_url: Option<String>,

    /// Site id in the collector backend
    pub site_id: Option<u32>,

    /// Unique tracker name, used to key persisted settings
    #[serde(default = "default_tracker_name")]
    pub name: String,

    /// Base URL that relative paths are resolved against
    pub application_base_url: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            site_id: None,
            name: default_tracker_name(),
            application_base_url: None,
        }
    }
}

impl TrackerConfig {
    /// Check if enough is configured to build a tracker
    pub fn is_ready(&self) -> bool {
        self.api_url.is_some() && self.site_id.is_some()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let api_url = self
            .api_url
            .as_deref()
            .ok_or_else(|| Error::Config("tracker.api_url is required".to_string()))?;
        validate_api_url(api_url)?;

        match self.site_id {
            None => Err(Error::Config("tracker.site_id is required".to_string())),
            Some(0) => Err(Error::Config(
                "tracker.site_id must be greater than 0".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

/// Check that an endpoint is an absolute http(s) URL with a host.
pub(crate) fn validate_api_url(api_url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(api_url)
        .map_err(|e| Error::Config(format!("invalid api url {:?}: {}", api_url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "api url must use http or https, got {:?}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(Error::Config(format!("api url {:?} has no host", api_url)));
    }
    Ok(parsed)
}

fn default_tracker_name() -> String {
    "Default Tracker".to_string()
}

/// Dispatcher configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Pause between dispatch passes; 0 dispatches immediately, negative is manual-only
    #[serde(default = "default_dispatch_interval")]
    pub interval_ms: i64,

    /// Gzip bulk POST bodies
    #[serde(default)]
    pub gzip: bool,

    /// When the dispatcher may consider itself online
    #[serde(default)]
    pub mode: Option<DispatchMode>,

    /// Connect/read timeout for one transmission
    #[serde(default = "default_connection_timeout")]
    pub timeout_ms: u64,

    /// Records drained from the cache per pass
    #[serde(default = "default_max_drain")]
    pub max_drain: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_dispatch_interval(),
            gzip: false,
            mode: None,
            timeout_ms: default_connection_timeout(),
            max_drain: default_max_drain(),
        }
    }
}

fn default_dispatch_interval() -> i64 {
    DEFAULT_DISPATCH_INTERVAL_MS
}

fn default_connection_timeout() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_max_drain() -> usize {
    DEFAULT_MAX_DRAIN
}

/// Session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Inactivity window after which the next event starts a new session
    #[serde(default = "default_session_timeout")]
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout(),
        }
    }
}

fn default_session_timeout() -> u64 {
    DEFAULT_SESSION_TIMEOUT_MS
}

/// Offline cache ceilings
///
/// Unset values fall back to whatever the tracker has persisted, and then to
/// the defaults (24h, 4MB).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    /// >0 limit in ms, 0 unlimited, negative disables the disk tier
    pub max_age_ms: Option<i64>,

    /// >0 limit in bytes, 0 unlimited
    pub max_size_bytes: Option<i64>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Level for the dispatcher worker alone; it logs once per packet
    #[serde(default)]
    pub dispatch_level: Option<String>,

    /// Also print warnings and errors to stderr
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dispatch_level: None,
            stderr: false,
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
    /// `$XDG_CONFIG_HOME/trackline/config.toml` (~/.config/trackline/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("trackline").join("config.toml")
    }

    /// Returns the data directory path (preference store, offline cache)
    ///
    /// `$XDG_DATA_HOME/trackline/` (~/.local/share/trackline/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("trackline")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/trackline/` (~/.local/state/trackline/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("trackline")
    }

    /// Returns the preference store path
    pub fn store_path() -> PathBuf {
        Self::data_dir().join("preferences.db")
    }

    /// Returns the offline cache directory
    pub fn cache_dir() -> PathBuf {
        Self::data_dir().join("event_cache")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("trackline.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.tracker.is_ready());
        assert_eq!(config.tracker.name, "Default Tracker");
        assert_eq!(config.dispatch.interval_ms, 120_000);
        assert_eq!(config.dispatch.timeout_ms, 5_000);
        assert!(!config.dispatch.gzip);
        assert_eq!(config.session.timeout_ms, 1_800_000);
        assert!(config.cache.max_age_ms.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.dispatch_level.is_none());
        assert!(!config.logging.stderr);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[tracker]
api_url = "https://analytics.example.com/matomo.php"
site_id = 3
name = "app"

[dispatch]
interval_ms = -1
gzip = true
mode = "wifi_only"

[session]
timeout_ms = 60000

[cache]
max_age_ms = 1000
max_size_bytes = 0

[logging]
level = "debug"
dispatch_level = "trace"
stderr = true
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert!(config.tracker.is_ready());
        assert!(config.tracker.validate().is_ok());
        assert_eq!(config.tracker.site_id, Some(3));
        assert_eq!(config.dispatch.interval_ms, -1);
        assert!(config.dispatch.gzip);
        assert_eq!(config.dispatch.mode, Some(DispatchMode::WifiOnly));
        assert_eq!(config.session.timeout_ms, 60_000);
        assert_eq!(config.cache.max_age_ms, Some(1000));
        assert_eq!(config.cache.max_size_bytes, Some(0));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dispatch_level.as_deref(), Some("trace"));
        assert!(config.logging.stderr);
    }

    #[test]
    fn test_tracker_config_validation() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            api_url: Some("https://analytics.example.com/matomo.php".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            api_url: Some("https://analytics.example.com/matomo.php".to_string()),
            site_id: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            api_url: Some("not a url".to_string()),
            site_id: Some(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            api_url: Some("ftp://analytics.example.com/matomo.php".to_string()),
            site_id: Some(1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tracker]\napi_url = \"http://localhost/matomo.php\"\nsite_id = 1\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.tracker.is_ready());
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
