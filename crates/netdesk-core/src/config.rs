//! Configuration management for the netdesk console

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend REST API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Socket.IO configuration
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Session (token) storage configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Display and refresh settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend, without the `/api` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Socket.IO configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Socket server URL; falls back to the API base URL when unset
    #[serde(default)]
    pub socket_url: Option<String>,
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JSON file holding the token and user object
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

/// Display and refresh settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Locale used for currency formatting
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Rows per page on paginated tables
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,

    /// Points kept on rolling line charts
    #[serde(default = "default_chart_history")]
    pub chart_history: usize,

    /// Polling interval for stats cards, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_request_timeout() -> u64 {
    30
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".netdesk-session.json")
}

fn default_locale() -> String {
    "id-ID".to_string()
}

const fn default_items_per_page() -> usize {
    10
}

const fn default_chart_history() -> usize {
    20
}

const fn default_poll_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            items_per_page: default_items_per_page(),
            chart_history: default_chart_history(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RealtimeConfig {
    /// Socket server URL, defaulting to the API host
    #[must_use]
    pub fn resolve_url<'a>(&'a self, api: &'a ApiConfig) -> &'a str {
        self.socket_url.as_deref().unwrap_or(&api.base_url)
    }
}

impl Config {
    /// Load configuration from an optional `netdesk.toml` and the environment
    ///
    /// Environment keys use the `NETDESK_` prefix and `__` between sections,
    /// e.g. `NETDESK_API__BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load() -> crate::Result<Self> {
        Self::build(config::File::with_name("netdesk").required(false))
    }

    /// Load configuration from an explicit file, still honouring the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        Self::build(config::File::from(path).required(true))
    }

    fn build<S>(file: S) -> crate::Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("NETDESK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
