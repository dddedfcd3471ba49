//! Configuration module for Forwardarr.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! environment-variable overrides, validation, defaults, and a builder for
//! programmatic use.
//!
//! Resolution order: built-in defaults, then the YAML file (if present), then
//! the environment variables used by container deployments.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Forwardarr.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub torrent_client: TorrentClientConfig,
    pub startup: StartupConfig,
    pub sync: SyncConfig,
    pub webhook: WebhookConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Where the VPN client writes the forwarded port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// File containing the forwarded port as base-10 text.
    pub port_file: PathBuf,
}

/// Torrent client WebUI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentClientConfig {
    /// Base URL of the WebUI, e.g. `http://localhost:8080`.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
}

/// Connection establishment at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Base delay in seconds for the exponential backoff (0 = default).
    pub retry_delay: u64,
    /// Wall-clock budget in seconds for connecting (0 = default).
    pub timeout: u64,
}

/// Steady-state synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Seconds between periodic reconciliations; 0 disables the timer.
    pub interval: u64,
}

/// Optional webhook notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Destination URL. `None` disables notifications.
    pub url: Option<String>,
    /// Per-delivery timeout in seconds.
    pub timeout: u64,
    /// Subscribed event names.
    pub events: Vec<String>,
}

/// Status and metrics HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `json` or `pretty`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Backoff base used when `startup.retry_delay` is unset.
pub const DEFAULT_STARTUP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Connection budget used when `startup.timeout` is unset.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            port_file: PathBuf::from("/tmp/gluetun/forwarded_port"),
        }
    }
}

impl Default for TorrentClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
            request_timeout: 10,
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_STARTUP_RETRY_DELAY.as_secs(),
            timeout: DEFAULT_STARTUP_TIMEOUT.as_secs(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { interval: 300 }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: 10,
            events: vec!["port_changed".to_string()],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl StartupConfig {
    /// Backoff base, with 0 normalised to [`DEFAULT_STARTUP_RETRY_DELAY`].
    pub fn retry_delay(&self) -> Duration {
        match self.retry_delay {
            0 => DEFAULT_STARTUP_RETRY_DELAY,
            secs => Duration::from_secs(secs),
        }
    }

    /// Connection budget, with 0 normalised to [`DEFAULT_STARTUP_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        match self.timeout {
            0 => DEFAULT_STARTUP_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }
}

impl SyncConfig {
    /// Periodic reconciliation interval; `None` when the timer is disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval > 0).then(|| Duration::from_secs(self.interval))
    }
}

impl WebhookConfig {
    /// True when a destination URL is configured.
    pub fn enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from [`Config::default`].
    ///
    /// A file that exists but cannot be parsed is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/forwardarr/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("forwardarr")
            .join("config.yaml")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Empty values are ignored. Duration values are whole seconds, and a
    /// negative value counts as 0 (timer off, or the startup default);
    /// values that fail to parse leave the current setting untouched.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let secs = |key: &str| {
            get(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .map(|v| u64::try_from(v).unwrap_or(0))
        };

        if let Some(v) = get("GLUETUN_PORT_FILE") {
            self.source.port_file = PathBuf::from(v);
        }
        if let Some(v) = get("TORRENT_CLIENT_URL") {
            self.torrent_client.url = v;
        }
        if let Some(v) = get("TORRENT_CLIENT_USER") {
            self.torrent_client.username = v;
        }
        if let Some(v) = get("TORRENT_CLIENT_PASSWORD") {
            self.torrent_client.password = v;
        }
        if let Some(v) = secs("STARTUP_RETRY_DELAY") {
            self.startup.retry_delay = v;
        }
        if let Some(v) = secs("STARTUP_TIMEOUT") {
            self.startup.timeout = v;
        }
        if let Some(v) = secs("SYNC_INTERVAL") {
            self.sync.interval = v;
        }
        if let Some(v) = get("METRICS_PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.server.port = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.logging.format = v.to_lowercase();
        }
        if let Some(v) = get("WEBHOOK_URL") {
            self.webhook.url = Some(v);
        }
        if let Some(v) = secs("WEBHOOK_TIMEOUT") {
            self.webhook.timeout = v;
        }
        if let Some(v) = get("WEBHOOK_EVENTS") {
            self.webhook.events = parse_events(&v);
        }
    }
}

/// Splits a comma-separated event list, falling back to `port_changed`.
fn parse_events(raw: &str) -> Vec<String> {
    let events: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .collect();

    if events.is_empty() {
        WebhookConfig::default().events
    } else {
        events
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"torrent_client.url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["json", "pretty"];

/// True when `raw` parses as an absolute http(s) URL with a host.
fn is_http_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- source ---
        if self.source.port_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "source.port_file".into(),
                message: "must not be empty".into(),
            });
        } else if self.source.port_file.file_name().is_none() {
            errors.push(ValidationError {
                field: "source.port_file".into(),
                message: format!(
                    "must name a file, got {}",
                    self.source.port_file.display()
                ),
            });
        }

        // --- torrent_client ---
        if !is_http_url(&self.torrent_client.url) {
            errors.push(ValidationError {
                field: "torrent_client.url".into(),
                message: format!(
                    "must be an http:// or https:// URL, got '{}'",
                    self.torrent_client.url
                ),
            });
        }
        if self.torrent_client.username.is_empty() {
            errors.push(ValidationError {
                field: "torrent_client.username".into(),
                message: "must not be empty".into(),
            });
        }
        if self.torrent_client.request_timeout == 0 {
            errors.push(ValidationError {
                field: "torrent_client.request_timeout".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- webhook ---
        if let Some(url) = self.webhook.url.as_deref().filter(|u| !u.is_empty()) {
            if !is_http_url(url) {
                errors.push(ValidationError {
                    field: "webhook.url".into(),
                    message: format!("must be an http:// or https:// URL, got '{url}'"),
                });
            }
            if self.webhook.timeout == 0 {
                errors.push(ValidationError {
                    field: "webhook.timeout".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use forwardarr_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .port_file("/gluetun/forwarded_port")
///     .torrent_client_url("http://qbittorrent:8080")
///     .sync_interval(60)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn port_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source.port_file = path.into();
        self
    }

    pub fn torrent_client_url(mut self, url: impl Into<String>) -> Self {
        self.config.torrent_client.url = url.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.torrent_client.username = username.into();
        self.config.torrent_client.password = password.into();
        self
    }

    pub fn startup(mut self, retry_delay_secs: u64, timeout_secs: u64) -> Self {
        self.config.startup.retry_delay = retry_delay_secs;
        self.config.startup.timeout = timeout_secs;
        self
    }

    pub fn sync_interval(mut self, seconds: u64) -> Self {
        self.config.sync.interval = seconds;
        self
    }

    pub fn webhook_url(mut self, url: impl Into<String>) -> Self {
        self.config.webhook.url = Some(url.into());
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
