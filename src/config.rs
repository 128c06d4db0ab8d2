//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! Product policy values (realtime reconnection cap, inactivity timeout)
//! live here rather than in code so they can be tuned per deployment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Backend base URL. Required for any API call.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// The configured base URL, or a fatal configuration error
    pub fn require_base_url(&self) -> Result<&str, ConfigError> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingBaseUrl)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Realtime channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_realtime_enabled")]
    pub enabled: bool,

    /// Channel path appended to the API base URL
    #[serde(default = "default_realtime_path")]
    pub path: String,

    /// Consecutive connection errors before giving up on a channel
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Overall budget for one connection phase
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,

    /// Silence after which a live connection is considered dead
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_secs: u64,
}

fn default_realtime_enabled() -> bool {
    true
}

fn default_realtime_path() -> String {
    "/realtime".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_backoff_base() -> u64 {
    1000
}

fn default_backoff_max() -> u64 {
    5000
}

fn default_ping_timeout() -> u64 {
    60
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_realtime_enabled(),
            path: default_realtime_path(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout(),
            backoff_base_ms: default_backoff_base(),
            backoff_max_ms: default_backoff_max(),
            ping_timeout_secs: default_ping_timeout(),
        }
    }
}

impl RealtimeConfig {
    /// Delay before retry number `attempt` (1-based): grows linearly with
    /// the attempt number, capped at `backoff_max_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let ms = self
            .backoff_base_ms
            .saturating_mul(u64::from(attempt.max(1)))
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    /// Attempt cap, never below one
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which the session is cleared
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
}

fn default_inactivity_timeout() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }
}

/// Endpoint paths for the dashboard collections
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_hospitals_path")]
    pub hospitals: String,
    #[serde(default = "default_doctors_path")]
    pub doctors: String,
    #[serde(default = "default_patients_path")]
    pub patients: String,
    #[serde(default = "default_appointments_path")]
    pub appointments: String,
    #[serde(default = "default_orders_path")]
    pub orders: String,
    #[serde(default = "default_prescriptions_path")]
    pub prescriptions: String,
    #[serde(default = "default_inventory_path")]
    pub inventory: String,
    #[serde(default = "default_finance_path")]
    pub finance: String,
}

fn default_hospitals_path() -> String {
    "/hospitals".to_string()
}

fn default_doctors_path() -> String {
    "/doctors".to_string()
}

fn default_patients_path() -> String {
    "/patients".to_string()
}

fn default_appointments_path() -> String {
    "/appointments".to_string()
}

fn default_orders_path() -> String {
    "/orders".to_string()
}

fn default_prescriptions_path() -> String {
    "/prescriptions".to_string()
}

fn default_inventory_path() -> String {
    "/inventory".to_string()
}

fn default_finance_path() -> String {
    "/finance".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            hospitals: default_hospitals_path(),
            doctors: default_doctors_path(),
            patients: default_patients_path(),
            appointments: default_appointments_path(),
            orders: default_orders_path(),
            prescriptions: default_prescriptions_path(),
            inventory: default_inventory_path(),
            finance: default_finance_path(),
        }
    }
}

impl DashboardConfig {
    /// Endpoint path of a collection by name
    pub fn path_of(&self, collection: &str) -> Option<&str> {
        let path = match collection {
            "hospitals" => &self.hospitals,
            "doctors" => &self.doctors,
            "patients" => &self.patients,
            "appointments" => &self.appointments,
            "orders" => &self.orders,
            "prescriptions" => &self.prescriptions,
            "inventory" => &self.inventory,
            "finance" => &self.finance,
            _ => return None,
        };
        Some(path.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    /// Production runtime: suppressed realtime errors are logged at warn
    #[serde(default)]
    pub production: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            production: false,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("medconsole").join("config.toml")),
            Some(PathBuf::from("/etc/medconsole/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // API overrides
        if let Some(url) = var("MEDCONSOLE_API_URL") {
            self.api.base_url = Some(url);
        }

        // Realtime overrides
        if let Some(attempts) = var("MEDCONSOLE_REALTIME_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.realtime.max_attempts = n;
            }
        }
        if let Some(enabled) = var("MEDCONSOLE_REALTIME_ENABLED") {
            self.realtime.enabled = parse_flag(&enabled);
        }

        // Session overrides
        if let Some(secs) = var("MEDCONSOLE_INACTIVITY_SECS") {
            if let Ok(n) = secs.parse() {
                self.session.inactivity_timeout_secs = n;
            }
        }

        // Logging overrides
        if let Some(level) = var("MEDCONSOLE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("MEDCONSOLE_LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(production) = var("MEDCONSOLE_PRODUCTION") {
            self.logging.production = parse_flag(&production);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("API base URL is not configured (set api.base_url or MEDCONSOLE_API_URL)")]
    MissingBaseUrl,
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# MedConsole Configuration
#
# Environment variables override these settings:
# - MEDCONSOLE_API_URL
# - MEDCONSOLE_REALTIME_ENABLED
# - MEDCONSOLE_REALTIME_MAX_ATTEMPTS
# - MEDCONSOLE_INACTIVITY_SECS
# - MEDCONSOLE_LOG_LEVEL
# - MEDCONSOLE_LOG_FORMAT
# - MEDCONSOLE_PRODUCTION

[api]
# Backend base URL (required)
base_url = "http://localhost:5000/api"

# Request timeout in seconds
request_timeout_secs = 30

[realtime]
# Subscribe to push events (pages fall back to polling when off)
enabled = true

# Channel path appended to the API base URL
path = "/realtime"

# Consecutive connection errors before giving up
max_attempts = 3

# Overall budget for one connection phase (seconds)
connect_timeout_secs = 15

# Linear backoff between attempts (ms)
backoff_base_ms = 1000
backoff_max_ms = 5000

# Silence after which a connection is considered dead (seconds)
ping_timeout_secs = 60

[session]
# Idle time before the session is cleared (seconds)
inactivity_timeout_secs = 3600

[dashboard]
hospitals = "/hospitals"
doctors = "/doctors"
patients = "/patients"
appointments = "/appointments"
orders = "/orders"
prescriptions = "/prescriptions"
inventory = "/inventory"
finance = "/finance"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Elevate suppressed realtime errors to warn
production = false
"#
    .to_string()
}
