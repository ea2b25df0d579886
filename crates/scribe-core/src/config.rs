//! Server configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/scribe/config.toml)
//! 3. Environment variables (SCRIBE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "SCRIBE";

/// Environment name that disables the development origins
const PRODUCTION: &str = "production";

/// Origins accepted only outside production
const DEVELOPMENT_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:3001",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:3001",
];

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Delay after the last change before a flush fires, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Base URL of the durable document store
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Timeout for a single store request, in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// User the server writes as when flushing content
    #[serde(default = "default_service_user_id")]
    pub service_user_id: String,

    /// Origins allowed to open collaboration connections
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Deployment environment (`production` disables localhost origins)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Listen address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Display name used in logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Maximum simultaneous editor connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Close a connection after this long without a frame, in milliseconds
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            store_url: default_store_url(),
            store_timeout_secs: default_store_timeout_secs(),
            service_user_id: default_service_user_id(),
            allowed_origins: default_allowed_origins(),
            environment: default_environment(),
            host: default_host(),
            port: default_port(),
            server_name: default_server_name(),
            max_connections: default_max_connections(),
            idle_timeout_ms: default_idle_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SCRIBE_STORE_URL, SCRIBE_PORT, ...)
    /// 2. Config file (~/.config/scribe/config.toml or SCRIBE_CONFIG)
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

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("DEBOUNCE_MS") {
            self.debounce_ms = parse_env("DEBOUNCE_MS", &val)?;
        }

        if let Some(val) = env_var("STORE_URL") {
            self.store_url = val;
        }

        if let Some(val) = env_var("STORE_TIMEOUT_SECS") {
            self.store_timeout_secs = parse_env("STORE_TIMEOUT_SECS", &val)?;
        }

        if let Some(val) = env_var("SERVICE_USER_ID") {
            self.service_user_id = val;
        }

        // Comma separated; empty string clears the list
        if let Some(val) = env_var("ALLOWED_ORIGINS") {
            self.allowed_origins = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(val) = env_var("ENV") {
            self.environment = val;
        }

        if let Some(val) = env_var("HOST") {
            self.host = val;
        }

        if let Some(val) = env_var("PORT") {
            self.port = parse_env("PORT", &val)?;
        }

        if let Some(val) = env_var("SERVER_NAME") {
            self.server_name = val;
        }

        if let Some(val) = env_var("MAX_CONNECTIONS") {
            self.max_connections = parse_env("MAX_CONNECTIONS", &val)?;
        }

        if let Some(val) = env_var("IDLE_TIMEOUT_MS") {
            self.idle_timeout_ms = parse_env("IDLE_TIMEOUT_MS", &val)?;
        }

        if let Some(val) = env_var("LOG_LEVEL") {
            self.log_level = val;
        }

        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SCRIBE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scribe")
            .join("config.toml")
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION)
    }

    /// Allowed origins including the development entries outside production
    pub fn effective_origins(&self) -> Vec<String> {
        let mut origins = self.allowed_origins.clone();
        if !self.is_production() {
            for origin in DEVELOPMENT_ORIGINS {
                if !origins.iter().any(|o| o == origin) {
                    origins.push(origin.to_string());
                }
            }
        }
        origins
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Socket address string to listen on
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}_{}: {:?}", ENV_PREFIX, name, value))
}

fn default_debounce_ms() -> u64 {
    5_000
}

fn default_store_url() -> String {
    "http://127.0.0.1:3211".to_string()
}

fn default_store_timeout_secs() -> u64 {
    10
}

fn default_service_user_id() -> String {
    "demo-user".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["https://docs.espacopessoal.com".to_string()]
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_server_name() -> String {
    "Scribe Collaboration Server".to_string()
}

fn default_max_connections() -> usize {
    100
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}
