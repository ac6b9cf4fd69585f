//! # Register Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     COREPOS_API_URL=https://pos.example.com/api                         │
//! │     COREPOS_TOKEN=...   COREPOS_COMPANY_ID=7                            │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/corepos/corepos.toml (Linux)                              │
//! │     ~/Library/Application Support/com.corepos.register/corepos.toml    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [api]
//! base_url = "https://pos.example.com/api"
//! company_id = "7"
//! timeout_secs = 30
//!
//! [storage]
//! db_path = "/var/lib/corepos/corepos.db"
//!
//! [sync]
//! cart_channel = "pos-cart-sync"
//!
//! [kitchen]
//! section_cache_ttl_secs = 300
//! debounce_ms = 1000
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 4000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ApiError;

const CONFIG_FILE_NAME: &str = "corepos.toml";
const DB_FILE_NAME: &str = "corepos.db";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available on this platform")]
    NoPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::validation(err.to_string())
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Backend connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; endpoint paths such as `/v1/invoices` are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. Usually stored under `token` after login instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Sent as the `company` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            token: None,
            company_id: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Local storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Database file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// Cross-window sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_cart_channel")]
    pub cart_channel: String,

    /// Buffered storage events per window.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_cart_channel() -> String {
    corepos_sync::CART_SYNC_CHANNEL.to_string()
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            cart_channel: default_cart_channel(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Kitchen/bar boards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenSettings {
    /// How long an item's section mapping is trusted.
    #[serde(default = "default_section_ttl")]
    pub section_cache_ttl_secs: u64,

    #[serde(default = "default_section_capacity")]
    pub section_cache_capacity: u64,

    /// Refresh requests closer together than this collapse into one.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_section_ttl() -> u64 {
    300
}

fn default_section_capacity() -> u64 {
    10_000
}

fn default_debounce() -> u64 {
    1000
}

impl Default for KitchenSettings {
    fn default() -> Self {
        KitchenSettings {
            section_cache_ttl_secs: default_section_ttl(),
            section_cache_capacity: default_section_capacity(),
            debounce_ms: default_debounce(),
        }
    }
}

impl KitchenSettings {
    pub fn section_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.section_cache_ttl_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Retry policy for status updates. `max_attempts` counts every call,
/// the first included. Waits between calls double from `initial_delay_ms`
/// and stop growing at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    4000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub kitchen: KitchenSettings,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load register config, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        info!(?path, "Register config saved");
        Ok(path)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let url = Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::Invalid(format!("api.base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be http or https, got: {}",
                url.scheme()
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("api.timeout_secs must be greater than 0".into()));
        }
        if self.sync.cart_channel.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.cart_channel must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be below retry.initial_delay_ms".into(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies `COREPOS_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("COREPOS_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }
        if let Some(token) = lookup("COREPOS_TOKEN") {
            self.api.token = Some(token);
        }
        if let Some(company) = lookup("COREPOS_COMPANY_ID") {
            self.api.company_id = Some(company);
        }
        if let Some(path) = lookup("COREPOS_DB_PATH") {
            self.storage.db_path = Some(PathBuf::from(path));
        }
        if let Some(channel) = lookup("COREPOS_CART_CHANNEL") {
            self.sync.cart_channel = channel;
        }
        if let Some(ttl) = lookup("COREPOS_SECTION_CACHE_TTL_SECS") {
            match ttl.parse() {
                Ok(secs) => self.kitchen.section_cache_ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring invalid COREPOS_SECTION_CACHE_TTL_SECS"),
            }
        }
        if let Some(ms) = lookup("COREPOS_DEBOUNCE_MS") {
            match ms.parse() {
                Ok(ms) => self.kitchen.debounce_ms = ms,
                Err(_) => warn!(value = %ms, "Ignoring invalid COREPOS_DEBOUNCE_MS"),
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "corepos", "register")
    }

    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Configured database path, else `corepos.db` in the data directory,
    /// else the working directory.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join(DB_FILE_NAME)))
            .unwrap_or_else(|| Path::new(DB_FILE_NAME).to_path_buf())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PosConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync.cart_channel, "pos-cart-sync");
        assert_eq!(config.kitchen.section_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.kitchen.debounce_window(), Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay(), Duration::from_secs(1));
        assert_eq!(config.retry.max_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_validation() {
        let mut config = PosConfig::default();
        config.api.base_url = "ftp://example.com".into();
        assert!(config.validate().is_err());

        config.api.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config = PosConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        config = PosConfig::default();
        config.retry.max_delay_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("COREPOS_API_URL", "https://pos.example.com/api"),
            ("COREPOS_TOKEN", "secret"),
            ("COREPOS_COMPANY_ID", "7"),
            ("COREPOS_DB_PATH", "/tmp/corepos.db"),
            ("COREPOS_SECTION_CACHE_TTL_SECS", "60"),
            ("COREPOS_DEBOUNCE_MS", "soon"),
        ]
        .into_iter()
        .collect();

        let mut config = PosConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://pos.example.com/api");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.company_id.as_deref(), Some("7"));
        assert_eq!(config.database_path(), PathBuf::from("/tmp/corepos.db"));
        assert_eq!(config.kitchen.section_cache_ttl_secs, 60);
        // Unparseable values leave the default.
        assert_eq!(config.kitchen.debounce_ms, 1000);
    }

    #[test]
    fn test_partial_toml() {
        let config: PosConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://pos.example.com/api"

            [kitchen]
            debounce_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.kitchen.debounce_ms, 250);
        assert_eq!(config.kitchen.section_cache_ttl_secs, 300);
        assert_eq!(config.retry, RetrySettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("corepos.toml");

        let mut config = PosConfig::default();
        config.api.company_id = Some("12".into());
        config.kitchen.section_cache_ttl_secs = 120;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let loaded: PosConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded, config);
    }
}
