use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::push::Notification;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Store settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// In-process cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Push delivery settings
    #[serde(default)]
    pub push: PushConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// SQLite store configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Path to the database file; empty selects the per-user data directory
    #[serde(default = "String::new")]
    pub path: String,
}

impl DatabaseConfig {
    // @returns: Explicit database path, if one is configured
    pub fn explicit_path(&self) -> Option<PathBuf> {
        if self.path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.path))
        }
    }
}

/// Cache configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Lifetime of an entry stored with the default expiration
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Interval between janitor sweeps of expired entries
    #[serde(default = "default_cache_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
            cleanup_interval_secs: default_cache_cleanup_interval_secs(),
        }
    }
}

/// Push notification service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PushConfig {
    /// Whether queued notifications are delivered; events stay in the outbox otherwise
    #[serde(default)]
    pub enabled: bool,

    /// Service endpoint URL
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    /// Server key, sent as `Authorization: key=<server_key>`
    #[serde(default = "String::new")]
    pub server_key: String,

    /// Request timeout in seconds
    #[serde(default = "default_push_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay between outbox sweeps when dispatching continuously
    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,

    /// Maximum number of outbox events handled per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Days a delivered or failed outbox event is kept; 0 keeps them forever
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Notification sent when a confession is approved
    #[serde(default = "default_approved_notification")]
    pub approved: Notification,

    /// Notification sent when a confession is rejected
    ///
    /// Defaults to the approval copy, which is what moderators' users have
    /// always received. Changing it is a product decision.
    #[serde(default = "default_rejected_notification")]
    pub rejected: Notification,
}

impl PushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    /// How long processed outbox events are kept, `None` when pruning is off
    pub fn retention(&self) -> Option<Duration> {
        if self.retention_days == 0 {
            None
        } else {
            Some(Duration::from_secs(self.retention_days * 24 * 60 * 60))
        }
    }

    /// Value of the authorization header sent with every push request
    pub fn authorization(&self) -> String {
        format!("key={}", self.server_key)
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_push_endpoint(),
            server_key: String::new(),
            timeout_secs: default_push_timeout_secs(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
            batch_size: default_batch_size(),
            retention_days: default_retention_days(),
            approved: default_approved_notification(),
            rejected: default_rejected_notification(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    30 * 60
}

fn default_cache_cleanup_interval_secs() -> u64 {
    60 * 60
}

fn default_push_endpoint() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

fn default_push_timeout_secs() -> u64 {
    10
}

fn default_dispatch_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> usize {
    50
}

fn default_retention_days() -> u64 {
    30
}

fn default_approved_notification() -> Notification {
    Notification {
        title: "Confess đã được duyệt".to_string(),
        body: "Thật tuyệt vời!".to_string(),
        click_action: "http://fptu.tech/my-confess".to_string(),
        icon: "https://fptu.tech/assets/images/fptuhcm-confessions.png".to_string(),
    }
}

fn default_rejected_notification() -> Notification {
    default_approved_notification()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.cache.default_ttl_secs == 0 {
            return Err(anyhow!("Cache default TTL must be greater than zero"));
        }

        if self.cache.cleanup_interval_secs == 0 {
            return Err(anyhow!("Cache cleanup interval must be greater than zero"));
        }

        if self.push.enabled {
            url::Url::parse(&self.push.endpoint)
                .map_err(|e| anyhow!("Invalid push endpoint '{}': {}", self.push.endpoint, e))?;

            if self.push.server_key.trim().is_empty() {
                return Err(anyhow!("Push server key is required when push delivery is enabled"));
            }

            if self.push.timeout_secs == 0 {
                return Err(anyhow!("Push timeout must be greater than zero"));
            }

            if self.push.batch_size == 0 {
                return Err(anyhow!("Push batch size must be greater than zero"));
            }

            if self.push.dispatch_interval_secs == 0 {
                return Err(anyhow!("Push dispatch interval must be greater than zero"));
            }
        }

        Ok(())
    }

    /// Load the configuration file, writing the defaults there first when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            return Ok(config);
        }

        log::warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }
}
