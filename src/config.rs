//! # Configuration Management
//!
//! Centralized configuration for a dispatch connection.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! Durations are written in milliseconds.

use crate::error::{DispatchError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max size of a single outbound frame (e.g. 16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DispatchConfig {
    /// Writer and correlation settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Keepalive and stale-entry sweep settings
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| DispatchError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| DispatchError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| DispatchError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `SESSION_DISPATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_millis("SESSION_DISPATCH_MSG_TIMEOUT_MS")? {
            config.connection.msg_timeout = val;
        }
        if let Some(val) = env_millis("SESSION_DISPATCH_KEEPALIVE_MIN_MS")? {
            config.heartbeat.keepalive_min = val;
        }
        if let Some(val) = env_millis("SESSION_DISPATCH_KEEPALIVE_MAX_MS")? {
            config.heartbeat.keepalive_max = val;
        }
        if let Some(val) = env_millis("SESSION_DISPATCH_PENDING_TTL_MS")? {
            config.heartbeat.pending_ttl = val;
        }
        if let Ok(level) = std::env::var("SESSION_DISPATCH_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| DispatchError::Config(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DispatchError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| DispatchError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration. Empty list means the configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.connection.validate());
        errors.extend(self.heartbeat.validate(self.connection.msg_timeout));
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DispatchError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| DispatchError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Writer and correlation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Maximum wait for a correlated reply
    #[serde(with = "duration_serde")]
    pub msg_timeout: Duration,

    /// Largest frame the writer will hand to the transport
    pub max_frame_size: usize,

    /// Use an all-zero IV when sealing binary frames instead of a random one.
    /// Only useful for reproducible captures.
    #[serde(default)]
    pub fixed_zero_iv: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            msg_timeout: timeout::DEFAULT_MSG_TIMEOUT,
            max_frame_size: MAX_FRAME_SIZE,
            fixed_zero_iv: false,
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.msg_timeout.as_millis() < 100 {
            errors.push("Message timeout too short (minimum: 100ms)".to_string());
        } else if self.msg_timeout.as_secs() > 300 {
            errors.push("Message timeout too long (maximum: 300s)".to_string());
        }

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_size
            ));
        }

        if self.fixed_zero_iv {
            errors.push(
                "WARNING: fixed zero IV is enabled - not recommended for production".to_string(),
            );
        }

        errors
    }
}

/// Keepalive scheduling and stale-entry sweeping
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeartbeatConfig {
    /// Shortest pause between keepalive probes
    #[serde(with = "duration_serde")]
    pub keepalive_min: Duration,

    /// Longest pause between keepalive probes
    #[serde(with = "duration_serde")]
    pub keepalive_max: Duration,

    /// How often the registry is swept for abandoned entries
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,

    /// Age after which an unanswered entry counts as abandoned
    #[serde(with = "duration_serde")]
    pub pending_ttl: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            keepalive_min: timeout::KEEPALIVE_MIN_INTERVAL,
            keepalive_max: timeout::KEEPALIVE_MAX_INTERVAL,
            sweep_interval: timeout::SWEEP_INTERVAL,
            pending_ttl: timeout::DEFAULT_MSG_TIMEOUT * 4,
        }
    }
}

impl HeartbeatConfig {
    /// Validate against the message timeout the entries are waited with
    pub fn validate(&self, msg_timeout: Duration) -> Vec<String> {
        let mut errors = Vec::new();

        if self.keepalive_min.as_millis() < 100 {
            errors.push("Keepalive interval too short (minimum: 100ms)".to_string());
        }
        if self.keepalive_max < self.keepalive_min {
            errors.push("keepalive_max must not be smaller than keepalive_min".to_string());
        }
        if self.keepalive_max.as_secs() > 3600 {
            errors.push("Keepalive interval too long (maximum: 1 hour)".to_string());
        }

        if self.sweep_interval.as_millis() < 100 {
            errors.push("Sweep interval too short (minimum: 100ms)".to_string());
        }
        if self.pending_ttl <= msg_timeout {
            errors.push(format!(
                "Pending TTL ({}ms) must exceed the message timeout ({}ms)",
                self.pending_ttl.as_millis(),
                msg_timeout.as_millis()
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("session-dispatch"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
