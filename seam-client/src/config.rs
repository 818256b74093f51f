//! Client configuration.
//!
//! All timing knobs default to the documented values from seam-core, so
//! an empty config file (or none at all) yields a correctly tuned
//! client. Durations are configured in milliseconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use seam_core::{JobLookupPolicy, ReconnectPolicy, GRACE_REMOVAL_DELAY, WATCHDOG_INTERVAL};

use crate::window::PopupSpec;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse the config file as TOML.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path that could not be parsed.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
}

/// Top-level client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the Seam API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Connect flow tuning.
    #[serde(default)]
    pub flow: FlowConfig,

    /// Progress stream tuning.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Subscription registry tuning.
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl ClientConfig {
    /// Default configuration against the given API base URL.
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            flow: FlowConfig::default(),
            stream: StreamConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Connect flow tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    /// Milliseconds between popup-closed watchdog checks.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    /// Popup width in pixels.
    #[serde(default = "default_popup_width")]
    pub popup_width: u32,

    /// Popup height in pixels.
    #[serde(default = "default_popup_height")]
    pub popup_height: u32,
}

impl FlowConfig {
    /// The watchdog check interval as a duration.
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    /// The popup size request.
    pub fn popup_spec(&self) -> PopupSpec {
        PopupSpec {
            width: self.popup_width,
            height: self.popup_height,
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_ms: default_watchdog_interval_ms(),
            popup_width: default_popup_width(),
            popup_height: default_popup_height(),
        }
    }
}

/// Progress stream tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Milliseconds before the first reconnect attempt.
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    /// Upper bound on any single reconnect delay, in milliseconds.
    #[serde(default = "default_reconnect_cap_ms")]
    pub reconnect_cap_ms: u64,

    /// Reconnect attempts allowed before the error becomes fatal.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
}

impl StreamConfig {
    /// The reconnect backoff policy these settings describe.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base: Duration::from_millis(self.reconnect_base_ms),
            cap: Duration::from_millis(self.reconnect_cap_ms),
            max_attempts: self.reconnect_max_attempts,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_cap_ms: default_reconnect_cap_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
        }
    }
}

/// Subscription registry tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Milliseconds a finished subscription stays visible before its
    /// entry is removed.
    #[serde(default = "default_grace_removal_ms")]
    pub grace_removal_ms: u64,

    /// Milliseconds before each job lookup retry, in order. The length
    /// bounds the retry count.
    #[serde(default = "default_lookup_retry_ms")]
    pub lookup_retry_ms: Vec<u64>,
}

impl RegistryConfig {
    /// The grace delay as a duration.
    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_removal_ms)
    }

    /// The job lookup retry schedule these settings describe.
    pub fn lookup_policy(&self) -> JobLookupPolicy {
        JobLookupPolicy {
            delays: self
                .lookup_retry_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            grace_removal_ms: default_grace_removal_ms(),
            lookup_retry_ms: default_lookup_retry_ms(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_watchdog_interval_ms() -> u64 {
    WATCHDOG_INTERVAL.as_millis() as u64
}

fn default_popup_width() -> u32 {
    PopupSpec::default().width
}

fn default_popup_height() -> u32 {
    PopupSpec::default().height
}

fn default_reconnect_base_ms() -> u64 {
    ReconnectPolicy::default().base.as_millis() as u64
}

fn default_reconnect_cap_ms() -> u64 {
    ReconnectPolicy::default().cap.as_millis() as u64
}

fn default_reconnect_max_attempts() -> u32 {
    ReconnectPolicy::default().max_attempts
}

fn default_grace_removal_ms() -> u64 {
    GRACE_REMOVAL_DELAY.as_millis() as u64
}

fn default_lookup_retry_ms() -> Vec<u64> {
    JobLookupPolicy::default()
        .delays
        .iter()
        .map(|d| d.as_millis() as u64)
        .collect()
}
