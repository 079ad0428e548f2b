//! Import configuration
//!
//! Every tunable of the upload pipeline lives in [`ImportConfig`]. Values come
//! from the environment (a `.env` file is honored) and fall back to the
//! defaults below.

use evimport_common::{ImportError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Ingestion endpoint used when `EVIMPORT_ENDPOINT` is not set.
pub const DEFAULT_ENDPOINT: &str = "https://api.amplitude.com/httpapi";

/// Value shipped in sample `.env` files; treated as "no key configured".
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY";

/// Per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Attempts per batch before the upload is given up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fixed pause between attempts of the same batch, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 10;

/// Concurrent uploads per group.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Events per HTTP request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Events accumulated before an upload cycle starts.
pub const DEFAULT_GROUP_SIZE: usize = 100;

/// Pause after each full group, in milliseconds.
pub const DEFAULT_GROUP_PAUSE_MS: u64 = 1000;

/// Upload pipeline configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Credential sent as the `api_key` query parameter
    pub api_key: String,

    /// Ingestion endpoint URL
    pub endpoint: String,

    pub timeout_secs: u64,

    pub max_attempts: u32,

    pub retry_delay_secs: u64,

    pub max_workers: usize,

    pub batch_size: usize,

    pub group_size: usize,

    pub group_pause_ms: u64,

    /// Treat an exhausted retry budget as a failed upload instead of logging
    /// it and moving on
    #[serde(default)]
    pub strict_delivery: bool,
}

impl ImportConfig {
    /// Load configuration from environment and defaults
    ///
    /// Environment variables:
    /// - `EVIMPORT_API_KEY`
    /// - `EVIMPORT_ENDPOINT`
    /// - `EVIMPORT_TIMEOUT_SECS`
    /// - `EVIMPORT_MAX_ATTEMPTS`
    /// - `EVIMPORT_RETRY_DELAY_SECS`
    /// - `EVIMPORT_MAX_WORKERS`
    /// - `EVIMPORT_BATCH_SIZE`
    /// - `EVIMPORT_GROUP_SIZE`
    /// - `EVIMPORT_GROUP_PAUSE_MS`
    /// - `EVIMPORT_STRICT_DELIVERY`
    ///
    /// The result is not validated; call [`ImportConfig::validate`] before use.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            api_key: std::env::var("EVIMPORT_API_KEY").unwrap_or(defaults.api_key),
            endpoint: std::env::var("EVIMPORT_ENDPOINT").unwrap_or(defaults.endpoint),
            timeout_secs: env_or("EVIMPORT_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_attempts: env_or("EVIMPORT_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay_secs: env_or("EVIMPORT_RETRY_DELAY_SECS", defaults.retry_delay_secs)?,
            max_workers: env_or("EVIMPORT_MAX_WORKERS", defaults.max_workers)?,
            batch_size: env_or("EVIMPORT_BATCH_SIZE", defaults.batch_size)?,
            group_size: env_or("EVIMPORT_GROUP_SIZE", defaults.group_size)?,
            group_pause_ms: env_or("EVIMPORT_GROUP_PAUSE_MS", defaults.group_pause_ms)?,
            strict_delivery: env_or("EVIMPORT_STRICT_DELIVERY", defaults.strict_delivery)?,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() || self.api_key == API_KEY_PLACEHOLDER {
            return Err(ImportError::config(
                "Must set API key (export EVIMPORT_API_KEY or add it to .env)",
            ));
        }

        let endpoint = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            ImportError::config(format!("Invalid endpoint '{}': {}", self.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ImportError::config(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.max_attempts == 0 {
            return Err(ImportError::config("max_attempts must be at least 1"));
        }

        for (name, value) in [
            ("max_workers", self.max_workers),
            ("batch_size", self.batch_size),
            ("group_size", self.group_size),
        ] {
            if value == 0 {
                return Err(ImportError::config(format!("{} must be greater than 0", name)));
            }
        }

        if self.batch_size > self.group_size {
            tracing::warn!(
                batch_size = self.batch_size,
                group_size = self.group_size,
                "Batch size exceeds group size; every group is sent as a single request"
            );
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn group_pause(&self) -> Duration {
        Duration::from_millis(self.group_pause_ms)
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            api_key: API_KEY_PLACEHOLDER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            max_workers: DEFAULT_MAX_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            group_size: DEFAULT_GROUP_SIZE,
            group_pause_ms: DEFAULT_GROUP_PAUSE_MS,
            strict_delivery: false,
        }
    }
}

// Keeps the credential out of logs.
impl std::fmt::Debug for ImportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportConfig")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("max_workers", &self.max_workers)
            .field("batch_size", &self.batch_size)
            .field("group_size", &self.group_size)
            .field("group_pause_ms", &self.group_pause_ms)
            .field("strict_delivery", &self.strict_delivery)
            .finish()
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ImportError::config(format!("Invalid value for {}: '{}' ({})", key, raw, e))),
        Err(_) => Ok(default),
    }
}
