//! Layer configuration.
//!
//! Timeouts and the optional shared cache location. Configuration is loaded
//! from environment variables with defaults suitable for local development.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for the resource layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Deadline applied to an operation when the caller supplies none, in
    /// milliseconds. 0 disables it.
    pub request_timeout_ms: u64,

    /// Budget for a single cache round trip, in milliseconds. An expired
    /// call counts as a miss. 0 disables it.
    pub cache_timeout_ms: u64,

    /// Shared cache URL (e.g., "redis://localhost:6379"). `None` runs without
    /// a shared cache.
    pub cache_url: Option<String>,
}

impl Default for LayerConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            cache_timeout_ms: 250,
            cache_url: None,
        }
    }
}

impl LayerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RESOURCE_REQUEST_TIMEOUT_MS`: Operation deadline (default: 30000, 0 disables)
    /// - `RESOURCE_CACHE_TIMEOUT_MS`: Cache round-trip budget (default: 250)
    /// - `RESOURCE_CACHE_URL`: Shared cache URL (default: none)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            request_timeout_ms: std::env::var("RESOURCE_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.request_timeout_ms),
            cache_timeout_ms: std::env::var("RESOURCE_CACHE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.cache_timeout_ms),
            cache_url: std::env::var("RESOURCE_CACHE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Default operation deadline, if enabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Cache round-trip budget. Zero means unbounded.
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.cache_url {
            if !url.contains("://") {
                return Err(ConfigError::InvalidValue {
                    key: "RESOURCE_CACHE_URL".to_string(),
                    message: format!("missing scheme in {}", url),
                });
            }
        }
        Ok(())
    }
}
