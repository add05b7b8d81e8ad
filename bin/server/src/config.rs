//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore, e.g. `TOKEN__SECRET` or `SESSION__CLEANUP_INTERVAL_SECONDS`.
//!
//! See [`TokenConfig`] for token signing and session lifetime settings.

use gatehouse_platform_access::TokenConfig;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Token signing and session lifetime configuration.
    pub token: TokenConfig,

    /// Session maintenance configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Resource policy loading configuration.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Login audit queue configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Interval between expired-session cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Treat requests as anonymous when the session store is unreachable
    /// instead of failing them with 503.
    /// Defaults to false so an outage never silently drops authentication.
    #[serde(default)]
    pub fail_open_authentication: bool,
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
            fail_open_authentication: false,
        }
    }
}

/// Resource policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Upper bound on loading the resource-role mapping, in milliseconds.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// How long a previous snapshot is served after a failed load before
    /// the source is tried again, in milliseconds.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_load_timeout_ms() -> u64 {
    5000
}

fn default_retry_interval_ms() -> u64 {
    5000
}

impl PolicyConfig {
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

/// Login audit configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Pending last-login updates held before new ones are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
