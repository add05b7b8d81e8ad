//! Token and session lifetime configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Settings for token signing and sliding session expiry.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// HMAC secret used to sign tokens.
    #[serde(skip_serializing)]
    secret: String,
    /// Value of the `iss` claim. Tokens from other issuers are rejected.
    /// Default: "gatehouse"
    #[serde(default = "default_issuer")]
    issuer: String,
    /// Session lifetime after login or renewal, in seconds.
    /// Default: 3600
    #[serde(default = "default_expire_seconds")]
    expire_seconds: i64,
    /// Remaining lifetime at or below which activity renews the session, in seconds.
    /// Default: 1200
    #[serde(default = "default_renew_threshold_seconds")]
    renew_threshold_seconds: i64,
    /// Request header carrying the token.
    /// Default: "Authorization"
    #[serde(default = "default_header")]
    header: String,
    /// Prefix stripped from the header value before parsing.
    /// Default: "Bearer "
    #[serde(default = "default_prefix")]
    prefix: String,
    /// Upper bound on a single session store call, in milliseconds.
    /// Default: 2000
    #[serde(default = "default_store_timeout_ms")]
    store_timeout_ms: u64,
}

fn default_issuer() -> String {
    "gatehouse".to_string()
}

fn default_expire_seconds() -> i64 {
    3600
}

fn default_renew_threshold_seconds() -> i64 {
    1200
}

fn default_header() -> String {
    "Authorization".to_string()
}

fn default_prefix() -> String {
    "Bearer ".to_string()
}

fn default_store_timeout_ms() -> u64 {
    2000
}

impl TokenConfig {
    /// Creates a configuration with defaults for everything but the secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: default_issuer(),
            expire_seconds: default_expire_seconds(),
            renew_threshold_seconds: default_renew_threshold_seconds(),
            header: default_header(),
            prefix: default_prefix(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }

    /// Sets the issuer claim.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the session lifetime.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expire_seconds = expiry.num_seconds();
        self
    }

    /// Sets the renewal threshold.
    #[must_use]
    pub fn with_renew_threshold(mut self, threshold: Duration) -> Self {
        self.renew_threshold_seconds = threshold.num_seconds();
        self
    }

    /// Sets the store call timeout.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.store_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Checks the settings for values that would make every token unusable.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.secret.is_empty() {
            return Err(SessionError::InvalidConfig {
                reason: "token secret is empty".to_string(),
            });
        }
        if self.expire_seconds <= 0 {
            return Err(SessionError::InvalidConfig {
                reason: format!("expire_seconds must be positive, got {}", self.expire_seconds),
            });
        }
        if self.renew_threshold_seconds < 0 || self.renew_threshold_seconds > self.expire_seconds {
            return Err(SessionError::InvalidConfig {
                reason: format!(
                    "renew threshold of {} seconds must lie within the {} second expiry",
                    self.renew_threshold_seconds, self.expire_seconds
                ),
            });
        }
        if self.secret.len() < 32 {
            tracing::warn!("token secret is shorter than recommended (32 bytes)");
        }
        Ok(())
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the session lifetime.
    #[must_use]
    pub fn expiry(&self) -> Duration {
        Duration::seconds(self.expire_seconds)
    }

    /// Returns the renewal threshold.
    #[must_use]
    pub fn renew_threshold(&self) -> Duration {
        Duration::seconds(self.renew_threshold_seconds)
    }

    /// Returns the name of the header carrying the token.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}
