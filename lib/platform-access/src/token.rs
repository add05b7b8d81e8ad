//! Token issuance and the session lifecycle behind it.
//!
//! Tokens are HS256 JWTs naming the user (`sub`), a unique token id (`jti`)
//! and the issuer (`iss`). They carry no roles and no expiry: the session
//! record in the store decides whether the holder is logged in, which makes
//! revocation a single delete.

use chrono::Duration;
use gatehouse_core::{Clock, TokenId, UserId};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::TokenConfig;
use crate::error::SessionError;
use crate::session::SessionRecord;
use crate::store::SessionStore;

/// Claims signed into every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User ID as a decimal string.
    pub sub: String,
    /// Unique token ID.
    pub jti: String,
    /// Issuer.
    pub iss: String,
}

impl TokenClaims {
    /// Parses the subject back into a user ID.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` if the subject is not a user ID.
    pub fn user_id(&self) -> Result<UserId, SessionError> {
        self.sub.parse().map_err(|e| SessionError::InvalidToken {
            reason: format!("bad subject '{}': {e}", self.sub),
        })
    }
}

/// Issues, parses, renews, and revokes session tokens.
pub struct TokenService {
    config: TokenConfig,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Creates a token service over `store`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the configuration fails validation.
    pub fn new(
        config: TokenConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Report<SessionError>> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret().as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret().as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims =
            HashSet::from(["sub".to_string(), "iss".to_string()]);
        validation.set_issuer(&[config.issuer()]);

        Ok(Self {
            config,
            store,
            clock,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Persists `record` for a fresh session window and returns a signed token for it.
    ///
    /// `record.expire_time()` is updated to the end of the new window.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the record cannot be stored, or
    /// `SigningFailed` if the token cannot be produced.
    #[instrument(skip(self, record), fields(user_id = %record.user_id()))]
    pub async fn create_token(
        &self,
        record: &mut SessionRecord,
    ) -> Result<String, Report<SessionError>> {
        self.refresh(record).await?;

        let claims = TokenClaims {
            sub: record.user_id().to_string(),
            jti: TokenId::new().to_string(),
            iss: self.config.issuer().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::SigningFailed {
                reason: e.to_string(),
            })?;

        debug!(jti = %claims.jti, "token issued");
        Ok(token)
    }

    /// Verifies a token's signature, format, and issuer and returns its claims.
    ///
    /// This says nothing about whether the session is still active.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidToken` on any verification failure.
    pub fn parse_token(&self, token: &str) -> Result<TokenClaims, Report<SessionError>> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| SessionError::InvalidToken {
                reason: e.to_string(),
            })?;
        Ok(data.claims)
    }

    /// Strips the configured prefix from a raw header value.
    ///
    /// Returns `None` for a missing, blank, unprefixed, or literal `"null"` value.
    #[must_use]
    pub fn extract_token<'a>(&self, header_value: Option<&'a str>) -> Option<&'a str> {
        let token = header_value?.strip_prefix(self.config.prefix())?.trim();
        if token.is_empty() || token == "null" {
            return None;
        }
        Some(token)
    }

    /// Resolves the session behind a raw authorization header value.
    ///
    /// A missing or malformed header and a token whose session is gone both
    /// yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if a token is present but fails verification, and
    /// `StoreUnavailable` if the store cannot answer.
    #[instrument(skip_all)]
    pub async fn resolve_session(
        &self,
        header_value: Option<&str>,
    ) -> Result<Option<SessionRecord>, Report<SessionError>> {
        let Some(token) = self.extract_token(header_value) else {
            return Ok(None);
        };

        let claims = self.parse_token(token)?;
        let user_id = claims.user_id()?;

        let record = self.bounded("get", self.store.get(user_id)).await?;
        if record.is_none() {
            debug!(%user_id, "{}", SessionError::SessionNotFound { user_id });
        }
        Ok(record)
    }

    /// Starts a new session window for `record`: `expire_time = now + E` and a fresh TTL.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be written.
    #[instrument(skip(self, record), fields(user_id = %record.user_id()))]
    pub async fn refresh(&self, record: &mut SessionRecord) -> Result<(), Report<SessionError>> {
        let expiry = self.config.expiry();
        record.set_expire_time(self.clock.now() + expiry);
        self.bounded("put", self.store.put(record.user_id(), record, expiry))
            .await
    }

    /// Extends `record` by a full window if its remaining lifetime is within
    /// the renewal threshold.
    ///
    /// Returns whether the session was renewed. A session that was logged out
    /// or evicted after `record` was read is left gone, and `record` is left
    /// unchanged. Concurrent renewals of the same session are harmless: each
    /// rewrites the same record and the last write wins.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if a needed renewal cannot be written.
    pub async fn renew_if_near_expiry(
        &self,
        record: &mut SessionRecord,
    ) -> Result<bool, Report<SessionError>> {
        let now = self.clock.now();
        let remaining: Duration = record.expire_time() - now;
        if remaining > self.config.renew_threshold() {
            return Ok(false);
        }

        let user_id = record.user_id();
        let expiry = self.config.expiry();
        let mut renewed = record.clone();
        renewed.set_expire_time(now + expiry);
        let live = self
            .bounded("touch", self.store.touch(user_id, &renewed, expiry))
            .await?;
        if !live {
            debug!(%user_id, "session ended before renewal");
            return Ok(false);
        }

        *record = renewed;
        debug!(%user_id, "session renewed");
        Ok(true)
    }

    /// Deletes the session for `user_id`. Every token issued for it stops working.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be written.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, user_id: UserId) -> Result<(), Report<SessionError>> {
        self.bounded("delete", self.store.delete(user_id)).await
    }

    /// Lists every active session.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be read.
    pub async fn list_active_sessions(&self) -> Result<Vec<SessionRecord>, Report<SessionError>> {
        self.bounded("list", self.store.list()).await
    }

    /// Forces a user offline.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the store cannot be written.
    pub async fn evict_session(&self, user_id: UserId) -> Result<(), Report<SessionError>> {
        self.invalidate(user_id).await
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, Report<SessionError>>>,
    ) -> Result<T, Report<SessionError>> {
        let timeout = self.config.store_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, ?timeout, "session store call timed out");
                Err(SessionError::StoreUnavailable {
                    reason: format!("{op} timed out after {timeout:?}"),
                }
                .into())
            }
        }
    }
}
