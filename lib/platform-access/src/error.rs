//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause. Callers receive
//! `Report<SessionError>` and decide per variant whether the request continues
//! as anonymous or fails.

use gatehouse_core::UserId;
use std::fmt;

/// Errors from token and session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Token is malformed, unsigned, tampered, or from another issuer.
    /// Never retried.
    InvalidToken { reason: String },
    /// Token is valid but no session record backs it.
    SessionNotFound { user_id: UserId },
    /// The session store could not be reached or timed out.
    StoreUnavailable { reason: String },
    /// A token could not be signed.
    SigningFailed { reason: String },
    /// Token settings are unusable (for example an empty secret).
    InvalidConfig { reason: String },
}

impl SessionError {
    /// Returns true for infrastructure faults that must fail the request closed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken { reason } => {
                write!(f, "invalid token: {reason}")
            }
            Self::SessionNotFound { user_id } => {
                write!(f, "no active session for user {user_id}")
            }
            Self::StoreUnavailable { reason } => {
                write!(f, "session store unavailable: {reason}")
            }
            Self::SigningFailed { reason } => {
                write!(f, "failed to sign token: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid token configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}
