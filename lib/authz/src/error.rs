//! Authorization error types.

use gatehouse_core::UserId;
use std::fmt;

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The resource requires roles but the request carries no principal.
    InsufficientAuthentication {
        /// Request method.
        method: String,
        /// Request path.
        url: String,
    },
    /// The principal holds none of the required roles.
    AccessDenied {
        /// The caller.
        user_id: UserId,
        /// Request method.
        method: String,
        /// Request path.
        url: String,
    },
    /// Policies could not be loaded and no earlier snapshot exists.
    PolicySourceUnavailable {
        /// Error details.
        reason: String,
    },
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientAuthentication { method, url } => {
                write!(f, "authentication required for {method} {url}")
            }
            Self::AccessDenied {
                user_id,
                method,
                url,
            } => write!(f, "user {user_id} is not allowed to {method} {url}"),
            Self::PolicySourceUnavailable { reason } => {
                write!(f, "resource policies unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for AuthzError {}
