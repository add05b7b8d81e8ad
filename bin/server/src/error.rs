//! Domain error types for server operations.
//!
//! Library errors arrive wrapped in `rootcause::Report` and are mapped to
//! [`ApiError`], which renders the JSON result envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gatehouse_authz::AuthzError;
use gatehouse_platform_access::SessionError;
use rootcause::prelude::Report;
use std::fmt;

use crate::response::{
    ApiResponse, CODE_BAD_CREDENTIALS, CODE_FORBIDDEN, CODE_NOT_LOGGED_IN, CODE_SYSTEM_ERROR,
};

/// User directory errors.
#[derive(Debug)]
pub enum DirectoryError {
    /// Database error while reading accounts.
    DatabaseError { details: String },
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError { details } => {
                write!(f, "user directory database error: {}", details)
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Login audit errors.
#[derive(Debug)]
pub enum AuditError {
    /// Database error while writing login metadata.
    DatabaseError { details: String },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatabaseError { details } => {
                write!(f, "login audit database error: {}", details)
            }
        }
    }
}

impl std::error::Error for AuditError {}

/// Errors rendered to API clients.
#[derive(Debug)]
pub enum ApiError {
    /// No valid session.
    NotAuthenticated,
    /// Roles do not satisfy the resource policy.
    Forbidden,
    /// Unknown username or wrong password.
    BadCredentials,
    /// A backing store could not answer.
    Unavailable { details: String },
    /// Unexpected failure.
    Internal { details: String },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::BadCredentials => write!(f, "bad credentials"),
            Self::Unavailable { details } => write!(f, "service unavailable: {}", details),
            Self::Internal { details } => write!(f, "internal error: {}", details),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<SessionError>> for ApiError {
    fn from(report: Report<SessionError>) -> Self {
        match report.current_context() {
            SessionError::InvalidToken { .. } | SessionError::SessionNotFound { .. } => {
                Self::NotAuthenticated
            }
            SessionError::StoreUnavailable { .. } => Self::Unavailable {
                details: report.to_string(),
            },
            SessionError::SigningFailed { .. } | SessionError::InvalidConfig { .. } => {
                Self::Internal {
                    details: report.to_string(),
                }
            }
        }
    }
}

impl From<Report<AuthzError>> for ApiError {
    fn from(report: Report<AuthzError>) -> Self {
        match report.current_context() {
            AuthzError::InsufficientAuthentication { .. } => Self::NotAuthenticated,
            AuthzError::AccessDenied { .. } => Self::Forbidden,
            AuthzError::PolicySourceUnavailable { .. } => Self::Unavailable {
                details: report.to_string(),
            },
        }
    }
}

impl From<Report<DirectoryError>> for ApiError {
    fn from(report: Report<DirectoryError>) -> Self {
        Self::Unavailable {
            details: report.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::NotAuthenticated => (
                StatusCode::UNAUTHORIZED,
                CODE_NOT_LOGGED_IN,
                "user is not logged in",
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                CODE_FORBIDDEN,
                "insufficient permissions",
            ),
            Self::BadCredentials => (
                StatusCode::UNAUTHORIZED,
                CODE_BAD_CREDENTIALS,
                "invalid username or password",
            ),
            Self::Unavailable { details } => {
                tracing::error!(%details, "backing service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    CODE_SYSTEM_ERROR,
                    "service temporarily unavailable",
                )
            }
            Self::Internal { details } => {
                tracing::error!(%details, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CODE_SYSTEM_ERROR,
                    "internal server error",
                )
            }
        };
        (status, Json(ApiResponse::fail(code, message))).into_response()
    }
}
