//! Authentication and authorization for the admin-panel API.
//!
//! This module provides:
//! - Token login and logout routes
//! - The authentication gate, which binds a [`Principal`] to each request
//!   carrying a live session token and renews sessions close to expiry
//! - The authorization layer, which checks the bound principal against the
//!   URL-pattern resource policies before any handler runs
//! - Postgres-backed session store, policy source, user directory, and login audit
//!
//! # Authorization Model
//!
//! Tokens only name a user; roles live in the server-side session record and
//! are read on every request. Logging a user out or evicting them deletes the
//! record, which revokes every token issued for it immediately.
//!
//! Resource policies are cached as an immutable snapshot. Services that edit
//! roles or resources must invalidate the cache (in process through
//! [`AppState::engine`], or over `POST /admin/resources/cache/invalidate`);
//! edits are not visible until then.

pub mod audit;
pub mod db;
pub mod directory;
pub mod middleware;
pub mod routes;

use crate::client::IpLocator;
use gatehouse_authz::AccessDecisionEngine;
use gatehouse_core::Clock;
use gatehouse_platform_access::TokenService;
use std::sync::Arc;

pub use audit::{LoginAuditSink, LoginAuditor};
pub use directory::{Account, UserDirectory};
pub use middleware::{CurrentUser, authenticate, authorize};
pub use routes::{login, logout};

/// Shared application state.
pub struct AppState {
    /// Token issuance and session lifecycle.
    pub tokens: Arc<TokenService>,
    /// Access decisions over the resource policy cache.
    pub engine: AccessDecisionEngine,
    /// Credential verification.
    pub users: Arc<dyn UserDirectory>,
    /// Background last-login writer.
    pub auditor: LoginAuditor,
    /// IP address to location lookup.
    pub ip_locator: Arc<dyn IpLocator>,
    /// Time source for login timestamps.
    pub clock: Arc<dyn Clock>,
    /// Serve requests anonymously while the session store is down.
    pub fail_open_authentication: bool,
}
