//! Sessions, tokens, and principals for gatehouse.
//!
//! This crate provides:
//! - Session records (`SessionRecord`) persisted in a `SessionStore`
//! - Role sets (`RoleSet`) compared with plain string membership
//! - The per-request identity (`Principal`)
//! - Token issuance, parsing, sliding renewal, and revocation (`TokenService`)
//!
//! # Session Model
//!
//! A token only names a user. Whether that user is logged in is decided by
//! the session store: deleting a record revokes every token issued for it,
//! and a record that is never touched again simply expires.
//!
//! # Example
//!
//! ```
//! use gatehouse_core::{SystemClock, UserId};
//! use gatehouse_platform_access::{
//!     InMemorySessionStore, RoleSet, SessionRecord, TokenConfig, TokenService,
//! };
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let clock = Arc::new(SystemClock);
//! let store = Arc::new(InMemorySessionStore::new(clock.clone()));
//! let service = TokenService::new(TokenConfig::new("a-long-enough-signing-secret"), store, clock)
//!     .expect("valid config");
//!
//! let mut record = SessionRecord::new(UserId::new(1), "alice", RoleSet::from_names(["admin"]));
//! let token = service.create_token(&mut record).await.expect("issued");
//!
//! let header = format!("Bearer {token}");
//! let session = service.resolve_session(Some(&header)).await.expect("store reachable");
//! assert_eq!(session.map(|s| s.user_id()), Some(UserId::new(1)));
//! # });
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod role;
pub mod session;
pub mod store;
pub mod token;

// Re-export main types at crate root
pub use auth::Principal;
pub use config::TokenConfig;
pub use error::SessionError;
pub use role::RoleSet;
pub use session::{LoginMetadata, SessionRecord};
pub use store::{InMemorySessionStore, SessionStore};
pub use token::{TokenClaims, TokenService};
