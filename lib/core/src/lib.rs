//! Core domain types and utilities for the gatehouse admin backend.
//!
//! This crate provides the foundational identifiers, the clock abstraction,
//! and the error handling alias shared by the session and authorization crates.

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Result;
pub use id::{ParseIdError, TokenId, UserId};
