//! Shared `Result` alias.
//!
//! Crates keep their own error enums (`SessionError`, `AuthzError`, ...) and
//! return them wrapped in a rootcause [`Report`], so storage and policy seams
//! can be written as `Result<T, SessionError>`.

use rootcause::Report;

/// `std::result::Result` with the error side wrapped in a [`Report`].
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
