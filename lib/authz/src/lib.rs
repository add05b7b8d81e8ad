//! Role-based access control for HTTP requests.
//!
//! Resource policies map an HTTP method and an Ant-style URL pattern to the
//! roles allowed to call it. [`ResourcePolicyCache`] loads them in bulk from a
//! [`PolicySource`] and keeps an immutable snapshot until invalidated;
//! [`AccessDecisionEngine`] checks a principal's roles against the first
//! matching policy.

mod cache;
mod decision;
mod error;
mod pattern;
mod types;

pub use cache::{PolicySource, ResourcePolicyCache};
pub use decision::{AccessDecisionEngine, Decision};
pub use error::AuthzError;
pub use pattern::{PathPattern, PatternError};
pub use types::{RequiredRoles, ResourcePolicy};
