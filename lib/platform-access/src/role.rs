//! Role names held by a session.
//!
//! Roles are opaque names managed by the admin panel (for example `admin`,
//! `editor`, `test`). They are compared by exact string membership only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of role names granted to a user at login time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Creates an empty role set (no access to any mediated route).
    #[must_use]
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Creates a role set from role names. Duplicates collapse.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Returns true if the named role is held.
    #[must_use]
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Returns true if at least one of `required` is held.
    #[must_use]
    pub fn contains_any<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        required.into_iter().any(|role| self.contains(role))
    }

    /// Iterates the role names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no roles are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_names(iter)
    }
}
