//! The authenticated identity bound to a single request.

use gatehouse_core::UserId;

use crate::role::RoleSet;
use crate::session::SessionRecord;

/// Identity attached to request-scoped context after the session resolves.
///
/// A principal is derived fresh from the session record on every request and
/// is never stored, so role changes applied to the record take effect on the
/// next request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user_id: UserId,
    username: String,
    nickname: Option<String>,
    roles: RoleSet,
}

impl Principal {
    /// Builds a principal from explicit parts.
    #[must_use]
    pub fn new(user_id: UserId, username: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            user_id,
            username: username.into(),
            nickname: None,
            roles,
        }
    }

    /// Derives the principal for a resolved session.
    #[must_use]
    pub fn from_session(record: &SessionRecord) -> Self {
        Self {
            user_id: record.user_id(),
            username: record.username().to_string(),
            nickname: record.nickname().map(str::to_string),
            roles: record.roles().clone(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }
}

impl From<&SessionRecord> for Principal {
    fn from(record: &SessionRecord) -> Self {
        Self::from_session(record)
    }
}
