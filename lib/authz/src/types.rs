//! Resource policy types.

use gatehouse_platform_access::RoleSet;
use serde::{Deserialize, Serialize};

/// One row of the resource-to-role mapping.
///
/// An empty `required_roles` list means the resource is disabled, not open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    /// Ant-style URL pattern, e.g. `/admin/users/**`.
    pub url_pattern: String,
    /// HTTP method, compared case-sensitively.
    pub http_method: String,
    /// Role names allowed to call the resource.
    pub required_roles: Vec<String>,
}

impl ResourcePolicy {
    /// Creates a new policy.
    #[must_use]
    pub fn new<I, S>(url_pattern: impl Into<String>, http_method: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url_pattern: url_pattern.into(),
            http_method: http_method.into(),
            required_roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a matching policy demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredRoles {
    /// Any one of these roles grants access.
    Roles(Vec<String>),
    /// The resource is switched off; nobody may call it.
    Disabled,
}

impl RequiredRoles {
    /// Builds the requirement for a policy's role list.
    #[must_use]
    pub fn from_roles(roles: Vec<String>) -> Self {
        if roles.is_empty() {
            Self::Disabled
        } else {
            Self::Roles(roles)
        }
    }

    /// Returns true if `roles` shares at least one role with the requirement.
    #[must_use]
    pub fn admits(&self, roles: &RoleSet) -> bool {
        match self {
            Self::Roles(required) => roles.contains_any(required.iter().map(String::as_str)),
            Self::Disabled => false,
        }
    }
}
