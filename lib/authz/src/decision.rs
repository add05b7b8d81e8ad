//! Role-based access decisions.

use crate::cache::ResourcePolicyCache;
use crate::error::AuthzError;
use crate::types::RequiredRoles;
use gatehouse_platform_access::Principal;
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Outcome of a successful access check. Refusals are reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Allow,
}

/// Checks requests against the resource policy cache.
#[derive(Clone)]
pub struct AccessDecisionEngine {
    cache: Arc<ResourcePolicyCache>,
}

impl AccessDecisionEngine {
    /// Creates an engine backed by `cache`.
    #[must_use]
    pub fn new(cache: Arc<ResourcePolicyCache>) -> Self {
        Self { cache }
    }

    /// Returns the underlying cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResourcePolicyCache> {
        &self.cache
    }

    /// Decides whether `principal` may call `method url`.
    ///
    /// Requests no policy covers are allowed. Otherwise the principal must hold
    /// at least one of the required roles.
    ///
    /// # Errors
    ///
    /// - `InsufficientAuthentication` if a policy applies and there is no principal
    /// - `AccessDenied` if the principal shares no role with the policy
    /// - `PolicySourceUnavailable` if policies cannot be loaded
    #[instrument(skip(self, principal), fields(user_id = principal.map(|p| p.user_id().get())))]
    pub async fn decide(
        &self,
        principal: Option<&Principal>,
        method: &str,
        url: &str,
    ) -> Result<Decision, Report<AuthzError>> {
        let Some(required) = self.cache.attributes_for(method, url).await? else {
            return Ok(Decision::Allow);
        };

        let Some(principal) = principal else {
            return Err(AuthzError::InsufficientAuthentication {
                method: method.to_string(),
                url: url.to_string(),
            }
            .into());
        };

        if required.admits(principal.roles()) {
            return Ok(Decision::Allow);
        }

        debug!(
            disabled = matches!(required, RequiredRoles::Disabled),
            "access denied"
        );
        Err(AuthzError::AccessDenied {
            user_id: principal.user_id(),
            method: method.to_string(),
            url: url.to_string(),
        }
        .into())
    }
}
