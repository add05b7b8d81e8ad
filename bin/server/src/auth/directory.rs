//! Credential verification against the account store.

use async_trait::async_trait;
use gatehouse_core::UserId;
use gatehouse_platform_access::RoleSet;
use rootcause::prelude::Report;

use crate::error::DirectoryError;

/// A verified account, as needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: UserId,
    /// Profile row backing the account, if the store keeps one.
    pub user_info_id: Option<i64>,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub roles: RoleSet,
}

/// Looks up accounts by login name and checks passwords.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns the account if `username` exists, is enabled, and `password` matches.
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, Report<DirectoryError>>;
}
