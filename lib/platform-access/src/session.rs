//! Session records for authenticated users.
//!
//! A session record is created at login and stored under the user's ID. It
//! holds the roles consulted on every request and the login metadata shown in
//! the online-users view. Its `expire_time` mirrors the store TTL.

use chrono::{DateTime, Utc};
use gatehouse_core::UserId;
use serde::{Deserialize, Serialize};

use crate::role::RoleSet;

/// Server-held state for one logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// The account this session belongs to.
    user_id: UserId,
    /// Login name.
    username: String,
    /// Display name shown in the admin panel.
    nickname: Option<String>,
    /// Avatar URL.
    avatar: Option<String>,
    /// Roles granted at login.
    roles: RoleSet,
    /// Client IP at login.
    ip_address: Option<String>,
    /// Human-readable location of `ip_address`.
    ip_source: Option<String>,
    /// Browser family reported by the user agent.
    browser: Option<String>,
    /// Operating system reported by the user agent.
    os: Option<String>,
    /// When the user logged in.
    last_login_time: Option<DateTime<Utc>>,
    /// When the record lapses unless renewed.
    expire_time: DateTime<Utc>,
}

impl SessionRecord {
    /// Creates a record that has not been issued yet.
    ///
    /// The expiry is set when the record is persisted through the token service.
    #[must_use]
    pub fn new(user_id: UserId, username: impl Into<String>, roles: RoleSet) -> Self {
        Self {
            user_id,
            username: username.into(),
            nickname: None,
            avatar: None,
            roles,
            ip_address: None,
            ip_source: None,
            browser: None,
            os: None,
            last_login_time: None,
            expire_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_nickname(mut self, nickname: Option<String>) -> Self {
        self.nickname = nickname;
        self
    }

    /// Sets the avatar URL.
    #[must_use]
    pub fn with_avatar(mut self, avatar: Option<String>) -> Self {
        self.avatar = avatar;
        self
    }

    /// Sets the client address and its resolved location.
    #[must_use]
    pub fn with_ip(mut self, ip_address: Option<String>, ip_source: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.ip_source = ip_source;
        self
    }

    /// Sets the browser and operating system.
    #[must_use]
    pub fn with_client(mut self, browser: Option<String>, os: Option<String>) -> Self {
        self.browser = browser;
        self.os = os;
        self
    }

    /// Sets the login timestamp.
    #[must_use]
    pub fn with_last_login_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_login_time = Some(at);
        self
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
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    #[must_use]
    pub fn ip_source(&self) -> Option<&str> {
        self.ip_source.as_deref()
    }

    #[must_use]
    pub fn browser(&self) -> Option<&str> {
        self.browser.as_deref()
    }

    #[must_use]
    pub fn os(&self) -> Option<&str> {
        self.os.as_deref()
    }

    #[must_use]
    pub fn last_login_time(&self) -> Option<DateTime<Utc>> {
        self.last_login_time
    }

    /// Returns when the record lapses unless renewed.
    #[must_use]
    pub fn expire_time(&self) -> DateTime<Utc> {
        self.expire_time
    }

    /// Returns true if the record has lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_time
    }

    /// Extracts the fields written back to the account table after login.
    #[must_use]
    pub fn login_metadata(&self) -> LoginMetadata {
        LoginMetadata {
            user_id: self.user_id,
            ip_address: self.ip_address.clone(),
            ip_source: self.ip_source.clone(),
            last_login_time: self.last_login_time,
        }
    }

    pub(crate) fn set_expire_time(&mut self, at: DateTime<Utc>) {
        self.expire_time = at;
    }
}

/// Login details persisted to the account table once a login succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginMetadata {
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub ip_source: Option<String>,
    pub last_login_time: Option<DateTime<Utc>>,
}
