//! Administrative endpoints: online users and policy cache control.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use gatehouse_core::UserId;
use gatehouse_platform_access::SessionRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AppState, CurrentUser};
use crate::error::ApiError;
use crate::response::ApiResponse;

/// Query parameters for the online users list.
#[derive(Debug, Default, Deserialize)]
pub struct OnlineUsersQuery {
    /// Substring to look for in nicknames.
    pub keywords: Option<String>,
}

/// One active session as shown to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub ip_address: Option<String>,
    pub ip_source: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub expire_time: DateTime<Utc>,
}

impl From<SessionRecord> for OnlineUser {
    fn from(record: SessionRecord) -> Self {
        Self {
            user_id: record.user_id(),
            username: record.username().to_string(),
            nickname: record.nickname().map(str::to_string),
            avatar: record.avatar().map(str::to_string),
            ip_address: record.ip_address().map(str::to_string),
            ip_source: record.ip_source().map(str::to_string),
            browser: record.browser().map(str::to_string),
            os: record.os().map(str::to_string),
            last_login_time: record.last_login_time(),
            expire_time: record.expire_time(),
        }
    }
}

/// Filters sessions by nickname and orders them most recent login first.
///
/// Blank keywords match everyone.
#[must_use]
pub fn online_users(records: Vec<SessionRecord>, keywords: Option<&str>) -> Vec<OnlineUser> {
    let keywords = keywords.map(str::trim).filter(|k| !k.is_empty());
    let mut users: Vec<OnlineUser> = records
        .into_iter()
        .filter(|record| match keywords {
            Some(k) => record.nickname().is_some_and(|nickname| nickname.contains(k)),
            None => true,
        })
        .map(OnlineUser::from)
        .collect();
    users.sort_by_key(|user| Reverse(user.last_login_time));
    users
}

/// Lists active sessions.
pub async fn list_online_users(
    State(state): State<Arc<AppState>>,
    CurrentUser(_): CurrentUser,
    Query(query): Query<OnlineUsersQuery>,
) -> Result<Json<ApiResponse<Vec<OnlineUser>>>, ApiError> {
    let records = state.tokens.list_active_sessions().await?;
    Ok(Json(ApiResponse::ok(online_users(
        records,
        query.keywords.as_deref(),
    ))))
}

/// Forces a user offline.
pub async fn remove_online_user(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
    Path(user_id): Path<UserId>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.tokens.evict_session(user_id).await?;
    info!(%user_id, by = %admin.user_id(), "session evicted");
    Ok(Json(ApiResponse::done()))
}

/// Drops the resource policy snapshot so role and resource edits take effect.
pub async fn invalidate_resource_cache(
    State(state): State<Arc<AppState>>,
    CurrentUser(admin): CurrentUser,
) -> Json<ApiResponse<()>> {
    state.engine.cache().invalidate();
    info!(by = %admin.user_id(), "resource policy cache invalidated on request");
    Json(ApiResponse::done())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gatehouse_platform_access::RoleSet;

    fn record(id: i64, nickname: Option<&str>, minutes_ago: Option<i64>) -> SessionRecord {
        let base = DateTime::<Utc>::UNIX_EPOCH + Duration::days(1);
        let record = SessionRecord::new(UserId::new(id), format!("user{id}"), RoleSet::none())
            .with_nickname(nickname.map(str::to_string));
        match minutes_ago {
            Some(m) => record.with_last_login_time(base - Duration::minutes(m)),
            None => record,
        }
    }

    fn ids(users: &[OnlineUser]) -> Vec<i64> {
        users.iter().map(|u| u.user_id.get()).collect()
    }

    #[test]
    fn sorted_by_last_login_descending() {
        let users = online_users(
            vec![
                record(1, Some("ann"), Some(30)),
                record(2, Some("bob"), Some(5)),
                record(3, Some("cat"), None),
                record(4, Some("dan"), Some(10)),
            ],
            None,
        );
        assert_eq!(ids(&users), vec![2, 4, 1, 3]);
    }

    #[test]
    fn keyword_filters_nickname() {
        let records = vec![
            record(1, Some("Alice"), Some(1)),
            record(2, Some("Malice"), Some(2)),
            record(3, Some("Bob"), Some(3)),
            record(4, None, Some(4)),
        ];
        assert_eq!(ids(&online_users(records.clone(), Some("lice"))), vec![1, 2]);
        assert_eq!(ids(&online_users(records.clone(), Some("alice"))), vec![2]);
        assert_eq!(ids(&online_users(records, Some("  "))), vec![1, 2, 3, 4]);
    }
}
