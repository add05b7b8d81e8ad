//! Authentication routes for login and logout.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use gatehouse_core::UserId;
use gatehouse_platform_access::{RoleSet, SessionRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{AppState, CurrentUser};
use crate::client::ClientInfo;
use crate::error::ApiError;
use crate::response::ApiResponse;

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Profile and token returned by a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info_id: Option<i64>,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub roles: RoleSet,
    pub ip_address: Option<String>,
    pub ip_source: Option<String>,
    pub last_login_time: Option<DateTime<Utc>>,
    pub token: String,
}

impl LoginResponse {
    fn new(record: &SessionRecord, user_info_id: Option<i64>, token: String) -> Self {
        Self {
            id: record.user_id(),
            user_info_id,
            username: record.username().to_string(),
            nickname: record.nickname().map(str::to_string),
            avatar: record.avatar().map(str::to_string),
            roles: record.roles().clone(),
            ip_address: record.ip_address().map(str::to_string),
            ip_source: record.ip_source().map(str::to_string),
            last_login_time: record.last_login_time(),
            token,
        }
    }
}

/// Verifies credentials and opens a session.
pub async fn login(
    State(state): State<Arc<AppState>>,
    client: ClientInfo,
    Json(form): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let account = state
        .users
        .verify_credentials(&form.username, &form.password)
        .await?
        .ok_or(ApiError::BadCredentials)?;

    let ip_source = client.ip_address.map(|ip| state.ip_locator.locate(ip));
    let mut record = SessionRecord::new(account.user_id, account.username, account.roles)
        .with_nickname(account.nickname)
        .with_avatar(account.avatar)
        .with_ip(client.ip_address.map(|ip| ip.to_string()), ip_source)
        .with_client(client.browser, client.os)
        .with_last_login_time(state.clock.now());

    let token = state.tokens.create_token(&mut record).await?;
    state.auditor.submit(record.login_metadata());

    info!(user_id = %record.user_id(), "user logged in");
    Ok(Json(ApiResponse::ok(LoginResponse::new(
        &record,
        account.user_info_id,
        token,
    ))))
}

/// Ends the caller's session.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.tokens.invalidate(principal.user_id()).await?;
    info!(user_id = %principal.user_id(), "user logged out");
    Ok(Json(ApiResponse::done()))
}
