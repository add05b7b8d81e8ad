//! Database adapters for sessions, resource policies, accounts, and login audit.
//!
//! The `sessions` table is owned by this server (see `migrations/`). The
//! `t_resource`, `t_role`, `t_role_resource`, `t_user_auth`, `t_user_info`,
//! and `t_user_role` tables belong to the admin panel's CRUD services and are
//! only read here, apart from the last-login columns of `t_user_auth`.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier},
};
use async_trait::async_trait;
use chrono::Duration;
use gatehouse_authz::{AuthzError, PolicySource, ResourcePolicy};
use gatehouse_core::UserId;
use gatehouse_platform_access::{
    LoginMetadata, RoleSet, SessionError, SessionRecord, SessionStore,
};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

use super::audit::LoginAuditSink;
use super::directory::{Account, UserDirectory};
use crate::error::{AuditError, DirectoryError};

fn store_unavailable(e: sqlx::Error) -> SessionError {
    SessionError::StoreUnavailable {
        reason: e.to_string(),
    }
}

fn encode_record(record: &SessionRecord) -> Result<serde_json::Value, SessionError> {
    serde_json::to_value(record).map_err(|e| SessionError::StoreUnavailable {
        reason: format!("failed to encode session record: {e}"),
    })
}

// Milliseconds keep sub-second TTLs exact.
fn ttl_seconds(ttl: Duration) -> f64 {
    ttl.num_milliseconds() as f64 / 1000.0
}

fn decode_record(value: serde_json::Value) -> Result<SessionRecord, SessionError> {
    serde_json::from_value(value).map_err(|e| SessionError::StoreUnavailable {
        reason: format!("corrupt session record: {e}"),
    })
}

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    record: serde_json::Value,
}

/// Session store backed by the `sessions` table.
///
/// Expiry is evaluated against database time; expired rows are invisible to
/// reads and reclaimed by [`PgSessionStore::delete_expired`].
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip(self, record))]
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), Report<SessionError>> {
        let record_json = encode_record(record)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, record, expires_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            ON CONFLICT (user_id)
            DO UPDATE SET record = EXCLUDED.record, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(user_id.get())
        .bind(record_json)
        .bind(ttl_seconds(ttl))
        .execute(&self.pool)
        .await
        .map_err(store_unavailable)?;

        Ok(())
    }

    #[instrument(skip(self, record))]
    async fn touch(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, Report<SessionError>> {
        let record_json = encode_record(record)?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET record = $2, expires_at = NOW() + make_interval(secs => $3)
            WHERE user_id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(user_id.get())
        .bind(record_json)
        .bind(ttl_seconds(ttl))
        .execute(&self.pool)
        .await
        .map_err(store_unavailable)?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, Report<SessionError>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT record
            FROM sessions
            WHERE user_id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_unavailable)?;

        match row {
            Some(r) => Ok(Some(decode_record(r.record)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<(), Report<SessionError>> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.get())
        .execute(&self.pool)
        .await
        .map_err(store_unavailable)?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, Report<SessionError>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            r#"
            SELECT record
            FROM sessions
            WHERE expires_at > NOW()
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_unavailable)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(decode_record(row.record)?);
        }
        Ok(records)
    }
}

/// Row type for resource policy queries.
#[derive(FromRow)]
struct ResourceRoleRow {
    url: String,
    request_method: String,
    role_names: Vec<String>,
}

/// Policy source reading the resource-role join.
///
/// Anonymous resources and top-level resource groups carry no policy.
/// Resources with no roles come back with an empty list, which disables them.
#[derive(Clone)]
pub struct PgPolicySource {
    pool: PgPool,
}

impl PgPolicySource {
    /// Creates a new policy source.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicySource for PgPolicySource {
    #[instrument(skip(self))]
    async fn list_resource_role_policies(
        &self,
    ) -> Result<Vec<ResourcePolicy>, Report<AuthzError>> {
        let rows: Vec<ResourceRoleRow> = sqlx::query_as(
            r#"
            SELECT re.url::text AS url,
                   re.request_method::text AS request_method,
                   COALESCE(
                       array_agg(r.role_name::text ORDER BY r.id)
                           FILTER (WHERE r.role_name IS NOT NULL),
                       '{}'::text[]
                   ) AS role_names
            FROM t_resource re
            LEFT JOIN t_role_resource rr ON re.id = rr.resource_id
            LEFT JOIN t_role r ON rr.role_id = r.id
            WHERE re.parent_id IS NOT NULL AND re.is_anonymous = 0
            GROUP BY re.id, re.url, re.request_method
            ORDER BY re.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthzError::PolicySourceUnavailable {
            reason: e.to_string(),
        })?;

        debug!(count = rows.len(), "loaded resource policies");
        Ok(rows
            .into_iter()
            .map(|row| ResourcePolicy::new(row.url, row.request_method, row.role_names))
            .collect())
    }
}

/// Row type for account queries.
#[derive(FromRow)]
struct AccountRow {
    id: i64,
    user_info_id: i64,
    username: String,
    password: String,
    nickname: Option<String>,
    avatar: Option<String>,
    disabled: bool,
}

/// Verifies a password against an argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// User directory over `t_user_auth`, `t_user_info`, and `t_user_role`.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Creates a new user directory.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn roles_for(&self, user_info_id: i64) -> Result<RoleSet, sqlx::Error> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.role_name::text
            FROM t_user_role ur
            JOIN t_role r ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_info_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(RoleSet::from_names(names))
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self, password))]
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, Report<DirectoryError>> {
        let db_error = |e: sqlx::Error| DirectoryError::DatabaseError {
            details: e.to_string(),
        };

        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT ua.id::bigint AS id,
                   ua.user_info_id::bigint AS user_info_id,
                   ua.username::text AS username,
                   ua.password::text AS password,
                   ui.nickname::text AS nickname,
                   ui.avatar::text AS avatar,
                   (ui.is_disable <> 0) AS disabled
            FROM t_user_auth ua
            JOIN t_user_info ui ON ua.user_info_id = ui.id
            WHERE ua.username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            debug!("unknown username");
            return Ok(None);
        };
        if !verify_password(password, &row.password) {
            debug!(user_id = row.id, "password mismatch");
            return Ok(None);
        }
        if row.disabled {
            debug!(user_id = row.id, "account disabled");
            return Ok(None);
        }

        let roles = self.roles_for(row.user_info_id).await.map_err(db_error)?;
        Ok(Some(Account {
            user_id: UserId::new(row.id),
            user_info_id: Some(row.user_info_id),
            username: row.username,
            nickname: row.nickname,
            avatar: row.avatar,
            roles,
        }))
    }
}

/// Writes last-login columns of `t_user_auth`.
#[derive(Clone)]
pub struct PgLoginAudit {
    pool: PgPool,
}

impl PgLoginAudit {
    /// Creates a new login audit sink.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAuditSink for PgLoginAudit {
    async fn record_login(&self, metadata: &LoginMetadata) -> Result<(), Report<AuditError>> {
        sqlx::query(
            r#"
            UPDATE t_user_auth
            SET ip_address = $2, ip_source = $3, last_login_time = $4
            WHERE id = $1
            "#,
        )
        .bind(metadata.user_id.get())
        .bind(metadata.ip_address.as_deref())
        .bind(metadata.ip_source.as_deref())
        .bind(metadata.last_login_time)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::DatabaseError {
            details: e.to_string(),
        })?;

        Ok(())
    }
}
