#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use gatehouse_authz::{AccessDecisionEngine, AuthzError, PolicySource, ResourcePolicy, ResourcePolicyCache};
use gatehouse_core::{Clock, ManualClock, UserId};
use gatehouse_platform_access::{
    InMemorySessionStore, LoginMetadata, RoleSet, SessionError, SessionRecord, SessionStore,
    TokenConfig, TokenService,
};
use gatehouse_server::{
    auth::{Account, AppState, LoginAuditSink, LoginAuditor, UserDirectory},
    client::LocalIpLocator,
    error::{AuditError, DirectoryError},
};
use http_body_util::BodyExt;
use rootcause::prelude::Report;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const SECRET: &str = "integration-test-secret-0123456789";
const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

/// Session store that can be switched off.
struct SwitchableStore {
    inner: InMemorySessionStore,
    down: AtomicBool,
}

impl SwitchableStore {
    fn check(&self) -> Result<(), Report<SessionError>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SessionError::StoreUnavailable {
                reason: "connection refused".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SwitchableStore {
    async fn put(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), Report<SessionError>> {
        self.check()?;
        self.inner.put(user_id, record, ttl).await
    }

    async fn touch(
        &self,
        user_id: UserId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<bool, Report<SessionError>> {
        self.check()?;
        self.inner.touch(user_id, record, ttl).await
    }

    async fn get(&self, user_id: UserId) -> Result<Option<SessionRecord>, Report<SessionError>> {
        self.check()?;
        self.inner.get(user_id).await
    }

    async fn delete(&self, user_id: UserId) -> Result<(), Report<SessionError>> {
        self.check()?;
        self.inner.delete(user_id).await
    }

    async fn list(&self) -> Result<Vec<SessionRecord>, Report<SessionError>> {
        self.check()?;
        self.inner.list().await
    }
}

struct EditableSource {
    policies: Mutex<Vec<ResourcePolicy>>,
}

#[async_trait]
impl PolicySource for EditableSource {
    async fn list_resource_role_policies(
        &self,
    ) -> Result<Vec<ResourcePolicy>, Report<AuthzError>> {
        Ok(self.policies.lock().unwrap().clone())
    }
}

struct FakeDirectory {
    accounts: HashMap<String, (String, Account)>,
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Account>, Report<DirectoryError>> {
        Ok(self
            .accounts
            .get(username)
            .filter(|(expected, _)| expected == password)
            .map(|(_, account)| account.clone()))
    }
}

#[derive(Default)]
struct RecordingAudit {
    recorded: Mutex<Vec<LoginMetadata>>,
}

#[async_trait]
impl LoginAuditSink for RecordingAudit {
    async fn record_login(&self, metadata: &LoginMetadata) -> Result<(), Report<AuditError>> {
        self.recorded.lock().unwrap().push(metadata.clone());
        Ok(())
    }
}

struct Harness {
    router: Router,
    state: Arc<AppState>,
    clock: Arc<ManualClock>,
    store: Arc<SwitchableStore>,
    source: Arc<EditableSource>,
    audit: Arc<RecordingAudit>,
}

fn account(id: i64, username: &str, nickname: &str, role: &str) -> Account {
    Account {
        user_id: UserId::new(id),
        user_info_id: Some(id + 100),
        username: username.to_string(),
        nickname: Some(nickname.to_string()),
        avatar: None,
        roles: RoleSet::from_names([role]),
    }
}

fn harness_with(fail_open: bool) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(SwitchableStore {
        inner: InMemorySessionStore::new(clock.clone()),
        down: AtomicBool::new(false),
    });
    let tokens = TokenService::new(TokenConfig::new(SECRET), store.clone(), clock.clone()).unwrap();

    let source = Arc::new(EditableSource {
        policies: Mutex::new(vec![
            ResourcePolicy::new("/admin/users/online", "GET", ["admin"]),
            ResourcePolicy::new("/admin/users/online/*", "DELETE", ["admin"]),
            ResourcePolicy::new("/admin/resources/cache/invalidate", "POST", ["admin"]),
        ]),
    });
    let cache = Arc::new(ResourcePolicyCache::new(source.clone()));

    let directory = FakeDirectory {
        accounts: HashMap::from([
            (
                "alice".to_string(),
                ("wonderland".to_string(), account(1, "alice", "Alice", "admin")),
            ),
            (
                "vera".to_string(),
                ("viewpoint".to_string(), account(2, "vera", "Vera", "viewer")),
            ),
        ]),
    };

    let audit = Arc::new(RecordingAudit::default());
    let (auditor, _worker) = LoginAuditor::spawn(audit.clone(), 16);

    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let state = Arc::new(AppState {
        tokens: Arc::new(tokens),
        engine: AccessDecisionEngine::new(cache),
        users: Arc::new(directory),
        auditor,
        ip_locator: Arc::new(LocalIpLocator),
        clock: clock_dyn,
        fail_open_authentication: fail_open,
    });

    Harness {
        router: gatehouse_server::router(state.clone()),
        state,
        clock,
        store,
        source,
        audit,
    }
}

fn harness() -> Harness {
    harness_with(false)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/users/login")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.5")
        .header("user-agent", FIREFOX)
        .body(Body::from(
            json!({"username": username, "password": password}).to_string(),
        ))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(h: &Harness, username: &str, password: &str) -> String {
    let (status, body) = send(&h.router, login_request(username, password)).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn login_returns_profile_and_token() {
    let h = harness();

    let (status, body) = send(&h.router, login_request("alice", "wonderland")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flag"], json!(true));
    assert_eq!(body["code"], json!(20000));
    assert_eq!(body["message"], json!("success"));
    let data = &body["data"];
    assert_eq!(data["id"], json!(1));
    assert_eq!(data["userInfoId"], json!(101));
    assert_eq!(data["username"], json!("alice"));
    assert_eq!(data["nickname"], json!("Alice"));
    assert_eq!(data["roles"], json!(["admin"]));
    assert_eq!(data["ipAddress"], json!("10.0.0.5"));
    assert_eq!(data["ipSource"], json!("intranet"));
    assert!(data["lastLoginTime"].is_string());
    assert!(!data["token"].as_str().unwrap().is_empty());

    let session = h.store.get(UserId::new(1)).await.unwrap().expect("session stored");
    assert_eq!(session.browser(), Some("Firefox"));
    assert_eq!(session.os(), Some("Linux"));
    assert_eq!(session.expire_time(), h.clock.now() + Duration::hours(1));
}

#[tokio::test]
async fn login_enqueues_last_login_update() {
    let h = harness();
    login(&h, "alice", "wonderland").await;

    for _ in 0..100 {
        if !h.audit.recorded.lock().unwrap().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }

    let recorded = h.audit.recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].user_id, UserId::new(1));
    assert_eq!(recorded[0].ip_source.as_deref(), Some("intranet"));
    assert_eq!(recorded[0].last_login_time, Some(h.clock.now()));
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let h = harness();

    let (status, body) = send(&h.router, login_request("alice", "guess")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["flag"], json!(false));
    assert_eq!(body["code"], json!(40002));
    assert_eq!(body["data"], Value::Null);
    assert!(h.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_request_to_protected_resource_needs_login() {
    let h = harness();

    let (status, body) = send(&h.router, authed("GET", "/admin/users/online", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!(40001));
    assert_eq!(body["message"], json!("user is not logged in"));
}

#[tokio::test]
async fn invalid_and_null_tokens_are_anonymous() {
    let h = harness();

    let (status, body) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some("not-a-token")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!(40001));

    let (status, _) = send(&h.router, authed("GET", "/admin/users/online", Some("null"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_role_is_forbidden() {
    let h = harness();
    let token = login(&h, "vera", "viewpoint").await;

    let (status, body) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!(40300));
    assert_eq!(body["message"], json!("insufficient permissions"));
}

#[tokio::test]
async fn admin_lists_online_users_newest_first() {
    let h = harness();
    login(&h, "vera", "viewpoint").await;
    h.clock.advance(Duration::minutes(1));
    let token = login(&h, "alice", "wonderland").await;

    let (status, body) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["userId"], json!(1));
    assert_eq!(users[1]["userId"], json!(2));

    let (_, body) = send(
        &h.router,
        authed("GET", "/admin/users/online?keywords=Ver", Some(&token)),
    )
    .await;
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["nickname"], json!("Vera"));
}

#[tokio::test]
async fn logout_revokes_token() {
    let h = harness();
    let token = login(&h, "alice", "wonderland").await;

    let (status, body) = send(&h.router, authed("POST", "/api/users/logout", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], json!(20000));

    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_without_session_needs_login() {
    let h = harness();
    let (status, body) = send(&h.router, authed("POST", "/api/users/logout", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!(40001));
}

#[tokio::test]
async fn admin_evicts_other_user() {
    let h = harness();
    let admin = login(&h, "alice", "wonderland").await;
    let viewer = login(&h, "vera", "viewpoint").await;

    let (status, _) = send(
        &h.router,
        authed("DELETE", "/admin/users/online/2", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&h.router, authed("POST", "/api/users/logout", Some(&viewer))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(h.store.get(UserId::new(1)).await.unwrap().is_some());
}

#[tokio::test]
async fn activity_near_expiry_renews_session() {
    let h = harness();
    let token = login(&h, "alice", "wonderland").await;
    let issued = h.store.get(UserId::new(1)).await.unwrap().unwrap().expire_time();

    // 15 minutes left: inside the renewal window.
    h.clock.advance(Duration::minutes(45));
    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let renewed = h.store.get(UserId::new(1)).await.unwrap().unwrap().expire_time();
    assert!(renewed > issued);
    assert_eq!(renewed, h.clock.now() + Duration::hours(1));

    // Past the original deadline, still logged in.
    h.clock.advance(Duration::minutes(30));
    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn idle_session_lapses() {
    let h = harness();
    let token = login(&h, "alice", "wonderland").await;

    h.clock.advance(Duration::minutes(61));

    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_outage_fails_closed() {
    let h = harness();
    let token = login(&h, "alice", "wonderland").await;
    h.store.down.store(true, Ordering::SeqCst);

    let (status, body) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], json!(50000));
}

#[tokio::test]
async fn store_outage_can_fail_open_to_anonymous() {
    let h = harness_with(true);
    let token = login(&h, "alice", "wonderland").await;
    h.store.down.store(true, Ordering::SeqCst);

    let (status, body) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&token)),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!(40001));
}

#[tokio::test]
async fn policy_edits_apply_after_invalidation() {
    let h = harness();
    let admin = login(&h, "alice", "wonderland").await;
    let viewer = login(&h, "vera", "viewpoint").await;

    h.source.policies.lock().unwrap()[0] =
        ResourcePolicy::new("/admin/users/online", "GET", ["admin", "viewer"]);

    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&viewer)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &h.router,
        authed("POST", "/admin/resources/cache/invalidate", Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!h.state.engine.cache().is_loaded());

    let (status, _) = send(
        &h.router,
        authed("GET", "/admin/users/online", Some(&viewer)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
