use gatehouse_authz::{AccessDecisionEngine, ResourcePolicyCache};
use gatehouse_core::{Clock, SystemClock};
use gatehouse_platform_access::TokenService;
use gatehouse_server::{
    auth::{
        AppState, LoginAuditor,
        db::{PgLoginAudit, PgPolicySource, PgSessionStore, PgUserDirectory},
    },
    client::LocalIpLocator,
    config::ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Cleanup expired sessions on startup
    let session_store = PgSessionStore::new(db_pool.clone());
    match session_store.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_store = session_store.clone();
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_store.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tokens = TokenService::new(config.token, Arc::new(session_store), clock.clone())
        .expect("invalid token configuration");

    // Warm the policy cache; a failure here is retried on first use
    let policy_cache = Arc::new(
        ResourcePolicyCache::new(Arc::new(PgPolicySource::new(db_pool.clone())))
            .with_load_timeout(config.policy.load_timeout())
            .with_retry_interval(config.policy.retry_interval()),
    );
    match policy_cache.reload().await {
        Ok(count) => tracing::info!(policies = count, "Loaded resource policies"),
        Err(e) => tracing::warn!(error = %e, "Failed to load resource policies on startup"),
    }

    let (auditor, _audit_worker) = LoginAuditor::spawn(
        Arc::new(PgLoginAudit::new(db_pool.clone())),
        config.audit.queue_capacity,
    );

    // Create application state
    let app_state = Arc::new(AppState {
        tokens: Arc::new(tokens),
        engine: AccessDecisionEngine::new(policy_cache),
        users: Arc::new(PgUserDirectory::new(db_pool)),
        auditor,
        ip_locator: Arc::new(LocalIpLocator),
        clock,
        fail_open_authentication: config.session.fail_open_authentication,
    });

    let app = gatehouse_server::router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
