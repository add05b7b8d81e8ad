//! gatehouse admin-panel API server.
//!
//! This crate wires the token session core and the URL-pattern authorization
//! engine into an axum [`Router`], and provides the Postgres adapters they
//! run on in production.

pub mod admin;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod response;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::AppState;

/// Builds the application router.
///
/// Every request passes the authentication gate first, then the
/// authorization layer, then the handler.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/users/login", post(auth::login))
        .route("/api/users/logout", post(auth::logout))
        .route("/admin/users/online", get(admin::list_online_users))
        .route(
            "/admin/users/online/{user_id}",
            delete(admin::remove_online_user),
        )
        .route(
            "/admin/resources/cache/invalidate",
            post(admin::invalidate_resource_cache),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authorize,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
