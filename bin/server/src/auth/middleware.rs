//! Authentication gate, authorization layer, and principal extractor.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use gatehouse_platform_access::{Principal, SessionError};
use std::sync::Arc;
use tracing::{debug, warn};

use super::AppState;
use crate::error::ApiError;

/// Resolves the session behind the request token and binds its principal.
///
/// Requests without a usable token continue anonymously; the authorization
/// layer decides whether that is enough. Sessions close to expiry are renewed
/// as a side effect. If the session store is unreachable the request fails
/// with 503 unless fail-open authentication is configured.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.extensions().get::<Principal>().is_some() {
        return Ok(next.run(request).await);
    }

    let header = request
        .headers()
        .get(state.tokens.config().header())
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match state.tokens.resolve_session(header.as_deref()).await {
        Ok(Some(mut record)) => {
            request
                .extensions_mut()
                .insert(Principal::from_session(&record));
            if let Err(e) = state.tokens.renew_if_near_expiry(&mut record).await {
                warn!(user_id = %record.user_id(), error = %e, "session renewal failed");
            }
        }
        Ok(None) => {}
        Err(report) => {
            let invalid_token = matches!(
                report.current_context(),
                SessionError::InvalidToken { .. }
            );
            if invalid_token {
                debug!(error = %report, "ignoring invalid token");
            } else if state.fail_open_authentication {
                warn!(error = %report, "session lookup failed; continuing anonymously");
            } else {
                return Err(report.into());
            }
        }
    }

    Ok(next.run(request).await)
}

/// Rejects requests whose principal does not satisfy the matching resource policy.
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request.extensions().get::<Principal>().cloned();
    let method = request.method().as_str().to_owned();
    let path = request.uri().path().to_owned();

    state
        .engine
        .decide(principal.as_ref(), &method, &path)
        .await?;

    Ok(next.run(request).await)
}

/// Extractor for the principal bound by [`authenticate`].
///
/// Rejects with 401 if the request is anonymous.
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentUser)
            .ok_or(ApiError::NotAuthenticated)
    }
}
