use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{app_state::AppState, handlers::error::ApiError, models::user::CallerIdentity};

enum Bearer<'a> {
    Absent,
    Present(&'a str),
    Malformed,
}

fn bearer(headers: &HeaderMap) -> Bearer<'_> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Bearer::Absent;
    };
    match value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
        Some(token) if !token.trim().is_empty() => Bearer::Present(token.trim()),
        _ => Bearer::Malformed,
    }
}

fn identify(state: &AppState, token: &str) -> Result<CallerIdentity, ApiError> {
    match state.jwt.validate_token(token) {
        Some(caller) => {
            debug!(caller = %caller.id, "valid bearer token");
            Ok(caller)
        }
        None => {
            debug!("rejected bearer token");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Rejects the request unless it carries a valid bearer token; the caller
/// is stored in the request extensions for the handler.
pub async fn auth_middleware<B>(
    Extension(state): Extension<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let caller = match bearer(req.headers()) {
        Bearer::Present(token) => identify(&state, token)?,
        Bearer::Absent | Bearer::Malformed => return Err(ApiError::Unauthorized),
    };
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Like [`auth_middleware`], but lets anonymous requests through. A token
/// that is present but invalid is still rejected.
pub async fn optional_auth_middleware<B>(
    Extension(state): Extension<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let caller = match bearer(req.headers()) {
        Bearer::Absent => None,
        Bearer::Present(token) => Some(identify(&state, token)?),
        Bearer::Malformed => return Err(ApiError::Unauthorized),
    };
    if let Some(caller) = caller {
        req.extensions_mut().insert(caller);
    }
    Ok(next.run(req).await)
}
