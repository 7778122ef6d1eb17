//! Admin authentication: a single bearer token checked on every
//! `/api/admin/*` route. Public booking and checkout endpoints stay open.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::shared::state::AppState;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let configured = state.config.admin_token.as_str();
    if configured.is_empty() {
        tracing::warn!("ADMIN_API_TOKEN is not set; rejecting admin request");
        return Err((
            StatusCode::UNAUTHORIZED,
            "admin access is not configured".to_string(),
        ));
    }

    match bearer_token(&request) {
        Some(token) if token == configured => Ok(next.run(request).await),
        Some(_) => Err((StatusCode::UNAUTHORIZED, "invalid admin token".to_string())),
        None => Err((
            StatusCode::UNAUTHORIZED,
            "Authentication required".to_string(),
        )),
    }
}
