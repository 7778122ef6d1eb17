//! Central route assembly: public booking-form endpoints, the Stripe
//! webhook, and the bearer-gated admin surface, merged into one router.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::require_admin;
use crate::shared::state::AppState;

async fn handle_health() -> axum::response::Json<serde_json::Value> {
    axum::response::Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Configure all API routes from all modules
pub fn configure_api_routes(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/health", get(handle_health))
        .merge(crate::services::configure_public_routes())
        .merge(crate::bookings::configure_public_routes())
        .merge(crate::billing::configure_public_routes());

    let admin = Router::new()
        .merge(crate::bookings::configure_admin_routes())
        .merge(crate::calendar::configure_calendar_routes())
        .merge(crate::services::configure_admin_routes())
        .merge(crate::billing::configure_admin_routes())
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
