use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::healthcheck))
        // Platform catalogs
        .route("/api/platforms", get(handlers::platforms::list_platforms))
        // Fact gathering
        .route("/api/facts", post(handlers::facts::gather_facts))
        .route("/api/facts/resolve", post(handlers::facts::resolve_facts))
        // SNMP sysDescr decoding
        .route("/api/sysdescr", post(handlers::sysdescr::parse_sysdescr))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
