//! HTTP API route definitions

use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers;
use super::AppState;

/// Create the main API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(handlers::health))
        // Sessions
        .route("/api/sessions", get(handlers::sessions::list_sessions))
        .route("/api/sessions/{id}/messages", get(handlers::sessions::get_messages))
        .route("/api/sessions/{id}/usage", get(handlers::usage::get_session_usage))
        // Pricing
        .route("/api/pricing/estimate", get(handlers::pricing::estimate))
        .with_state(state)
}
