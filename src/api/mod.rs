//! HTTP API server module
//!
//! Read-only REST endpoints for the dashboard frontend: session listing,
//! paged transcripts with cost annotation, per-session usage and ad-hoc
//! price estimates.

pub mod handlers;
mod routes;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::DashboardConfig;
use crate::error::AppError;
use crate::pricing::PricingTable;
use crate::sessions::{SessionIndex, SessionStore};

pub use routes::create_router;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub pricing: Arc<PricingTable>,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, pricing: PricingTable) -> Self {
        Self {
            store,
            pricing: Arc::new(pricing),
        }
    }

    /// Filesystem-backed state for a loaded config
    pub fn from_config(config: &DashboardConfig) -> Self {
        let index = SessionIndex::new(&config.sources);
        let found = index.refresh();
        tracing::info!("Indexed {} transcript sessions", found);
        Self::new(Arc::new(index), config.pricing_table())
    }
}

/// Router with CORS and request tracing applied
pub fn build_app(state: Arc<AppState>) -> Router {
    // Configure CORS for cross-origin requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

/// Start the HTTP API server
///
/// Host and port come from the `server` config section
/// (SESSIONSCOPE_API_HOST / SESSIONSCOPE_API_PORT override them).
///
/// SECURITY: Binding to 0.0.0.0 exposes local transcripts to the network.
pub async fn start_server(config: DashboardConfig) -> Result<(), AppError> {
    let addr: SocketAddr = config.server.bind_addr().parse().map_err(|e| {
        AppError::config_error(format!(
            "Invalid server address {}: {}",
            config.server.bind_addr(),
            e
        ))
    })?;

    // Security warning for network exposure
    if config.server.host == "0.0.0.0" {
        tracing::warn!("Server binding to 0.0.0.0 - transcripts accessible from network");
    }

    let state = Arc::new(AppState::from_config(&config));
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::unknown(format!("Failed to bind HTTP server on {}: {}", addr, e)))?;

    tracing::info!("HTTP API server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::unknown(format!("HTTP server error: {}", e)))
}
