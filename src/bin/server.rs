//! Headless sessionscope server binary
//!
//! Serves normalized transcripts and cost attribution for local Claude Code,
//! Codex and Gemini sessions.
//!
//! Usage:
//!   SESSIONSCOPE_API_PORT=3040 ./sessionscope-server
//!
//! Environment variables:
//!   - SESSIONSCOPE_DATA_ROOT: Directory holding config.yaml (default: ~/.sessionscope)
//!   - SESSIONSCOPE_API_HOST: Bind address (default: 127.0.0.1)
//!   - SESSIONSCOPE_API_PORT: Port number (default: 3040)
//!   - RUST_LOG: Log filter (default: sessionscope_lib=info)

use sessionscope_lib::{api, config::DashboardConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    EnvFilter::new("sessionscope_lib=info,sessionscope_server=info,tower_http=info")
                }),
        )
        .init();

    tracing::info!("Starting sessionscope server v{}", env!("CARGO_PKG_VERSION"));

    let config = match DashboardConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config, using defaults: {}", e);
            DashboardConfig::default().with_env_overrides()
        }
    };

    // Start HTTP API server (blocks)
    if let Err(e) = api::start_server(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
