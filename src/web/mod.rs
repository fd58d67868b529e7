//! HTTP surface: the resource route table served over axum.
//!
//! The same [`Router`](axum::Router) backs the standalone server and the
//! serverless HTTP event handler in [`crate::dispatch`].

pub mod config;
pub mod extract;
pub mod handlers;
pub mod response;
pub mod router;
pub mod state;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;
pub use state::AppState;

use crate::error::{RelayError, Result};
use tracing::{info, warn};

/// Serve `state` until Ctrl-C.
pub async fn start_web_server(config: WebConfig, state: AppState) -> Result<()> {
    let facade = state.facade.describe();
    let app = create_app(state, &config);

    let addr = config.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Starting pi_everywhere server on http://{} ({} facade)", addr, facade);
    info!("Health endpoint: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::web_server_error(format!("Server error: {}", e)))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C, serving until killed: {}", e);
            std::future::pending::<()>().await
        }
    }
}
