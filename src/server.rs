//! Server startup and shutdown.
//!
//! `run_server` builds the security filter chain from configuration, mounts
//! the dashboard routes behind it, and serves until a shutdown signal
//! arrives.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::routes;
use crate::security::SecurityFilterChainBuilder;
use crate::state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Run the web server with the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - the security filter chain cannot be built from the configuration
/// - the listener cannot bind to `addr`
/// - the server fails while running
pub async fn run_server(config: Config, addr: String) -> AppResult<()> {
    info!("Starting dashboard security front...");

    let chain = SecurityFilterChainBuilder::from_config(&config).build_filter_chain()?;
    let state = Arc::new(AppState::new());
    let app = routes::create_router(state, &chain);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to address {}: {}", addr, e)))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves when Ctrl+C (or, on Unix, SIGTERM) is received.
///
/// If a signal handler cannot be installed the error is logged and that
/// signal source is ignored.
async fn create_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("Shutdown signal received");
}
