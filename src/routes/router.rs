use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::security::{SecurityFilterChain, CSRF_TOKEN_PATH};
use axum::http::Uri;
use axum::middleware;
use axum::routing::get;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::csrf_token;
use super::health;
use super::AppState;

/// Create application router
pub fn create_router(state: Arc<AppState>, chain: &SecurityFilterChain) -> axum::Router {
    let routes = axum::Router::new()
        .route(CSRF_TOKEN_PATH, get(csrf_token::csrf_token))
        .route("/actuator/health", get(health::health_check))
        .route("/actuator/info", get(health::info))
        .fallback(not_found)
        .with_state(state);

    // Every route, the fallback included, sits behind the security chain
    chain
        .apply(routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
