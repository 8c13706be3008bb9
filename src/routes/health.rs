use crate::routes::types::{HealthCheckResponse, InfoResponse};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use super::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthCheckResponse {
        status: "UP".to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now(),
    })
}

/// Service name and version
pub async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(InfoResponse {
        name: state.service_name.clone(),
        version: state.version.clone(),
    })
}
