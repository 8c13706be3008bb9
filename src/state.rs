use std::time::Instant;

/// Application state shared across all HTTP handlers.
///
/// Wrapped in `Arc` and handed to handlers through Axum's State extraction.
/// The security filter chain keeps its own state and never reads this.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Service name reported by `/actuator/info`
    pub service_name: String,

    /// Crate version reported by `/actuator/info`
    pub version: String,

    /// When the server started, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
