use serde::{Deserialize, Serialize};

/// CORS settings as supplied by the environment (`CORS_*` variables).
///
/// This is the raw input only. The policy actually enforced is the union of
/// these lists with the built-in defaults, see
/// [`CorsPolicy`](crate::security::cors::CorsPolicy).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsSettings {
    /// Origins allowed to issue cross-origin requests
    pub allowed_origins: Vec<String>,

    /// HTTP methods allowed on cross-origin requests
    pub allowed_methods: Vec<String>,

    /// Request headers allowed on cross-origin requests
    pub allowed_headers: Vec<String>,

    /// Whether browsers may send credentials (cookies, Authorization)
    pub allow_credentials: bool,

    /// How long browsers may cache a preflight response, in seconds
    pub max_age_seconds: u64,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            allow_credentials: true,
            max_age_seconds: 3600,
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
