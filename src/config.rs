mod cors;
mod security;
mod server;

pub use cors::{parse_list, CorsSettings};
pub use security::SecurityConfig;
pub use server::ServerConfig;

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsSettings,
    pub security: SecurityConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Missing or blank values fall back to defaults. Values that are present
    /// but cannot be parsed are configuration errors.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server_host = var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let server_port = var("SERVER_PORT")
            .unwrap_or_else(|| "8082".to_string())
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration("Invalid SERVER_PORT".to_string()))?;

        // CORS config
        let defaults = CorsSettings::default();
        let allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        let allowed_methods = var("CORS_ALLOWED_METHODS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        let allowed_headers = var("CORS_ALLOWED_HEADERS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default();
        let allow_credentials = match var("CORS_ALLOW_CREDENTIALS") {
            Some(raw) => raw.trim().to_ascii_lowercase().parse().map_err(|_| {
                AppError::Configuration("Invalid CORS_ALLOW_CREDENTIALS".to_string())
            })?,
            None => defaults.allow_credentials,
        };
        let max_age_seconds = match var("CORS_MAX_AGE") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Configuration("Invalid CORS_MAX_AGE".to_string()))?,
            None => defaults.max_age_seconds,
        };

        // Security config
        let admin_username = var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        let admin_password_hash = var("ADMIN_PASSWORD_HASH").map(|hash| hash.trim().to_string());
        let realm = var("SECURITY_REALM").unwrap_or_else(|| "Realm".to_string());

        let config = Config {
            server: ServerConfig {
                host: server_host,
                port: server_port,
            },
            cors: CorsSettings {
                allowed_origins,
                allowed_methods,
                allowed_headers,
                allow_credentials,
                max_age_seconds,
            },
            security: SecurityConfig {
                admin_username,
                admin_password_hash,
                realm,
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> AppResult<()> {
        self.security.validate().map_err(AppError::Configuration)
    }
}
