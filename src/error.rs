use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Full authentication is required to access this resource")]
    Unauthorized { realm: String },

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Could not verify the provided CSRF token because no token was found to compare")]
    MissingCsrfToken,

    #[error("Invalid CSRF token found")]
    InvalidCsrfToken,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Unauthorized { .. } => {
                (StatusCode::UNAUTHORIZED, self.to_string(), "UNAUTHORIZED")
            }
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string(), "FORBIDDEN"),
            AppError::MissingCsrfToken | AppError::InvalidCsrfToken => {
                (StatusCode::FORBIDDEN, self.to_string(), "CSRF_REJECTED")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string(), "BAD_REQUEST"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string(), "NOT_FOUND"),
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Data serialization error".to_string(),
                    "SERIALIZATION_ERROR",
                )
            }
            _ => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = json!({
            "error": error_code,
            "message": error_message,
        });

        let mut response = (status, Json(body)).into_response();

        if let AppError::Unauthorized { realm } = &self {
            let challenge = HeaderValue::from_str(&format!("Basic realm=\"{}\"", realm))
                .unwrap_or_else(|_| HeaderValue::from_static("Basic realm=\"Realm\""));
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }

        response
    }
}

/// Result type alias for AppResult
pub type AppResult<T> = Result<T, AppError>;
