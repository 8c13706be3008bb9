use crate::error::{AppError, AppResult};
use crate::security::csrf::CsrfToken;
use axum::{response::Json, Extension};

/// Hand the current CSRF token to the front end.
///
/// The token is placed in the request by the CSRF stage of the filter chain;
/// on a first visit the same stage also sets the `XSRF-TOKEN` cookie.
pub async fn csrf_token(token: Option<Extension<CsrfToken>>) -> AppResult<Json<CsrfToken>> {
    let Extension(token) = token
        .ok_or_else(|| AppError::Internal("CSRF filter is not installed".to_string()))?;

    Ok(Json(token))
}
