//! Cookie-based CSRF protection.
//!
//! The token lives in a cookie the front end can read from script and must
//! be echoed back in a header (or form field) on state-changing requests.
//! Nothing is stored server side.

use crate::error::{AppError, AppResult};
use crate::security::pattern::PathPattern;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CSRF_COOKIE_NAME: &str = "XSRF-TOKEN";
pub const CSRF_HEADER_NAME: &str = "X-XSRF-TOKEN";
pub const CSRF_PARAMETER_NAME: &str = "_csrf";

/// Upper bound on a form body buffered while looking for the token field
const MAX_FORM_BYTES: usize = 1024 * 1024;

/// CSRF token made available to handlers through request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfToken {
    pub token: String,
    pub header_name: String,
    pub parameter_name: String,
}

/// Stores the CSRF token in a cookie
#[derive(Debug, Clone)]
pub struct CookieCsrfTokenRepository {
    cookie_name: String,
    header_name: String,
    parameter_name: String,
    cookie_path: String,
    cookie_http_only: bool,
}

impl Default for CookieCsrfTokenRepository {
    fn default() -> Self {
        Self {
            cookie_name: CSRF_COOKIE_NAME.to_string(),
            header_name: CSRF_HEADER_NAME.to_string(),
            parameter_name: CSRF_PARAMETER_NAME.to_string(),
            cookie_path: "/".to_string(),
            cookie_http_only: true,
        }
    }
}

impl CookieCsrfTokenRepository {
    /// Repository whose cookie is readable by browser scripts, so a
    /// single-page front end can copy the token into request headers.
    pub fn with_http_only_false() -> Self {
        Self {
            cookie_http_only: false,
            ..Self::default()
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn is_cookie_http_only(&self) -> bool {
        self.cookie_http_only
    }

    pub fn generate_token(&self) -> CsrfToken {
        self.token(Uuid::new_v4().to_string())
    }

    /// Read the token from the request cookie, if any
    pub fn load_token(&self, headers: &HeaderMap) -> Option<CsrfToken> {
        parse_cookies(headers)
            .remove(&self.cookie_name)
            .filter(|value| !value.is_empty())
            .map(|value| self.token(value))
    }

    /// Append the `Set-Cookie` header carrying `token`
    pub fn save_token(&self, token: &CsrfToken, headers: &mut HeaderMap) -> AppResult<()> {
        let mut cookie = format!(
            "{}={}; Path={}",
            self.cookie_name, token.token, self.cookie_path
        );
        if self.cookie_http_only {
            cookie.push_str("; HttpOnly");
        }

        let value = HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid CSRF cookie: {}", e)))?;
        headers.append(header::SET_COOKIE, value);
        Ok(())
    }

    fn token(&self, value: String) -> CsrfToken {
        CsrfToken {
            token: value,
            header_name: self.header_name.clone(),
            parameter_name: self.parameter_name.clone(),
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// CSRF stage of the security filter chain
#[derive(Debug, Clone)]
pub struct CsrfProtection {
    repository: CookieCsrfTokenRepository,
    ignored: Vec<PathPattern>,
}

impl CsrfProtection {
    pub fn new(repository: CookieCsrfTokenRepository) -> Self {
        Self {
            repository,
            ignored: Vec::new(),
        }
    }

    /// Exempt requests matching `pattern` from token validation
    pub fn ignoring(mut self, pattern: &str) -> Self {
        self.ignored.push(PathPattern::new(pattern));
        self
    }

    pub fn repository(&self) -> &CookieCsrfTokenRepository {
        &self.repository
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.ignored.iter().any(|pattern| pattern.matches(path))
    }

    pub fn requires_protection(&self, method: &Method, path: &str) -> bool {
        !is_safe_method(method) && !self.is_exempt(path)
    }
}

fn is_safe_method(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::TRACE, Method::OPTIONS].contains(method)
}

/// Validate the CSRF token on state-changing requests.
///
/// Every request gets the current token in its extensions; when the browser
/// had no token cookie a fresh one is issued on the response, rejected or not.
pub async fn csrf_filter(
    State(csrf): State<Arc<CsrfProtection>>,
    mut req: Request,
    next: Next,
) -> Response {
    let repository = csrf.repository();
    let (token, generated) = match repository.load_token(req.headers()) {
        Some(token) => (token, false),
        None => (repository.generate_token(), true),
    };
    req.extensions_mut().insert(token.clone());

    let mut response = if csrf.requires_protection(req.method(), req.uri().path()) {
        match verify(&csrf, &token, generated, req).await {
            Ok(req) => next.run(req).await,
            Err(e) => e.into_response(),
        }
    } else {
        next.run(req).await
    };

    if generated {
        if let Err(e) = repository.save_token(&token, response.headers_mut()) {
            return e.into_response();
        }
    }

    response
}

async fn verify(
    csrf: &CsrfProtection,
    expected: &CsrfToken,
    generated: bool,
    req: Request,
) -> AppResult<Request> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if generated {
        warn!(%method, %path, "CSRF token cookie missing");
        return Err(AppError::MissingCsrfToken);
    }

    let (actual, req) = resolve_actual_token(csrf.repository(), req).await?;
    match actual {
        Some(actual) if tokens_match(&expected.token, &actual) => {
            debug!(%method, %path, "CSRF token accepted");
            Ok(req)
        }
        Some(_) => {
            warn!(%method, %path, "CSRF token mismatch");
            Err(AppError::InvalidCsrfToken)
        }
        None => {
            warn!(%method, %path, "CSRF token not supplied");
            Err(AppError::InvalidCsrfToken)
        }
    }
}

/// Find the token the client echoed back: header first, then the form field
/// of an urlencoded body. The body is restored for the handler.
async fn resolve_actual_token(
    repository: &CookieCsrfTokenRepository,
    req: Request,
) -> AppResult<(Option<String>, Request)> {
    if let Some(value) = req.headers().get(repository.header_name()) {
        let value = value
            .to_str()
            .map_err(|_| AppError::BadRequest("Malformed CSRF header".to_string()))?;
        return Ok((Some(value.to_string()), req));
    }

    if !is_form_urlencoded(req.headers()) {
        return Ok((None, req));
    }

    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable form body: {}", e)))?;

    let actual = url::form_urlencoded::parse(&bytes)
        .find(|(name, _)| name == repository.parameter_name())
        .map(|(_, value)| value.into_owned());

    Ok((actual, Request::from_parts(parts, Body::from(bytes))))
}

fn is_form_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

/// Constant-time comparison
fn tokens_match(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (expected.as_bytes(), actual.as_bytes());
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_only_false_repository() {
        let repository = CookieCsrfTokenRepository::with_http_only_false();
        assert!(!repository.is_cookie_http_only());
        assert_eq!(repository.cookie_name(), "XSRF-TOKEN");
        assert_eq!(repository.header_name(), "X-XSRF-TOKEN");
        assert_eq!(repository.parameter_name(), "_csrf");
        assert!(CookieCsrfTokenRepository::default().is_cookie_http_only());
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let repository = CookieCsrfTokenRepository::with_http_only_false();
        let a = repository.generate_token();
        let b = repository.generate_token();
        assert_ne!(a.token, b.token);
        assert_eq!(a.token.len(), 36);
    }

    #[test]
    fn test_save_token_omits_http_only() {
        let repository = CookieCsrfTokenRepository::with_http_only_false();
        let token = repository.generate_token();
        let mut headers = HeaderMap::new();
        repository.save_token(&token, &mut headers).unwrap();

        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert_eq!(cookie, format!("XSRF-TOKEN={}; Path=/", token.token));
    }

    #[test]
    fn test_save_token_default_is_http_only() {
        let repository = CookieCsrfTokenRepository::default();
        let token = repository.generate_token();
        let mut headers = HeaderMap::new();
        repository.save_token(&token, &mut headers).unwrap();

        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.ends_with("; HttpOnly"));
    }

    #[test]
    fn test_load_token_from_cookie_header() {
        let repository = CookieCsrfTokenRepository::with_http_only_false();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "JSESSIONID=abc; XSRF-TOKEN=token-123; lang=en".parse().unwrap(),
        );

        let token = repository.load_token(&headers).unwrap();
        assert_eq!(token.token, "token-123");
        assert_eq!(token.header_name, "X-XSRF-TOKEN");
    }

    #[test]
    fn test_load_token_ignores_empty_cookie() {
        let repository = CookieCsrfTokenRepository::with_http_only_false();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "XSRF-TOKEN=".parse().unwrap());
        assert!(repository.load_token(&headers).is_none());
        assert!(repository.load_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_requires_protection() {
        let csrf = CsrfProtection::new(CookieCsrfTokenRepository::with_http_only_false())
            .ignoring("/actuator/**")
            .ignoring("/rocketmq-dashboard/csrf-token");

        assert!(csrf.requires_protection(&Method::POST, "/topic/createOrUpdate.do"));
        assert!(csrf.requires_protection(&Method::DELETE, "/consumer/delete.do"));
        assert!(!csrf.requires_protection(&Method::GET, "/topic/list.query"));
        assert!(!csrf.requires_protection(&Method::OPTIONS, "/topic/list.query"));
        assert!(!csrf.requires_protection(&Method::POST, "/actuator/refresh"));
        assert!(!csrf.requires_protection(&Method::POST, "/rocketmq-dashboard/csrf-token"));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
        assert!(!tokens_match("abc", ""));
    }

    #[test]
    fn test_is_form_urlencoded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert!(is_form_urlencoded(&headers));

        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_form_urlencoded(&headers));
    }
}
