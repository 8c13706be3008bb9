//! Effective CORS policy and its registration by path pattern.
//!
//! The policy enforced for a request is the set union of the configured
//! [`CorsSettings`] lists with the built-in defaults below. Ordering of the
//! configured lists carries no meaning.
//!
//! Cross-origin requests from origins the policy does not allow, and
//! preflights asking for a method or header outside it, are rejected with
//! 403 before any other stage runs.

use crate::config::CorsSettings;
use crate::error::{AppError, AppResult};
use crate::security::pattern::PathPattern;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};
use tower_http::cors::{AllowCredentials, AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, MaxAge};
use tracing::warn;

pub const DEFAULT_ALLOWED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "OPTIONS"];

pub const DEFAULT_ALLOWED_HEADERS: [&str; 6] = [
    "content-type",
    "Authorization",
    "X-Requested-With",
    "Origin",
    "Accept",
    "X-XSRF-TOKEN",
];

/// Local development origin of the dashboard front end
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 1] = ["http://localhost:3002"];

const WILDCARD: &str = "*";

/// CORS policy derived from [`CorsSettings`] merged with the defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorsPolicy {
    pub allowed_origins: BTreeSet<String>,
    pub allowed_methods: BTreeSet<String>,
    pub allowed_headers: BTreeSet<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl CorsPolicy {
    /// Merge configured settings with the built-in defaults.
    ///
    /// Configured origins are unioned with [`DEFAULT_ALLOWED_ORIGINS`]; the
    /// settings themselves are left untouched.
    pub fn from_settings(settings: &CorsSettings) -> Self {
        Self {
            allowed_origins: union(&settings.allowed_origins, &DEFAULT_ALLOWED_ORIGINS)
                .into_iter()
                .map(|origin| trim_trailing_slash(&origin).to_string())
                .collect(),
            allowed_methods: union(&settings.allowed_methods, &DEFAULT_ALLOWED_METHODS),
            allowed_headers: union(&settings.allowed_headers, &DEFAULT_ALLOWED_HEADERS),
            allow_credentials: settings.allow_credentials,
            max_age_seconds: settings.max_age_seconds,
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.contains(WILDCARD)
    }

    /// Origins compare case-insensitively, ignoring a trailing `/`
    pub fn allows_origin(&self, origin: &str) -> bool {
        let origin = trim_trailing_slash(origin);
        self.allows_any_origin()
            || self
                .allowed_origins
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(origin))
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.allowed_methods.contains(WILDCARD) || self.allowed_methods.contains(method)
    }

    /// Check every name of an `Access-Control-Request-Headers` value
    pub fn allows_request_headers(&self, requested: &str) -> bool {
        if self.allowed_headers.contains(WILDCARD) {
            return true;
        }
        requested
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .all(|name| {
                self.allowed_headers
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(name))
            })
    }

    /// Reject combinations browsers refuse to honour
    pub fn validate(&self) -> AppResult<()> {
        if self.allow_credentials && self.allows_any_origin() {
            return Err(AppError::Configuration(
                "CORS_ALLOWED_ORIGINS cannot contain \"*\" when CORS_ALLOW_CREDENTIALS is true"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn trim_trailing_slash(origin: &str) -> &str {
    origin.strip_suffix('/').unwrap_or(origin)
}

fn union(configured: &[String], defaults: &[&str]) -> BTreeSet<String> {
    configured
        .iter()
        .cloned()
        .chain(defaults.iter().map(|value| value.to_string()))
        .collect()
}

/// CORS policies keyed by request path pattern. The first matching
/// registration applies.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicySource {
    registrations: Vec<(PathPattern, CorsPolicy)>,
}

impl CorsPolicySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pattern: &str, policy: CorsPolicy) {
        self.registrations.push((PathPattern::new(pattern), policy));
    }

    pub fn policy_for(&self, path: &str) -> Option<&CorsPolicy> {
        self.registrations
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, policy)| policy)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &PathPattern> {
        self.registrations.iter().map(|(pattern, _)| pattern)
    }

    fn policies(&self) -> impl Iterator<Item = &CorsPolicy> {
        self.registrations.iter().map(|(_, policy)| policy)
    }

    /// Build the `tower-http` layer enforcing this source.
    ///
    /// Origin, credentials and max-age are resolved per request path.
    /// Methods and headers advertise every registered policy's values.
    pub fn to_layer(&self) -> AppResult<CorsLayer> {
        for policy in self.policies() {
            policy.validate()?;
        }

        let allow_methods = self.allow_methods()?;
        let allow_headers = self.allow_headers()?;
        let source = Arc::new(self.clone());

        let origin_source = Arc::clone(&source);
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            origin_source
                .policy_for(parts.uri.path())
                .is_some_and(|policy| policy.allows_origin(origin))
        });

        let credentials_source = Arc::clone(&source);
        let allow_credentials =
            AllowCredentials::predicate(move |_origin: &HeaderValue, parts: &Parts| {
                credentials_source
                    .policy_for(parts.uri.path())
                    .is_some_and(|policy| policy.allow_credentials)
            });

        let max_age = MaxAge::dynamic(move |_origin: &HeaderValue, parts: &Parts| {
            let seconds = source
                .policy_for(parts.uri.path())
                .map_or(0, |policy| policy.max_age_seconds);
            Duration::from_secs(seconds)
        });

        Ok(CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_credentials(allow_credentials)
            .allow_methods(allow_methods)
            .allow_headers(allow_headers)
            .max_age(max_age))
    }

    fn allow_methods(&self) -> AppResult<AllowMethods> {
        let mut methods: Vec<Method> = Vec::new();
        for name in self.policies().flat_map(|policy| &policy.allowed_methods) {
            if name == WILDCARD {
                return Ok(AllowMethods::mirror_request());
            }
            let method = Method::from_bytes(name.as_bytes())
                .map_err(|_| AppError::Configuration(format!("Invalid CORS method: {}", name)))?;
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        Ok(AllowMethods::list(methods))
    }

    fn allow_headers(&self) -> AppResult<AllowHeaders> {
        let mut headers: Vec<HeaderName> = Vec::new();
        for name in self.policies().flat_map(|policy| &policy.allowed_headers) {
            if name == WILDCARD {
                return Ok(AllowHeaders::mirror_request());
            }
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| AppError::Configuration(format!("Invalid CORS header: {}", name)))?;
            if !headers.contains(&header) {
                headers.push(header);
            }
        }
        Ok(AllowHeaders::list(headers))
    }
}

/// CORS stage of the security filter chain: origin and preflight checks in
/// front of the `tower-http` layer built from the same source
#[derive(Debug, Clone)]
pub struct CorsFilter {
    source: CorsPolicySource,
    layer: CorsLayer,
}

impl CorsFilter {
    pub fn new(source: CorsPolicySource) -> AppResult<Self> {
        let layer = source.to_layer()?;
        Ok(Self { source, layer })
    }

    pub fn source(&self) -> &CorsPolicySource {
        &self.source
    }

    /// Reject a cross-origin request the policy registered for `path` does not
    /// allow. Paths without a registration are not checked.
    pub fn check(
        &self,
        path: &str,
        origin: &str,
        headers: &HeaderMap,
        preflight: bool,
    ) -> AppResult<()> {
        let Some(policy) = self.source.policy_for(path) else {
            return Ok(());
        };

        if !policy.allows_origin(origin) {
            warn!(origin, path, "Cross-origin request from disallowed origin");
            return Err(invalid_cors_request());
        }

        if preflight {
            let method =
                header_str(headers, &header::ACCESS_CONTROL_REQUEST_METHOD).unwrap_or("");
            if !policy.allows_method(method) {
                warn!(origin, path, method, "Preflight for disallowed method");
                return Err(invalid_cors_request());
            }

            let requested =
                header_str(headers, &header::ACCESS_CONTROL_REQUEST_HEADERS).unwrap_or("");
            if !policy.allows_request_headers(requested) {
                warn!(origin, path, requested, "Preflight for disallowed headers");
                return Err(invalid_cors_request());
            }
        }

        Ok(())
    }
}

fn invalid_cors_request() -> AppError {
    AppError::Forbidden("Invalid CORS request".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
        && req.headers().contains_key(header::ORIGIN)
        && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

/// `true` when `origin` names the host the request was sent to
fn is_same_origin(origin: &str, req: &Request) -> bool {
    let host = header_str(req.headers(), &header::HOST)
        .or_else(|| req.uri().authority().map(|authority| authority.as_str()));
    let Some(host) = host else {
        return false;
    };

    origin
        .split_once("://")
        .is_some_and(|(_, authority)| trim_trailing_slash(authority).eq_ignore_ascii_case(host))
}

/// Enforce the CORS policy, then let `tower-http` write the response headers.
///
/// A plain `OPTIONS` request (no `Origin` or no
/// `Access-Control-Request-Method`) is not a preflight and goes on to the
/// remaining stages untouched.
pub async fn cors_filter(
    State(cors): State<Arc<CorsFilter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let preflight = is_preflight(&req);

    if let Some(origin) = header_str(req.headers(), &header::ORIGIN) {
        if !is_same_origin(origin, &req) {
            cors.check(req.uri().path(), origin, req.headers(), preflight)?;
        }
    }

    if req.method() == Method::OPTIONS && !preflight {
        return Ok(next.run(req).await);
    }

    match cors.layer.layer(next).oneshot(req).await {
        Ok(response) => Ok(response),
        Err(never) => match never {},
    }
}
