use crate::config::{Config, CorsSettings};
use crate::error::AppResult;
use crate::security::authz::{authorization_filter, Access, AuthorizationRules};
use crate::security::basic::{basic_authentication_filter, HttpBasic, UserStore, ADMIN_ROLE};
use crate::security::cors::{cors_filter, CorsFilter, CorsPolicy, CorsPolicySource};
use crate::security::csrf::{csrf_filter, CookieCsrfTokenRepository, CsrfProtection};
use axum::{middleware, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};

/// Operational metrics endpoints, restricted to administrators
pub const METRICS_PATH_PATTERN: &str = "/actuator/**";

/// Endpoint the front end calls to obtain a CSRF token
pub const CSRF_TOKEN_PATH: &str = "/rocketmq-dashboard/csrf-token";

pub const CORS_PATH_PATTERN: &str = "/**";

pub const DEFAULT_REALM: &str = "Realm";

/// Builds the [`SecurityFilterChain`] once at startup
#[derive(Debug, Clone)]
pub struct SecurityFilterChainBuilder {
    cors: CorsSettings,
    users: UserStore,
    realm: String,
}

impl SecurityFilterChainBuilder {
    pub fn new(cors: CorsSettings) -> Self {
        Self {
            cors,
            users: UserStore::new(),
            realm: DEFAULT_REALM.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cors.clone())
            .users(UserStore::from_config(&config.security))
            .realm(config.security.realm.clone())
    }

    pub fn users(mut self, users: UserStore) -> Self {
        self.users = users;
        self
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// Merge the CORS settings with the defaults and register the result for
    /// every path
    pub fn build_cors_policy_source(&self) -> AppResult<CorsPolicySource> {
        let policy = CorsPolicy::from_settings(&self.cors);
        policy.validate()?;

        let mut source = CorsPolicySource::new();
        source.register(CORS_PATH_PATTERN, policy);
        Ok(source)
    }

    pub fn build_csrf_token_repository(&self) -> CookieCsrfTokenRepository {
        CookieCsrfTokenRepository::with_http_only_false()
    }

    pub fn build_filter_chain(&self) -> AppResult<SecurityFilterChain> {
        let cors = CorsFilter::new(self.build_cors_policy_source()?)?;

        let csrf = CsrfProtection::new(self.build_csrf_token_repository())
            .ignoring(METRICS_PATH_PATTERN)
            .ignoring(CSRF_TOKEN_PATH);

        let authorization = AuthorizationRules::new()
            .request_matchers(METRICS_PATH_PATTERN, Access::HasRole(ADMIN_ROLE.to_string()))
            .any_request(Access::PermitAll)
            .with_basic_challenge(self.realm.clone());

        if self.users.is_empty() {
            warn!("No users configured; {} is unreachable", METRICS_PATH_PATTERN);
        }
        let http_basic = HttpBasic::new(self.users.clone(), self.realm.clone());

        info!(
            cors_patterns = cors.source().patterns().count(),
            csrf_exempt = ?[METRICS_PATH_PATTERN, CSRF_TOKEN_PATH],
            realm = %self.realm,
            "Security filter chain built"
        );

        Ok(SecurityFilterChain {
            cors: Arc::new(cors),
            csrf: Arc::new(csrf),
            http_basic: Arc::new(http_basic),
            authorization: Arc::new(authorization),
        })
    }
}

/// Immutable request-filtering pipeline: CORS, CSRF, HTTP Basic
/// authentication, then authorization
#[derive(Clone)]
pub struct SecurityFilterChain {
    cors: Arc<CorsFilter>,
    csrf: Arc<CsrfProtection>,
    http_basic: Arc<HttpBasic>,
    authorization: Arc<AuthorizationRules>,
}

impl SecurityFilterChain {
    pub fn cors_policy_source(&self) -> &CorsPolicySource {
        self.cors.source()
    }

    pub fn csrf(&self) -> &CsrfProtection {
        &self.csrf
    }

    pub fn http_basic(&self) -> &HttpBasic {
        &self.http_basic
    }

    pub fn authorization(&self) -> &AuthorizationRules {
        &self.authorization
    }

    /// Wrap every route (and the fallback) of `router` in the chain.
    /// The first layer added is the first to see a request.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&self.cors),
                    cors_filter,
                ))
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&self.csrf),
                    csrf_filter,
                ))
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&self.http_basic),
                    basic_authentication_filter,
                ))
                .layer(middleware::from_fn_with_state(
                    Arc::clone(&self.authorization),
                    authorization_filter,
                )),
        )
    }
}
