use crate::error::AppError;
use crate::security::basic::Principal;
use crate::security::pattern::PathPattern;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// What a rule demands of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    PermitAll,
    HasRole(String),
    DenyAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    /// No principal, but one could be granted access after authenticating
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone)]
pub struct AuthorizationRule {
    pub pattern: PathPattern,
    pub access: Access,
}

/// Ordered authorization rules; the first rule matching the path decides.
/// A path no rule matches is denied.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRules {
    rules: Vec<AuthorizationRule>,
    challenge_realm: Option<String>,
}

impl AuthorizationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_matchers(mut self, pattern: &str, access: Access) -> Self {
        self.rules.push(AuthorizationRule {
            pattern: PathPattern::new(pattern),
            access,
        });
        self
    }

    pub fn any_request(self, access: Access) -> Self {
        self.request_matchers("/**", access)
    }

    /// Answer unauthenticated denials with a Basic challenge for `realm`
    /// instead of a plain 403
    pub fn with_basic_challenge(mut self, realm: impl Into<String>) -> Self {
        self.challenge_realm = Some(realm.into());
        self
    }

    pub fn rules(&self) -> &[AuthorizationRule] {
        &self.rules
    }

    pub fn access_for(&self, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map_or(&Access::DenyAll, |rule| &rule.access)
    }

    pub fn decide(&self, path: &str, principal: Option<&Principal>) -> Decision {
        match (self.access_for(path), principal) {
            (Access::PermitAll, _) => Decision::Granted,
            (Access::HasRole(role), Some(principal)) if principal.has_role(role) => {
                Decision::Granted
            }
            (Access::HasRole(_), Some(_)) => Decision::Forbidden,
            (Access::HasRole(_), None) => Decision::Unauthenticated,
            (Access::DenyAll, _) => Decision::Forbidden,
        }
    }

    fn rejection(&self, decision: Decision) -> AppError {
        match (decision, &self.challenge_realm) {
            (Decision::Unauthenticated, Some(realm)) => AppError::Unauthorized {
                realm: realm.clone(),
            },
            _ => AppError::Forbidden("Insufficient privileges".to_string()),
        }
    }
}

/// Enforce [`AuthorizationRules`] against the principal left by the
/// authentication stage
pub async fn authorization_filter(
    State(rules): State<Arc<AuthorizationRules>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();
    let decision = rules.decide(path, req.extensions().get::<Principal>());

    if decision != Decision::Granted {
        debug!(path, ?decision, "Request denied by authorization rules");
        return Err(rules.rejection(decision));
    }

    Ok(next.run(req).await)
}
