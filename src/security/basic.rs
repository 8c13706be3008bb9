use crate::config::SecurityConfig;
use crate::error::{AppError, AppResult};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const ADMIN_ROLE: &str = "ADMIN";

/// Authenticated caller, inserted into request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A user able to authenticate with HTTP Basic
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    pub password_hash: String,
    pub roles: Vec<String>,
}

/// In-memory user store with bcrypt password hashes
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    users: HashMap<String, UserAccount>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from configuration: the administrator, if a password
    /// hash is configured
    pub fn from_config(config: &SecurityConfig) -> Self {
        let mut store = Self::new();
        if let Some(hash) = &config.admin_password_hash {
            store = store.with_user(UserAccount {
                username: config.admin_username.clone(),
                password_hash: hash.clone(),
                roles: vec![ADMIN_ROLE.to_string()],
            });
        }
        store
    }

    pub fn with_user(mut self, account: UserAccount) -> Self {
        self.users.insert(account.username.clone(), account);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Verify a username/password pair. Blocking: bcrypt is deliberately slow.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Principal> {
        let account = self.users.get(username)?;
        match bcrypt::verify(password, &account.password_hash) {
            Ok(true) => Some(Principal {
                username: account.username.clone(),
                roles: account.roles.clone(),
            }),
            Ok(false) => None,
            Err(e) => {
                warn!(username, error = %e, "Stored password hash is unusable");
                None
            }
        }
    }
}

/// HTTP Basic authentication stage
#[derive(Debug, Clone)]
pub struct HttpBasic {
    users: Arc<UserStore>,
    realm: String,
}

impl HttpBasic {
    pub fn new(users: UserStore, realm: impl Into<String>) -> Self {
        Self {
            users: Arc::new(users),
            realm: realm.into(),
        }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn challenge(&self) -> AppError {
        AppError::Unauthorized {
            realm: self.realm.clone(),
        }
    }

    async fn authenticate(&self, username: String, password: String) -> AppResult<Option<Principal>> {
        let users = Arc::clone(&self.users);
        tokio::task::spawn_blocking(move || users.authenticate(&username, &password))
            .await
            .map_err(|e| AppError::Internal(format!("Authentication task failed: {}", e)))
    }
}

/// Decode `Basic <base64(username:password)>`. Returns `None` for other
/// schemes and for malformed credentials alike.
pub fn decode_basic_credentials(value: &HeaderValue) -> Option<(String, String)> {
    let encoded = basic_payload(value)?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn basic_payload(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let (scheme, payload) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("basic")
        .then(|| payload.trim())
}

fn is_basic_scheme(value: &HeaderValue) -> bool {
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().split(' ').next())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

/// Authenticate requests carrying Basic credentials.
///
/// Requests without an `Authorization: Basic` header pass through
/// anonymously; presented credentials that fail verification are answered
/// with a challenge straight away.
pub async fn basic_authentication_filter(
    State(basic): State<Arc<HttpBasic>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = match req.headers().get(AUTHORIZATION) {
        Some(value) if is_basic_scheme(value) => Some(decode_basic_credentials(value)),
        _ => None,
    };

    let Some(credentials) = presented else {
        return Ok(next.run(req).await);
    };

    let Some((username, password)) = credentials else {
        warn!(path = %req.uri().path(), "Malformed Basic credentials");
        return Err(basic.challenge());
    };

    match basic.authenticate(username.clone(), password).await? {
        Some(principal) => {
            debug!(username = %principal.username, "Basic authentication succeeded");
            req.extensions_mut().insert(principal);
            Ok(next.run(req).await)
        }
        None => {
            warn!(username = %username, path = %req.uri().path(), "Basic authentication failed");
            Err(basic.challenge())
        }
    }
}
