use serde::Deserialize;

/// Credentials and challenge settings for HTTP Basic authentication
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Username of the dashboard administrator
    pub admin_username: String,

    /// bcrypt hash of the administrator password; `None` disables the account
    pub admin_password_hash: Option<String>,

    /// Realm announced in `WWW-Authenticate` challenges
    pub realm: String,
}

impl SecurityConfig {
    /// Validate security configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.admin_username.trim().is_empty() {
            return Err("ADMIN_USERNAME must not be empty".to_string());
        }

        if let Some(hash) = &self.admin_password_hash {
            if !is_bcrypt_hash(hash) {
                return Err("ADMIN_PASSWORD_HASH must be a bcrypt hash".to_string());
            }
        }

        if self.realm.contains('"') {
            return Err("SECURITY_REALM must not contain double quotes".to_string());
        }

        Ok(())
    }
}

fn is_bcrypt_hash(value: &str) -> bool {
    value.len() == 60
        && ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| value.starts_with(prefix))
}
