//! Administrative command handlers.
//!
//! CLI helpers for operators: inspecting the CORS policy the server would
//! enforce, and producing a password hash for `ADMIN_PASSWORD_HASH`.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::security::{SecurityFilterChainBuilder, CORS_PATH_PATTERN};
use clap::Subcommand;
use tracing::info;

/// Administrative commands available via CLI.
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Print the effective CORS policy as JSON
    ShowPolicy,

    /// Print a bcrypt hash suitable for ADMIN_PASSWORD_HASH
    HashPassword {
        /// Password to hash
        password: String,

        /// bcrypt cost factor
        #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
    },
}

/// Run an administrative command with the given configuration.
pub fn run(config: Config, admin_command: AdminCommands) -> AppResult<()> {
    match admin_command {
        AdminCommands::ShowPolicy => show_policy(&config),
        AdminCommands::HashPassword { password, cost } => hash_password(&password, cost),
    }
}

/// Print the CORS policy registered for all paths.
fn show_policy(config: &Config) -> AppResult<()> {
    let source = SecurityFilterChainBuilder::from_config(config).build_cors_policy_source()?;
    let policy = source.policy_for("/").ok_or_else(|| {
        AppError::Internal(format!("No CORS policy registered for {}", CORS_PATH_PATTERN))
    })?;

    println!("{}", serde_json::to_string_pretty(policy)?);
    Ok(())
}

fn hash_password(password: &str, cost: u32) -> AppResult<()> {
    if password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    info!("Hashing password with cost {}", cost);
    println!("{}", bcrypt::hash(password, cost)?);
    Ok(())
}
