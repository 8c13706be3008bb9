//! Request security for the dashboard: CORS, CSRF, HTTP Basic
//! authentication and path-based authorization, composed into a single
//! [`SecurityFilterChain`].

pub mod authz;
pub mod basic;
mod chain;
pub mod cors;
pub mod csrf;
pub mod pattern;

pub use chain::{
    SecurityFilterChain, SecurityFilterChainBuilder, CORS_PATH_PATTERN, CSRF_TOKEN_PATH,
    DEFAULT_REALM, METRICS_PATH_PATTERN,
};
