//! Security front for a message-broker administration dashboard.
//!
//! Binds CORS settings from the environment into an ordered filter chain
//! (CORS, CSRF, HTTP Basic authentication, authorization) and serves the
//! dashboard's security endpoints behind it.

pub mod admin;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod server;
pub mod state;
