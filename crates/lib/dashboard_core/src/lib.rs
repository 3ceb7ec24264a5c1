//! # dashboard_core
//!
//! Core domain logic for the dashboard server: credentials, sessions,
//! one-time tokens, roles, mail dispatch and the account flows built on them.

pub mod accounts;
pub mod auth;
pub mod ids;
pub mod mail;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
