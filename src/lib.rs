//! civicwatch - a community incident-reporting service
//!
//! Accounts with verified emails, signed session tokens, federated
//! sign-in, and the report store behind a guarded HTTP surface.

pub mod auth;
pub mod config;
pub mod http_server;
pub mod reports;
