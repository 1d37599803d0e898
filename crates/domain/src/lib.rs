//! Shared domain types for SessionWarden: the workspace-wide error type and
//! the TOML configuration model.

pub mod config;
pub mod error;
