//! Error types shared across the mail admin API.

use thiserror::Error;

/// Shared error type for the admin API crates.
///
/// The auth subsystem produces `Config`; the `Json`, domain, and mailbox
/// variants belong to the resource-forwarding layer that consumes this
/// crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    #[error("Invalid mailbox address: {0}")]
    InvalidMailbox(String),

    #[error("Authentication error: {message}")]
    Auth { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
