//! Shared types for the mail admin API.
//!
//! Configuration loading and the common error type used by the
//! authentication subsystem and the resource-forwarding layer.

pub mod config;
pub mod error;

pub use config::{AuthSettings, Config};
pub use error::{Error, Result};
