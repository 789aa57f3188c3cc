//! Mailadmin: mail-server administration API core
//!
//! This is the root crate that provides benchmark access to the internal
//! modules. For actual functionality, use the individual crates directly:
//!
//! - `mail-core`: shared configuration and error types
//! - `auth`: authentication, sessions, permissions, audit logging

// Re-export for benchmarks
pub use auth;
pub use mail_core as core;
