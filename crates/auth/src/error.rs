//! Typed denial taxonomy for authentication and authorization.
//!
//! Every failure mode is a recoverable, typed denial. No code path may
//! default to "allow" on an internal fault: anything unexpected maps to a
//! denial variant before it reaches the caller.

use chrono::Duration;
use thiserror::Error;

/// Authentication and authorization errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The presented secret is unknown or malformed.
    #[error("invalid credential")]
    InvalidCredential,

    /// The credential is valid but the source address is not in its allow-list.
    #[error("source address not allowed")]
    IpNotAllowed,

    /// Request quota exceeded for this identifier.
    #[error("rate limit exceeded, retry after {retry_after}")]
    RateLimited { retry_after: Duration },

    /// Session token unknown, expired, or revoked.
    #[error("session invalid or expired")]
    SessionInvalid,

    /// Session is valid but the operation is not authorized.
    #[error("permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// Session table is at capacity and eviction could not free space.
    #[error("session capacity exceeded")]
    CapacityExceeded,
}

impl AuthError {
    /// Denials that a caller can meaningfully retry after waiting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::RateLimited { .. })
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
