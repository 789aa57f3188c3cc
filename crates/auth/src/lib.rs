//! Authentication and Security
//!
//! Credential validation, session management, permission evaluation,
//! rate limiting, and audit logging for the mail admin API. The
//! request-handling layer calls [`AuthManager`] for every inbound
//! operation; everything else in this crate sits behind it.

pub mod audit;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod permission;
pub mod rate_limit;
pub mod security;
pub mod session;

pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use credentials::{Credential, CredentialStore, IpPattern, ValidatedCredential};
pub use error::{AuthError, AuthResult};
pub use manager::{AuthManager, SourceContext};
pub use permission::{
    AccessLevel, ConditionOperator, OperationCategory, PermissionRule, RequestContext,
    RuleCondition, Verdict,
};
pub use rate_limit::{RateDecision, RateLimitConfig, RateLimiter};
pub use session::{Session, SessionGrant, SessionManager};
