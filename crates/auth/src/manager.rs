//! Authentication manager.
//!
//! Orchestrates the credential store, rate limiter, session manager, and
//! permission evaluator, and emits an audit event for every decision
//! branch. Fail-closed throughout: nothing here defaults to "allow".

use chrono::{DateTime, Duration, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use mail_core::AuthSettings;

use crate::audit::{AuditEvent, AuditEventType, AuditLogger, AuditSink};
use crate::credentials::CredentialStore;
use crate::error::{AuthError, AuthResult};
use crate::permission::{self, PermissionRule, RequestContext, Verdict};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::security;
use crate::session::{Session, SessionGrant, SessionManager};

/// Facts about where a request came from. All fields optional: an
/// unattributable source simply skips the checks that need it.
#[derive(Debug, Clone, Default)]
pub struct SourceContext {
    pub addr: Option<IpAddr>,
}

impl SourceContext {
    pub fn unattributed() -> Self {
        Self::default()
    }

    pub fn from_addr(addr: IpAddr) -> Self {
        Self { addr: Some(addr) }
    }
}

/// Entry point for the request-handling layer: every inbound call goes
/// through `authenticate` once and `authorize` per operation.
pub struct AuthManager {
    credentials: CredentialStore,
    sessions: SessionManager,
    limiter: RateLimiter,
    rules: Vec<PermissionRule>,
    audit: AuditLogger,
}

impl AuthManager {
    /// Assemble the subsystem from configuration. Must run inside a tokio
    /// runtime (the audit logger spawns its delivery task).
    pub fn from_settings(settings: &AuthSettings, sink: Arc<dyn AuditSink>) -> anyhow::Result<Self> {
        Ok(Self {
            credentials: CredentialStore::from_settings(settings)?,
            sessions: SessionManager::new(
                Duration::seconds(settings.session_timeout_secs as i64),
                settings.max_sessions,
            ),
            limiter: RateLimiter::new(RateLimitConfig {
                max_requests: settings.rate_limit_max_requests,
                window: Duration::seconds(settings.rate_limit_window_secs as i64),
            }),
            rules: Vec::new(),
            audit: AuditLogger::new(sink),
        })
    }

    /// Assemble from already-built components (tests, custom wiring).
    pub fn new(
        credentials: CredentialStore,
        sessions: SessionManager,
        limiter: RateLimiter,
        audit: AuditLogger,
    ) -> Self {
        Self {
            credentials,
            sessions,
            limiter,
            rules: Vec::new(),
            audit,
        }
    }

    /// Install explicit permission rules (deny-by-default when non-empty).
    pub fn with_rules(mut self, rules: Vec<PermissionRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Validate a credential and open a session.
    pub async fn authenticate(
        &self,
        secret: &str,
        source: &SourceContext,
    ) -> AuthResult<SessionGrant> {
        self.authenticate_at(secret, source, Utc::now()).await
    }

    /// Deterministic variant of [`authenticate`](Self::authenticate).
    pub async fn authenticate_at(
        &self,
        secret: &str,
        source: &SourceContext,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionGrant> {
        let identity = security::redact(&security::fingerprint(secret));

        // Rate limits come first: a throttled caller never reaches the
        // credential store, so throttling leaks nothing about validity.
        let mut decision = self.limiter.check_at(&format!("key:{}", identity), now);
        if decision.allowed {
            if let Some(addr) = source.addr {
                decision = self.limiter.check_at(&format!("ip:{}", addr), now);
            }
        }
        if !decision.allowed {
            self.audit.log(
                AuditEvent::builder(AuditEventType::RateLimited)
                    .identity(&identity)
                    .source_ip(source.addr)
                    .detail(serde_json::json!({
                        "retry_after_secs": decision.retry_after.num_seconds(),
                    }))
                    .denied()
                    .build(),
            );
            return Err(AuthError::RateLimited {
                retry_after: decision.retry_after,
            });
        }

        let Some(validated) = self.credentials.validate(secret).await else {
            self.audit.log(
                AuditEvent::builder(AuditEventType::CredentialRejected)
                    .identity(&identity)
                    .source_ip(source.addr)
                    .denied()
                    .build(),
            );
            return Err(AuthError::InvalidCredential);
        };

        if !validated.allows_source(source.addr) {
            self.audit.log(
                AuditEvent::builder(AuditEventType::IpDenied)
                    .identity(security::redact(&validated.fingerprint))
                    .source_ip(source.addr)
                    .denied()
                    .build(),
            );
            return Err(AuthError::IpNotAllowed);
        }

        let grant = match self.sessions.create_at(&validated, now) {
            Ok(grant) => grant,
            Err(e) => {
                self.audit.log(
                    AuditEvent::builder(AuditEventType::CapacityExceeded)
                        .identity(security::redact(&validated.fingerprint))
                        .source_ip(source.addr)
                        .denied()
                        .build(),
                );
                return Err(e);
            }
        };

        self.audit.log(
            AuditEvent::builder(AuditEventType::CredentialValidated)
                .identity(security::redact(&validated.fingerprint))
                .source_ip(source.addr)
                .build(),
        );
        self.audit.log(
            AuditEvent::builder(AuditEventType::SessionCreated)
                .identity(security::redact(&validated.fingerprint))
                .source_ip(source.addr)
                .detail(serde_json::json!({
                    "access_level": grant.access_level.as_str(),
                    "expires_at": grant.expires_at.to_rfc3339(),
                }))
                .build(),
        );

        Ok(grant)
    }

    /// Decide whether the session behind `token` may perform `operation`.
    /// Returns the session as identity context on allow.
    pub fn authorize(
        &self,
        token: &str,
        operation: &str,
        context: Option<&RequestContext>,
    ) -> AuthResult<Session> {
        self.authorize_at(token, operation, context, Utc::now())
    }

    /// Deterministic variant of [`authorize`](Self::authorize).
    pub fn authorize_at(
        &self,
        token: &str,
        operation: &str,
        context: Option<&RequestContext>,
        now: DateTime<Utc>,
    ) -> AuthResult<Session> {
        let session = match self.sessions.validate_at(token, now) {
            Ok(session) => session,
            Err(e) => {
                // The table cannot tell an expired token from one that was
                // never issued or was revoked, so the event stays generic.
                self.audit.log(
                    AuditEvent::builder(AuditEventType::SessionDenied)
                        .detail(serde_json::json!({"operation": operation}))
                        .denied()
                        .build(),
                );
                return Err(e);
            }
        };

        match permission::evaluate(session.access_level, operation, context, &self.rules) {
            Verdict::Allowed => {
                debug!(
                    session_id = %session.id,
                    operation = %operation,
                    "Operation authorized"
                );
                Ok(session)
            }
            Verdict::Denied { reason } => {
                self.audit.log(
                    AuditEvent::builder(AuditEventType::PermissionDenied)
                        .identity(security::redact(&session.credential))
                        .detail(serde_json::json!({
                            "operation": operation,
                            "reason": &reason,
                        }))
                        .denied()
                        .build(),
                );
                Err(AuthError::PermissionDenied { reason })
            }
        }
    }

    /// Extend a live session. Fails on expired or unknown tokens.
    pub fn refresh(&self, token: &str) -> AuthResult<SessionGrant> {
        self.refresh_at(token, Utc::now())
    }

    /// Deterministic variant of [`refresh`](Self::refresh).
    pub fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<SessionGrant> {
        let grant = self.sessions.refresh_at(token, now)?;
        self.audit.log(
            AuditEvent::builder(AuditEventType::SessionRefreshed)
                .detail(serde_json::json!({
                    "expires_at": grant.expires_at.to_rfc3339(),
                }))
                .build(),
        );
        Ok(grant)
    }

    /// Explicit logout. Idempotent.
    pub fn revoke(&self, token: &str) -> bool {
        let revoked = self.sessions.revoke(token);
        if revoked {
            self.audit
                .log(AuditEvent::builder(AuditEventType::SessionRevoked).build());
        }
        revoked
    }

    /// Rotate a credential and revoke every session it had opened.
    pub async fn rotate_credentials(&self, old_secret: &str, new_secret: &str) -> anyhow::Result<()> {
        let old_fingerprint = self.credentials.rotate(old_secret, new_secret).await?;
        let revoked = self.sessions.revoke_for_credential(&old_fingerprint);
        self.audit.log(
            AuditEvent::builder(AuditEventType::CredentialsRotated)
                .identity(security::redact(&old_fingerprint))
                .detail(serde_json::json!({"revoked_sessions": revoked}))
                .build(),
        );
        Ok(())
    }

    /// Remove expired sessions and stale rate-limit windows once.
    pub fn sweep(&self) -> usize {
        let removed = self.sessions.sweep_expired();
        self.limiter.prune_at(Utc::now());
        if removed > 0 {
            self.audit.log(
                AuditEvent::builder(AuditEventType::SessionExpired)
                    .detail(serde_json::json!({"removed": removed}))
                    .build(),
            );
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) on a fixed interval as a background task.
    /// Reclamation happens even when no requests arrive; each pass holds
    /// only short per-shard locks.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                manager.sweep();
            }
        })
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
