//! Session management.
//!
//! Sessions are time-bounded grants created after credential validation.
//! The table owns every record and is keyed by token hash; callers hold
//! only the opaque token. Expiry is fixed (`expires_at = last_activity_at
//! + timeout`) and extended solely by explicit refresh — validation never
//! extends a session as a side effect. A session leaves the table by
//! expiry (lazy removal or sweep) or by revocation, both irreversible.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::credentials::ValidatedCredential;
use crate::error::{AuthError, AuthResult};
use crate::permission::AccessLevel;
use crate::security;

/// A live session record, owned exclusively by the [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    /// Copied from the credential at creation, immutable afterwards.
    pub access_level: AccessLevel,
    /// Fingerprint of the credential that authenticated this session.
    pub credential: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// What the caller receives: the raw token (shown once), level, and expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    pub access_level: AccessLevel,
    pub expires_at: DateTime<Utc>,
}

/// Concurrent session table with a bounded capacity.
pub struct SessionManager {
    /// Sessions indexed by token hash; the raw token is never a key.
    sessions: DashMap<String, Session>,
    /// Serializes creates so capacity check, eviction, and insert are one
    /// step. Lookups, refreshes, and revocations stay lock-free.
    create_lock: Mutex<()>,
    timeout: Duration,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            create_lock: Mutex::new(()),
            timeout,
            max_sessions,
        }
    }

    /// Create a session for a validated credential.
    pub fn create(&self, credential: &ValidatedCredential) -> AuthResult<SessionGrant> {
        self.create_at(credential, Utc::now())
    }

    /// Deterministic variant of [`create`](Self::create).
    ///
    /// At capacity the session with the oldest `last_activity_at` is
    /// evicted first, so one stuck session cannot block logins forever.
    /// `CapacityExceeded` is only reachable when eviction cannot free
    /// space (a zero-capacity table).
    pub fn create_at(
        &self,
        credential: &ValidatedCredential,
        now: DateTime<Utc>,
    ) -> AuthResult<SessionGrant> {
        if self.max_sessions == 0 {
            return Err(AuthError::CapacityExceeded);
        }
        // Without this guard, concurrent creates could all pass the
        // capacity check before any insert lands and push the table over
        // the cap. The guard carries no data, so a poisoned lock is safe
        // to re-enter.
        let _create = self
            .create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while self.sessions.len() >= self.max_sessions {
            if !self.evict_oldest() {
                return Err(AuthError::CapacityExceeded);
            }
        }

        let token = security::generate_secure_token(security::TOKEN_BYTES);
        let session = Session {
            id: Uuid::new_v4(),
            access_level: credential.access_level,
            credential: credential.fingerprint.clone(),
            created_at: now,
            last_activity_at: now,
            expires_at: now + self.timeout,
        };

        debug!(
            session_id = %session.id,
            identity = %security::redact(&credential.fingerprint),
            level = ?session.access_level,
            expires_at = %session.expires_at,
            "Session created"
        );

        let grant = SessionGrant {
            token: token.clone(),
            access_level: session.access_level,
            expires_at: session.expires_at,
        };
        self.sessions.insert(security::fingerprint(&token), session);
        Ok(grant)
    }

    /// Remove the least-recently-active session. Returns false when the
    /// table is empty.
    fn evict_oldest(&self) -> bool {
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.last_activity_at)
            .map(|entry| (entry.key().clone(), entry.id));

        match oldest {
            Some((key, id)) => {
                if self.sessions.remove(&key).is_some() {
                    info!(session_id = %id, "Evicted least-recently-active session");
                }
                // A concurrent removal also freed a slot; either way the
                // capacity loop re-checks.
                true
            }
            None => false,
        }
    }

    /// Look up a session by token.
    pub fn validate(&self, token: &str) -> AuthResult<Session> {
        self.validate_at(token, Utc::now())
    }

    /// Deterministic variant of [`validate`](Self::validate). An expired
    /// record is removed on sight (lazy expiry); expiry is never extended
    /// here.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Session> {
        let key = security::fingerprint(token);
        match self.sessions.get(&key) {
            Some(entry) if !entry.is_expired_at(now) => Ok(entry.clone()),
            Some(entry) => {
                let id = entry.id;
                drop(entry);
                self.sessions.remove_if(&key, |_, s| s.is_expired_at(now));
                debug!(session_id = %id, "Session expired, removed lazily");
                Err(AuthError::SessionInvalid)
            }
            None => Err(AuthError::SessionInvalid),
        }
    }

    /// Extend a live session by the configured timeout.
    pub fn refresh(&self, token: &str) -> AuthResult<SessionGrant> {
        self.refresh_at(token, Utc::now())
    }

    /// Deterministic variant of [`refresh`](Self::refresh). An expired
    /// session cannot be resurrected: the record is removed and the call
    /// fails.
    pub fn refresh_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<SessionGrant> {
        let key = security::fingerprint(token);
        match self.sessions.get_mut(&key) {
            Some(mut entry) if !entry.is_expired_at(now) => {
                entry.last_activity_at = now;
                entry.expires_at = now + self.timeout;
                debug!(session_id = %entry.id, expires_at = %entry.expires_at, "Session refreshed");
                Ok(SessionGrant {
                    token: token.to_string(),
                    access_level: entry.access_level,
                    expires_at: entry.expires_at,
                })
            }
            Some(entry) => {
                drop(entry);
                self.sessions.remove_if(&key, |_, s| s.is_expired_at(now));
                Err(AuthError::SessionInvalid)
            }
            None => Err(AuthError::SessionInvalid),
        }
    }

    /// Remove a session. Idempotent: revoking an unknown or already-revoked
    /// token returns false without error.
    pub fn revoke(&self, token: &str) -> bool {
        match self.sessions.remove(&security::fingerprint(token)) {
            Some((_, session)) => {
                info!(session_id = %session.id, "Session revoked");
                true
            }
            None => false,
        }
    }

    /// Remove all expired sessions. Runs from the background sweeper so an
    /// idle system still reclaims memory.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// Deterministic variant of [`sweep_expired`](Self::sweep_expired).
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "Swept expired sessions");
        }
        removed
    }

    /// Revoke every session created from the given credential. Used as the
    /// revocation sweep after a credential rotation.
    pub fn revoke_for_credential(&self, fingerprint: &str) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.credential != fingerprint);
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!(
                identity = %security::redact(fingerprint),
                removed,
                "Revoked sessions for rotated credential"
            );
        }
        removed
    }

    /// Number of live session records.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
