//! Credential store for API keys.
//!
//! Raw secrets never live in the table: each credential is indexed by a
//! SHA-256 fingerprint and verified against an Argon2 hash. The whole set
//! is swapped atomically on rotation, so concurrent validations observe
//! either the old or the new set, never a mix.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use mail_core::AuthSettings;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::permission::AccessLevel;
use crate::security;

/// Secrets shorter than this are rejected before any comparison.
pub const MIN_SECRET_LENGTH: usize = 16;

/// One entry of a credential's IP allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpPattern {
    /// Exact address match.
    Exact(IpAddr),
    /// IPv4 network prefix, e.g. `10.0.0.0/8`.
    Cidr { network: Ipv4Addr, prefix: u8 },
}

impl IpPattern {
    /// Parse an exact address or `a.b.c.d/n` CIDR pattern.
    pub fn parse(pattern: &str) -> Option<Self> {
        match pattern.split_once('/') {
            Some((net, prefix)) => {
                let network: Ipv4Addr = net.parse().ok()?;
                let prefix: u8 = prefix.parse().ok()?;
                if prefix > 32 {
                    return None;
                }
                Some(Self::Cidr { network, prefix })
            }
            None => pattern.parse().ok().map(Self::Exact),
        }
    }

    /// Check whether an address falls under this pattern.
    pub fn matches(&self, addr: IpAddr) -> bool {
        match self {
            Self::Exact(allowed) => *allowed == addr,
            Self::Cidr { network, prefix } => match addr {
                IpAddr::V4(v4) => {
                    if *prefix == 0 {
                        return true;
                    }
                    let mask = u32::MAX << (32 - u32::from(*prefix));
                    (u32::from(v4) & mask) == (u32::from(*network) & mask)
                }
                IpAddr::V6(_) => false,
            },
        }
    }
}

/// A stored API credential. The secret itself is discarded at load time.
#[derive(Debug, Clone)]
pub struct Credential {
    /// SHA-256 hex of the secret; lookup key and redacted identity source.
    pub fingerprint: String,
    /// Argon2 PHC string used for verification.
    secret_hash: String,
    pub access_level: AccessLevel,
    /// Empty list means no source restriction.
    pub allowed_from: Vec<IpPattern>,
    pub loaded_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from a raw secret. The secret is hashed and dropped.
    pub fn new(
        secret: &str,
        access_level: AccessLevel,
        allowed_from: Vec<IpPattern>,
    ) -> Result<Self> {
        if !is_well_formed(secret) {
            return Err(anyhow!(
                "credential secret does not meet the minimum length/format policy"
            ));
        }
        Ok(Self {
            fingerprint: security::fingerprint(secret),
            secret_hash: security::hash_secret(secret)?,
            access_level,
            allowed_from,
            loaded_at: Utc::now(),
        })
    }

    /// Check a source address against the allow-list.
    pub fn allows_source(&self, addr: Option<IpAddr>) -> bool {
        source_allowed(&self.allowed_from, addr)
    }
}

/// An empty allow-list accepts any source. An absent address skips the
/// check entirely: attribution is the transport layer's responsibility.
fn source_allowed(patterns: &[IpPattern], addr: Option<IpAddr>) -> bool {
    if patterns.is_empty() {
        return true;
    }
    match addr {
        Some(a) => patterns.iter().any(|p| p.matches(a)),
        None => true,
    }
}

/// Outcome of a successful credential validation, handed to the session
/// layer. Carries no secret material.
#[derive(Debug, Clone)]
pub struct ValidatedCredential {
    pub fingerprint: String,
    pub access_level: AccessLevel,
    pub allowed_from: Vec<IpPattern>,
}

impl ValidatedCredential {
    /// Check a source address against the credential's allow-list.
    pub fn allows_source(&self, addr: Option<IpAddr>) -> bool {
        source_allowed(&self.allowed_from, addr)
    }
}

/// Minimum length/format policy, checked as one predicate so a rejection
/// does not reveal which part failed.
fn is_well_formed(secret: &str) -> bool {
    secret.len() >= MIN_SECRET_LENGTH && secret.chars().all(|c| c.is_ascii_graphic())
}

/// In-memory store of the active credential set.
pub struct CredentialStore {
    /// Credentials indexed by secret fingerprint.
    credentials: RwLock<HashMap<String, Credential>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
        }
    }

    /// Load the permitted credential set from configuration.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        let allowed_from = settings
            .allowed_ips
            .iter()
            .map(|p| {
                IpPattern::parse(p).ok_or_else(|| anyhow!("invalid IP allow-list entry: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut credentials = HashMap::new();

        let rw = Credential::new(&settings.api_key, AccessLevel::ReadWrite, allowed_from.clone())?;
        info!(identity = %security::redact(&rw.fingerprint), "Loaded read-write API credential");
        credentials.insert(rw.fingerprint.clone(), rw);

        if let Some(ro_secret) = &settings.api_key_read_only {
            let ro = Credential::new(ro_secret, AccessLevel::ReadOnly, allowed_from)?;
            info!(identity = %security::redact(&ro.fingerprint), "Loaded read-only API credential");
            credentials.insert(ro.fingerprint.clone(), ro);
        }

        Ok(Self {
            credentials: RwLock::new(credentials),
        })
    }

    /// Add a credential to the active set.
    pub async fn insert(&self, credential: Credential) {
        let mut credentials = self.credentials.write().await;
        credentials.insert(credential.fingerprint.clone(), credential);
    }

    /// Validate a presented secret.
    ///
    /// Runs the length/format policy first (fail fast, no table access),
    /// then a fingerprint lookup, a constant-time digest comparison, and
    /// finally the slow Argon2 verification.
    pub async fn validate(&self, secret: &str) -> Option<ValidatedCredential> {
        if !is_well_formed(secret) {
            debug!("Credential rejected by format policy");
            return None;
        }

        let fp = security::fingerprint(secret);
        let credentials = self.credentials.read().await;
        let credential = credentials.get(&fp)?;

        if !security::constant_time_eq(fp.as_bytes(), credential.fingerprint.as_bytes()) {
            return None;
        }
        if !security::verify_secret(secret, &credential.secret_hash) {
            warn!(identity = %security::redact(&fp), "Fingerprint matched but hash verification failed");
            return None;
        }

        debug!(
            identity = %security::redact(&credential.fingerprint),
            level = ?credential.access_level,
            "Credential validated"
        );

        Some(ValidatedCredential {
            fingerprint: credential.fingerprint.clone(),
            access_level: credential.access_level,
            allowed_from: credential.allowed_from.clone(),
        })
    }

    /// Atomically replace a credential with a new secret.
    ///
    /// Lookup, verification, and swap all happen under the write lock, so a
    /// concurrent `validate` sees the old entry or the new one, never both
    /// and never neither. Returns the fingerprint of the replaced entry.
    pub async fn rotate(&self, old_secret: &str, new_secret: &str) -> Result<String> {
        if !is_well_formed(old_secret) || !is_well_formed(new_secret) {
            return Err(anyhow!("rotation secrets do not meet the format policy"));
        }

        let old_fp = security::fingerprint(old_secret);
        let mut credentials = self.credentials.write().await;

        let old = credentials
            .get(&old_fp)
            .ok_or_else(|| anyhow!("unknown credential"))?;
        if !security::verify_secret(old_secret, &old.secret_hash) {
            return Err(anyhow!("unknown credential"));
        }

        let replacement = Credential::new(new_secret, old.access_level, old.allowed_from.clone())?;
        info!(
            old = %security::redact(&old_fp),
            new = %security::redact(&replacement.fingerprint),
            "Rotated API credential"
        );

        credentials.remove(&old_fp);
        credentials.insert(replacement.fingerprint.clone(), replacement);
        Ok(old_fp)
    }

    /// Number of credentials in the active set.
    pub async fn len(&self) -> usize {
        self.credentials.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.credentials.read().await.is_empty()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
