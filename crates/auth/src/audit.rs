//! Audit logging for authentication and authorization decisions.
//!
//! Every decision branch emits an [`AuditEvent`]. Emission is best-effort
//! and decoupled from the decision path: a full buffer or a failing sink
//! drops the event with a warning, it never blocks or alters the outcome.
//! Events carry redacted identities only, never raw secret material.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Types of auditable events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    CredentialValidated,
    CredentialRejected,
    IpDenied,
    RateLimited,
    SessionCreated,
    SessionRefreshed,
    SessionRevoked,
    /// A token failed validation: unknown, revoked, or expired.
    SessionDenied,
    /// Expired records reclaimed by the sweeper.
    SessionExpired,
    PermissionDenied,
    CredentialsRotated,
    CapacityExceeded,
}

/// An immutable audit record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Redacted credential or session reference.
    pub identity: Option<String>,
    pub source_ip: Option<IpAddr>,
    /// Structured context for the event.
    pub detail: serde_json::Value,
    /// Whether the audited step succeeded.
    pub success: bool,
}

impl AuditEvent {
    /// Start building an event of the given type.
    pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder {
            event_type,
            identity: None,
            source_ip: None,
            detail: serde_json::Value::Null,
            success: true,
        }
    }
}

/// Builder for audit events.
pub struct AuditEventBuilder {
    event_type: AuditEventType,
    identity: Option<String>,
    source_ip: Option<IpAddr>,
    detail: serde_json::Value,
    success: bool,
}

impl AuditEventBuilder {
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn source_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.source_ip = ip;
        self
    }

    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn denied(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            identity: self.identity,
            source_ip: self.source_ip,
            detail: self.detail,
            success: self.success,
        }
    }
}

/// Destination for the append-only audit stream. The subsystem only
/// produces events; long-term storage and querying live elsewhere.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// In-memory sink for tests.
pub struct MemoryAuditSink {
    events: tokio::sync::RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: tokio::sync::RwLock::new(Vec::new()),
        }
    }

    /// Copy of all recorded events.
    pub async fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

/// Sink that emits events as structured log records.
pub struct TracingAuditSink;

#[async_trait::async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        tracing::info!(
            target: "audit",
            event_id = %event.id,
            event_type = ?event.event_type,
            identity = event.identity.as_deref().unwrap_or("-"),
            source_ip = ?event.source_ip,
            success = event.success,
            detail = %event.detail,
            "audit event"
        );
        Ok(())
    }
}

/// Buffered, non-blocking audit logger.
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
    /// Async channel so callers never wait on the sink.
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(10_000);

        let sink_clone = sink.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink_clone.record(&event).await {
                    tracing::error!(error = %e, "Failed to record audit event");
                }
            }
        });

        Self { sink, tx }
    }

    /// Emit an event without blocking. A full buffer drops the event.
    pub fn log(&self, event: AuditEvent) {
        if self.tx.try_send(event).is_err() {
            tracing::warn!("Audit buffer full, event dropped");
        }
    }

    /// Emit an event and wait for the sink (tests and shutdown paths).
    pub async fn log_sync(&self, event: AuditEvent) -> Result<()> {
        self.sink.record(&event).await
    }
}
