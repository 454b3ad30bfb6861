//! Audit trail of delegation transitions.
//!
//! Events are the only place a signed artifact is linked back to its
//! delegation.

use super::model::{ArtifactRef, DelegationStatus};
use super::ports::AuditSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Delegation created
    Created,
    /// Delegate drafted a signature
    Drafted,
    /// Delegator approved the draft
    Approved,
    /// Document signed
    Signed,
    /// Delegation rejected
    Rejected,
    /// Delegation cancelled
    Cancelled,
    /// A call was refused; `detail` carries the error
    Refused,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Delegation concerned
    pub delegation_id: Uuid,
    /// Acting user
    pub actor_id: String,
    /// Kind of event
    pub action: AuditAction,
    /// Status after the event
    pub status: Option<DelegationStatus>,
    /// When it happened
    pub at: DateTime<Utc>,
    /// Signed output, for `Signed`
    pub artifact: Option<ArtifactRef>,
    /// Free-form detail (rejection reason, refusal error)
    pub detail: Option<String>,
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Events for one delegation.
    pub fn events_for(&self, delegation_id: Uuid) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.delegation_id == delegation_id)
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Writes events to the `log` facade under the `pdf_seal::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        match serde_json::to_string(event) {
            Ok(line) => log::info!(target: "pdf_seal::audit", "{}", line),
            Err(e) => log::error!(target: "pdf_seal::audit", "Unserializable audit event: {}", e),
        }
    }
}
