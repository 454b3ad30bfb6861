//! Collaborators the workflow talks to.
//!
//! The workflow holds each port as `Arc<dyn Trait>`; calls that may hang
//! (the TOTP verifier and the key store) run on a helper thread, which is
//! why every port is `Send + Sync`.

use super::audit::AuditEvent;
use super::model::{ArtifactRef, Delegation};
use crate::error::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use crate::signatures::{SigningKeyInfo, SigningKeyStore, SigningRequest};

/// Second-factor check.
pub trait TotpVerifier: Send + Sync {
    /// Whether `token` is currently valid for `user_id`.
    fn verify(&self, user_id: &str, token: &str) -> Result<bool>;
}

/// Source of unsigned documents and sink for signed ones.
pub trait ArtifactStore: Send + Sync {
    /// Bytes of `document_id`; [`crate::Error::DocumentNotFound`] if absent.
    fn load(&self, document_id: &str) -> Result<Vec<u8>>;

    /// Persist the signed bytes of `document_id`.
    ///
    /// Called under the delegation lock after a version check, but before the
    /// record update. A repository written outside the workflow can still
    /// reject that update, leaving the saved artifact unreferenced.
    fn save(&self, document_id: &str, bytes: &[u8]) -> Result<ArtifactRef>;
}

/// Delegation persistence with optimistic concurrency.
pub trait DelegationRepository: Send + Sync {
    /// Store a new delegation.
    fn insert(&self, delegation: &Delegation) -> Result<()>;

    /// Load by id; [`crate::Error::DelegationNotFound`] if absent.
    fn get(&self, id: Uuid) -> Result<Delegation>;

    /// Replace the stored record if its version is still `expected_version`.
    ///
    /// Returns the saved record with its version bumped, or
    /// [`crate::Error::ConcurrentModification`].
    fn update(&self, delegation: &Delegation, expected_version: u64) -> Result<Delegation>;

    /// Delegations where `user_id` is delegator or delegate, oldest first.
    fn list_for_user(&self, user_id: &str) -> Result<Vec<Delegation>>;
}

/// Receives one event per transition or refusal.
pub trait AuditSink: Send + Sync {
    /// Record `event`.
    fn record(&self, event: &AuditEvent);
}

/// Time source.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}
