//! Delegation state machine.
//!
//! ```text
//! pending ──sign──▶ pending_approval ──approve──▶ approved ──sign──▶ signed
//!    │                    │
//!    └──sign (no approval needed)──────────────────────────────────▶ signed
//!
//! pending | pending_approval ──reject──▶ rejected
//! pending | pending_approval ──cancel──▶ cancelled
//! ```
//!
//! Every mutating call runs under the per-delegation lock and checks, in
//! order: terminal status, expiry, actor, status, input, second factor.
//! Only then are side effects performed and the record saved with an
//! optimistic version check. A refused call changes nothing.

use super::audit::{AuditAction, AuditEvent};
use super::locks::LockRegistry;
use super::model::{ArtifactRef, CreateDelegation, Delegation, DelegationStatus, SignatureDraft, DRAFT_METADATA_KEY};
use super::ports::{ArtifactStore, AuditSink, Clock, DelegationRepository, TotpVerifier};
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::signatures::{PdfSigner, SignerMetadata, SigningKeyInfo, SigningKeyStore, SigningRequest};
use chrono::{DateTime, Utc};
use serde_json::Map;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Run `call` on a helper thread, giving up after `timeout`.
///
/// A call that times out keeps running in the background; its result is
/// discarded.
pub fn call_with_timeout<T, F>(dependency: &'static str, timeout: Duration, call: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("pdf-seal-{}", dependency.replace(' ', "-")))
        .spawn(move || {
            // The receiver is gone when the caller already timed out
            let _ = tx.send(call());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(Error::DependencyTimeout { dependency }),
        Err(RecvTimeoutError::Disconnected) => Err(Error::Signer(format!("{} exited without answering", dependency))),
    }
}

/// Collaborators of a [`DelegationWorkflow`].
#[derive(Clone)]
pub struct WorkflowPorts {
    /// Delegation persistence
    pub repository: Arc<dyn DelegationRepository>,
    /// Documents and signed artifacts
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Signing keys
    pub keys: Arc<dyn SigningKeyStore>,
    /// Second factor
    pub totp: Arc<dyn TotpVerifier>,
    /// Audit trail
    pub audit: Arc<dyn AuditSink>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

/// The result of a successful transition before it is saved.
struct Transition {
    action: AuditAction,
    artifact: Option<ArtifactRef>,
    detail: Option<String>,
}

impl Transition {
    fn new(action: AuditAction) -> Self {
        Self {
            action,
            artifact: None,
            detail: None,
        }
    }
}

/// Orchestrates delegations and the signing pipeline.
pub struct DelegationWorkflow {
    config: WorkflowConfig,
    signer: PdfSigner,
    ports: WorkflowPorts,
    locks: LockRegistry,
}

impl DelegationWorkflow {
    /// Create a workflow.
    pub fn new(config: WorkflowConfig, ports: WorkflowPorts) -> Self {
        let signer = PdfSigner::new(config.signing.clone());
        Self {
            config,
            signer,
            ports,
            locks: LockRegistry::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Create a `pending` delegation.
    pub fn create(&self, request: CreateDelegation) -> Result<Delegation> {
        let now = self.ports.clock.now();
        let delegator_id = required("delegator_id", &request.delegator_id)?;
        let delegate_id = required("delegate_id", &request.delegate_id)?;
        let reason = required("reason", &request.reason)?;
        let document_id = match request.document_id.as_deref() {
            Some(id) => Some(required("document_id", id)?),
            None => None,
        };
        if let Some(expires_at) = request.expires_at {
            if expires_at <= now {
                return Err(Error::InvalidInput {
                    field: "expires_at",
                    reason: format!("{} is not in the future", expires_at),
                });
            }
        }
        if request
            .metadata
            .as_ref()
            .is_some_and(|metadata| metadata.contains_key(DRAFT_METADATA_KEY))
        {
            return Err(Error::InvalidInput {
                field: "metadata",
                reason: format!("{} is reserved", DRAFT_METADATA_KEY),
            });
        }
        if delegator_id == delegate_id {
            log::warn!("User {} is delegating to themself", delegator_id);
        }

        let requires_approval = request
            .requires_approval
            .unwrap_or_else(|| self.config.approval_required_for(&reason));
        let delegation = Delegation {
            id: Uuid::new_v4(),
            document_id,
            delegator_id,
            delegate_id,
            reason,
            status: DelegationStatus::Pending,
            metadata: request.metadata.unwrap_or_else(Map::new),
            created_at: now,
            expires_at: request.expires_at,
            signed_at: None,
            revoked_at: None,
            requires_approval,
            approved_at: None,
            rejection_reason: None,
            artifact: None,
            version: 0,
        };
        self.ports.repository.insert(&delegation)?;

        log::info!(
            "Delegation {} created: {} -> {} (approval {})",
            delegation.id,
            delegation.delegator_id,
            delegation.delegate_id,
            if requires_approval { "required" } else { "not required" }
        );
        self.audit(&delegation, &delegation.delegator_id, Transition::new(AuditAction::Created), now);
        Ok(delegation)
    }

    /// Delegate signs: drafts when approval is pending, otherwise finalizes.
    pub fn sign(&self, id: Uuid, actor_id: &str, totp: &str) -> Result<Delegation> {
        self.transition(id, actor_id, "sign", |delegation, now| {
            if actor_id != delegation.delegate_id {
                return Err(forbidden(actor_id, "sign"));
            }
            let draft = delegation.draft()?;
            let may_sign = match delegation.status {
                DelegationStatus::Pending => draft.is_none(),
                DelegationStatus::Approved => true,
                _ => false,
            };
            if !may_sign {
                return Err(invalid_state(delegation, "sign"));
            }
            let document_id = delegation
                .document_id
                .clone()
                .ok_or(Error::NotSignable(delegation.id))?;
            self.verify_totp(actor_id, totp)?;

            if delegation.requires_approval && delegation.status == DelegationStatus::Pending {
                let key = self.key_for(&delegation.delegate_id)?;
                delegation.set_draft(&SignatureDraft {
                    drafted_by: actor_id.to_string(),
                    drafted_at: now,
                    document_id,
                    key_id: key.key_id,
                })?;
                delegation.status = DelegationStatus::PendingApproval;
                return Ok(Transition::new(AuditAction::Drafted));
            }

            let key = self.key_for(&delegation.delegate_id)?;
            let key_id = match draft {
                Some(draft) if draft.key_id != key.key_id => return Err(Error::KeyInactive(draft.key_id)),
                Some(draft) => draft.key_id,
                None => key.key_id,
            };
            let artifact = self.finalize(delegation, &document_id, key_id, now)?;
            delegation.status = DelegationStatus::Signed;
            delegation.signed_at = Some(now);
            delegation.artifact = Some(artifact.clone());
            Ok(Transition {
                action: AuditAction::Signed,
                artifact: Some(artifact),
                detail: None,
            })
        })
    }

    /// Delegator approves the pending draft.
    pub fn approve(&self, id: Uuid, actor_id: &str, totp: &str) -> Result<Delegation> {
        self.transition(id, actor_id, "approve", |delegation, now| {
            if actor_id != delegation.delegator_id {
                return Err(forbidden(actor_id, "approve"));
            }
            if delegation.status != DelegationStatus::PendingApproval || delegation.draft()?.is_none() {
                return Err(invalid_state(delegation, "approve"));
            }
            self.verify_totp(actor_id, totp)?;

            delegation.status = DelegationStatus::Approved;
            delegation.approved_at = Some(now);
            Ok(Transition::new(AuditAction::Approved))
        })
    }

    /// Either party rejects.
    pub fn reject(&self, id: Uuid, actor_id: &str, reason: &str) -> Result<Delegation> {
        self.transition(id, actor_id, "reject", |delegation, _now| {
            if !delegation.involves(actor_id) {
                return Err(forbidden(actor_id, "reject"));
            }
            if !matches!(
                delegation.status,
                DelegationStatus::Pending | DelegationStatus::PendingApproval
            ) {
                return Err(invalid_state(delegation, "reject"));
            }
            let reason = required("reason", reason)?;

            delegation.status = DelegationStatus::Rejected;
            delegation.clear_draft();
            delegation.rejection_reason = Some(reason.clone());
            Ok(Transition {
                action: AuditAction::Rejected,
                artifact: None,
                detail: Some(reason),
            })
        })
    }

    /// Delegator withdraws.
    pub fn cancel(&self, id: Uuid, actor_id: &str) -> Result<Delegation> {
        self.transition(id, actor_id, "cancel", |delegation, now| {
            if actor_id != delegation.delegator_id {
                return Err(forbidden(actor_id, "cancel"));
            }
            if !matches!(
                delegation.status,
                DelegationStatus::Pending | DelegationStatus::PendingApproval
            ) {
                return Err(invalid_state(delegation, "cancel"));
            }

            delegation.status = DelegationStatus::Cancelled;
            delegation.revoked_at = Some(now);
            Ok(Transition::new(AuditAction::Cancelled))
        })
    }

    /// Load a delegation. Expiry is not enforced on reads.
    pub fn get(&self, id: Uuid) -> Result<Delegation> {
        self.ports.repository.get(id)
    }

    /// Delegations where `user_id` is delegator or delegate.
    pub fn list_for_user(&self, user_id: &str) -> Result<Vec<Delegation>> {
        self.ports.repository.list_for_user(user_id)
    }

    /// Locked load, common checks, `decide`, save and audit.
    fn transition<F>(&self, id: Uuid, actor_id: &str, action: &'static str, decide: F) -> Result<Delegation>
    where
        F: FnOnce(&mut Delegation, DateTime<Utc>) -> Result<Transition>,
    {
        self.locks.with_lock(id, || {
            let now = self.ports.clock.now();
            let mut delegation = self.ports.repository.get(id)?;
            let expected_version = delegation.version;
            let status_before = delegation.status;

            let outcome = check_open(&delegation, action, now).and_then(|()| decide(&mut delegation, now));
            let transition = match outcome {
                Ok(transition) => transition,
                Err(e) => {
                    log::warn!("Refused {} on delegation {} by {}: {}", action, id, actor_id, e);
                    self.ports.audit.record(&AuditEvent {
                        delegation_id: id,
                        actor_id: actor_id.to_string(),
                        action: AuditAction::Refused,
                        status: Some(status_before),
                        at: now,
                        artifact: None,
                        detail: Some(format!("{}: {}", action, e)),
                    });
                    return Err(e);
                },
            };

            let saved = self.ports.repository.update(&delegation, expected_version)?;
            log::info!("Delegation {} {} by {} -> {}", id, action, actor_id, saved.status);
            self.audit(&saved, actor_id, transition, now);
            Ok(saved)
        })
    }

    fn audit(&self, delegation: &Delegation, actor_id: &str, transition: Transition, at: DateTime<Utc>) {
        self.ports.audit.record(&AuditEvent {
            delegation_id: delegation.id,
            actor_id: actor_id.to_string(),
            action: transition.action,
            status: Some(delegation.status),
            at,
            artifact: transition.artifact,
            detail: transition.detail,
        });
    }

    fn verify_totp(&self, user_id: &str, token: &str) -> Result<()> {
        let invalid = || Error::InvalidTotp {
            user_id: user_id.to_string(),
        };
        if token.trim().is_empty() {
            return Err(invalid());
        }
        let verifier = Arc::clone(&self.ports.totp);
        let (user, token) = (user_id.to_string(), token.to_string());
        match call_with_timeout("TOTP verifier", self.config.dependency_timeout, move || {
            verifier.verify(&user, &token)
        }) {
            Ok(true) => Ok(()),
            Err(e @ Error::DependencyTimeout { .. }) => Err(e),
            Ok(false) => Err(invalid()),
            Err(e) => {
                log::warn!("TOTP verifier failed for {}: {}", user_id, e);
                Err(invalid())
            },
        }
    }

    fn key_for(&self, owner_id: &str) -> Result<SigningKeyInfo> {
        let keys = Arc::clone(&self.ports.keys);
        let owner = owner_id.to_string();
        let key = call_with_timeout("signing key store", self.config.dependency_timeout, move || {
            keys.key_for_owner(&owner)
        })?;
        if !key.active {
            return Err(Error::KeyInactive(key.key_id));
        }
        Ok(key)
    }

    /// Run the signing pipeline and store the result.
    fn finalize(
        &self,
        delegation: &Delegation,
        document_id: &str,
        key_id: String,
        now: DateTime<Utc>,
    ) -> Result<ArtifactRef> {
        let pdf = self.ports.artifacts.load(document_id)?;
        let metadata = SignerMetadata::new()
            .with_name(delegation.delegate_id.clone())
            .with_reason(delegation.reason.clone())
            .with_signing_time(now.fixed_offset());

        let keys = Arc::clone(&self.ports.keys);
        let algorithm = self.signer.config().digest_algorithm;
        let timeout = self.config.dependency_timeout;
        let artifact = self.signer.sign_with(&pdf, &metadata, move |digest| {
            let request = SigningRequest {
                digest: digest.to_vec(),
                algorithm,
            };
            call_with_timeout("signer", timeout, move || keys.sign(&key_id, &request))
        })?;

        // Nothing is stored for a record that can no longer be updated.
        if self.ports.repository.get(delegation.id)?.version != delegation.version {
            return Err(Error::ConcurrentModification {
                delegation_id: delegation.id,
            });
        }
        self.ports.artifacts.save(document_id, &artifact.bytes)
    }
}

/// Terminal status first, then expiry.
fn check_open(delegation: &Delegation, action: &'static str, now: DateTime<Utc>) -> Result<()> {
    if delegation.status.is_terminal() {
        return Err(invalid_state(delegation, action));
    }
    match delegation.expires_at {
        Some(expires_at) if delegation.is_expired(now) => Err(Error::Expired {
            delegation_id: delegation.id,
            expires_at,
        }),
        _ => Ok(()),
    }
}

fn invalid_state(delegation: &Delegation, action: &'static str) -> Error {
    Error::InvalidState {
        delegation_id: delegation.id,
        status: delegation.status.to_string(),
        action,
    }
}

fn forbidden(actor_id: &str, action: &'static str) -> Error {
    Error::Forbidden {
        actor_id: actor_id.to_string(),
        action,
    }
}

fn required(field: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_with_timeout() {
        let fast = call_with_timeout("fast", Duration::from_secs(5), || Ok(3));
        assert_eq!(fast.unwrap(), 3);

        let slow = call_with_timeout("slow", Duration::from_millis(20), || {
            thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        assert!(matches!(slow, Err(Error::DependencyTimeout { dependency: "slow" })));

        let failing: Result<()> = call_with_timeout("failing", Duration::from_secs(5), || {
            Err(Error::KeyNotFound("k".into()))
        });
        assert!(matches!(failing, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("reason", "  Review  ").unwrap(), "Review");
        assert!(matches!(
            required("reason", "   "),
            Err(Error::InvalidInput { field: "reason", .. })
        ));
    }
}
