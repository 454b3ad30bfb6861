//! Delegation records and their lifecycle states.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key the pending signature draft is stored under.
pub const DRAFT_METADATA_KEY: &str = "signatureDraft";

/// Where a delegation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStatus {
    /// Created, waiting for the delegate
    Pending,
    /// Delegate drafted a signature, waiting for the delegator
    PendingApproval,
    /// Delegator approved the draft, delegate may finalize
    Approved,
    /// Document signed (terminal)
    Signed,
    /// Refused by either party (terminal)
    Rejected,
    /// Withdrawn by the delegator (terminal)
    Cancelled,
}

impl DelegationStatus {
    /// Terminal states accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DelegationStatus::Signed | DelegationStatus::Rejected | DelegationStatus::Cancelled
        )
    }

    /// Wire name (`pending_approval`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DelegationStatus::Pending => "pending",
            DelegationStatus::PendingApproval => "pending_approval",
            DelegationStatus::Approved => "approved",
            DelegationStatus::Signed => "signed",
            DelegationStatus::Rejected => "rejected",
            DelegationStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DelegationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded intent to sign, awaiting approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureDraft {
    /// Delegate who drafted
    pub drafted_by: String,
    /// When the draft was made
    pub drafted_at: DateTime<Utc>,
    /// Document the draft applies to
    pub document_id: String,
    /// Key selected for the final signature
    pub key_id: String,
}

/// Pointer to a stored signed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Source document
    pub document_id: String,
    /// Store-specific location of the signed bytes
    pub location: String,
    /// Size of the signed bytes
    pub length: usize,
    /// Uppercase hex SHA-256 of the signed bytes
    pub sha256: String,
}

/// One grant from a delegator to a delegate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    /// Random identifier
    pub id: Uuid,
    /// Document to sign; `None` for a role delegation
    pub document_id: Option<String>,
    /// Granting user
    pub delegator_id: String,
    /// Receiving user
    pub delegate_id: String,
    /// Why the delegation exists
    pub reason: String,
    /// Current state
    pub status: DelegationStatus,
    /// Opaque caller data plus the signature draft
    pub metadata: Map<String, Value>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Optional deadline
    pub expires_at: Option<DateTime<Utc>>,
    /// When the document was signed
    pub signed_at: Option<DateTime<Utc>>,
    /// When the delegator cancelled
    pub revoked_at: Option<DateTime<Utc>>,
    /// Whether the delegator must approve a draft first
    pub requires_approval: bool,
    /// When the delegator approved
    pub approved_at: Option<DateTime<Utc>>,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
    /// Signed output
    pub artifact: Option<ArtifactRef>,
    /// Optimistic concurrency counter, bumped on every save
    pub version: u64,
}

impl Delegation {
    /// Whether `expires_at` has passed at `now`.
    ///
    /// Stored status never changes on expiry; mutating calls check this.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Role delegations carry no document.
    pub fn is_role_delegation(&self) -> bool {
        self.document_id.is_none()
    }

    /// Whether `user_id` is the delegator or the delegate.
    pub fn involves(&self, user_id: &str) -> bool {
        self.delegator_id == user_id || self.delegate_id == user_id
    }

    /// The stored signature draft, if any.
    pub fn draft(&self) -> Result<Option<SignatureDraft>> {
        match self.metadata.get(DRAFT_METADATA_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        }
    }

    /// Store `draft` under [`DRAFT_METADATA_KEY`].
    pub fn set_draft(&mut self, draft: &SignatureDraft) -> Result<()> {
        self.metadata
            .insert(DRAFT_METADATA_KEY.to_string(), serde_json::to_value(draft)?);
        Ok(())
    }

    /// Discard the draft.
    pub fn clear_draft(&mut self) {
        self.metadata.remove(DRAFT_METADATA_KEY);
    }
}

/// Input for creating a delegation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateDelegation {
    /// Granting user
    pub delegator_id: String,
    /// Receiving user
    pub delegate_id: String,
    /// Document to sign; `None` for a role delegation
    pub document_id: Option<String>,
    /// Why the delegation exists
    pub reason: String,
    /// Optional deadline, must lie in the future
    pub expires_at: Option<DateTime<Utc>>,
    /// Override for the configured approval policy
    pub requires_approval: Option<bool>,
    /// Opaque caller data
    pub metadata: Option<Map<String, Value>>,
}

impl CreateDelegation {
    /// Delegation of a document from `delegator_id` to `delegate_id`.
    pub fn new(delegator_id: impl Into<String>, delegate_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            delegator_id: delegator_id.into(),
            delegate_id: delegate_id.into(),
            reason: reason.into(),
            ..Self::default()
        }
    }

    /// Set the document.
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Set the deadline.
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Override the approval policy.
    pub fn with_requires_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = Some(requires_approval);
        self
    }

    /// Attach caller metadata.
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
