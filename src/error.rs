//! Error types for the signing pipeline and the delegation workflow.
//!
//! Every failure carries its kind plus the offending field or offset, and
//! [`Error::category`] tells a caller whether to retry with different input,
//! surface a permission/state problem, or back off from a flaky dependency.

use uuid::Uuid;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`] for callers deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request itself was wrong; retry with different input.
    InvalidInput,
    /// The actor or the delegation state does not permit the action.
    PermissionOrState,
    /// An external collaborator failed or timed out; re-query, then retry.
    TransientDependency,
    /// The document or stored data is damaged or structurally unusable.
    Corrupt,
}

/// Error types that can occur while preparing, signing or orchestrating.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    // === PDF structure ===
    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid or missing cross-reference data
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    // === Signing pipeline ===
    /// No signable form field / AcroForm structure could be established
    #[error("Cannot insert signature placeholder: {reason}")]
    PlaceholderInsertion {
        /// Why the document could not be prepared
        reason: String,
    },

    /// A value does not fit into the space reserved for it
    #[error("{region} needs {required} bytes but only {available} are reserved")]
    CapacityExceeded {
        /// Which reserved region overflowed ("signature contents", "signature metadata")
        region: &'static str,
        /// Bytes required
        required: usize,
        /// Bytes available
        available: usize,
    },

    /// A ByteRange integer is wider than its fixed-width slot
    #[error("ByteRange value {value} does not fit in {width} digits")]
    ByteRangeOverflow {
        /// The offending integer
        value: usize,
        /// Width of the reserved slot
        width: usize,
    },

    /// The signature dictionary is not where the placeholder says it is
    #[error("Signature dictionary not found at byte {offset}: {reason}")]
    SignatureDictionaryNotFound {
        /// Recorded dictionary offset
        offset: usize,
        /// What did not match
        reason: String,
    },

    /// The bytes do not match the recorded placeholder layout
    #[error("Placeholder mismatch at byte {offset}: {reason}")]
    PlaceholderMismatch {
        /// Offset that failed the check
        offset: usize,
        /// What did not match
        reason: String,
    },

    // === Delegation workflow ===
    /// Transition not permitted from the current status
    #[error("Cannot {action} delegation {delegation_id} in status {status}")]
    InvalidState {
        /// Delegation the action targeted
        delegation_id: Uuid,
        /// Status observed when the action was refused
        status: String,
        /// Attempted action
        action: &'static str,
    },

    /// The delegation's `expires_at` has passed
    #[error("Delegation {delegation_id} expired at {expires_at}")]
    Expired {
        /// Delegation the action targeted
        delegation_id: Uuid,
        /// Expiry instant
        expires_at: chrono::DateTime<chrono::Utc>,
    },

    /// Second factor rejected or verifier failed
    #[error("Invalid one-time code for user {user_id}")]
    InvalidTotp {
        /// User whose code was checked
        user_id: String,
    },

    /// The actor is not allowed to perform this action
    #[error("User {actor_id} may not {action} this delegation")]
    Forbidden {
        /// Acting user
        actor_id: String,
        /// Attempted action
        action: &'static str,
    },

    /// Role delegations carry no document and can never be signed
    #[error("Delegation {0} is a role delegation and cannot be signed")]
    NotSignable(Uuid),

    /// No delegation with this id
    #[error("Delegation not found: {0}")]
    DelegationNotFound(Uuid),

    /// The artifact store has no such document
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// A request field failed validation
    #[error("Invalid {field}: {reason}")]
    InvalidInput {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Somebody else updated the delegation between load and save
    #[error("Delegation {delegation_id} was modified concurrently")]
    ConcurrentModification {
        /// Delegation that lost the race
        delegation_id: Uuid,
    },

    // === External collaborators ===
    /// Signing key does not exist
    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    /// Signing key exists but is revoked
    #[error("Signing key is not active: {0}")]
    KeyInactive(String),

    /// The external signer failed
    #[error("Signer error: {0}")]
    Signer(String),

    /// An external dependency did not answer in time
    #[error("{dependency} did not respond within the configured timeout")]
    DependencyTimeout {
        /// Which dependency timed out
        dependency: &'static str,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error for retry / reporting decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::CapacityExceeded { .. }
            | Error::ByteRangeOverflow { .. }
            | Error::InvalidInput { .. }
            | Error::InvalidTotp { .. }
            | Error::DelegationNotFound(_)
            | Error::DocumentNotFound(_) => ErrorCategory::InvalidInput,
            Error::InvalidState { .. }
            | Error::Expired { .. }
            | Error::Forbidden { .. }
            | Error::NotSignable(_)
            | Error::KeyNotFound(_)
            | Error::KeyInactive(_) => ErrorCategory::PermissionOrState,
            Error::ConcurrentModification { .. }
            | Error::DependencyTimeout { .. }
            | Error::Signer(_)
            | Error::Io(_) => ErrorCategory::TransientDependency,
            Error::ParseError { .. }
            | Error::InvalidXref
            | Error::ObjectNotFound(..)
            | Error::InvalidPdf(_)
            | Error::Decode(_)
            | Error::PlaceholderInsertion { .. }
            | Error::SignatureDictionaryNotFound { .. }
            | Error::PlaceholderMismatch { .. }
            | Error::Json(_) => ErrorCategory::Corrupt,
        }
    }

    /// Whether retrying the same call later might succeed.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::TransientDependency
    }
}
