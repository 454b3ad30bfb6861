//! Configuration for signing and the delegation workflow.

use crate::signatures::{DigestAlgorithm, SignatureSubFilter, SignatureVisibility};
use std::time::Duration;

/// Default space reserved for the signature blob, in bytes.
pub const DEFAULT_RESERVED_SIGNATURE_BYTES: usize = 8192;

/// Default width of the whitespace slot for signer metadata.
pub const DEFAULT_METADATA_CAPACITY: usize = 2048;

/// Signing pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningConfig {
    /// Bytes reserved for the signature (hex capacity is twice this).
    pub reserved_signature_bytes: usize,

    /// Digest handed to the signer.
    pub digest_algorithm: DigestAlgorithm,

    /// `/SubFilter` of the signature dictionary.
    pub sub_filter: SignatureSubFilter,

    /// Field name; `None` picks the first free `Signature{n}`.
    pub field_name: Option<String>,

    /// Widget placement.
    pub visibility: SignatureVisibility,

    /// Whitespace reserved inside the signature dictionary for metadata.
    pub metadata_capacity: usize,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            reserved_signature_bytes: DEFAULT_RESERVED_SIGNATURE_BYTES,
            digest_algorithm: DigestAlgorithm::Sha256,
            sub_filter: SignatureSubFilter::Pkcs7Detached,
            field_name: None,
            visibility: SignatureVisibility::Invisible,
            metadata_capacity: DEFAULT_METADATA_CAPACITY,
        }
    }

    /// Hex characters reserved in `/Contents`.
    pub fn reserved_hex_capacity(&self) -> usize {
        self.reserved_signature_bytes * 2
    }

    /// Set the reserved signature size in bytes.
    pub fn with_reserved_signature_bytes(mut self, bytes: usize) -> Self {
        self.reserved_signature_bytes = bytes;
        self
    }

    /// Set the digest algorithm.
    pub fn with_digest_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.digest_algorithm = algorithm;
        self
    }

    /// Set the sub-filter.
    pub fn with_sub_filter(mut self, sub_filter: SignatureSubFilter) -> Self {
        self.sub_filter = sub_filter;
        self
    }

    /// Set an explicit field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Set widget placement.
    pub fn with_visibility(mut self, visibility: SignatureVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the metadata slot width (0 disables metadata patching).
    pub fn with_metadata_capacity(mut self, capacity: usize) -> Self {
        self.metadata_capacity = capacity;
        self
    }
}

/// Delegation workflow configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Whether every new delegation requires the delegator's approval.
    pub require_approval: bool,

    /// Reasons (case-insensitive) that force approval.
    pub approval_reasons: Vec<String>,

    /// Upper bound for a single call to the TOTP verifier or the signer.
    pub dependency_timeout: Duration,

    /// Pipeline settings used when a delegation is finalized.
    pub signing: SigningConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            require_approval: false,
            approval_reasons: Vec::new(),
            dependency_timeout: Duration::from_secs(10),
            signing: SigningConfig::new(),
        }
    }

    /// Require approval for every delegation.
    pub fn with_require_approval(mut self, require: bool) -> Self {
        self.require_approval = require;
        self
    }

    /// Add a reason that forces approval.
    pub fn with_approval_reason(mut self, reason: impl Into<String>) -> Self {
        self.approval_reasons.push(reason.into());
        self
    }

    /// Set the dependency timeout.
    pub fn with_dependency_timeout(mut self, timeout: Duration) -> Self {
        self.dependency_timeout = timeout;
        self
    }

    /// Set the signing configuration.
    pub fn with_signing(mut self, signing: SigningConfig) -> Self {
        self.signing = signing;
        self
    }

    /// Whether a delegation created with `reason` needs approval.
    pub fn approval_required_for(&self, reason: &str) -> bool {
        let reason = reason.trim();
        self.require_approval
            || self
                .approval_reasons
                .iter()
                .any(|r| r.trim().eq_ignore_ascii_case(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_defaults() {
        let config = SigningConfig::default();
        assert_eq!(config.reserved_hex_capacity(), 16384);
        assert_eq!(config.metadata_capacity, 2048);
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert!(config.field_name.is_none());
    }

    #[test]
    fn test_signing_builder() {
        let config = SigningConfig::new()
            .with_reserved_signature_bytes(16)
            .with_field_name("Approval")
            .with_metadata_capacity(0);
        assert_eq!(config.reserved_hex_capacity(), 32);
        assert_eq!(config.field_name.as_deref(), Some("Approval"));
        assert_eq!(config.metadata_capacity, 0);
    }

    #[test]
    fn test_approval_reasons_case_insensitive() {
        let config = WorkflowConfig::new().with_approval_reason("Contract approval");
        assert!(config.approval_required_for("contract APPROVAL"));
        assert!(!config.approval_required_for("Invoice"));
        assert!(WorkflowConfig::new().with_require_approval(true).approval_required_for("x"));
        assert_eq!(WorkflowConfig::default().dependency_timeout, Duration::from_secs(10));
    }
}
