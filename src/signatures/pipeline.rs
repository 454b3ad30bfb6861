//! End-to-end signing: prepare, digest, sign externally, embed.

use super::byterange::finalize_byte_range;
use super::digest::compute_digest;
use super::embedder::embed_signature;
use super::metadata::patch_metadata;
use super::placeholder::{insert_placeholder, PlaceholderOptions};
use super::types::{ByteRange, DigestAlgorithm, PreparedDocument, SignedArtifact, SignerMetadata};
use crate::config::SigningConfig;
use crate::error::{Error, Result};

/// Request handed to an external signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    /// Digest of the signed byte ranges
    pub digest: Vec<u8>,
    /// Algorithm that produced `digest`
    pub algorithm: DigestAlgorithm,
}

/// Public description of a signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyInfo {
    /// Key identifier understood by the store
    pub key_id: String,
    /// User the key belongs to
    pub owner_id: String,
    /// Whether the key may still sign (revoked keys may not)
    pub active: bool,
}

/// "Sign these bytes with key K" capability (an HSM or a software store).
///
/// Implementations return [`Error::KeyNotFound`] for unknown keys and
/// owners, [`Error::KeyInactive`] for revoked keys. The returned blob is
/// embedded verbatim (typically a DER-encoded CMS `SignedData`).
pub trait SigningKeyStore: Send + Sync {
    /// The active key owned by `owner_id`.
    fn key_for_owner(&self, owner_id: &str) -> Result<SigningKeyInfo>;

    /// Sign `request.digest` with `key_id`.
    fn sign(&self, key_id: &str, request: &SigningRequest) -> Result<Vec<u8>>;
}

/// A prepared document whose digest is ready for the signer.
#[derive(Debug, Clone)]
pub struct PreparedSignature {
    /// Prepared bytes and reserved-region layout
    pub document: PreparedDocument,
    /// Final ByteRange, already written into the bytes
    pub byte_range: ByteRange,
    /// Digest over the ByteRange spans
    pub digest: Vec<u8>,
    /// Algorithm of `digest`
    pub digest_algorithm: DigestAlgorithm,
}

impl PreparedSignature {
    /// The request to send to a [`SigningKeyStore`].
    pub fn request(&self) -> SigningRequest {
        SigningRequest {
            digest: self.digest.clone(),
            algorithm: self.digest_algorithm,
        }
    }
}

/// Runs the signing stages in order against one configuration.
#[derive(Debug, Clone, Default)]
pub struct PdfSigner {
    config: SigningConfig,
}

impl PdfSigner {
    /// Create a signer with the given configuration.
    pub fn new(config: SigningConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Insert the placeholder, patch metadata, finalize the ByteRange and
    /// compute the digest.
    pub fn prepare(&self, pdf: &[u8], metadata: &SignerMetadata) -> Result<PreparedSignature> {
        let mut document = insert_placeholder(pdf, &PlaceholderOptions::from(&self.config))?;
        if !metadata.is_empty() {
            patch_metadata(&mut document.bytes, &document.placeholder, metadata)?;
        }
        let byte_range = finalize_byte_range(&mut document.bytes, &document.placeholder)?;
        let digest = compute_digest(&document.bytes, &document.placeholder, self.config.digest_algorithm)?;

        Ok(PreparedSignature {
            document,
            byte_range,
            digest,
            digest_algorithm: self.config.digest_algorithm,
        })
    }

    /// Embed `signature` into a prepared document.
    pub fn finish(&self, prepared: PreparedSignature, signature: &[u8]) -> Result<SignedArtifact> {
        let PreparedSignature {
            mut document,
            byte_range,
            digest,
            digest_algorithm,
        } = prepared;
        embed_signature(&mut document.bytes, &document.placeholder, signature)?;

        let final_range = finalize_byte_range(&mut document.bytes, &document.placeholder)?;
        if final_range != byte_range {
            return Err(Error::PlaceholderMismatch {
                offset: document.placeholder.byte_range_offset,
                reason: format!("ByteRange moved from {} to {}", byte_range, final_range),
            });
        }

        log::info!(
            "Signed field {:?}: {} bytes, ByteRange {}",
            document.placeholder.field_name,
            document.bytes.len(),
            final_range
        );
        Ok(SignedArtifact {
            bytes: document.bytes,
            digest,
            digest_algorithm,
            byte_range: final_range,
            placeholder: document.placeholder,
        })
    }

    /// Full pipeline with `sign` producing the signature from the digest.
    pub fn sign_with<F>(&self, pdf: &[u8], metadata: &SignerMetadata, sign: F) -> Result<SignedArtifact>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>>,
    {
        let prepared = self.prepare(pdf, metadata)?;
        let signature = sign(&prepared.digest)?;
        self.finish(prepared, &signature)
    }

    /// Full pipeline signing with `key_id` from `store`.
    pub fn sign_with_key(
        &self,
        pdf: &[u8],
        metadata: &SignerMetadata,
        store: &dyn SigningKeyStore,
        key_id: &str,
    ) -> Result<SignedArtifact> {
        let prepared = self.prepare(pdf, metadata)?;
        let signature = store.sign(key_id, &prepared.request())?;
        self.finish(prepared, &signature)
    }
}
