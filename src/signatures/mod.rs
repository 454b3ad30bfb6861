//! PDF digital signature pipeline.
//!
//! Preparing and signing a document happens in stages, each operating on
//! the byte buffer produced by the previous one:
//!
//! ```text
//! original PDF
//!     ↓ insert_placeholder      (incremental update with reserved regions)
//!     ↓ patch_metadata          (optional: /Name /Reason /Location /ContactInfo /M)
//!     ↓ finalize_byte_range     (real offsets into the ByteRange slot)
//!     ↓ compute_digest          (every byte outside the contents region)
//!     ↓ [external signer]
//!     ↓ embed_signature         (hex blob into the contents region)
//! signed PDF (same length as the prepared one)
//! ```
//!
//! [`PdfSigner`] runs the whole sequence; the stage functions are exposed
//! for callers who sign out of process and resume later from a persisted
//! [`SignaturePlaceholder`].
//!
//! ## Example
//!
//! ```no_run
//! use pdf_seal::config::SigningConfig;
//! use pdf_seal::signatures::{PdfSigner, SignerMetadata};
//!
//! let original = std::fs::read("contract.pdf")?;
//! let signer = PdfSigner::new(SigningConfig::default());
//! let artifact = signer.sign_with(&original, &SignerMetadata::new().with_reason("Approval"), |digest| {
//!     // Hand the digest to an HSM or CMS builder here
//!     Ok(digest.to_vec())
//! })?;
//! std::fs::write("contract-signed.pdf", &artifact.bytes)?;
//! # Ok::<(), pdf_seal::error::Error>(())
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - ISO 32000-1:2008 Section 7.5.6 - Incremental Updates

mod byterange;
mod digest;
mod embedder;
mod metadata;
mod pipeline;
mod placeholder;
#[cfg(feature = "rsa-keys")]
mod rsa_keys;
mod types;
mod verifier;

pub use byterange::{
    extract_signed_bytes, finalize_byte_range, validate_byte_range, BYTE_RANGE_DIGITS, BYTE_RANGE_TEMPLATE,
};
pub use digest::{compute_digest, digest_bytes, digest_for};
pub use embedder::embed_signature;
pub use metadata::{format_pdf_date, patch_metadata};
pub use pipeline::{PdfSigner, PreparedSignature, SigningKeyInfo, SigningKeyStore, SigningRequest};
pub use placeholder::{insert_placeholder, PlaceholderOptions};
#[cfg(feature = "rsa-keys")]
pub use rsa_keys::RsaKeyStore;
pub use types::{
    AnnotationFlags, ByteRange, DigestAlgorithm, PreparedDocument, SignaturePlaceholder,
    SignatureSubFilter, SignatureVisibility, SignedArtifact, SignerMetadata,
};
pub use verifier::{inspect_signatures, SignatureCheck, SignatureReport};

/// Uppercase hex encoding.
///
/// ```
/// assert_eq!(pdf_seal::signatures::bytes_to_hex(&[0x0A, 0xFF]), "0AFF");
/// ```
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        hex.push(DIGITS[(b >> 4) as usize] as char);
        hex.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    hex
}

/// Encode a PDF text string: plain bytes for printable ASCII, otherwise
/// UTF-16BE with a `FEFF` byte order mark.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        text.as_bytes().to_vec()
    } else {
        utf16be_with_bom(text)
    }
}

/// UTF-16BE bytes prefixed with the `FEFF` byte order mark.
pub fn utf16be_with_bom(text: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}
