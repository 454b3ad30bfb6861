//! Digest calculation over the signed spans.
//!
//! The digest covers every byte except the contents region `<...>`,
//! delimiters included, at the offsets recorded by the placeholder.

use super::byterange::check_layout;
use super::types::{ByteRange, DigestAlgorithm, SignaturePlaceholder};
use crate::error::{Error, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

fn hash_spans<D: Digest>(spans: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for span in spans {
        hasher.update(span);
    }
    hasher.finalize().to_vec()
}

fn hash_with(algorithm: DigestAlgorithm, spans: &[&[u8]]) -> Vec<u8> {
    match algorithm {
        DigestAlgorithm::Sha1 => hash_spans::<Sha1>(spans),
        DigestAlgorithm::Sha256 => hash_spans::<Sha256>(spans),
        DigestAlgorithm::Sha384 => hash_spans::<Sha384>(spans),
        DigestAlgorithm::Sha512 => hash_spans::<Sha512>(spans),
    }
}

/// Hash a single buffer.
pub fn digest_bytes(data: &[u8], algorithm: DigestAlgorithm) -> Vec<u8> {
    hash_with(algorithm, &[data])
}

/// Digest of everything outside `[contents_offset, contents_offset + contents_length)`.
///
/// Uses the recorded offsets only; the bytes are never re-scanned.
pub fn compute_digest(
    bytes: &[u8],
    placeholder: &SignaturePlaceholder,
    algorithm: DigestAlgorithm,
) -> Result<Vec<u8>> {
    check_layout(bytes, placeholder)?;
    let head = &bytes[..placeholder.contents_offset];
    let tail = &bytes[placeholder.contents_end()..];
    let digest = hash_with(algorithm, &[head, tail]);
    log::debug!(
        "{} digest over {} + {} bytes",
        algorithm.name(),
        head.len(),
        tail.len()
    );
    Ok(digest)
}

/// Recompute the digest a ByteRange describes (for checking signed files).
pub fn digest_for(bytes: &[u8], range: &ByteRange, algorithm: DigestAlgorithm) -> Result<Vec<u8>> {
    let first = range.first_span().and_then(|span| bytes.get(span));
    let second = range.second_span().and_then(|span| bytes.get(span));
    match (first, second) {
        (Some(a), Some(b)) => Ok(hash_with(algorithm, &[a, b])),
        _ => Err(Error::InvalidPdf(format!("ByteRange {} exceeds file size {}", range, bytes.len()))),
    }
}
