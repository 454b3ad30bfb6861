//! Signature embedding into the reserved contents region.

use super::byterange::check_layout;
use super::bytes_to_hex;
use super::types::SignaturePlaceholder;
use crate::error::{Error, Result};

/// Write `signature` as uppercase hex into the contents region, padded
/// with `0` to the reserved capacity.
///
/// Fails with [`Error::CapacityExceeded`] (bytes untouched) when the hex
/// form is longer than the reservation, and with
/// [`Error::PlaceholderMismatch`] when the recorded region does not hold a
/// hex string of the recorded length.
pub fn embed_signature(bytes: &mut [u8], placeholder: &SignaturePlaceholder, signature: &[u8]) -> Result<()> {
    check_layout(bytes, placeholder)?;

    let hex = bytes_to_hex(signature);
    if hex.len() > placeholder.reserved_hex_capacity {
        return Err(Error::CapacityExceeded {
            region: "signature contents",
            required: hex.len(),
            available: placeholder.reserved_hex_capacity,
        });
    }

    let start = placeholder.contents_offset + 1;
    let end = placeholder.contents_end() - 1;
    let region = &mut bytes[start..end];
    if let Some(pos) = region.iter().position(|b| !b.is_ascii_hexdigit()) {
        return Err(Error::PlaceholderMismatch {
            offset: start + pos,
            reason: "contents region holds a non-hex byte".to_string(),
        });
    }

    region[..hex.len()].copy_from_slice(hex.as_bytes());
    region[hex.len()..].fill(b'0');
    log::debug!(
        "Embedded {}-byte signature ({} of {} hex digits used)",
        signature.len(),
        hex.len(),
        placeholder.reserved_hex_capacity
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<u8>, SignaturePlaceholder) {
        let bytes = b"XX<00000000>YY".to_vec();
        let placeholder = SignaturePlaceholder {
            byte_range_offset: 0,
            byte_range_width: 0,
            contents_offset: 2,
            contents_length: 10,
            reserved_hex_capacity: 8,
            dictionary_offset: 0,
            metadata_offset: 12,
            metadata_capacity: 0,
            signature_object: 1,
            field_name: "Signature1".into(),
            total_length: bytes.len(),
        };
        (bytes, placeholder)
    }

    #[test]
    fn test_embed_pads_with_zeros() {
        let (mut bytes, placeholder) = sample();
        embed_signature(&mut bytes, &placeholder, &[0xAB, 0xCD]).unwrap();
        assert_eq!(&bytes, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_embed_exact_capacity() {
        let (mut bytes, placeholder) = sample();
        embed_signature(&mut bytes, &placeholder, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(&bytes, b"XX<DEADBEEF>YY");
    }

    #[test]
    fn test_reembed_overwrites_previous_signature() {
        let (mut bytes, placeholder) = sample();
        embed_signature(&mut bytes, &placeholder, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        embed_signature(&mut bytes, &placeholder, &[0x01]).unwrap();
        assert_eq!(&bytes, b"XX<01000000>YY");
    }

    #[test]
    fn test_too_large_leaves_bytes_unchanged() {
        let (mut bytes, placeholder) = sample();
        let before = bytes.clone();
        let err = embed_signature(&mut bytes, &placeholder, &[0xAA; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                required: 10,
                available: 8,
                ..
            }
        ));
        assert_eq!(bytes, before);
    }

    #[test]
    fn test_non_hex_region_is_mismatch() {
        let (mut bytes, placeholder) = sample();
        bytes[5] = b'z';
        assert!(matches!(
            embed_signature(&mut bytes, &placeholder, &[0x01]),
            Err(Error::PlaceholderMismatch { offset: 5, .. })
        ));
    }
}
