//! ByteRange finalization for PDF signatures.
//!
//! The ByteRange array specifies which portions of the document are covered
//! by the signature: `[offset1 length1 offset2 length2]` where
//!
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! The placeholder reserves a fixed-width slot for the array; finalizing
//! writes the real values as decimal ASCII and pads the rest with spaces,
//! so the file length never changes and running it twice is a no-op.

use super::types::{ByteRange, SignaturePlaceholder};
use crate::error::{Error, Result};

/// Digits reserved for each of the three variable ByteRange integers.
pub const BYTE_RANGE_DIGITS: usize = 10;

/// Fixed-width ByteRange template written by the placeholder inserter.
pub const BYTE_RANGE_TEMPLATE: &str = "[0 0000000000 0000000000 0000000000]";

fn mismatch(offset: usize, reason: impl Into<String>) -> Error {
    Error::PlaceholderMismatch {
        offset,
        reason: reason.into(),
    }
}

/// Check that `bytes` still has the layout `placeholder` describes.
pub(crate) fn check_layout(bytes: &[u8], placeholder: &SignaturePlaceholder) -> Result<()> {
    if bytes.len() != placeholder.total_length {
        return Err(mismatch(
            bytes.len(),
            format!("document is {} bytes, placeholder recorded {}", bytes.len(), placeholder.total_length),
        ));
    }
    if placeholder.contents_length != placeholder.reserved_hex_capacity + 2
        || placeholder.contents_end() > bytes.len()
    {
        return Err(mismatch(placeholder.contents_offset, "contents region out of bounds"));
    }
    if bytes[placeholder.contents_offset] != b'<' || bytes[placeholder.contents_end() - 1] != b'>' {
        return Err(mismatch(placeholder.contents_offset, "contents region is not delimited by < >"));
    }
    Ok(())
}

/// Validate the ByteRange slot: `[`, then digits and spaces, then `]`, then spaces.
fn check_slot(bytes: &[u8], placeholder: &SignaturePlaceholder) -> Result<()> {
    let start = placeholder.byte_range_offset;
    let slot = start
        .checked_add(placeholder.byte_range_width)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| mismatch(start, "ByteRange slot out of bounds"))?;

    let close = slot
        .iter()
        .position(|&b| b == b']')
        .ok_or_else(|| mismatch(start, "ByteRange slot has no closing bracket"))?;
    let well_formed = slot.first() == Some(&b'[')
        && slot[1..close].iter().all(|&b| b.is_ascii_digit() || b == b' ')
        && slot[close + 1..].iter().all(|&b| b == b' ');
    if !well_formed {
        return Err(mismatch(start, "ByteRange slot does not hold a ByteRange array"));
    }
    Ok(())
}

/// Format `range` padded with spaces to `width`.
fn format_padded(range: &ByteRange, width: usize) -> Result<String> {
    for value in range.as_array() {
        if value.to_string().len() > BYTE_RANGE_DIGITS {
            return Err(Error::ByteRangeOverflow {
                value,
                width: BYTE_RANGE_DIGITS,
            });
        }
    }
    let text = range.to_string();
    if text.len() > width {
        return Err(Error::ByteRangeOverflow {
            value: range.end().unwrap_or(usize::MAX),
            width,
        });
    }
    Ok(format!("{:<width$}", text, width = width))
}

/// Write the real ByteRange into the reserved slot.
///
/// Span 1 is `[0, contents_offset)`, span 2 is
/// `[contents_offset + contents_length, total_length)`. Idempotent.
pub fn finalize_byte_range(bytes: &mut [u8], placeholder: &SignaturePlaceholder) -> Result<ByteRange> {
    check_layout(bytes, placeholder)?;
    check_slot(bytes, placeholder)?;

    let range = placeholder.byte_range();
    let text = format_padded(&range, placeholder.byte_range_width)?;
    let start = placeholder.byte_range_offset;
    bytes[start..start + placeholder.byte_range_width].copy_from_slice(text.as_bytes());

    log::debug!("Finalized ByteRange {} at offset {}", range, start);
    Ok(range)
}

/// Check a ByteRange read from a signed file against the file length.
pub fn validate_byte_range(range: &ByteRange, file_size: usize) -> std::result::Result<(), String> {
    if range.start1 != 0 {
        return Err(format!("ByteRange must start at 0, got {}", range.start1));
    }
    match range.end() {
        Some(end) if end == file_size => {},
        Some(end) => return Err(format!("ByteRange must end at file size {}, got {}", file_size, end)),
        None => return Err(format!("ByteRange {} overflows", range)),
    }
    if range.length1 > range.start2 {
        return Err(format!(
            "ByteRange first range ({}) overlaps with second range start ({})",
            range.length1, range.start2
        ));
    }
    Ok(())
}

/// Concatenate the two spans of `range`.
pub fn extract_signed_bytes(pdf_data: &[u8], range: &ByteRange) -> Result<Vec<u8>> {
    let first = range.first_span().and_then(|span| pdf_data.get(span));
    let second = range.second_span().and_then(|span| pdf_data.get(span));
    match (first, second) {
        (Some(a), Some(b)) => Ok([a, b].concat()),
        _ => Err(Error::InvalidPdf(format!(
            "ByteRange {} exceeds file size {}",
            range,
            pdf_data.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `HEAD` + slot + ` <0000> ` + `TAIL`, with a matching placeholder.
    fn sample() -> (Vec<u8>, SignaturePlaceholder) {
        let mut bytes = b"HEAD/ByteRange ".to_vec();
        let byte_range_offset = bytes.len();
        bytes.extend_from_slice(BYTE_RANGE_TEMPLATE.as_bytes());
        bytes.extend_from_slice(b" /Contents ");
        let contents_offset = bytes.len();
        bytes.extend_from_slice(b"<0000>");
        bytes.extend_from_slice(b" >>TAIL");
        let placeholder = SignaturePlaceholder {
            byte_range_offset,
            byte_range_width: BYTE_RANGE_TEMPLATE.len(),
            contents_offset,
            contents_length: 6,
            reserved_hex_capacity: 4,
            dictionary_offset: 0,
            metadata_offset: contents_offset + 7,
            metadata_capacity: 0,
            signature_object: 1,
            field_name: "Signature1".into(),
            total_length: bytes.len(),
        };
        (bytes, placeholder)
    }

    #[test]
    fn test_template_width() {
        assert_eq!(BYTE_RANGE_TEMPLATE.len(), 36);
    }

    #[test]
    fn test_finalize_writes_padded_range() {
        let (mut bytes, placeholder) = sample();
        let len = bytes.len();
        let range = finalize_byte_range(&mut bytes, &placeholder).unwrap();

        assert_eq!(bytes.len(), len);
        assert_eq!(range.length1, placeholder.contents_offset);
        assert_eq!(range.start2, placeholder.contents_offset + 6);
        let slot = &bytes[placeholder.byte_range_offset..placeholder.byte_range_offset + 36];
        let expected = format!("{:<36}", range.to_string());
        assert_eq!(slot, expected.as_bytes());
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let (mut bytes, placeholder) = sample();
        finalize_byte_range(&mut bytes, &placeholder).unwrap();
        let once = bytes.clone();
        finalize_byte_range(&mut bytes, &placeholder).unwrap();
        assert_eq!(bytes, once);
    }

    #[test]
    fn test_overflow() {
        let range = ByteRange::from_array([0, 12_345_678_901, 12_345_678_910, 5]);
        assert!(matches!(format_padded(&range, 36), Err(Error::ByteRangeOverflow { width: 10, .. })));
    }

    #[test]
    fn test_mismatched_layout() {
        let (mut bytes, mut placeholder) = sample();
        placeholder.contents_offset += 1;
        assert!(matches!(
            finalize_byte_range(&mut bytes, &placeholder),
            Err(Error::PlaceholderMismatch { .. })
        ));

        let (mut bytes, placeholder) = sample();
        bytes[placeholder.byte_range_offset + 3] = b'x';
        assert!(finalize_byte_range(&mut bytes, &placeholder).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        assert!(validate_byte_range(&ByteRange::from_array([0, 100, 150, 50]), 200).is_ok());
        assert!(validate_byte_range(&ByteRange::from_array([10, 100, 150, 50]), 200).is_err());
        assert!(validate_byte_range(&ByteRange::from_array([0, 100, 150, 100]), 200).is_err());
        assert!(validate_byte_range(&ByteRange::from_array([0, 160, 150, 50]), 200).is_err());
        assert!(validate_byte_range(&ByteRange::from_array([0, 1, usize::MAX, usize::MAX]), 200).is_err());
    }

    #[test]
    fn test_extract_signed_bytes() {
        let signed = extract_signed_bytes(b"AAABBBCCC", &ByteRange::from_array([0, 3, 6, 3])).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(extract_signed_bytes(b"AAA", &ByteRange::from_array([0, 3, 6, 3])).is_err());
        let wrapping = ByteRange::from_array([usize::MAX, 2, usize::MAX, 2]);
        assert!(extract_signed_bytes(b"AAABBBCCC", &wrapping).is_err());
    }
}
