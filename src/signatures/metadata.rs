//! In-place signer metadata for the signature dictionary.
//!
//! The placeholder reserves a run of spaces just before the dictionary's
//! closing `>>`. Patching overwrites the start of that run with `/Name`,
//! `/Reason`, `/Location`, `/ContactInfo` and `/M` entries; the remainder
//! stays whitespace, so the file length and every recorded offset hold.
//! Runs before the ByteRange is finalized and the digest is taken.

use super::bytes_to_hex;
use super::types::{SignaturePlaceholder, SignerMetadata};
use super::utf16be_with_bom;
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};

/// Format a PDF date string `D:YYYYMMDDHHmmSS+HH'mm'` (ISO 32000-1, 7.9.4).
///
/// ```
/// use chrono::DateTime;
/// use pdf_seal::signatures::format_pdf_date;
///
/// let t = DateTime::parse_from_rfc3339("2024-03-05T14:07:09-03:30").unwrap();
/// assert_eq!(format_pdf_date(&t), "D:20240305140709-03'30'");
/// ```
pub fn format_pdf_date(time: &DateTime<FixedOffset>) -> String {
    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!("D:{}{}{:02}'{:02}'", time.format("%Y%m%d%H%M%S"), sign, minutes / 60, minutes % 60)
}

fn not_found(offset: usize, reason: impl Into<String>) -> Error {
    Error::SignatureDictionaryNotFound {
        offset,
        reason: reason.into(),
    }
}

/// Serialized entries for `metadata`, each preceded by a space.
fn metadata_entries(metadata: &SignerMetadata) -> Vec<u8> {
    let mut out = Vec::new();
    let text_fields = [
        ("Name", &metadata.name),
        ("Reason", &metadata.reason),
        ("Location", &metadata.location),
        ("ContactInfo", &metadata.contact_info),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            out.extend_from_slice(format!(" /{} <{}>", key, bytes_to_hex(&utf16be_with_bom(value))).as_bytes());
        }
    }
    if let Some(time) = &metadata.signing_time {
        out.extend_from_slice(format!(" /M ({})", format_pdf_date(time)).as_bytes());
    }
    out
}

/// Verify the signature dictionary at the recorded offsets.
fn locate_slot(bytes: &[u8], placeholder: &SignaturePlaceholder) -> Result<std::ops::Range<usize>> {
    let dict_start = placeholder.dictionary_offset;
    if !bytes.get(dict_start..).is_some_and(|b| b.starts_with(b"<<")) {
        return Err(not_found(dict_start, "no dictionary opens at the recorded offset"));
    }
    let slot_start = placeholder.metadata_offset;
    let slot_end = slot_start + placeholder.metadata_capacity;
    if slot_start < dict_start || slot_end > bytes.len() {
        return Err(not_found(slot_start, "metadata slot lies outside the document"));
    }

    let header = &bytes[dict_start..slot_start];
    if !header.windows(b"/Type /Sig".len()).any(|w| w == b"/Type /Sig") {
        return Err(not_found(dict_start, "dictionary is not /Type /Sig"));
    }
    if let Some(pos) = bytes[slot_start..slot_end].iter().position(|&b| b != b' ') {
        return Err(not_found(slot_start + pos, "metadata slot is not untouched whitespace"));
    }
    if !bytes[slot_end..].starts_with(b">>") {
        return Err(not_found(slot_end, "metadata slot does not end at the dictionary close"));
    }
    Ok(slot_start..slot_end)
}

/// Write `metadata` into the reserved slot of the signature dictionary.
///
/// Fails with [`Error::SignatureDictionaryNotFound`] on a structural
/// mismatch and [`Error::CapacityExceeded`] when the entries do not fit;
/// in both cases `bytes` is left unchanged.
pub fn patch_metadata(bytes: &mut [u8], placeholder: &SignaturePlaceholder, metadata: &SignerMetadata) -> Result<()> {
    let slot = locate_slot(bytes, placeholder)?;
    let entries = metadata_entries(metadata);
    if entries.len() > slot.len() {
        return Err(Error::CapacityExceeded {
            region: "signature metadata",
            required: entries.len(),
            available: slot.len(),
        });
    }

    bytes[slot.start..slot.start + entries.len()].copy_from_slice(&entries);
    log::debug!("Patched {} bytes of signer metadata at offset {}", entries.len(), slot.start);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_object;

    fn sample(capacity: usize) -> (Vec<u8>, SignaturePlaceholder) {
        let mut bytes = b"1 0 obj\n".to_vec();
        let dictionary_offset = bytes.len();
        bytes.extend_from_slice(b"<< /Type /Sig /Contents <0000> ");
        let metadata_offset = bytes.len();
        bytes.resize(bytes.len() + capacity, b' ');
        bytes.extend_from_slice(b">>\nendobj\n");
        let placeholder = SignaturePlaceholder {
            byte_range_offset: 0,
            byte_range_width: 0,
            contents_offset: dictionary_offset + 24,
            contents_length: 6,
            reserved_hex_capacity: 4,
            dictionary_offset,
            metadata_offset,
            metadata_capacity: capacity,
            signature_object: 1,
            field_name: "Signature1".into(),
            total_length: bytes.len(),
        };
        (bytes, placeholder)
    }

    #[test]
    fn test_patch_writes_entries_and_keeps_length() {
        let (mut bytes, placeholder) = sample(256);
        let len = bytes.len();
        let time = DateTime::parse_from_rfc3339("2025-01-02T03:04:05+00:00").unwrap();
        let metadata = SignerMetadata::new()
            .with_name("José")
            .with_reason("Contract approval")
            .with_signing_time(time);
        patch_metadata(&mut bytes, &placeholder, &metadata).unwrap();
        assert_eq!(bytes.len(), len);

        let (_, dict) = parse_object(&bytes[placeholder.dictionary_offset..]).unwrap();
        let dict = dict.as_dict().unwrap();
        assert_eq!(dict["Name"].as_text().as_deref(), Some("José"));
        assert_eq!(dict["Reason"].as_text().as_deref(), Some("Contract approval"));
        assert_eq!(dict["M"].as_string(), Some(&b"D:20250102030405+00'00'"[..]));
        assert!(!dict.contains_key("Location"));
    }

    #[test]
    fn test_capacity_exceeded_leaves_bytes() {
        let (mut bytes, placeholder) = sample(8);
        let before = bytes.clone();
        let err = patch_metadata(&mut bytes, &placeholder, &SignerMetadata::new().with_reason("Too long"))
            .unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { available: 8, .. }));
        assert_eq!(bytes, before);
    }

    #[test]
    fn test_structural_mismatch() {
        let (mut bytes, mut placeholder) = sample(64);
        placeholder.dictionary_offset += 1;
        assert!(matches!(
            patch_metadata(&mut bytes, &placeholder, &SignerMetadata::new().with_name("A")),
            Err(Error::SignatureDictionaryNotFound { .. })
        ));

        let (mut bytes, placeholder) = sample(64);
        patch_metadata(&mut bytes, &placeholder, &SignerMetadata::new().with_name("A")).unwrap();
        // The slot is no longer untouched
        assert!(patch_metadata(&mut bytes, &placeholder, &SignerMetadata::new().with_name("B")).is_err());
    }

    #[test]
    fn test_negative_offset_date() {
        let t = DateTime::parse_from_rfc3339("1999-12-31T23:59:59-08:00").unwrap();
        assert_eq!(format_pdf_date(&t), "D:19991231235959-08'00'");
    }
}
