//! Structural inspection of signatures in a PDF.
//!
//! Walks the AcroForm field tree for signed `/FT /Sig` fields and checks
//! each ByteRange against the file: that it starts at 0, covers the file
//! to its last byte and excludes exactly one `<hex>` string. Cryptographic
//! validation of the CMS blob is left to the caller.

use super::byterange::validate_byte_range;
use super::digest::digest_for;
use super::types::{ByteRange, DigestAlgorithm, SignatureSubFilter, SignerMetadata};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::object::{Dictionary, Object};
use chrono::{DateTime, FixedOffset};

const MAX_FIELD_DEPTH: usize = 32;

/// Results of the structural checks on one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureCheck {
    /// ByteRange starts at 0, ends at the file length and does not overlap
    pub byte_range_valid: bool,
    /// The gap opens with `<` and closes with `>`
    pub delimiters_ok: bool,
    /// Everything inside the delimiters is a hex digit
    pub gap_is_hex: bool,
    /// The signature covers the whole file (no later update follows it)
    pub covers_whole_file: bool,
}

impl SignatureCheck {
    /// Whether every check passed.
    pub fn is_intact(&self) -> bool {
        self.byte_range_valid && self.delimiters_ok && self.gap_is_hex
    }
}

/// One signed field.
#[derive(Debug, Clone)]
pub struct SignatureReport {
    /// Fully qualified field name
    pub field_name: String,
    /// `/SubFilter`, when recognized
    pub sub_filter: Option<SignatureSubFilter>,
    /// ByteRange as stored, when it has four integers
    pub byte_range: Option<ByteRange>,
    /// Signature blob with the zero padding stripped
    pub contents: Vec<u8>,
    /// Signer details from the signature dictionary
    pub metadata: SignerMetadata,
    /// Structural checks
    pub checks: SignatureCheck,
}

impl SignatureReport {
    /// Recompute the digest the signer was given.
    pub fn digest(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Option<Result<Vec<u8>>> {
        self.byte_range.map(|range| digest_for(bytes, &range, algorithm))
    }
}

/// Parse `D:YYYYMMDDHHmmSS+HH'mm'` (or a trailing `Z`).
fn parse_pdf_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let body = raw.strip_prefix("D:").unwrap_or(raw);
    let normalized = if let Some(stamp) = body.strip_suffix('Z') {
        format!("{}+0000", stamp)
    } else {
        body.replace('\'', "")
    };
    DateTime::parse_from_str(&normalized, "%Y%m%d%H%M%S%z").ok()
}

fn read_byte_range(dict: &Dictionary) -> Option<ByteRange> {
    let values = dict.get("ByteRange")?.as_array()?;
    if values.len() != 4 {
        return None;
    }
    let mut out = [0usize; 4];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = usize::try_from(value.as_integer()?).ok()?;
    }
    Some(ByteRange::from_array(out))
}

fn read_metadata(dict: &Dictionary) -> SignerMetadata {
    let text = |key: &str| dict.get(key).and_then(Object::as_text);
    SignerMetadata {
        name: text("Name"),
        reason: text("Reason"),
        location: text("Location"),
        contact_info: text("ContactInfo"),
        signing_time: text("M").as_deref().and_then(parse_pdf_date),
    }
}

/// Every check fails when the ByteRange arithmetic overflows.
fn check_range(bytes: &[u8], range: &ByteRange) -> SignatureCheck {
    let (Some(first), Some(second)) = (range.first_span(), range.second_span()) else {
        return SignatureCheck::default();
    };
    let mut checks = SignatureCheck {
        byte_range_valid: validate_byte_range(range, bytes.len()).is_ok(),
        covers_whole_file: second.end == bytes.len(),
        ..SignatureCheck::default()
    };
    let open = first.end;
    match open.checked_add(2) {
        Some(min_start2) if range.start2 >= min_start2 && range.start2 <= bytes.len() => {},
        _ => return checks,
    }
    checks.delimiters_ok = bytes[open] == b'<' && bytes[range.start2 - 1] == b'>';
    checks.gap_is_hex = bytes[open + 1..range.start2 - 1]
        .iter()
        .all(|b| b.is_ascii_hexdigit());
    checks
}

fn report_for(doc: &PdfDocument<'_>, field_name: String, value: &Object) -> Result<SignatureReport> {
    let sig = doc.resolve_dict(value)?;
    let byte_range = read_byte_range(&sig);
    let checks = byte_range
        .map(|range| check_range(doc.bytes(), &range))
        .unwrap_or_default();

    let mut contents = sig
        .get("Contents")
        .and_then(Object::as_string)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    while contents.last() == Some(&0) {
        contents.pop();
    }

    Ok(SignatureReport {
        field_name,
        sub_filter: sig
            .get("SubFilter")
            .and_then(Object::as_name)
            .and_then(SignatureSubFilter::from_pdf_name),
        byte_range,
        contents,
        metadata: read_metadata(&sig),
        checks,
    })
}

fn walk_fields(
    doc: &PdfDocument<'_>,
    fields: &[Object],
    parent_name: Option<&str>,
    inherited_type: Option<&str>,
    depth: usize,
    out: &mut Vec<SignatureReport>,
) -> Result<()> {
    if depth > MAX_FIELD_DEPTH {
        log::warn!("Field tree deeper than {} levels, ignoring the rest", MAX_FIELD_DEPTH);
        return Ok(());
    }
    for field in fields {
        let dict = match doc.resolve_dict(field) {
            Ok(dict) => dict,
            Err(e) => {
                log::warn!("Skipping unreadable form field: {}", e);
                continue;
            },
        };
        let partial = dict.get("T").and_then(Object::as_text);
        let name = match (parent_name, partial) {
            (Some(parent), Some(partial)) => format!("{}.{}", parent, partial),
            (None, Some(partial)) => partial,
            (Some(parent), None) => parent.to_string(),
            (None, None) => String::new(),
        };
        let field_type = dict.get("FT").and_then(Object::as_name).or(inherited_type);

        if let Some(kids) = dict.get("Kids") {
            let kids = doc.resolve_value(kids)?;
            if let Some(kids) = kids.as_array() {
                walk_fields(doc, kids, Some(&name), field_type, depth + 1, out)?;
            }
        }
        if field_type == Some("Sig") {
            if let Some(value) = dict.get("V").filter(|v| !v.is_null()) {
                out.push(report_for(doc, name, value)?);
            }
        }
    }
    Ok(())
}

/// Every signed signature field in `bytes`, in field-tree order.
pub fn inspect_signatures(bytes: &[u8]) -> Result<Vec<SignatureReport>> {
    let doc = PdfDocument::parse(bytes)?;
    let catalog = doc.catalog()?;
    let Some(acroform) = catalog.get("AcroForm") else {
        return Ok(Vec::new());
    };
    let acroform = doc.resolve_dict(acroform)?;
    let fields = match acroform.get("Fields") {
        Some(fields) => doc.resolve_value(fields)?,
        None => return Ok(Vec::new()),
    };

    let mut reports = Vec::new();
    if let Some(fields) = fields.as_array() {
        walk_fields(&doc, fields, None, None, 0, &mut reports)?;
    }
    log::debug!("Found {} signed field(s)", reports.len());
    Ok(reports)
}
