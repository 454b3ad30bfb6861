//! Signature placeholder insertion.
//!
//! Appends an incremental update holding a signature dictionary whose
//! `/ByteRange` and `/Contents` values are fixed-width templates, a
//! signature field widget on the first page, the rewritten page, AcroForm
//! and catalog. The offsets of the templates are recorded in a
//! [`SignaturePlaceholder`] so later stages can patch them in place.

use super::byterange::BYTE_RANGE_TEMPLATE;
use super::types::{AnnotationFlags, PreparedDocument, SignaturePlaceholder, SignatureSubFilter, SignatureVisibility};
use super::encode_text_string;
use crate::config::SigningConfig;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::{AcroFormBuilder, IncrementalUpdate};
use std::collections::HashSet;

/// What to reserve and where to put the field.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderOptions {
    /// Hex characters reserved in `/Contents` (must be even)
    pub reserved_hex_capacity: usize,
    /// Explicit field name, or `None` for the first free `Signature{n}`
    pub field_name: Option<String>,
    /// Widget placement
    pub visibility: SignatureVisibility,
    /// Whitespace reserved for the metadata patcher
    pub metadata_capacity: usize,
    /// `/SubFilter` value
    pub sub_filter: SignatureSubFilter,
}

impl From<&SigningConfig> for PlaceholderOptions {
    fn from(config: &SigningConfig) -> Self {
        Self {
            reserved_hex_capacity: config.reserved_hex_capacity(),
            field_name: config.field_name.clone(),
            visibility: config.visibility,
            metadata_capacity: config.metadata_capacity,
            sub_filter: config.sub_filter,
        }
    }
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self::from(&SigningConfig::default())
    }
}

fn insertion_error(reason: impl Into<String>) -> Error {
    Error::PlaceholderInsertion { reason: reason.into() }
}

/// Positions inside the serialized signature dictionary body.
struct DictionaryLayout {
    byte_range: usize,
    contents: usize,
    metadata: usize,
}

/// Serialize the signature dictionary with its reserved regions.
fn signature_dictionary(options: &PlaceholderOptions) -> (Vec<u8>, DictionaryLayout) {
    let mut body = Vec::with_capacity(options.reserved_hex_capacity + options.metadata_capacity + 160);
    body.extend_from_slice(b"<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /");
    body.extend_from_slice(options.sub_filter.as_pdf_name().as_bytes());
    body.extend_from_slice(b" /ByteRange ");
    let byte_range = body.len();
    body.extend_from_slice(BYTE_RANGE_TEMPLATE.as_bytes());
    body.extend_from_slice(b" /Contents ");
    let contents = body.len();
    body.push(b'<');
    body.resize(body.len() + options.reserved_hex_capacity, b'0');
    body.push(b'>');
    body.push(b' ');
    let metadata = body.len();
    body.resize(body.len() + options.metadata_capacity, b' ');
    body.extend_from_slice(b">>");

    (
        body,
        DictionaryLayout {
            byte_range,
            contents,
            metadata,
        },
    )
}

/// Partial names of the existing top-level fields.
fn existing_field_names(doc: &PdfDocument<'_>, fields: &[Object]) -> HashSet<String> {
    fields
        .iter()
        .filter_map(|field| match doc.resolve_dict(field) {
            Ok(dict) => dict.get("T").and_then(Object::as_text),
            Err(e) => {
                log::warn!("Skipping unreadable form field {:?}: {}", field, e);
                None
            },
        })
        .collect()
}

fn choose_field_name(requested: Option<&str>, taken: &HashSet<String>) -> Result<String> {
    match requested {
        Some(name) => {
            if name.is_empty() || name.contains('.') {
                return Err(insertion_error(format!("invalid field name {:?}", name)));
            }
            if taken.contains(name) {
                return Err(insertion_error(format!("a field named {:?} already exists", name)));
            }
            Ok(name.to_string())
        },
        None => {
            let mut n = 1;
            loop {
                let candidate = format!("Signature{}", n);
                if !taken.contains(&candidate) {
                    return Ok(candidate);
                }
                n += 1;
            }
        },
    }
}

fn widget_dictionary(
    name: &str,
    sig_ref: ObjectRef,
    page_ref: ObjectRef,
    visibility: &SignatureVisibility,
    appearance: Option<ObjectRef>,
) -> Dictionary {
    let rect = match visibility {
        SignatureVisibility::Invisible => [0.0; 4],
        SignatureVisibility::Visible { rect } => *rect,
    };
    let flags = AnnotationFlags::for_signature(visibility);

    let mut widget = Dictionary::new();
    widget.insert("Type".into(), Object::Name("Annot".into()));
    widget.insert("Subtype".into(), Object::Name("Widget".into()));
    widget.insert("FT".into(), Object::Name("Sig".into()));
    widget.insert("T".into(), Object::String(encode_text_string(name)));
    widget.insert("V".into(), Object::Reference(sig_ref));
    widget.insert("F".into(), Object::Integer(i64::from(flags.bits())));
    widget.insert("Rect".into(), Object::Array(rect.iter().map(|&v| Object::Real(v)).collect()));
    widget.insert("P".into(), Object::Reference(page_ref));
    if let Some(ap) = appearance {
        let mut ap_dict = Dictionary::new();
        ap_dict.insert("N".into(), Object::Reference(ap));
        widget.insert("AP".into(), Object::Dictionary(ap_dict));
    }
    widget
}

/// Empty form XObject sized to the widget, so viewers have something to draw.
fn empty_appearance(rect: &[f64; 4]) -> Object {
    let width = (rect[2] - rect[0]).abs();
    let height = (rect[3] - rect[1]).abs();
    let mut dict = Dictionary::new();
    dict.insert("Type".into(), Object::Name("XObject".into()));
    dict.insert("Subtype".into(), Object::Name("Form".into()));
    dict.insert(
        "BBox".into(),
        Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)]),
    );
    dict.insert("Resources".into(), Object::Dictionary(Dictionary::new()));
    Object::Stream {
        dict,
        data: bytes::Bytes::new(),
    }
}

/// Reserve a signature in `pdf` through an incremental update.
///
/// The returned bytes start with `pdf` unchanged. Fails with
/// [`Error::PlaceholderInsertion`] when the document structure cannot carry
/// a signature field.
pub fn insert_placeholder(pdf: &[u8], options: &PlaceholderOptions) -> Result<PreparedDocument> {
    if options.reserved_hex_capacity == 0 || options.reserved_hex_capacity % 2 != 0 {
        return Err(insertion_error(format!(
            "reserved hex capacity must be a positive even number, got {}",
            options.reserved_hex_capacity
        )));
    }

    let doc = PdfDocument::parse(pdf)
        .map_err(|e| insertion_error(format!("cannot read document structure: {}", e)))?;
    if doc.is_encrypted() {
        return Err(insertion_error("encrypted documents are not supported"));
    }

    let catalog_ref = doc.catalog_ref().map_err(|e| insertion_error(e.to_string()))?;
    let mut catalog = doc
        .catalog()
        .map_err(|e| insertion_error(format!("cannot resolve catalog: {}", e)))?;
    let (page_ref, mut page) = doc
        .first_page()
        .map_err(|e| insertion_error(format!("cannot locate first page: {}", e)))?;

    let existing_form = match catalog.get("AcroForm") {
        None | Some(Object::Null) => None,
        Some(obj) => {
            let dict = doc
                .resolve_dict(obj)
                .map_err(|e| insertion_error(format!("cannot resolve AcroForm: {}", e)))?;
            Some((obj.as_reference(), dict))
        },
    };
    let existing_fields = match existing_form.as_ref().and_then(|(_, form)| form.get("Fields")) {
        Some(fields) => doc
            .resolve_value(fields)
            .map_err(|e| insertion_error(format!("cannot resolve /Fields: {}", e)))?
            .as_array()
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    };
    let field_name = choose_field_name(
        options.field_name.as_deref(),
        &existing_field_names(&doc, &existing_fields),
    )?;

    let mut update = IncrementalUpdate::new(&doc);
    let sig_ref = update.allocate();
    let widget_ref = update.allocate();
    let acroform_ref = match existing_form.as_ref().and_then(|(r, _)| *r) {
        Some(r) => r,
        None => update.allocate(),
    };

    let appearance = match &options.visibility {
        SignatureVisibility::Visible { rect } => Some(update.add(&empty_appearance(rect))),
        SignatureVisibility::Invisible => None,
    };
    let widget = widget_dictionary(&field_name, sig_ref, page_ref, &options.visibility, appearance);
    update.put(widget_ref, &Object::Dictionary(widget));

    // The annotation array may live in its own object; rewrite whichever holds it
    match page.get("Annots").cloned() {
        Some(Object::Reference(annots_ref)) => {
            let mut annots = doc
                .resolve_value(&Object::Reference(annots_ref))
                .map_err(|e| insertion_error(format!("cannot resolve /Annots: {}", e)))?
                .as_array()
                .cloned()
                .unwrap_or_default();
            annots.push(Object::Reference(widget_ref));
            update.put(annots_ref, &Object::Array(annots));
        },
        Some(Object::Array(mut annots)) => {
            annots.push(Object::Reference(widget_ref));
            page.insert("Annots".into(), Object::Array(annots));
            update.put(page_ref, &Object::Dictionary(page));
        },
        _ => {
            page.insert("Annots".into(), Object::Array(vec![Object::Reference(widget_ref)]));
            update.put(page_ref, &Object::Dictionary(page));
        },
    }

    let base_form = existing_form.map(|(_, dict)| dict).unwrap_or_default();
    let mut acroform = AcroFormBuilder::from_existing(&base_form, existing_fields)
        .signatures_exist()
        .append_only();
    acroform.add_field(widget_ref);
    update.put(acroform_ref, &Object::Dictionary(acroform.build()));

    catalog.insert("AcroForm".into(), Object::Reference(acroform_ref));
    update.put(catalog_ref, &Object::Dictionary(catalog));

    let (body, layout) = signature_dictionary(options);
    update.put_raw(sig_ref, body);

    let output = update.write()?;
    let dictionary_offset = output
        .body_offsets
        .get(&sig_ref.id)
        .copied()
        .ok_or_else(|| insertion_error("signature dictionary missing from update"))?;

    let placeholder = SignaturePlaceholder {
        byte_range_offset: dictionary_offset + layout.byte_range,
        byte_range_width: BYTE_RANGE_TEMPLATE.len(),
        contents_offset: dictionary_offset + layout.contents,
        contents_length: options.reserved_hex_capacity + 2,
        reserved_hex_capacity: options.reserved_hex_capacity,
        dictionary_offset,
        metadata_offset: dictionary_offset + layout.metadata,
        metadata_capacity: options.metadata_capacity,
        signature_object: sig_ref.id,
        field_name,
        total_length: output.bytes.len(),
    };
    log::debug!(
        "Inserted placeholder {:?}: contents at {} (+{}), ByteRange at {}, {} -> {} bytes",
        placeholder.field_name,
        placeholder.contents_offset,
        placeholder.contents_length,
        placeholder.byte_range_offset,
        pdf.len(),
        placeholder.total_length
    );

    Ok(PreparedDocument {
        bytes: output.bytes,
        placeholder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_dictionary_layout() {
        let options = PlaceholderOptions {
            reserved_hex_capacity: 8,
            metadata_capacity: 4,
            ..Default::default()
        };
        let (body, layout) = signature_dictionary(&options);
        let text = String::from_utf8(body.clone()).unwrap();
        assert!(text.starts_with("<< /Type /Sig /Filter /Adobe.PPKLite /SubFilter /adbe.pkcs7.detached"));
        assert!(body[layout.byte_range..].starts_with(BYTE_RANGE_TEMPLATE.as_bytes()));
        assert_eq!(&body[layout.contents..layout.contents + 10], b"<00000000>");
        assert_eq!(&body[layout.metadata..], b"    >>");
    }

    #[test]
    fn test_choose_field_name() {
        let taken: HashSet<String> = ["Signature1".to_string(), "Signature2".to_string()].into();
        assert_eq!(choose_field_name(None, &taken).unwrap(), "Signature3");
        assert_eq!(choose_field_name(Some("Approval"), &taken).unwrap(), "Approval");
        assert!(matches!(
            choose_field_name(Some("Signature1"), &taken),
            Err(Error::PlaceholderInsertion { .. })
        ));
        assert!(choose_field_name(Some("a.b"), &taken).is_err());
    }

    #[test]
    fn test_odd_capacity_rejected() {
        let options = PlaceholderOptions {
            reserved_hex_capacity: 7,
            ..Default::default()
        };
        let err = insert_placeholder(b"%PDF-1.4\n", &options).unwrap_err();
        assert!(matches!(err, Error::PlaceholderInsertion { .. }));
    }

    #[test]
    fn test_missing_startxref_rejected() {
        let err = insert_placeholder(b"%PDF-1.4\n1 0 obj\n<< >>\nendobj\n", &PlaceholderOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::PlaceholderInsertion { .. }));
    }
}
