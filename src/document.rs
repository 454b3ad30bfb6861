//! Read-only PDF document index.
//!
//! [`PdfDocument`] borrows the file bytes and resolves indirect objects on
//! demand through the merged cross-reference chain. It never modifies the
//! input; rewriting happens by appending an incremental update built with
//! [`crate::writer::IncrementalUpdate`].

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::{parse_object_stream, ObjectStream};
use crate::parser::parse_indirect_object;
use crate::xref::{parse_xref_chain, CrossRefTable, XRefEntry, XRefFlavor};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Maximum depth when following reference chains (`1 0 R` → `2 0 R` → ...).
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maximum page tree depth walked while looking for the first page.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// Parsed PDF file, borrowing its bytes.
///
/// # Example
///
/// ```no_run
/// use pdf_seal::document::PdfDocument;
///
/// let bytes = std::fs::read("contract.pdf")?;
/// let doc = PdfDocument::parse(&bytes)?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// let catalog = doc.catalog()?;
/// assert_eq!(catalog.get("Type").and_then(|t| t.as_name()), Some("Catalog"));
/// # Ok::<(), pdf_seal::error::Error>(())
/// ```
pub struct PdfDocument<'a> {
    bytes: &'a [u8],
    version: (u8, u8),
    xref: CrossRefTable,
    object_streams: RefCell<HashMap<u32, Rc<ObjectStream>>>,
}

impl std::fmt::Debug for PdfDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("length", &self.bytes.len())
            .field("xref_entries", &self.xref.len())
            .field("xref_flavor", &self.xref.flavor())
            .finish_non_exhaustive()
    }
}

impl<'a> PdfDocument<'a> {
    /// Parse the header and cross-reference chain of `bytes`.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let version = parse_header(bytes)?;
        let xref = parse_xref_chain(bytes)?;
        log::debug!(
            "Parsed PDF {}.{}: {} xref entries, newest section {:?} at {}",
            version.0,
            version.1,
            xref.len(),
            xref.flavor(),
            xref.startxref()
        );
        Ok(Self {
            bytes,
            version,
            xref,
            object_streams: RefCell::new(HashMap::new()),
        })
    }

    /// The underlying file bytes.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// PDF version from the `%PDF-x.y` header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Newest trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Offset of the newest cross-reference section.
    pub fn startxref(&self) -> u64 {
        self.xref.startxref()
    }

    /// Whether the newest section is an xref stream.
    pub fn uses_xref_stream(&self) -> bool {
        self.xref.flavor() == XRefFlavor::Stream
    }

    /// Whether the trailer names an `/Encrypt` dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().get("Encrypt").is_some_and(|e| !e.is_null())
    }

    /// First object number not used by any existing object.
    pub fn next_object_number(&self) -> u32 {
        let size = self
            .trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);
        size.max(self.xref.max_object_number() + 1)
    }

    /// Load an indirect object.
    pub fn resolve(&self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.get(obj_ref.id) {
            Some(XRefEntry::Uncompressed { offset, generation }) => {
                if *generation != obj_ref.gen {
                    return Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen));
                }
                let start = usize::try_from(*offset).map_err(|_| Error::InvalidXref)?;
                let slice = self.bytes.get(start..).ok_or_else(|| {
                    Error::InvalidPdf(format!("object {} offset {} beyond end of file", obj_ref, start))
                })?;
                let (found, object) = parse_indirect_object(slice, start)?;
                if found.id != obj_ref.id {
                    log::warn!("xref entry for {} points at object {}", obj_ref, found);
                }
                Ok(object)
            },
            Some(XRefEntry::Compressed { stream, index }) => {
                let objstm = self.object_stream(*stream)?;
                objstm
                    .get(obj_ref.id)
                    .cloned()
                    .or_else(|| {
                        objstm
                            .get_by_index(*index)
                            .filter(|(number, _)| *number == obj_ref.id)
                            .map(|(_, obj)| obj.clone())
                    })
                    .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
            },
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Follow references until a direct object is reached.
    pub fn resolve_value(&self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => current = self.resolve(r)?,
                direct => return Ok(direct),
            }
        }
        Err(Error::InvalidPdf("reference chain too long".to_string()))
    }

    /// Resolve `obj` and require a dictionary (streams yield their dictionary).
    pub fn resolve_dict(&self, obj: &Object) -> Result<Dictionary> {
        match self.resolve_value(obj)? {
            Object::Dictionary(dict) | Object::Stream { dict, .. } => Ok(dict),
            other => Err(Error::InvalidPdf(format!("expected dictionary, found {}", other.type_name()))),
        }
    }

    fn object_stream(&self, number: u32) -> Result<Rc<ObjectStream>> {
        if let Some(cached) = self.object_streams.borrow().get(&number) {
            return Ok(Rc::clone(cached));
        }
        let stream_obj = match self.xref.get(number) {
            Some(XRefEntry::Uncompressed { generation, .. }) => {
                self.resolve(ObjectRef::new(number, *generation))?
            },
            _ => {
                return Err(Error::InvalidPdf(format!(
                    "object stream {} is not stored uncompressed",
                    number
                )))
            },
        };
        let parsed = Rc::new(parse_object_stream(&stream_obj)?);
        log::debug!("Loaded object stream {} with {} objects", number, parsed.len());
        self.object_streams.borrow_mut().insert(number, Rc::clone(&parsed));
        Ok(parsed)
    }

    /// Reference held by the trailer's `/Root`.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))
    }

    /// The document catalog dictionary.
    pub fn catalog(&self) -> Result<Dictionary> {
        let catalog = self.resolve_dict(&Object::Reference(self.catalog_ref()?))?;
        if catalog.get("Type").and_then(Object::as_name) != Some("Catalog") {
            log::warn!("Catalog dictionary lacks /Type /Catalog");
        }
        Ok(catalog)
    }

    /// First leaf of the page tree, with its reference.
    pub fn first_page(&self) -> Result<(ObjectRef, Dictionary)> {
        let catalog = self.catalog()?;
        let mut node_ref = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;
        let mut visited = HashSet::new();

        for _ in 0..MAX_PAGE_TREE_DEPTH {
            if !visited.insert(node_ref) {
                return Err(Error::InvalidPdf(format!("page tree cycle at {}", node_ref)));
            }
            let node = self.resolve_dict(&Object::Reference(node_ref))?;
            let is_pages = node.get("Type").and_then(Object::as_name) == Some("Pages");
            let kids = match node.get("Kids") {
                Some(kids) if is_pages => self.resolve_value(kids)?,
                _ => return Ok((node_ref, node)),
            };
            node_ref = kids
                .as_array()
                .and_then(|k| k.first())
                .and_then(Object::as_reference)
                .ok_or_else(|| Error::InvalidPdf("document has no pages".to_string()))?;
        }

        Err(Error::InvalidPdf("page tree too deep".to_string()))
    }
}

/// Read the `%PDF-x.y` header, which may be preceded by garbage.
pub fn parse_header(bytes: &[u8]) -> Result<(u8, u8)> {
    let marker = b"%PDF-";
    let window = &bytes[..bytes.len().min(1024)];
    let pos = window
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| Error::InvalidPdf("missing %PDF- header".to_string()))?;
    if pos > 0 {
        log::warn!("PDF header found at offset {} instead of 0", pos);
    }

    let version = &bytes[pos + marker.len()..];
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => Ok((major - b'0', minor - b'0')),
        _ => Err(Error::InvalidPdf("malformed PDF version in header".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a classic-xref file from object bodies numbered from 1.
    fn build_pdf(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                trailer_extra,
                xref
            )
            .as_bytes(),
        );
        pdf
    }

    fn simple_pdf() -> Vec<u8> {
        build_pdf(
            &[
                "<< /Type /Catalog /Pages 2 0 R >>",
                "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
            ],
            "",
        )
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), (1, 7));
        assert_eq!(parse_header(b"junk%PDF-2.0\n").unwrap(), (2, 0));
        assert!(parse_header(b"not a pdf").is_err());
    }

    #[test]
    fn test_catalog_and_first_page() {
        let pdf = simple_pdf();
        let doc = PdfDocument::parse(&pdf).unwrap();
        assert_eq!(doc.version(), (1, 7));
        assert_eq!(doc.catalog_ref().unwrap(), ObjectRef::new(1, 0));

        let (page_ref, page) = doc.first_page().unwrap();
        assert_eq!(page_ref, ObjectRef::new(3, 0));
        assert_eq!(page["Type"].as_name(), Some("Page"));
        assert!(!doc.uses_xref_stream());
        assert!(!doc.is_encrypted());
    }

    #[test]
    fn test_next_object_number() {
        let pdf = simple_pdf();
        let doc = PdfDocument::parse(&pdf).unwrap();
        assert_eq!(doc.next_object_number(), 4);
    }

    #[test]
    fn test_missing_object() {
        let pdf = simple_pdf();
        let doc = PdfDocument::parse(&pdf).unwrap();
        assert!(matches!(doc.resolve(ObjectRef::new(9, 0)), Err(Error::ObjectNotFound(9, 0))));
        assert!(matches!(doc.resolve(ObjectRef::new(1, 3)), Err(Error::ObjectNotFound(1, 3))));
    }

    #[test]
    fn test_encrypted_flag() {
        let pdf = build_pdf(
            &["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] /Count 0 >>", "<< /Filter /Standard >>"],
            "/Encrypt 3 0 R",
        );
        let doc = PdfDocument::parse(&pdf).unwrap();
        assert!(doc.is_encrypted());
    }

    #[test]
    fn test_empty_page_tree() {
        let pdf = build_pdf(&["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] /Count 0 >>"], "");
        let doc = PdfDocument::parse(&pdf).unwrap();
        assert!(doc.first_page().is_err());
    }
}
