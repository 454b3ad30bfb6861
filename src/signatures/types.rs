//! Digital signature types and data structures.

use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Digest algorithm used for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-1 (deprecated, but still common in legacy PDFs)
    Sha1,
    /// SHA-256 (recommended)
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Get the DER-encoded OID for this digest algorithm.
    pub fn oid(&self) -> &'static [u8] {
        match self {
            DigestAlgorithm::Sha1 => &[0x2B, 0x0E, 0x03, 0x02, 0x1A], // 1.3.14.3.2.26
            DigestAlgorithm::Sha256 => &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01], // 2.16.840.1.101.3.4.2.1
            DigestAlgorithm::Sha384 => &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02], // 2.16.840.1.101.3.4.2.2
            DigestAlgorithm::Sha512 => &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03], // 2.16.840.1.101.3.4.2.3
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest size in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Parse `SHA-256`, `sha256`, `SHA256`, ...
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Some(DigestAlgorithm::Sha1),
            "SHA256" => Some(DigestAlgorithm::Sha256),
            "SHA384" => Some(DigestAlgorithm::Sha384),
            "SHA512" => Some(DigestAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// Signature sub-filter type (signature format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached - PKCS#7 detached signature
    #[default]
    Pkcs7Detached,
    /// adbe.pkcs7.sha1 - PKCS#7 with SHA-1 digest
    Pkcs7Sha1,
    /// ETSI.CAdES.detached - PAdES CAdES signature
    CadesDetached,
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
        }
    }

    /// Parse a PDF name into a sub-filter type.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        match name {
            "adbe.pkcs7.detached" => Some(SignatureSubFilter::Pkcs7Detached),
            "adbe.pkcs7.sha1" => Some(SignatureSubFilter::Pkcs7Sha1),
            "ETSI.CAdES.detached" => Some(SignatureSubFilter::CadesDetached),
            _ => None,
        }
    }
}

/// Where the signature widget appears.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SignatureVisibility {
    /// Zero-size hidden widget
    #[default]
    Invisible,
    /// Widget on the first page at `[llx, lly, urx, ury]` (user space units)
    Visible {
        /// Widget rectangle
        rect: [f64; 4],
    },
}

bitflags! {
    /// Annotation flags (ISO 32000-1:2008, Table 165).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AnnotationFlags: u32 {
        /// Do not display unknown annotation types
        const INVISIBLE = 1;
        /// Do not display or print
        const HIDDEN = 1 << 1;
        /// Print with the page
        const PRINT = 1 << 2;
        /// Do not scale with page zoom
        const NO_ZOOM = 1 << 3;
        /// Do not rotate with the page
        const NO_ROTATE = 1 << 4;
        /// Do not display on screen
        const NO_VIEW = 1 << 5;
        /// No user interaction
        const READ_ONLY = 1 << 6;
        /// Annotation cannot be deleted or have its properties changed
        const LOCKED = 1 << 7;
    }
}

impl AnnotationFlags {
    /// Flags for a signature widget with the given visibility.
    pub fn for_signature(visibility: &SignatureVisibility) -> Self {
        let flags = AnnotationFlags::PRINT | AnnotationFlags::LOCKED;
        match visibility {
            SignatureVisibility::Invisible => flags | AnnotationFlags::HIDDEN,
            SignatureVisibility::Visible { .. } => flags,
        }
    }
}

/// `[start1 length1 start2 length2]` covering everything but the contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// Start of the first span (always 0)
    pub start1: usize,
    /// Length of the first span (offset of `<`)
    pub length1: usize,
    /// Start of the second span (just after `>`)
    pub start2: usize,
    /// Length of the second span (to end of file)
    pub length2: usize,
}

impl ByteRange {
    /// The four integers in PDF order.
    pub fn as_array(&self) -> [usize; 4] {
        [self.start1, self.length1, self.start2, self.length2]
    }

    /// Build from four integers in PDF order.
    pub fn from_array(values: [usize; 4]) -> Self {
        Self {
            start1: values[0],
            length1: values[1],
            start2: values[2],
            length2: values[3],
        }
    }

    /// `start1..start1 + length1`, or `None` if the end overflows.
    pub fn first_span(&self) -> Option<std::ops::Range<usize>> {
        Some(self.start1..self.start1.checked_add(self.length1)?)
    }

    /// `start2..start2 + length2`, or `None` if the end overflows.
    pub fn second_span(&self) -> Option<std::ops::Range<usize>> {
        Some(self.start2..self.start2.checked_add(self.length2)?)
    }

    /// End of the second span, i.e. the file length it claims to cover.
    ///
    /// Values read from a file can be arbitrary; `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        self.start2.checked_add(self.length2)
    }

    /// Number of excluded bytes between the spans, `None` if the spans
    /// overlap or overflow.
    pub fn gap(&self) -> Option<usize> {
        self.start2.checked_sub(self.first_span()?.end)
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {} {} {}]", self.start1, self.length1, self.start2, self.length2)
    }
}

/// Layout of the reserved regions in a prepared PDF.
///
/// Every offset is absolute within the prepared bytes. Persist this record
/// between preparation and embedding; later stages never re-scan the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePlaceholder {
    /// Offset of the `[` starting the ByteRange array
    pub byte_range_offset: usize,
    /// Fixed width of the ByteRange text including brackets
    pub byte_range_width: usize,
    /// Offset of the `<` starting the contents hex string
    pub contents_offset: usize,
    /// Length of the contents region including `<` and `>`
    pub contents_length: usize,
    /// Hex characters available for the signature
    pub reserved_hex_capacity: usize,
    /// Offset of the `<<` opening the signature dictionary
    pub dictionary_offset: usize,
    /// Offset of the whitespace slot reserved for signer metadata
    pub metadata_offset: usize,
    /// Width of the metadata slot
    pub metadata_capacity: usize,
    /// Object number of the signature dictionary
    pub signature_object: u32,
    /// Partial name (`/T`) of the signature field
    pub field_name: String,
    /// Length of the prepared bytes
    pub total_length: usize,
}

impl SignaturePlaceholder {
    /// First byte after the contents region.
    pub fn contents_end(&self) -> usize {
        self.contents_offset + self.contents_length
    }

    /// Largest signature (in bytes) the reserved region accepts.
    pub fn signature_capacity(&self) -> usize {
        self.reserved_hex_capacity / 2
    }

    /// The ByteRange these offsets imply.
    pub fn byte_range(&self) -> ByteRange {
        ByteRange {
            start1: 0,
            length1: self.contents_offset,
            start2: self.contents_end(),
            length2: self.total_length.saturating_sub(self.contents_end()),
        }
    }
}

/// Prepared bytes plus the layout of their reserved regions.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    /// Original bytes followed by the signing update
    pub bytes: Vec<u8>,
    /// Where the reserved regions are
    pub placeholder: SignaturePlaceholder,
}

/// Final signed document.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    /// Signed PDF bytes, same length as the prepared document
    pub bytes: Vec<u8>,
    /// Digest that was handed to the signer
    pub digest: Vec<u8>,
    /// Algorithm of `digest`
    pub digest_algorithm: DigestAlgorithm,
    /// Final ByteRange written into the document
    pub byte_range: ByteRange,
    /// Layout of the reserved regions
    pub placeholder: SignaturePlaceholder,
}

/// Optional signer details written into the signature dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerMetadata {
    /// Name of the signer (`/Name`)
    pub name: Option<String>,
    /// Reason for signing (`/Reason`)
    pub reason: Option<String>,
    /// Signing location (`/Location`)
    pub location: Option<String>,
    /// Contact information (`/ContactInfo`)
    pub contact_info: Option<String>,
    /// Signing time (`/M`)
    pub signing_time: Option<DateTime<FixedOffset>>,
}

impl SignerMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    /// Set the signing time.
    pub fn with_signing_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// Whether no entry is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.reason.is_none()
            && self.location.is_none()
            && self.contact_info.is_none()
            && self.signing_time.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_algorithm_names() {
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
        assert_eq!(DigestAlgorithm::from_name("sha-384"), Some(DigestAlgorithm::Sha384));
        assert_eq!(DigestAlgorithm::from_name("SHA1"), Some(DigestAlgorithm::Sha1));
        assert_eq!(DigestAlgorithm::from_name("md5"), None);
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_sub_filter_names() {
        assert_eq!(SignatureSubFilter::Pkcs7Detached.as_pdf_name(), "adbe.pkcs7.detached");
        assert_eq!(
            SignatureSubFilter::from_pdf_name("ETSI.CAdES.detached"),
            Some(SignatureSubFilter::CadesDetached)
        );
    }

    #[test]
    fn test_signature_flags() {
        let invisible = AnnotationFlags::for_signature(&SignatureVisibility::Invisible);
        assert_eq!(invisible.bits(), 134);
        let visible = AnnotationFlags::for_signature(&SignatureVisibility::Visible {
            rect: [10.0, 10.0, 200.0, 60.0],
        });
        assert_eq!(visible.bits(), 132);
    }

    #[test]
    fn test_placeholder_byte_range() {
        let placeholder = SignaturePlaceholder {
            byte_range_offset: 500,
            byte_range_width: 36,
            contents_offset: 550,
            contents_length: 18,
            reserved_hex_capacity: 16,
            dictionary_offset: 420,
            metadata_offset: 570,
            metadata_capacity: 64,
            signature_object: 12,
            field_name: "Signature1".into(),
            total_length: 1000,
        };
        let range = placeholder.byte_range();
        assert_eq!(range.as_array(), [0, 550, 568, 432]);
        assert_eq!(range.end(), Some(1000));
        assert_eq!(range.gap(), Some(18));
        assert_eq!(range.to_string(), "[0 550 568 432]");
        assert_eq!(placeholder.signature_capacity(), 8);
    }

    #[test]
    fn test_byte_range_arithmetic_overflow() {
        let huge = ByteRange::from_array([usize::MAX, 1, usize::MAX, 1]);
        assert_eq!(huge.first_span(), None);
        assert_eq!(huge.second_span(), None);
        assert_eq!(huge.end(), None);
        assert_eq!(huge.gap(), None);

        let overlapping = ByteRange::from_array([0, 10, 5, 5]);
        assert_eq!(overlapping.gap(), None);
        assert_eq!(overlapping.end(), Some(10));
    }

    #[test]
    fn test_placeholder_json_round_trip() {
        let placeholder = SignaturePlaceholder {
            byte_range_offset: 1,
            byte_range_width: 36,
            contents_offset: 40,
            contents_length: 10,
            reserved_hex_capacity: 8,
            dictionary_offset: 0,
            metadata_offset: 51,
            metadata_capacity: 0,
            signature_object: 3,
            field_name: "Approval".into(),
            total_length: 200,
        };
        let json = serde_json::to_string(&placeholder).unwrap();
        assert!(json.contains("\"contents_offset\":40"));
        let back: SignaturePlaceholder = serde_json::from_str(&json).unwrap();
        assert_eq!(back, placeholder);
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = SignerMetadata::new().with_name("Ana").with_reason("Approval");
        assert!(!metadata.is_empty());
        assert_eq!(metadata.reason.as_deref(), Some("Approval"));
        assert!(SignerMetadata::default().is_empty());
    }
}
