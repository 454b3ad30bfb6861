//! PDF object types.
//!
//! Dictionaries keep their entries in document order so that rewritten
//! catalog, page and AcroForm dictionaries serialize the way they were read.

use indexmap::IndexMap;

/// Dictionary with order-preserving keys (names without the leading `/`).
pub type Dictionary = IndexMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array)
    String(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Raw (still encoded) stream data
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Decode a PDF text string: UTF-16BE when it carries a `FEFF` mark,
    /// otherwise treated as Latin-1 (close enough to PDFDocEncoding for
    /// field names and signer metadata).
    pub fn as_text(&self) -> Option<String> {
        let bytes = self.as_string()?;
        if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            let units: Vec<u16> = bytes[2..]
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Some(String::from_utf16_lossy(&units))
        } else {
            Some(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        assert_eq!(ObjectRef::new(12, 0).to_string(), "12 0 R");
    }

    #[test]
    fn test_stream_as_dict() {
        let mut dict = Dictionary::new();
        dict.insert("Type".into(), Object::Name("XRef".into()));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::new(),
        };
        assert_eq!(
            stream.as_dict().and_then(|d| d.get("Type")).and_then(|o| o.as_name()),
            Some("XRef")
        );
        assert_eq!(stream.type_name(), "Stream");
    }

    #[test]
    fn test_as_text_utf16() {
        let obj = Object::String(vec![0xFE, 0xFF, 0x00, 0x4A, 0x00, 0xF6]);
        assert_eq!(obj.as_text().as_deref(), Some("Jö"));
    }

    #[test]
    fn test_as_text_latin1() {
        let obj = Object::String(b"Signature1".to_vec());
        assert_eq!(obj.as_text().as_deref(), Some("Signature1"));
        assert_eq!(Object::Integer(1).as_text(), None);
    }
}
