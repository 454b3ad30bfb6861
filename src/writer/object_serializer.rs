//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! ISO 32000-1:2008, 7.3. Dictionaries are written in insertion order so a
//! rewritten catalog or page keeps the layout it was read with.

use crate::object::{Dictionary, Object, ObjectRef};

/// Serializer for PDF objects.
///
/// Output always goes into a `Vec<u8>`, so serialization cannot fail.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Put each dictionary entry on its own line
    pretty: bool,
}

impl ObjectSerializer {
    /// Create a compact single-line serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer that breaks dictionaries over several lines.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut body = Vec::new();
        self.write_object(&mut body, obj);
        wrap_indirect(id, gen, &body)
    }

    /// Append an object to `buf`.
    pub fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => self.write_array(buf, arr),
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => self.write_stream(buf, dict, data),
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_array(&self, buf: &mut Vec<u8>, arr: &[Object]) {
        buf.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            self.write_object(buf, obj);
        }
        buf.push(b']');
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        buf.extend_from_slice(b"<<");
        for (key, value) in dict {
            buf.extend_from_slice(if self.pretty { b"\n  " } else { b" " });
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, value);
        }
        buf.extend_from_slice(if self.pretty && !dict.is_empty() { b"\n>>" } else { b" >>" });
    }

    /// `/Length` always reflects the data actually written.
    fn write_stream(&self, buf: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        self.write_dictionary(buf, &dict);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream");
    }
}

/// Wrap an already serialized body as `{id} {gen} obj ... endobj`.
pub fn wrap_indirect(id: u32, gen: u16, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 32);
    buf.extend_from_slice(indirect_header(id, gen).as_bytes());
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\nendobj\n");
    buf
}

/// The `{id} {gen} obj\n` line preceding an object body.
pub fn indirect_header(id: u32, gen: u16) -> String {
    format!("{} {} obj\n", id, gen)
}

/// Write a real number, trimming trailing zeros (at most 5 decimals).
fn write_real(buf: &mut Vec<u8>, value: f64) {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        buf.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        buf.extend_from_slice(trimmed.as_bytes());
    }
}

/// Literal `(...)` syntax for printable ASCII, hex `<...>` otherwise.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        buf.extend_from_slice(crate::signatures::bytes_to_hex(data).as_bytes());
        buf.push(b'>');
    }
}

/// Names start with `/`; delimiters, whitespace and non-ASCII use `#xx`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'
            | b'"'
            | b'$'..=b'&'
            | b'\''
            | b'*'..=b'.'
            | b'0'..=b'9'
            | b';'
            | b'='
            | b'?'
            | b'@'
            | b'A'..=b'Z'
            | b'^'..=b'z'
            | b'|'
            | b'~' => buf.push(byte),
            _ => buf.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}

/// Helper functions for building PDF objects.
impl ObjectSerializer {
    /// Create a Name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Create a String object from a Rust string.
    pub fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec())
    }

    /// Create a Dictionary object, keeping entry order.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Create a Reference object.
    pub fn reference(r: ObjectRef) -> Object {
        Object::Reference(r)
    }

    /// Create a rectangle array `[llx lly urx ury]`.
    pub fn rect(llx: f64, lly: f64, urx: f64, ury: f64) -> Object {
        Object::Array(vec![Object::Real(llx), Object::Real(lly), Object::Real(urx), Object::Real(ury)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(false)), "false");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(s.serialize_to_string(&Object::Real(3.14258)), "3.14258");
        assert_eq!(s.serialize_to_string(&Object::Real(612.0)), "612");
        assert_eq!(s.serialize_to_string(&Object::Real(0.5)), "0.5");
    }

    #[test]
    fn test_serialize_string() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::String(b"Hello".to_vec())), "(Hello)");
        assert_eq!(
            s.serialize_to_string(&Object::String(b"Test (parens)".to_vec())),
            "(Test \\(parens\\))"
        );
        assert_eq!(s.serialize_to_string(&Object::String(vec![0xFE, 0xFF, 0x00, 0x41])), "<FEFF0041>");
    }

    #[test]
    fn test_serialize_name_with_special_chars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&ObjectSerializer::name("Adobe.PPKLite")), "/Adobe.PPKLite");
        assert_eq!(
            s.serialize_to_string(&ObjectSerializer::name("Name With (Parens)")),
            "/Name#20With#20#28Parens#29"
        );
    }

    #[test]
    fn test_serialize_dictionary_keeps_order() {
        let s = ObjectSerializer::new();
        let dict = ObjectSerializer::dict(vec![
            ("Type", ObjectSerializer::name("Annot")),
            ("Subtype", ObjectSerializer::name("Widget")),
            ("P", ObjectSerializer::reference(ObjectRef::new(3, 0))),
            ("Rect", ObjectSerializer::rect(0.0, 0.0, 0.0, 0.0)),
        ]);
        assert_eq!(
            s.serialize_to_string(&dict),
            "<< /Type /Annot /Subtype /Widget /P 3 0 R /Rect [0 0 0 0] >>"
        );
    }

    #[test]
    fn test_pretty_dictionary() {
        let s = ObjectSerializer::pretty();
        let dict = ObjectSerializer::dict(vec![("Type", ObjectSerializer::name("Catalog"))]);
        assert_eq!(s.serialize_to_string(&dict), "<<\n  /Type /Catalog\n>>");
    }

    #[test]
    fn test_serialize_stream_sets_length() {
        let s = ObjectSerializer::new();
        let mut dict = Dictionary::new();
        dict.insert("Length".to_string(), Object::Integer(99));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"stream data"),
        };
        let result = s.serialize_to_string(&stream);
        assert!(result.starts_with("<< /Length 11 >>\nstream\n"));
        assert!(result.ends_with("stream data\nendstream"));
    }

    #[test]
    fn test_serialize_indirect() {
        let s = ObjectSerializer::new();
        let bytes = s.serialize_indirect(7, 0, &Object::Integer(42));
        assert_eq!(bytes, b"7 0 obj\n42\nendobj\n");
    }

    #[test]
    fn test_serialized_objects_parse_back() {
        let s = ObjectSerializer::new();
        let original = ObjectSerializer::dict(vec![
            ("T", Object::String(b"Signature1".to_vec())),
            ("Kids", Object::Array(vec![Object::Reference(ObjectRef::new(5, 0))])),
            ("Odd", ObjectSerializer::name("a#b c")),
        ]);
        let bytes = s.serialize(&original);
        let (_, parsed) = crate::parser::parse_object(&bytes).unwrap();
        assert_eq!(parsed, original);
    }
}
