//! Object stream parsing (PDF 1.5+).
//!
//! Documents written with cross-reference streams usually keep the catalog,
//! page tree and AcroForm inside `/Type /ObjStm` streams, so the signer has
//! to read them from here before it can rewrite them in an update.
//!
//! ```text
//! N 0 obj
//! << /Type /ObjStm /N 2 /First 8 /Filter /FlateDecode >>
//! stream
//! 1 0 2 40                 % pairs: (object number, offset from /First)
//! << /Type /Catalog ... >> % object 1
//! << /Type /Pages ... >>   % object 2
//! endstream
//! ```

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Decoded object stream contents, keyed by object number.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: HashMap<u32, Object>,
    order: Vec<u32>,
}

impl ObjectStream {
    /// Object stored under `object_number`, if the stream holds one.
    pub fn get(&self, object_number: u32) -> Option<&Object> {
        self.objects.get(&object_number)
    }

    /// Object at position `index` in the header (the xref entry's index).
    pub fn get_by_index(&self, index: u32) -> Option<(u32, &Object)> {
        let number = *self.order.get(index as usize)?;
        self.objects.get(&number).map(|obj| (number, obj))
    }

    /// Number of objects that parsed successfully.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing could be parsed.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Parse an object stream and extract all objects.
///
/// Objects that fail to parse are skipped with a warning; the rest of the
/// stream stays usable.
pub fn parse_object_stream(stream_obj: &Object) -> Result<ObjectStream> {
    let (dict, data) = match stream_obj {
        Object::Stream { dict, data } => (dict, data),
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /Type /{}", type_name)));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;
    if !(0..=1_000_000).contains(&n) || !(0..=10_000_000).contains(&first) {
        return Err(Error::InvalidPdf(format!("invalid object stream header /N {} /First {}", n, first)));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = decode_stream(dict, data)?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_pairs(&decoded[..first], n)?;
    let body = &decoded[first..];
    let mut stream = ObjectStream::default();

    for (object_number, offset) in pairs {
        stream.order.push(object_number);
        let Some(slice) = body.get(offset..) else {
            log::warn!("Object {} offset {} is beyond object stream data", object_number, offset);
            continue;
        };
        match parse_object(slice) {
            Ok((_, obj)) => {
                stream.objects.insert(object_number, obj);
            },
            Err(e) => {
                log::warn!("Failed to parse object {} from object stream: {:?}", object_number, e);
            },
        }
    }

    Ok(stream)
}

fn parse_pairs(header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = header;

    for i in 0..count {
        let mut next = || match token(remaining) {
            Ok((rest, Token::Integer(value))) if value >= 0 => {
                remaining = rest;
                Ok(value)
            },
            _ => Err(Error::ParseError {
                offset: header.len() - remaining.len(),
                reason: format!("malformed object stream header at pair {}", i),
            }),
        };
        let number = next()?;
        let offset = next()?;
        pairs.push((number as u32, offset as usize));
    }

    Ok(pairs)
}
