//! Incremental updates (ISO 32000-1:2008, 7.5.6).
//!
//! The original bytes are copied unchanged; new and replaced objects are
//! appended, followed by a cross-reference section covering only those
//! objects and a trailer whose `/Prev` points at the previous section. The
//! section uses the same syntax as the base document's newest section, so
//! a file written with xref streams keeps using xref streams.

use crate::decoders::encode_flate;
use crate::document::PdfDocument;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::object_serializer::{indirect_header, ObjectSerializer};
use crate::xref::XRefFlavor;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct PendingObject {
    gen: u16,
    body: Vec<u8>,
}

/// Result of writing an incremental update.
#[derive(Debug, Clone)]
pub struct UpdateOutput {
    /// Original bytes followed by the update
    pub bytes: Vec<u8>,
    /// Offset of each written object's `N G obj` line
    pub object_offsets: BTreeMap<u32, usize>,
    /// Offset of each written object's body (just after `obj\n`)
    pub body_offsets: BTreeMap<u32, usize>,
    /// Offset of the new cross-reference section
    pub xref_offset: usize,
}

/// Builder for one incremental update on top of a parsed document.
pub struct IncrementalUpdate<'d, 'a> {
    base: &'d PdfDocument<'a>,
    serializer: ObjectSerializer,
    objects: BTreeMap<u32, PendingObject>,
    next_id: u32,
    flavor: XRefFlavor,
}

impl<'d, 'a> IncrementalUpdate<'d, 'a> {
    /// Start an update whose xref section matches the base document.
    pub fn new(base: &'d PdfDocument<'a>) -> Self {
        let flavor = if base.uses_xref_stream() {
            XRefFlavor::Stream
        } else {
            XRefFlavor::Table
        };
        Self {
            base,
            serializer: ObjectSerializer::new(),
            objects: BTreeMap::new(),
            next_id: base.next_object_number(),
            flavor,
        }
    }

    /// Force a cross-reference syntax instead of matching the base.
    pub fn with_flavor(mut self, flavor: XRefFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    /// Write `obj` under `obj_ref`, replacing any earlier version.
    pub fn put(&mut self, obj_ref: ObjectRef, obj: &Object) {
        let body = self.serializer.serialize(obj);
        self.put_raw(obj_ref, body);
    }

    /// Write pre-serialized object syntax under `obj_ref`.
    ///
    /// Used for objects whose byte layout the caller needs to control, such
    /// as a signature dictionary with reserved regions.
    pub fn put_raw(&mut self, obj_ref: ObjectRef, body: Vec<u8>) {
        self.objects.insert(obj_ref.id, PendingObject { gen: obj_ref.gen, body });
    }

    /// Allocate a number for `obj` and write it.
    pub fn add(&mut self, obj: &Object) -> ObjectRef {
        let r = self.allocate();
        self.put(r, obj);
        r
    }

    /// Number of objects in the update.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Assemble the original bytes plus the update.
    pub fn write(mut self) -> Result<UpdateOutput> {
        let base_bytes = self.base.bytes();
        let mut out = Vec::with_capacity(base_bytes.len() + 4096);
        out.extend_from_slice(base_bytes);
        if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
            out.push(b'\n');
        }

        let mut object_offsets = BTreeMap::new();
        let mut body_offsets = BTreeMap::new();
        for (&id, pending) in &self.objects {
            object_offsets.insert(id, out.len());
            out.extend_from_slice(indirect_header(id, pending.gen).as_bytes());
            body_offsets.insert(id, out.len());
            out.extend_from_slice(&pending.body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let file_id = self.file_id(&out);
        let xref_offset = match self.flavor {
            XRefFlavor::Table => {
                let entries: Vec<(u32, usize, u16)> = self
                    .objects
                    .iter()
                    .map(|(&id, p)| (id, object_offsets[&id], p.gen))
                    .collect();
                let offset = out.len();
                write_xref_table(&mut out, &entries);
                let trailer = self.trailer_dict(self.size(), file_id);
                out.extend_from_slice(b"trailer\n");
                self.serializer.write_object(&mut out, &Object::Dictionary(trailer));
                out.push(b'\n');
                offset
            },
            XRefFlavor::Stream => {
                let xref_ref = self.allocate();
                let offset = out.len();
                let mut entries: Vec<(u32, usize, u16)> = self
                    .objects
                    .iter()
                    .map(|(&id, p)| (id, object_offsets[&id], p.gen))
                    .collect();
                entries.push((xref_ref.id, offset, 0));
                let trailer = self.trailer_dict(self.size(), file_id);
                let stream = xref_stream(trailer, &entries)?;
                out.extend_from_slice(&self.serializer.serialize_indirect(xref_ref.id, 0, &stream));
                object_offsets.insert(xref_ref.id, offset);
                offset
            },
        };

        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        log::debug!(
            "Incremental update: {} objects, {:?} xref at {}, {} -> {} bytes",
            self.objects.len(),
            self.flavor,
            xref_offset,
            base_bytes.len(),
            out.len()
        );

        Ok(UpdateOutput {
            bytes: out,
            object_offsets,
            body_offsets,
            xref_offset,
        })
    }

    fn size(&self) -> u32 {
        let highest = self.objects.keys().next_back().map_or(0, |id| id + 1);
        self.next_id.max(highest).max(self.base.next_object_number())
    }

    /// `/ID`: the permanent first half is kept, the second changes per update.
    fn file_id(&self, bytes: &[u8]) -> Object {
        let digest = Sha256::digest(bytes);
        let update_id = Object::String(digest[..16].to_vec());
        let permanent = self
            .base
            .trailer()
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .filter(|id| id.as_string().is_some())
            .cloned()
            .unwrap_or_else(|| update_id.clone());
        Object::Array(vec![permanent, update_id])
    }

    fn trailer_dict(&self, size: u32, file_id: Object) -> Dictionary {
        let base = self.base.trailer();
        let mut dict = Dictionary::new();
        dict.insert("Size".to_string(), Object::Integer(i64::from(size)));
        for key in ["Root", "Info"] {
            if let Some(value) = base.get(key) {
                dict.insert(key.to_string(), value.clone());
            }
        }
        dict.insert("ID".to_string(), file_id);
        dict.insert("Prev".to_string(), Object::Integer(self.base.startxref() as i64));
        dict
    }
}

/// Group sorted object numbers into contiguous `(first, count)` runs.
fn subsections(entries: &[(u32, usize, u16)]) -> Vec<(u32, &[(u32, usize, u16)])> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=entries.len() {
        if i == entries.len() || entries[i].0 != entries[i - 1].0 + 1 {
            runs.push((entries[start].0, &entries[start..i]));
            start = i;
        }
    }
    runs
}

fn write_xref_table(out: &mut Vec<u8>, entries: &[(u32, usize, u16)]) {
    out.extend_from_slice(b"xref\n");
    for (first, run) in subsections(entries) {
        out.extend_from_slice(format!("{} {}\n", first, run.len()).as_bytes());
        for (_, offset, gen) in run {
            out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
        }
    }
}

/// Build a `/Type /XRef` stream with `/W [1 n 2]` rows (type 1 entries only).
fn xref_stream(dict: Dictionary, entries: &[(u32, usize, u16)]) -> Result<Object> {
    let max_offset = entries.iter().map(|e| e.1).max().unwrap_or(0) as u64;
    let offset_width = ((64 - max_offset.leading_zeros()).div_ceil(8) as usize).max(4);

    let mut rows = Vec::with_capacity(entries.len() * (offset_width + 3));
    let mut index = Vec::new();
    for (first, run) in subsections(entries) {
        index.push(Object::Integer(i64::from(first)));
        index.push(Object::Integer(run.len() as i64));
        for &(_, offset, gen) in run {
            rows.push(1u8);
            rows.extend_from_slice(&(offset as u64).to_be_bytes()[8 - offset_width..]);
            rows.extend_from_slice(&gen.to_be_bytes());
        }
    }

    let mut stream_dict = Dictionary::new();
    stream_dict.insert("Type".to_string(), Object::Name("XRef".to_string()));
    stream_dict.extend(dict);
    stream_dict.insert(
        "W".to_string(),
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(offset_width as i64),
            Object::Integer(2),
        ]),
    );
    stream_dict.insert("Index".to_string(), Object::Array(index));
    stream_dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));

    Ok(Object::Stream {
        dict: stream_dict,
        data: bytes::Bytes::from(encode_flate(&rows)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(ids: &[u32]) -> Vec<(u32, usize, u16)> {
        ids.iter().map(|&id| (id, id as usize * 10, 0)).collect()
    }

    #[test]
    fn test_subsections_contiguous_runs() {
        let e = entries(&[1, 2, 3, 7, 9, 10]);
        let runs: Vec<(u32, usize)> = subsections(&e).into_iter().map(|(f, r)| (f, r.len())).collect();
        assert_eq!(runs, vec![(1, 3), (7, 1), (9, 2)]);
        assert!(subsections(&[]).is_empty());
    }

    #[test]
    fn test_xref_table_entry_format() {
        let mut out = Vec::new();
        write_xref_table(&mut out, &[(4, 1234, 0), (5, 1300, 2)]);
        assert_eq!(out, b"xref\n4 2\n0000001234 00000 n \n0000001300 00002 n \n");
    }

    #[test]
    fn test_xref_stream_rows_decode() {
        let e = vec![(3, 0x0102_0304, 0), (8, 17, 1)];
        let stream = xref_stream(Dictionary::new(), &e).unwrap();
        let (dict, data) = match &stream {
            Object::Stream { dict, data } => (dict, data),
            other => panic!("expected stream, got {:?}", other),
        };
        let rows = crate::decoders::decode_stream(dict, data).unwrap();
        assert_eq!(rows.len(), 2 * 7);
        assert_eq!(&rows[..7], &[1, 0x01, 0x02, 0x03, 0x04, 0, 0]);
        assert_eq!(&rows[7..], &[1, 0, 0, 0, 17, 0, 1]);
        assert_eq!(dict["Index"].as_array().unwrap().len(), 4);
    }
}
