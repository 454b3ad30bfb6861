//! Cross-reference table parsing (classic tables and PDF 1.5 xref streams).
//!
//! Signing appends an incremental update, so it needs three things from the
//! existing file: where the newest cross-reference section starts (for
//! `/Prev`), the newest trailer (for `/Root`, `/Size`, `/Info`, `/ID`), and
//! the merged object locations across the whole `/Prev` chain.

use crate::decoders::decode_stream;
use crate::error::{Error, Result};
use crate::lexer::{is_pdf_whitespace, skip_ws};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object, parse_object};
use std::collections::{HashMap, HashSet};

/// Limit on `/Prev` chain length (circular or absurd chains).
const MAX_PREV_DEPTH: usize = 64;

/// Location of one object according to the cross-reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry
    Free,
    /// Object stored directly in the file at a byte offset
    Uncompressed {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/Type /ObjStm`
        stream: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Which cross-reference syntax the newest section uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefFlavor {
    /// `xref` keyword table followed by `trailer`
    Table,
    /// `/Type /XRef` stream object
    Stream,
}

/// Merged cross-reference data for the whole update chain.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
    flavor: XRefFlavor,
    startxref: u64,
}

impl CrossRefTable {
    /// Look up an object's location.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Newest trailer dictionary (for xref streams: the stream dictionary).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Syntax of the newest section.
    pub fn flavor(&self) -> XRefFlavor {
        self.flavor
    }

    /// Offset of the newest section; the `/Prev` of the next update.
    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// Highest object number referenced by any section.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Number of known entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an older section: entries already present (newer) win.
    fn merge_older(&mut self, older: HashMap<u32, XRefEntry>) {
        for (number, entry) in older {
            self.entries.entry(number).or_insert(entry);
        }
    }
}

/// Find the offset after the last `startxref` keyword.
pub fn find_startxref(bytes: &[u8]) -> Result<u64> {
    let keyword = b"startxref";
    let window_start = bytes.len().saturating_sub(4096);
    let tail = &bytes[window_start..];
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let after = skip_ws(&tail[pos + keyword.len()..]);
    let digits: Vec<u8> = after.iter().take_while(|b| b.is_ascii_digit()).copied().collect();
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(Error::InvalidXref)
}

/// Parse the cross-reference chain starting at the newest `startxref`.
pub fn parse_xref_chain(bytes: &[u8]) -> Result<CrossRefTable> {
    let startxref = find_startxref(bytes)?;
    let (entries, trailer, flavor) = parse_section(bytes, startxref)?;

    let mut table = CrossRefTable {
        entries,
        trailer,
        flavor,
        startxref,
    };

    let mut visited = HashSet::from([startxref]);
    let mut prev = table.trailer.get("Prev").and_then(Object::as_integer);
    while let Some(offset) = prev {
        let offset = u64::try_from(offset).map_err(|_| Error::InvalidXref)?;
        if !visited.insert(offset) || visited.len() > MAX_PREV_DEPTH {
            return Err(Error::InvalidPdf(format!("circular or too deep /Prev chain at {}", offset)));
        }
        log::debug!("Following /Prev to xref section at offset {}", offset);
        let (entries, older_trailer, _) = parse_section(bytes, offset)?;
        table.merge_older(entries);
        prev = older_trailer.get("Prev").and_then(Object::as_integer);
    }

    Ok(table)
}

type Section = (HashMap<u32, XRefEntry>, Dictionary, XRefFlavor);

fn parse_section(bytes: &[u8], offset: u64) -> Result<Section> {
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    if start >= bytes.len() {
        return Err(Error::InvalidPdf(format!("xref offset {} beyond end of file", offset)));
    }

    let input = skip_ws(&bytes[start..]);
    if input.starts_with(b"xref") {
        let (mut entries, trailer) = parse_table(bytes, start)?;
        // Hybrid-reference files keep compressed objects in a side stream
        if let Some(stream_offset) = trailer.get("XRefStm").and_then(Object::as_integer) {
            let (stream_entries, _) = parse_stream(bytes, stream_offset as usize)?;
            for (number, entry) in stream_entries {
                let slot = entries.entry(number).or_insert(XRefEntry::Free);
                if *slot == XRefEntry::Free {
                    *slot = entry;
                }
            }
        }
        Ok((entries, trailer, XRefFlavor::Table))
    } else if input.first().is_some_and(u8::is_ascii_digit) {
        let (entries, trailer) = parse_stream(bytes, start)?;
        Ok((entries, trailer, XRefFlavor::Stream))
    } else {
        Err(Error::InvalidXref)
    }
}

/// Minimal cursor for the line-oriented table syntax.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && is_pdf_whitespace(self.bytes[self.pos]) {
            self.pos += 1;
        }
    }

    fn starts_with(&self, keyword: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(keyword)
    }

    fn read_uint(&mut self) -> Result<u64> {
        self.skip_ws();
        let begin = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[begin..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(Error::ParseError {
                offset: begin,
                reason: "expected unsigned integer in xref table".to_string(),
            })
    }

    fn read_flag(&mut self) -> Result<u8> {
        self.skip_ws();
        match self.bytes.get(self.pos) {
            Some(&flag @ (b'n' | b'f')) => {
                self.pos += 1;
                Ok(flag)
            },
            _ => Err(Error::ParseError {
                offset: self.pos,
                reason: "expected 'n' or 'f' in xref entry".to_string(),
            }),
        }
    }
}

fn parse_table(bytes: &[u8], start: usize) -> Result<(HashMap<u32, XRefEntry>, Dictionary)> {
    let mut cursor = Cursor { bytes, pos: start };
    cursor.skip_ws();
    cursor.pos += b"xref".len();

    let mut entries = HashMap::new();
    loop {
        cursor.skip_ws();
        if cursor.pos >= bytes.len() {
            return Err(Error::InvalidXref);
        }
        if cursor.starts_with(b"trailer") {
            cursor.pos += b"trailer".len();
            break;
        }

        let first = cursor.read_uint()?;
        let count = cursor.read_uint()?;
        if count > bytes.len() as u64 / 18 {
            return Err(Error::InvalidPdf(format!("xref subsection count {} is implausible", count)));
        }
        for i in 0..count {
            let field1 = cursor.read_uint()?;
            let field2 = cursor.read_uint()?;
            let flag = cursor.read_flag()?;
            let number = object_number(first, i)?;
            let entry = if flag == b'n' {
                XRefEntry::Uncompressed {
                    offset: field1,
                    generation: field2.min(u64::from(u16::MAX)) as u16,
                }
            } else {
                XRefEntry::Free
            };
            // Within one section a later subsection entry for the same number wins
            entries.insert(number, entry);
        }
    }

    let (_, trailer) = parse_object(&bytes[cursor.pos..]).map_err(|_| Error::ParseError {
        offset: cursor.pos,
        reason: "malformed trailer dictionary".to_string(),
    })?;
    match trailer {
        Object::Dictionary(dict) => Ok((entries, dict)),
        other => Err(Error::ParseError {
            offset: cursor.pos,
            reason: format!("trailer is a {}, not a dictionary", other.type_name()),
        }),
    }
}

/// Entry `i` of a subsection starting at `first`.
fn object_number(first: u64, i: u64) -> Result<u32> {
    first
        .checked_add(i)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(Error::InvalidXref)
}

fn read_field(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

fn parse_stream(bytes: &[u8], start: usize) -> Result<(HashMap<u32, XRefEntry>, Dictionary)> {
    let slice = bytes.get(start..).ok_or(Error::InvalidXref)?;
    let (_, object) = parse_indirect_object(slice, start)?;
    let (dict, data) = match object {
        Object::Stream { dict, data } => (dict, data),
        other => {
            return Err(Error::InvalidPdf(format!(
                "xref stream at {} is a {}",
                start,
                other.type_name()
            )))
        },
    };
    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidPdf(format!("object at {} is not /Type /XRef", start)));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| w.iter().filter_map(Object::as_integer).map(|v| v.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    }
    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;

    let unsigned = |value: &Object| {
        value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or(Error::InvalidXref)
    };
    let ranges: Vec<(u64, u64)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .filter_map(|pair| match pair {
                [a, b] => Some(unsigned(a).and_then(|first| Ok((first, unsigned(b)?)))),
                _ => None,
            })
            .collect::<Result<_>>()?,
        None => vec![(0, u64::try_from(size).unwrap_or(0))],
    };

    let decoded = decode_stream(&dict, &data)?;
    let entry_size: usize = widths.iter().sum();
    let mut chunks = decoded.chunks_exact(entry_size.max(1));
    let mut entries = HashMap::new();

    for (first, count) in ranges {
        for i in 0..count {
            let raw = chunks
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let (f1, rest) = raw.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let number = object_number(first, i)?;
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: read_field(f2),
                    generation: read_field(f3).min(u64::from(u16::MAX)) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: u32::try_from(read_field(f2)).map_err(|_| Error::InvalidXref)?,
                    index: u32::try_from(read_field(f3)).map_err(|_| Error::InvalidXref)?,
                },
                // Unknown types are treated as null references
                _ => XRefEntry::Free,
            };
            entries.insert(number, entry);
        }
    }

    Ok((entries, dict))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let obj1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                obj1, obj2, xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_find_startxref() {
        let pdf = classic_pdf();
        let offset = find_startxref(&pdf).unwrap() as usize;
        assert!(pdf[offset..].starts_with(b"xref"));
    }

    #[test]
    fn test_find_startxref_missing() {
        assert!(matches!(find_startxref(b"%PDF-1.4\n%%EOF"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_classic_table() {
        let pdf = classic_pdf();
        let table = parse_xref_chain(&pdf).unwrap();
        assert_eq!(table.flavor(), XRefFlavor::Table);
        assert_eq!(table.get(0), Some(&XRefEntry::Free));
        match table.get(1) {
            Some(XRefEntry::Uncompressed { offset, .. }) => {
                assert!(pdf[*offset as usize..].starts_with(b"1 0 obj"))
            },
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(table.trailer().get("Size").and_then(Object::as_integer), Some(3));
        assert_eq!(table.max_object_number(), 2);
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let mut pdf = classic_pdf();
        let prev = find_startxref(&pdf).unwrap();
        let obj1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Lang (en) >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n1 1\n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev {} >>\nstartxref\n{}\n%%EOF\n",
                obj1, prev, xref
            )
            .as_bytes(),
        );

        let table = parse_xref_chain(&pdf).unwrap();
        assert_eq!(table.startxref(), xref as u64);
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::Uncompressed {
                offset: obj1 as u64,
                generation: 0
            })
        );
        assert!(table.get(2).is_some());
    }

    #[test]
    fn test_circular_prev_rejected() {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!("xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev {} >>\nstartxref\n{}\n%%EOF\n", xref, xref)
                .as_bytes(),
        );
        assert!(parse_xref_chain(&pdf).is_err());
    }

    /// Unfiltered xref stream object at offset 9.
    fn xref_stream(widths: &str, index: &str, data: &[u8]) -> Vec<u8> {
        let mut pdf = b"%PDF-1.5\n".to_vec();
        pdf.extend_from_slice(
            format!(
                "1 0 obj\n<< /Type /XRef /Size 3 /W {} /Index {} /Length {} >>\nstream\n",
                widths,
                index,
                data.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(data);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");
        pdf
    }

    #[test]
    fn test_xref_stream_index() {
        let pdf = xref_stream("[1 4 1]", "[4 2]", &[1, 0, 0, 0, 9, 0, 2, 0, 0, 0, 7, 3]);
        let (entries, _) = parse_stream(&pdf, 9).unwrap();
        assert_eq!(entries.get(&4), Some(&XRefEntry::Uncompressed { offset: 9, generation: 0 }));
        assert_eq!(entries.get(&5), Some(&XRefEntry::Compressed { stream: 7, index: 3 }));
    }

    #[test]
    fn test_xref_stream_rejects_bad_numbers() {
        let rows = [1, 0, 0, 0, 9, 0, 1, 0, 0, 0, 9, 0];
        let negative_start = xref_stream("[1 4 1]", "[-1 2]", &rows);
        assert!(matches!(parse_stream(&negative_start, 9), Err(Error::InvalidXref)));

        let negative_count = xref_stream("[1 4 1]", "[0 -3]", &rows);
        assert!(matches!(parse_stream(&negative_count, 9), Err(Error::InvalidXref)));

        let past_u32 = xref_stream("[1 4 1]", "[4294967295 2]", &rows);
        assert!(matches!(parse_stream(&past_u32, 9), Err(Error::InvalidXref)));

        // Object stream number 2^32
        let wide_stream = xref_stream("[1 5 0]", "[0 1]", &[2, 1, 0, 0, 0, 0]);
        assert!(matches!(parse_stream(&wide_stream, 9), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_object_number_overflow() {
        assert_eq!(object_number(10, 2).unwrap(), 12);
        assert!(matches!(object_number(u64::MAX, 1), Err(Error::InvalidXref)));
        assert!(matches!(object_number(u64::from(u32::MAX), 1), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_classic_subsection_overflow() {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n18446744073709551615 2\n0000000000 65535 f \n0000000000 65535 f \ntrailer\n<< /Size 1 >>\nstartxref\n{}\n%%EOF\n",
                xref
            )
            .as_bytes(),
        );
        assert!(matches!(parse_table(&pdf, xref), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_read_field_big_endian() {
        assert_eq!(read_field(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_field(&[]), 0);
    }
}
