//! PDF object parser.
//!
//! Recursive descent over lexer tokens: read a token, decide the object type,
//! recurse into arrays and dictionaries. A dictionary followed by `stream`
//! becomes a stream object whose data is sliced using `/Length`.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings (ISO 32000-1:2008, 7.3.4.2).
///
/// ```
/// # use pdf_seal::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\101"), b"a(b)A");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'(' | b')' | b'\\' => result.push(escaped),
            b'\r' => {
                // Line continuation; swallow an LF of a CRLF pair too
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'\n' => {},
            b'0'..=b'7' => {
                let mut code = u32::from(escaped - b'0');
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    code = code * 8 + u32::from(raw[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                result.push((code & 0xFF) as u8);
            },
            other => result.push(other),
        }
    }

    result
}

fn parse_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Parse a single PDF object.
///
/// ```
/// use pdf_seal::parser::parse_object;
///
/// let (_, obj) = parse_object(b"<< /Type /Catalog /Pages 2 0 R >>").unwrap();
/// assert!(obj.as_dict().is_some());
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Integer(i) => {
            // "obj gen R" is a reference; anything else is a plain integer
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if i >= 0 && (0..=i64::from(u16::MAX)).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },
        Token::Real(r) => Ok((input, Object::Real(r))),
        Token::LiteralString(raw) => Ok((input, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(hex) => Ok((input, Object::String(decode_hex(hex)))),
        Token::Name(name) => Ok((input, Object::Name(name))),
        Token::ArrayStart => parse_array(input),
        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;
            if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
                let (rest, data) = parse_stream_data(stream_input, &dict)?;
                return Ok((
                    rest,
                    Object::Stream {
                        dict,
                        data: bytes::Bytes::from(data),
                    },
                ));
            }
            Ok((remaining, Object::Dictionary(dict)))
        },
        _ => Err(parse_error(input)),
    }
}

/// Stream data follows `stream` plus CRLF or LF and runs for `/Length` bytes.
///
/// Only direct `/Length` integers are honored; otherwise the data ends at the
/// next `endstream` keyword.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = if let Some(rest) = input.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\n") {
        rest
    } else if let Some(rest) = input.strip_prefix(b"\r") {
        log::warn!("Stream keyword followed by CR alone; accepting");
        rest
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length as usize;
        if length <= input.len() {
            let after = &input[length..];
            if let Ok((rest, Token::StreamEnd)) = token(after) {
                return Ok((rest, input[..length].to_vec()));
            }
        }
        log::debug!("Stream /Length {} does not land on endstream; scanning", length);
    }

    let keyword = b"endstream";
    let pos = input
        .windows(keyword.len())
        .position(|window| window == keyword)
        .ok_or_else(|| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)))?;

    let mut data = &input[..pos];
    // EOL before endstream is not part of the data
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[pos + keyword.len()..], data.to_vec()))
}

fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        let (after, tok) = token(remaining)?;
        if tok == Token::ArrayEnd {
            return Ok((after, Object::Array(objects)));
        }
        let (after, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = after;
    }
}

fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (after, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((after, dict)),
            Token::Name(key) => {
                let (after_value, value) = parse_object(after)?;
                dict.insert(key, value);
                remaining = after_value;
            },
            _ => return Err(parse_error(remaining)),
        }
    }
}

/// Decode hex string digits to bytes, ignoring whitespace; an odd trailing
/// digit is treated as if followed by 0.
///
/// ```
/// use pdf_seal::parser::decode_hex;
///
/// assert_eq!(decode_hex(b"48656C6C6F"), b"Hello");
/// assert_eq!(decode_hex(b"7"), vec![0x70]);
/// ```
pub fn decode_hex(hex_bytes: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = hex_bytes
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();

    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Parse `N G obj <object> endobj`, reporting failures at `offset`.
pub fn parse_indirect_object(input: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let fail = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };

    let (rest, id) = match token(input) {
        Ok((rest, Token::Integer(id))) if id >= 0 => (rest, id as u32),
        _ => return Err(fail("expected object number")),
    };
    let (rest, gen) = match token(rest) {
        Ok((rest, Token::Integer(gen))) if (0..=i64::from(u16::MAX)).contains(&gen) => {
            (rest, gen as u16)
        },
        _ => return Err(fail("expected generation number")),
    };
    let rest = match token(rest) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(fail("expected 'obj' keyword")),
    };
    let (_, object) = parse_object(rest).map_err(|e| fail(&format!("malformed object body: {}", e)))?;

    Ok((ObjectRef::new(id, gen), object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_vs_integers() {
        let (_, obj) = parse_object(b"12 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(12, 0)));

        let (_, obj) = parse_object(b"[1 2 3]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![Object::Integer(1), Object::Integer(2), Object::Integer(3)])
        );
    }

    #[test]
    fn test_parse_nested_dictionary_keeps_order() {
        let (_, obj) =
            parse_object(b"<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [] >> >>").unwrap();
        let dict = obj.as_dict().unwrap();
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Type", "Pages", "AcroForm"]);
        assert!(dict["AcroForm"].as_dict().unwrap()["Fields"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_parse_stream_with_length() {
        let input = b"<< /Length 5 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_with_wrong_length_falls_back() {
        let input = b"<< /Length 99 >>\nstream\nHello\nendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\nb"), b"a\nb");
        assert_eq!(decode_literal_string_escapes(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string_escapes(b"line\\\njoined"), b"linejoined");
    }

    #[test]
    fn test_parse_indirect_object() {
        let (r, obj) = parse_indirect_object(b"7 0 obj\n<< /Type /Sig >>\nendobj", 0).unwrap();
        assert_eq!(r, ObjectRef::new(7, 0));
        assert_eq!(obj.as_dict().unwrap()["Type"].as_name(), Some("Sig"));

        let err = parse_indirect_object(b"trailer << >>", 40).unwrap_err();
        assert!(matches!(err, Error::ParseError { offset: 40, .. }));
    }

    #[test]
    fn test_unclosed_dictionary_is_error() {
        assert!(parse_object(b"<< /Type /Catalog").is_err());
    }
}
