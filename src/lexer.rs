//! PDF lexer (tokenizer).
//!
//! Low-level tokenization of PDF byte streams with `nom`. Only the token
//! types that appear in trailers, cross-reference streams, object streams
//! and the catalog / page / AcroForm / signature dictionaries are needed:
//! numbers, literal and hex strings, names, keywords and delimiters.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the PDF lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g., 3.14, -2.5, .5)
    Real(f64),
    /// Literal string bytes, escapes still encoded
    LiteralString(&'a [u8]),
    /// Hexadecimal string digits, whitespace preserved
    HexString(&'a [u8]),
    /// Name with `#xx` escapes decoded
    Name(String),
    /// Boolean true keyword
    True,
    /// Boolean false keyword
    False,
    /// Null keyword
    Null,
    /// Array start delimiter [
    ArrayStart,
    /// Array end delimiter ]
    ArrayEnd,
    /// Dictionary start delimiter <<
    DictStart,
    /// Dictionary end delimiter >>
    DictEnd,
    /// Indirect object start keyword "obj"
    ObjStart,
    /// Indirect object end keyword "endobj"
    ObjEnd,
    /// Stream start keyword "stream"
    StreamStart,
    /// Stream end keyword "endstream"
    StreamEnd,
    /// Reference keyword "R" (used in "10 0 R")
    R,
}

/// PDF whitespace characters (ISO 32000-1:2008, Table 1).
pub fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (ISO 32000-1:2008, Table 2).
pub fn is_pdf_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) = take_while(is_pdf_whitespace)(input)?;
    if ws.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Space)));
    }
    Ok((remaining, ()))
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments, returning the remaining input.
pub fn skip_ws(input: &[u8]) -> &[u8] {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        return remaining;
    }
}

fn digit_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
}

/// Parse an integer or real number (`42`, `-17`, `+3`, `3.14`, `.5`, `4.`).
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let start = input;
    let (input, sign) = opt(one_of("+-"))(input)?;
    let (input, int_part) = opt(digit1)(input)?;
    let (input, frac_part) = opt(preceded(char('.'), opt(digit1)))(input)?;

    if int_part.is_none() && frac_part.is_none() {
        return Err(digit_error(start));
    }

    let negative = sign == Some('-');
    let int_str = match int_part {
        Some(digits) => std::str::from_utf8(digits).map_err(|_| digit_error(start))?,
        None => "0",
    };

    match frac_part {
        Some(frac) => {
            let frac_str = match frac {
                Some(digits) => std::str::from_utf8(digits).map_err(|_| digit_error(start))?,
                None => "0",
            };
            let magnitude: f64 = format!("{}.{}", int_str, frac_str)
                .parse()
                .map_err(|_| digit_error(start))?;
            Ok((input, Token::Real(if negative { -magnitude } else { magnitude })))
        },
        None => {
            let magnitude: i64 = int_str.parse().map_err(|_| digit_error(start))?;
            Ok((input, Token::Integer(if negative { -magnitude } else { magnitude })))
        },
    }
}

/// Parse a literal string, tracking balanced parentheses and skipping escapes.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

/// Parse a hexadecimal string `<48656C6C6F>`; `<<` is left for the dictionary rule.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || is_pdf_whitespace(c)),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in PDF names (ISO 32000-1:2008, 7.3.5).
///
/// ```
/// # use pdf_seal::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B#23C"), "A B#C");
/// assert_eq!(decode_name_escapes(b"Type"), "Type");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut decoded = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                decoded.push(byte);
                i += 3;
                continue;
            }
        }
        decoded.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| !is_pdf_whitespace(c) && !is_pdf_delimiter(c)),
            |bytes: &[u8]| Token::Name(decode_name_escapes(bytes)),
        ),
    )(input)
}

/// Keywords and delimiters. `<<`/`>>` are tried before hex strings, and
/// `endstream`/`endobj` before their shorter prefixes.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, tok) = alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)?;

    // Alphabetic keywords must end at a token boundary ("nullable" is not "null").
    let alphabetic = !matches!(
        tok,
        Token::DictStart | Token::DictEnd | Token::ArrayStart | Token::ArrayEnd
    );
    if alphabetic {
        if let Some(&next) = rest.first() {
            if !is_pdf_whitespace(next) && !is_pdf_delimiter(next) {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Tag,
                )));
            }
        }
    }
    Ok((rest, tok))
}

/// Parse a single PDF token after skipping whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(token(b"42").unwrap().1, Token::Integer(42));
        assert_eq!(token(b"  -17 ").unwrap().1, Token::Integer(-17));
        assert_eq!(token(b"+3").unwrap().1, Token::Integer(3));
        assert_eq!(token(b"3.5").unwrap().1, Token::Real(3.5));
        assert_eq!(token(b"-.5").unwrap().1, Token::Real(-0.5));
        assert_eq!(token(b"4.").unwrap().1, Token::Real(4.0));
    }

    #[test]
    fn test_names() {
        assert_eq!(token(b"/Type").unwrap().1, Token::Name("Type".into()));
        assert_eq!(token(b"/A#20B").unwrap().1, Token::Name("A B".into()));
        let (rest, tok) = token(b"/Sig/Filter").unwrap();
        assert_eq!(tok, Token::Name("Sig".into()));
        assert_eq!(rest, b"/Filter");
    }

    #[test]
    fn test_strings() {
        assert_eq!(token(b"(Hello (World))").unwrap().1, Token::LiteralString(b"Hello (World)"));
        assert_eq!(token(b"(a\\)b)").unwrap().1, Token::LiteralString(b"a\\)b"));
        assert_eq!(token(b"<48 65>").unwrap().1, Token::HexString(b"48 65"));
        assert!(token(b"(unterminated").is_err());
    }

    #[test]
    fn test_delimiters_and_keywords() {
        assert_eq!(token(b"<<").unwrap().1, Token::DictStart);
        assert_eq!(token(b">>").unwrap().1, Token::DictEnd);
        assert_eq!(token(b"endobj").unwrap().1, Token::ObjEnd);
        assert_eq!(token(b"endstream").unwrap().1, Token::StreamEnd);
        assert_eq!(token(b"obj").unwrap().1, Token::ObjStart);
        assert_eq!(token(b"R ").unwrap().1, Token::R);
        assert_eq!(token(b"null]").unwrap().1, Token::Null);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(token(b"% comment\n 7").unwrap().1, Token::Integer(7));
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(token(b"nullable").is_err());
    }
}
