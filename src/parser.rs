//! PDF object parser.
//!
//! Recursive descent over lexer tokens: primitives, arrays, dictionaries,
//! indirect references and streams, plus reading a whole `N G obj ... endobj`
//! block at a byte offset taken from the cross-reference table.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in PDF literal strings.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits) and
/// line continuations. Unknown escapes keep the backslash.
///
/// ```
/// # use cert_oxide::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"Caf\\351"), b"Caf\xe9");
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

        let simple = match raw[i + 1] {
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'b' => Some(0x08),
            b'f' => Some(0x0C),
            b'(' => Some(b'('),
            b')' => Some(b')'),
            b'\\' => Some(b'\\'),
            _ => None,
        };
        if let Some(byte) = simple {
            result.push(byte);
            i += 2;
            continue;
        }

        match raw[i + 1] {
            b'\n' => i += 2,
            b'\r' => {
                i += 2;
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let digits = raw[i + 1..]
                    .iter()
                    .take(3)
                    .take_while(|d| (b'0'..=b'7').contains(*d))
                    .count();
                let value = raw[i + 1..i + 1 + digits]
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                result.push((value & 0xFF) as u8);
                i += 1 + digits;
            },
            _ => {
                result.push(b'\\');
                i += 1;
            },
        }
    }

    result
}

/// Decode a hex string body to bytes, ignoring whitespace.
///
/// An odd trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .copied()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let nibble = |c: u8| -> Result<u8> {
        (c as char)
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or_else(|| Error::ParseError {
                offset: 0,
                reason: format!("invalid hex digit {:?}", c as char),
            })
    };

    digits
        .chunks(2)
        .map(|pair| {
            let high = nibble(pair[0])?;
            let low = match pair.get(1) {
                Some(&c) => nibble(c)?,
                None => 0,
            };
            Ok((high << 4) | low)
        })
        .collect()
}

/// Parse one PDF object.
///
/// `N G R` is recognized by looking two tokens ahead after an integer.
/// A dictionary followed by `stream` becomes [`Object::Stream`].
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Integer(i) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                }
            }
            Ok((input, Object::Integer(i)))
        },
        Token::Real(r) => Ok((input, Object::Real(r))),
        Token::LiteralString(raw) => Ok((input, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::HexDigit))),
        },
        Token::Name(name) => Ok((input, Object::Name(name))),
        Token::ArrayStart => parse_array(input),
        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;
            match token(remaining) {
                Ok((stream_input, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(stream_input, &dict)?;
                    Ok((
                        rest,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::from(data),
                        },
                    ))
                },
                _ => Ok((remaining, Object::Dictionary(dict))),
            }
        },
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Stream body after the `stream` keyword, sized by a direct `/Length`.
///
/// An indirect or missing `/Length` falls back to scanning for `endstream`.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], Vec<u8>> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        log::warn!("No end-of-line after stream keyword");
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length.max(0) as usize;
        if input.len() >= length {
            let (data, rest) = input.split_at(length);
            if let Ok((after, Token::StreamEnd)) = token(rest) {
                return Ok((after, data.to_vec()));
            }
            log::warn!("Stream /Length {} does not end at endstream, scanning", length);
        }
    }

    let keyword = b"endstream";
    match input.windows(keyword.len()).position(|w| w == keyword) {
        Some(pos) => {
            let mut end = pos;
            while end > 0 && matches!(input[end - 1], b'\r' | b'\n') {
                end -= 1;
            }
            Ok((&input[pos + keyword.len()..], input[..end].to_vec()))
        },
        None => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))),
    }
}

/// Array body after `[`. Hitting end of input returns what was read.
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(objects))),
            Ok(_) => {
                let (rest, obj) = parse_object(remaining)?;
                objects.push(obj);
                remaining = rest;
            },
            Err(_) if remaining.iter().all(u8::is_ascii_whitespace) => {
                return Ok((remaining, Object::Array(objects)));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Dictionary body after `<<`. Keys must be names.
fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => {
                let (rest, value) = parse_object(rest)?;
                dict.insert(key, value);
                remaining = rest;
            },
            Ok(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    nom::error::ErrorKind::Tag,
                )));
            },
            Err(_) if remaining.iter().all(u8::is_ascii_whitespace) => {
                return Ok((remaining, dict));
            },
            Err(e) => return Err(e),
        }
    }
}

/// Parse a whole indirect object `N G obj <object> endobj` starting at `offset`.
///
/// A missing `endobj` is tolerated; everything else is a [`Error::ParseError`]
/// carrying the offset.
pub fn parse_indirect_object_at(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let fail = |reason: &str| Error::ParseError {
        offset,
        reason: reason.to_string(),
    };
    let input = data.get(offset..).ok_or_else(|| fail("offset beyond end of file"))?;

    let (input, id) = match token(input) {
        Ok((rest, Token::Integer(n))) if n >= 0 => (rest, n as u32),
        _ => return Err(fail("expected object number")),
    };
    let (input, gen) = match token(input) {
        Ok((rest, Token::Integer(g))) if g >= 0 => (rest, g as u16),
        _ => return Err(fail("expected generation number")),
    };
    let input = match token(input) {
        Ok((rest, Token::ObjStart)) => rest,
        _ => return Err(fail("expected 'obj' keyword")),
    };
    let (rest, object) = parse_object(input).map_err(|e| fail(&format!("bad object body: {:?}", e)))?;

    if !matches!(token(rest), Ok((_, Token::ObjEnd))) {
        log::debug!("Object {} {} at byte {} has no endobj", id, gen, offset);
    }

    Ok((ObjectRef::new(id, gen), object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"-7").unwrap().1, Object::Integer(-7));
        assert_eq!(parse_object(b"0.5").unwrap().1, Object::Real(0.5));
        assert_eq!(parse_object(b"/SigFlags").unwrap().1, Object::Name("SigFlags".to_string()));
    }

    #[test]
    fn test_parse_literal_string_with_escapes() {
        let (_, obj) = parse_object(b"(Line1\\nLine2 \\(x\\) \\247)").unwrap();
        assert_eq!(obj, Object::String(b"Line1\nLine2 (x) \xa7".to_vec()));
    }

    #[test]
    fn test_escape_line_continuation_and_unknown() {
        assert_eq!(decode_literal_string_escapes(b"long \\\nstring"), b"long string");
        assert_eq!(decode_literal_string_escapes(b"a\\qb"), b"a\\qb");
        assert_eq!(decode_literal_string_escapes(b"\\128"), b"\n8");
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(b"48 65 6C 6C 6F").unwrap(), b"Hello");
        assert_eq!(decode_hex(b"ABC").unwrap(), vec![0xAB, 0xC0]);
        assert_eq!(decode_hex(b"").unwrap(), Vec::<u8>::new());
        assert!(decode_hex(b"zz").is_err());
    }

    #[test]
    fn test_parse_zero_filled_hex_string() {
        let (_, obj) = parse_object(b"<0000000000>").unwrap();
        assert_eq!(obj, Object::String(vec![0; 5]));
    }

    #[test]
    fn test_parse_reference_vs_integer() {
        assert_eq!(parse_object(b"10 0 R").unwrap().1, Object::Reference(ObjectRef::new(10, 0)));
        assert_eq!(parse_object(b"10 0 obj").unwrap().1, Object::Integer(10));
    }

    #[test]
    fn test_parse_array_of_references() {
        let (_, obj) = parse_object(b"[3 0 R 4 0 R]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Reference(ObjectRef::new(3, 0)),
                Object::Reference(ObjectRef::new(4, 0)),
            ])
        );
    }

    #[test]
    fn test_parse_nested_dictionary() {
        let (_, obj) =
            parse_object(b"<< /Type /Page /MediaBox [0 0 841.89 595.28] /Resources << /Font 5 0 R >> >>")
                .unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").and_then(Object::as_name), Some("Page"));
        assert_eq!(dict.get("MediaBox").and_then(Object::as_array).map(Vec::len), Some(4));
        let resources = dict.get("Resources").and_then(Object::as_dict).unwrap();
        assert_eq!(resources.get("Font").and_then(Object::as_reference), Some(ObjectRef::new(5, 0)));
    }

    #[test]
    fn test_parse_byte_range_placeholder_names() {
        let (_, obj) = parse_object(b"[0 /********** /********** /**********]").unwrap();
        let items = obj.as_array().unwrap();
        assert_eq!(items[0], Object::Integer(0));
        assert_eq!(items[3].as_name(), Some("**********"));
    }

    #[test]
    fn test_parse_stream() {
        let (_, obj) = parse_object(b"<< /Length 5 >>\nstream\nhello\nendstream").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_stream_with_indirect_length() {
        let (_, obj) = parse_object(b"<< /Length 9 0 R >>\r\nstream\r\nabc\r\nendstream").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_dictionary_errors() {
        assert!(parse_object(b"<< /Type >>").is_err());
        assert!(parse_object(b"<< 123 /Value >>").is_err());
    }

    #[test]
    fn test_unclosed_containers_are_lenient() {
        assert_eq!(parse_object(b"[ 1 2").unwrap().1.as_array().map(Vec::len), Some(2));
        assert!(parse_object(b"<< /Type /Page").unwrap().1.as_dict().is_some());
    }

    #[test]
    fn test_parse_indirect_object_at() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let (id, obj) = parse_indirect_object_at(data, 9).unwrap();
        assert_eq!(id, ObjectRef::new(1, 0));
        assert_eq!(obj.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name), Some("Catalog"));
    }

    #[test]
    fn test_parse_indirect_object_at_bad_offset() {
        let data = b"1 0 obj\n<< >>\nendobj\n";
        match parse_indirect_object_at(data, 4) {
            Err(Error::ParseError { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_indirect_object_at(data, 500).is_err());
    }
}
