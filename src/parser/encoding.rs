//! Input decoding.
//!
//! Every document is decoded to UTF-8 before parsing. The source encoding is, in order of
//! precedence, the one named by the caller, the one given by a byte order mark, and the one
//! declared in the XML declaration. UTF-8 is the fallback.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use super::{XmlParserError, XmlParserErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlCharEncoding {
    None,
    UTF8,
    UTF16LE,
    UTF16BE,
}

/// Guess the encoding from the first bytes of the input.
///
/// This only recognizes byte order marks and the UTF-16 forms of `<?`.
pub fn detect_encoding(input: &[u8]) -> XmlCharEncoding {
    match input {
        [0x3C, 0x3F, 0x78, 0x6D, ..] => XmlCharEncoding::UTF8,
        [0x3C, 0x00, 0x3F, 0x00, ..] => XmlCharEncoding::UTF16LE,
        [0x00, 0x3C, 0x00, 0x3F, ..] => XmlCharEncoding::UTF16BE,
        // UTF-8 BOM
        [0xEF, 0xBB, 0xBF, ..] => XmlCharEncoding::UTF8,
        // UTF-16 BOM (BE)
        [0xFE, 0xFF, ..] => XmlCharEncoding::UTF16BE,
        // UTF-16 BOM (LE)
        [0xFF, 0xFE, ..] => XmlCharEncoding::UTF16LE,
        _ => XmlCharEncoding::None,
    }
}

/// Look up an encoding by one of its labels (`"latin1"`, `"Shift_JIS"`, ...).
pub fn find_encoding(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Read the `encoding="..."` pseudo-attribute of an ASCII-compatible XML declaration.
fn declared_encoding(input: &[u8]) -> Option<&str> {
    let decl = input.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&decl[..end]).ok()?;
    let (_, rest) = decl.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let rest = &rest[1..];
    rest.find(quote).map(|end| &rest[..end])
}

/// Decode `input` to UTF-8.
///
/// Returns the text without any byte order mark, and the name of the source encoding.
pub(crate) fn decode_input<'a>(
    input: &'a [u8],
    encoding: Option<&str>,
) -> Result<(Cow<'a, str>, &'static str), XmlParserError> {
    let unsupported = |label: &str| XmlParserError {
        code: XmlParserErrors::XmlErrUnsupportedEncoding,
        message: format!("Unsupported encoding {label}"),
        file: None,
        line: 1,
        column: 1,
    };

    let (enc, bom_len) = if let Some(label) = encoding {
        let enc = find_encoding(label).ok_or_else(|| unsupported(label))?;
        let bom_len = Encoding::for_bom(input)
            .filter(|&(bom, _)| bom == enc)
            .map_or(0, |(_, len)| len);
        (enc, bom_len)
    } else if let Some((enc, len)) = Encoding::for_bom(input) {
        (enc, len)
    } else {
        match detect_encoding(input) {
            XmlCharEncoding::UTF16LE => (UTF_16LE, 0),
            XmlCharEncoding::UTF16BE => (UTF_16BE, 0),
            _ => match declared_encoding(input) {
                // A UTF-16 label on single-byte input is a lie; keep reading it as UTF-8.
                Some(label) => match find_encoding(label).ok_or_else(|| unsupported(label))? {
                    enc if enc == UTF_16LE || enc == UTF_16BE => (UTF_8, 0),
                    enc => (enc, 0),
                },
                None => (UTF_8, 0),
            },
        }
    };

    let text = enc
        .decode_without_bom_handling_and_without_replacement(&input[bom_len..])
        .ok_or_else(|| XmlParserError {
            code: XmlParserErrors::XmlErrInvalidChar,
            message: format!("Input is not proper {}", enc.name()),
            file: None,
            line: 1,
            column: 1,
        })?;
    Ok((text, enc.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_and_declaration_detection() {
        assert_eq!(detect_encoding(b"\xEF\xBB\xBF<a/>"), XmlCharEncoding::UTF8);
        assert_eq!(detect_encoding(b"\xFF\xFE<\0"), XmlCharEncoding::UTF16LE);
        assert_eq!(detect_encoding(b"<a/>"), XmlCharEncoding::None);
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding='ISO-8859-1'?><a/>"),
            Some("ISO-8859-1")
        );
        assert_eq!(declared_encoding(b"<?xml version='1.0'?><a/>"), None);
    }

    #[test]
    fn decodes_latin1_from_declaration() {
        let input = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>\xE9</a>";
        let (text, name) = decode_input(input, None).unwrap();
        assert!(text.ends_with("<a>\u{e9}</a>"));
        assert_eq!(name, "windows-1252");
    }

    #[test]
    fn explicit_label_wins_and_bom_is_dropped() {
        let (text, name) = decode_input(b"\xEF\xBB\xBF<a/>", Some("utf-8")).unwrap();
        assert_eq!(text, "<a/>");
        assert_eq!(name, "UTF-8");

        let utf16: Vec<u8> = "\u{feff}<a/>"
            .encode_utf16()
            .flat_map(|u| u.to_le_bytes())
            .collect();
        let (text, name) = decode_input(&utf16, None).unwrap();
        assert_eq!(text, "<a/>");
        assert_eq!(name, "UTF-16LE");
    }

    #[test]
    fn rejects_unknown_labels_and_bad_bytes() {
        let err = decode_input(b"<a/>", Some("no-such-encoding")).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrUnsupportedEncoding);
        let err = decode_input(b"<a>\xFF</a>", None).unwrap_err();
        assert_eq!(err.code, XmlParserErrors::XmlErrInvalidChar);
    }
}
