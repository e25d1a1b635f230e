//! Content transfer encodings.
//!
//! Holds the encoding tags written into `Content-Transfer-Encoding` and the
//! quoted-printable byte encoder. Line length is enforced separately by the
//! writers in [`crate::wrap`].

use std::fmt;

/// Transfer encoding applied to a message part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// Quoted-Printable encoding (RFC 2045 section 6.7).
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// Base64 encoding (RFC 2045 section 6.8).
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Content that is already base64 and only needs line folding.
    #[cfg_attr(feature = "serde", serde(rename = "base64-pre-encoded"))]
    Base64PreEncoded,
    /// Body bytes are passed through untouched.
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    Unencoded,
}

impl TransferEncoding {
    /// Returns the `Content-Transfer-Encoding` token for this encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 | Self::Base64PreEncoded => "base64",
            Self::Unencoded => "8bit",
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding allowed for file content (embedded files and attachments).
///
/// Files are always transferred as base64; the only choice is whether the
/// content still has to be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FileEncoding {
    /// Raw bytes, base64-encoded on export.
    #[default]
    Base64,
    /// Content is already base64 text.
    Base64PreEncoded,
}

impl From<FileEncoding> for TransferEncoding {
    fn from(encoding: FileEncoding) -> Self {
        match encoding {
            FileEncoding::Base64 => Self::Base64,
            FileEncoding::Base64PreEncoded => Self::Base64PreEncoded,
        }
    }
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn push_escape(out: &mut Vec<u8>, byte: u8) {
    out.extend_from_slice(&[b'=', HEX[usize::from(byte >> 4)], HEX[usize::from(byte & 0x0F)]]);
}

/// Returns true if `rest` starts a hard line break or is empty.
fn at_line_end(rest: &[u8]) -> bool {
    matches!(rest.first(), None | Some(b'\r' | b'\n'))
}

/// Encodes bytes as Quoted-Printable (RFC 2045 section 6.7) without wrapping.
///
/// Hard line breaks (`\r\n`, bare `\n` and bare `\r`) are all written as
/// CRLF, so the output never carries a bare line terminator. Whitespace that
/// would end a line is escaped, as are `=` and every byte outside printable
/// ASCII. The output is meant to be fed through a
/// [`QpLineWriter`](crate::wrap::QpLineWriter).
#[must_use]
pub fn encode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 4);
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];
        let rest = &input[i + 1..];
        match byte {
            b'\r' if rest.starts_with(b"\n") => {
                out.extend_from_slice(b"\r\n");
                i += 2;
                continue;
            }
            b'\r' | b'\n' => out.extend_from_slice(b"\r\n"),
            b' ' | b'\t' if at_line_end(rest) => push_escape(&mut out, byte),
            b' ' | b'\t' | b'!'..=b'<' | b'>'..=b'~' => out.push(byte),
            _ => push_escape(&mut out, byte),
        }
        i += 1;
    }

    out
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_encoding_tokens() {
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
        assert_eq!(TransferEncoding::Base64PreEncoded.to_string(), "base64");
        assert_eq!(TransferEncoding::Unencoded.to_string(), "8bit");
    }

    #[test]
    fn test_file_encoding_conversion() {
        assert_eq!(TransferEncoding::from(FileEncoding::Base64), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::from(FileEncoding::Base64PreEncoded),
            TransferEncoding::Base64PreEncoded
        );
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), b"Hello, World!");
    }

    #[test]
    fn test_quoted_printable_escapes() {
        assert_eq!(encode_quoted_printable("Héllo".as_bytes()), b"H=C3=A9llo");
        assert_eq!(encode_quoted_printable(b"a=b"), b"a=3Db");
        assert_eq!(encode_quoted_printable(b"a\x0Bb\x7F"), b"a=0Bb=7F");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(encode_quoted_printable(b"end "), b"end=20");
        assert_eq!(encode_quoted_printable(b"tab\t\r\nnext"), b"tab=09\r\nnext");
        assert_eq!(encode_quoted_printable(b"a b\nc"), b"a b\r\nc");
        assert_eq!(encode_quoted_printable(b"x \ny"), b"x=20\r\ny");
        assert_eq!(encode_quoted_printable(b"x\t\rz"), b"x=09\r\nz");
    }

    #[test]
    fn test_quoted_printable_keeps_line_breaks() {
        assert_eq!(
            encode_quoted_printable(b"line one\nline two\rthree"),
            b"line one\r\nline two\r\nthree"
        );
        assert_eq!(encode_quoted_printable(b"a\r\nb"), b"a\r\nb");
        assert_eq!(encode_quoted_printable(b"a\n\rb"), b"a\r\n\r\nb");
        assert_eq!(encode_quoted_printable(b"\r\r\n"), b"\r\n\r\n");
    }

    #[test]
    fn test_quoted_printable_has_no_bare_line_feed() {
        let encoded = encode_quoted_printable(b"one\ntwo\r\nthree\rfour\n");
        for (i, &byte) in encoded.iter().enumerate() {
            if byte == b'\n' {
                assert!(i > 0 && encoded[i - 1] == b'\r', "bare LF at {i}");
            }
            if byte == b'\r' {
                assert_eq!(encoded.get(i + 1), Some(&b'\n'), "bare CR at {i}");
            }
        }
    }
}
