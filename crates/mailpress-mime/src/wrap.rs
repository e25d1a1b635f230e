//! Line-wrapping writers for encoded bodies.
//!
//! Both writers sit between an encoder and the output sink and guarantee
//! that no emitted line exceeds [`MAX_LINE_LEN`] characters, as required by
//! RFC 2045 section 6.7 (quoted-printable) and section 6.8 (base64). Each
//! keeps a column counter across writes, so a body may be fed in any number
//! of chunks.

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;

/// Maximum length of an encoded line, excluding the CRLF terminator.
pub const MAX_LINE_LEN: usize = 76;

/// Line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Quoted-printable soft line break.
pub const SOFT_BREAK: &[u8] = b"=\r\n";

/// Folds base64 text into lines of [`MAX_LINE_LEN`] characters.
///
/// The writer does not encode anything itself. Use [`write_base64`] to encode
/// raw bytes, or write already encoded base64 straight into it.
#[derive(Debug)]
pub struct Base64LineWriter<W> {
    inner: W,
    line_len: usize,
}

impl<W: Write> Base64LineWriter<W> {
    /// Creates a writer starting at column 0.
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self { inner, line_len: 0 }
    }

    /// Number of bytes written since the last line break.
    #[must_use]
    pub const fn line_len(&self) -> usize {
        self.line_len
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Base64LineWriter<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let written = buf.len();

        while buf.len() + self.line_len > MAX_LINE_LEN {
            let take = MAX_LINE_LEN - self.line_len;
            self.inner.write_all(&buf[..take])?;
            self.inner.write_all(CRLF)?;
            buf = &buf[take..];
            self.line_len = 0;
        }

        self.inner.write_all(buf)?;
        self.line_len += buf.len();

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Base64-encodes `data` into `out`, folded into lines of [`MAX_LINE_LEN`]
/// characters. No line break follows the last line.
///
/// # Errors
///
/// Returns the first error reported by `out`.
pub fn write_base64<W: Write>(out: &mut W, data: &[u8]) -> io::Result<()> {
    let mut encoder = EncoderWriter::new(Base64LineWriter::new(out), &STANDARD);
    encoder.write_all(data)?;
    encoder.finish()?;
    Ok(())
}

/// Folds quoted-printable text into lines of at most [`MAX_LINE_LEN`]
/// characters.
///
/// Hard line breaks already present in the input are copied through and
/// reset the column. Long lines get a soft line break (`=` CRLF), which is
/// never placed inside an `=XX` escape. The `=` of a soft break counts
/// towards the line length.
///
/// An escape must not straddle two `write` calls; hand each encoded body
/// over in one piece or split it between escapes.
#[derive(Debug)]
pub struct QpLineWriter<W> {
    inner: W,
    line_len: usize,
}

impl<W: Write> QpLineWriter<W> {
    /// Creates a writer starting at column 0.
    #[must_use]
    pub const fn new(inner: W) -> Self {
        Self { inner, line_len: 0 }
    }

    /// Number of bytes written since the last line break.
    #[must_use]
    pub const fn line_len(&self) -> usize {
        self.line_len
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Position of the soft break in `buf`, leaving room for the trailing `=`
    /// and backing off so that no escape triplet is cut.
    fn soft_break_at(&self, buf: &[u8]) -> usize {
        let cut = MAX_LINE_LEN - self.line_len - 1;
        if cut >= 2 && buf[cut - 2] == b'=' {
            cut - 2
        } else if cut >= 1 && buf[cut - 1] == b'=' {
            cut - 1
        } else {
            cut
        }
    }
}

impl<W: Write> Write for QpLineWriter<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let written = buf.len();

        while !buf.is_empty() {
            let remaining = MAX_LINE_LEN - self.line_len;

            // Everything left fits on the current line.
            if buf.len() < remaining {
                self.inner.write_all(buf)?;
                self.line_len += buf.len();
                break;
            }

            // A hard line break within reach ends the line as-is. The line
            // may use the full width, so a CRLF can start at `remaining`.
            let window = &buf[..buf.len().min(remaining + 2)];
            if let Some(i) = window.iter().position(|&b| b == b'\n')
                && (i != remaining + 1 || buf[i - 1] == b'\r')
            {
                self.inner.write_all(&buf[..=i])?;
                buf = &buf[i + 1..];
                self.line_len = 0;
                continue;
            }

            let cut = self.soft_break_at(buf);
            self.inner.write_all(&buf[..cut])?;
            self.inner.write_all(SOFT_BREAK)?;
            buf = &buf[cut..];
            self.line_len = 0;
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
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
    use crate::encoding::encode_quoted_printable;
    use base64::Engine;
    use proptest::prelude::*;

    fn base64_wrapped(data: &[u8]) -> String {
        let mut out = Vec::new();
        write_base64(&mut out, data).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Rewrites every hard line break (`\r\n`, `\n`, `\r`) as CRLF.
    fn crlf_breaks(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len());
        let mut i = 0;
        while i < data.len() {
            match data[i] {
                b'\r' if data.get(i + 1) == Some(&b'\n') => {
                    out.extend_from_slice(CRLF);
                    i += 1;
                }
                b'\r' | b'\n' => out.extend_from_slice(CRLF),
                byte => out.push(byte),
            }
            i += 1;
        }
        out
    }

    fn qp_wrapped(data: &[u8]) -> String {
        let mut out = Vec::new();
        QpLineWriter::new(&mut out)
            .write_all(&encode_quoted_printable(data))
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    fn decode_qp(text: &str) -> Vec<u8> {
        let bytes = text.as_bytes();
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'=' {
                if bytes[i + 1..].starts_with(b"\r\n") {
                    i += 3;
                    continue;
                }
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        out
    }

    #[test]
    fn test_base64_repeated_bytes() {
        let encoded = base64_wrapped(&[b'a'; 100]);
        let lines: Vec<&str> = encoded.split("\r\n").collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), MAX_LINE_LEN);
        assert_eq!(lines[1].len(), 136 - MAX_LINE_LEN);
        assert!(!encoded.ends_with("\r\n"));
    }

    #[test]
    fn test_base64_exact_line_has_no_trailing_break() {
        let mut out = Vec::new();
        let mut writer = Base64LineWriter::new(&mut out);
        writer.write_all(&[b'A'; MAX_LINE_LEN]).unwrap();
        assert_eq!(writer.line_len(), MAX_LINE_LEN);

        writer.write_all(b"BB").unwrap();
        assert_eq!(writer.line_len(), 2);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, format!("{}\r\nBB", "A".repeat(MAX_LINE_LEN)));
    }

    #[test]
    fn test_base64_column_carries_across_writes() {
        let mut out = Vec::new();
        let mut writer = Base64LineWriter::new(&mut out);
        for _ in 0..10 {
            writer.write_all(&[b'x'; 20]).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.iter().map(|l| l.len()).collect::<Vec<_>>(), [76, 76, 48]);
    }

    #[test]
    fn test_qp_short_input_unchanged() {
        assert_eq!(qp_wrapped(b"short line"), "short line");
    }

    #[test]
    fn test_qp_soft_break_position() {
        let text = qp_wrapped(&[b'a'; 100]);
        let lines: Vec<&str> = text.split("\r\n").collect();

        assert_eq!(lines[0], format!("{}=", "a".repeat(75)));
        assert_eq!(lines[1], "a".repeat(25));
    }

    #[test]
    fn test_qp_never_splits_escape() {
        for offset in 0..4 {
            let mut input = vec![b'a'; 70 + offset];
            input.extend_from_slice(&[0xE9; 10]);
            let text = qp_wrapped(&input);

            for line in text.split("\r\n") {
                let content = line.strip_suffix('=').unwrap_or(line);
                let tail = content.len().saturating_sub(2);
                assert!(!content[tail..].contains('='), "split escape in {line:?}");
                assert!(line.len() <= MAX_LINE_LEN);
            }
            assert_eq!(decode_qp(&text), input);
        }
    }

    #[test]
    fn test_qp_hard_breaks_reset_column() {
        let mut input = "b".repeat(60).into_bytes();
        input.extend_from_slice(b"\r\n");
        input.extend_from_slice("c".repeat(60).as_bytes());
        let text = qp_wrapped(&input);

        assert!(!text.contains("=\r\n"));
        assert_eq!(text.as_bytes(), input.as_slice());
    }

    #[test]
    fn test_qp_bare_breaks_written_as_crlf() {
        let mut input = "g".repeat(80).into_bytes();
        input.extend_from_slice(b"\nshort\rlast ");
        let text = qp_wrapped(&input);

        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines, [format!("{}=", "g".repeat(75)).as_str(), "ggggg", "short", "last=20"]);
    }

    #[test]
    fn test_qp_full_width_line_before_crlf() {
        let mut input = "d".repeat(MAX_LINE_LEN).into_bytes();
        input.extend_from_slice(b"\r\nnext");
        let text = qp_wrapped(&input);

        assert_eq!(text.as_bytes(), input.as_slice());
    }

    #[test]
    fn test_qp_column_carries_across_writes() {
        let mut out = Vec::new();
        let mut writer = QpLineWriter::new(&mut out);
        writer.write_all(&[b'e'; 50]).unwrap();
        writer.write_all(&[b'f'; 50]).unwrap();
        assert_eq!(writer.line_len(), 25);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("{}{}=\r\n", "e".repeat(50), "f".repeat(25))));
    }

    proptest! {
        #[test]
        fn prop_base64_lines_bounded(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = base64_wrapped(&data);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LEN);
            }
            let joined: String = encoded.split("\r\n").collect();
            prop_assert_eq!(STANDARD.decode(joined).unwrap(), data);
        }

        #[test]
        fn prop_qp_lines_bounded_and_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let text = qp_wrapped(&data);
            for line in text.split("\r\n") {
                prop_assert!(!line.contains(['\r', '\n']), "bare line terminator in {:?}", line);
                prop_assert!(line.len() <= MAX_LINE_LEN, "line too long: {:?}", line);
                if let Some(content) = line.strip_suffix('=') {
                    let tail = content.len().saturating_sub(2);
                    prop_assert!(!content[tail..].contains('='), "split escape: {:?}", line);
                }
            }
            prop_assert_eq!(decode_qp(&text), crlf_breaks(&data));
        }
    }
}
