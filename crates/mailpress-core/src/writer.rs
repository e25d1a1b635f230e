//! Bounded stack of nested multipart sections writing into one buffer.

use std::io::Write;

use mailpress_mime::{
    Base64LineWriter, ContentType, Headers, QpLineWriter, Section, TransferEncoding,
    encode_quoted_printable, write_base64,
};
use tracing::{trace, warn};

use crate::error::Result;
use crate::structure::MultipartKind;

/// Maximum number of simultaneously open sections: one per
/// [`MultipartKind`].
pub const MAX_DEPTH: usize = 3;

/// Writes a message body, opening and closing nested multipart sections.
///
/// At depth 0 part headers go into the top-level header map and the body is
/// written straight into the buffer. Inside a section every write creates a
/// new part of the innermost section.
#[derive(Debug)]
pub struct MessageWriter {
    header: Headers,
    buf: Vec<u8>,
    stack: Vec<(MultipartKind, Section)>,
    root_bodies: usize,
}

impl MessageWriter {
    /// Creates a writer with the top-level header map and an empty buffer.
    #[must_use]
    pub fn new(header: Headers, mut buf: Vec<u8>) -> Self {
        buf.clear();
        Self {
            header,
            buf,
            stack: Vec::with_capacity(MAX_DEPTH),
            root_bodies: 0,
        }
    }

    /// Number of open sections.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Opens a nested section of the given kind.
    ///
    /// # Panics
    ///
    /// Panics if [`MAX_DEPTH`] sections are already open, or if `kind` does
    /// not nest inside the innermost open section (mixed, then related, then
    /// alternative).
    ///
    /// # Errors
    ///
    /// Returns an error if writing the part header fails.
    pub fn open(&mut self, kind: MultipartKind) -> Result<()> {
        assert!(
            self.stack.len() < MAX_DEPTH,
            "multipart nesting exceeds {MAX_DEPTH} levels"
        );
        if let Some((outer, _)) = self.stack.last() {
            assert!(
                kind > *outer,
                "multipart/{} cannot be nested inside multipart/{}",
                kind.subtype(),
                outer.subtype()
            );
        }

        let section = Section::new();
        let content_type = ContentType::multipart(kind.subtype(), section.boundary()).to_string();

        if self.stack.is_empty() {
            self.header.set("Content-Type", content_type);
        } else {
            let mut h = Headers::new();
            h.set("Content-Type", content_type);
            self.create_part(&h)?;
        }

        self.stack.push((kind, section));
        trace!(%kind, depth = self.stack.len(), "opened multipart section");
        Ok(())
    }

    /// Closes the innermost section. Does nothing at depth 0.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the closing delimiter fails.
    pub fn close(&mut self) -> Result<()> {
        if let Some((kind, section)) = self.stack.pop() {
            section.close(&mut self.buf)?;
            trace!(%kind, depth = self.stack.len(), "closed multipart section");
        }
        Ok(())
    }

    /// Writes one part: its headers and its body encoded with `encoding`.
    ///
    /// Outside any section there is no delimiter to separate bodies. A second
    /// root write overwrites same-named top-level headers and appends its
    /// body directly to the previous one. Exports hit this only for layouts
    /// with no text part, one attachment and some embedded files, which need
    /// no wrapper under the classification rules.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the buffer fails.
    pub fn write(&mut self, headers: Headers, body: &[u8], encoding: TransferEncoding) -> Result<()> {
        if self.stack.is_empty() {
            self.root_bodies += 1;
            if self.root_bodies > 1 {
                warn!(
                    bodies = self.root_bodies,
                    "more than one body written outside a multipart section"
                );
            }
            self.header.extend(headers);
        } else {
            self.create_part(&headers)?;
        }
        self.write_body(body, encoding)
    }

    fn create_part(&mut self, headers: &Headers) -> Result<()> {
        if let Some((_, section)) = self.stack.last_mut() {
            section.create_part(&mut self.buf, headers)?;
        }
        Ok(())
    }

    fn write_body(&mut self, body: &[u8], encoding: TransferEncoding) -> Result<()> {
        match encoding {
            TransferEncoding::Base64 => write_base64(&mut self.buf, body)?,
            TransferEncoding::Base64PreEncoded => {
                Base64LineWriter::new(&mut self.buf).write_all(body)?;
            }
            TransferEncoding::QuotedPrintable => {
                QpLineWriter::new(&mut self.buf).write_all(&encode_quoted_printable(body))?;
            }
            TransferEncoding::Unencoded => self.buf.extend_from_slice(body),
        }
        Ok(())
    }

    /// Abandons the message and returns the buffer, whatever was written.
    #[must_use]
    pub fn into_buffer(self) -> Vec<u8> {
        self.buf
    }

    /// Consumes the writer, returning the top-level headers and the body.
    ///
    /// # Panics
    ///
    /// Panics if a section is still open.
    #[must_use]
    pub fn finish(self) -> (Headers, Vec<u8>) {
        assert!(
            self.stack.is_empty(),
            "{} multipart section(s) left open",
            self.stack.len()
        );
        (self.header, self.buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn text_headers() -> Headers {
        let mut h = Headers::new();
        h.set("Content-Type", "text/plain; charset=UTF-8");
        h.set("Content-Transfer-Encoding", "8bit");
        h
    }

    #[test]
    fn test_root_write_merges_headers() {
        let mut header = Headers::new();
        header.set("Subject", "Hi");
        let mut writer = MessageWriter::new(header, Vec::new());

        writer
            .write(text_headers(), b"hello", TransferEncoding::Unencoded)
            .unwrap();
        let (header, body) = writer.finish();

        assert_eq!(header.get("Subject"), Some("Hi"));
        assert_eq!(header.get("Content-Type"), Some("text/plain; charset=UTF-8"));
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_open_close_depth() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        writer.open(MultipartKind::Mixed).unwrap();
        writer.open(MultipartKind::Related).unwrap();
        writer.open(MultipartKind::Alternative).unwrap();
        assert_eq!(writer.depth(), MAX_DEPTH);

        for expected in (0..MAX_DEPTH).rev() {
            writer.close().unwrap();
            assert_eq!(writer.depth(), expected);
        }
        writer.close().unwrap();
        assert_eq!(writer.depth(), 0);

        let (header, body) = writer.finish();
        let content_type = header.get("Content-Type").unwrap();
        assert!(content_type.starts_with("multipart/mixed; boundary=\"=_"));

        let body = String::from_utf8(body).unwrap();
        assert_eq!(body.matches("Content-Type: multipart/").count(), 2);
        assert_eq!(body.matches("--\r\n").count(), 3);
    }

    #[test]
    fn test_nested_part_written_into_innermost_section() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        writer.open(MultipartKind::Alternative).unwrap();
        writer
            .write(text_headers(), b"one", TransferEncoding::Unencoded)
            .unwrap();
        writer
            .write(text_headers(), b"two", TransferEncoding::Unencoded)
            .unwrap();
        writer.close().unwrap();

        let (header, body) = writer.finish();
        let boundary = header
            .get("Content-Type")
            .and_then(|ct| mailpress_mime::ContentType::parse(ct).ok())
            .and_then(|ct| ct.boundary().map(str::to_string))
            .unwrap();
        let body = String::from_utf8(body).unwrap();

        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("\r\n\r\none\r\n--"));
        assert!(body.ends_with(&format!("two\r\n--{boundary}--\r\n")));
    }

    #[test]
    fn test_base64_body_is_wrapped() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        writer
            .write(Headers::new(), &[7u8; 100], TransferEncoding::Base64)
            .unwrap();
        let (_, body) = writer.finish();
        let body = String::from_utf8(body).unwrap();

        let lines: Vec<&str> = body.split("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 60);
    }

    #[test]
    fn test_pre_encoded_body_only_folded() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        let encoded = "QUJD".repeat(30);
        writer
            .write(Headers::new(), encoded.as_bytes(), TransferEncoding::Base64PreEncoded)
            .unwrap();
        let (_, body) = writer.finish();

        let body = String::from_utf8(body).unwrap();
        assert_eq!(body.replace("\r\n", ""), encoded);
        assert_eq!(body.split("\r\n").next().unwrap().len(), 76);
    }

    #[test]
    #[should_panic(expected = "cannot be nested")]
    fn test_out_of_order_nesting_panics() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        writer.open(MultipartKind::Alternative).unwrap();
        let _ = writer.open(MultipartKind::Mixed);
    }

    #[test]
    #[should_panic(expected = "left open")]
    fn test_finish_with_open_section_panics() {
        let mut writer = MessageWriter::new(Headers::new(), Vec::new());
        writer.open(MultipartKind::Mixed).unwrap();
        let _ = writer.finish();
    }
}
