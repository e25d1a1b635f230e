//! Turns a [`Message`] into top-level headers and a MIME body.

use std::io::Write;

use mailpress_mime::{Headers, TransferEncoding, quote};
use tracing::debug;

use crate::error::{Error, Result};
use crate::message::{File, Message, format_date};
use crate::structure::Structure;
use crate::writer::MessageWriter;

/// An exported message: the top-level header map plus the body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    header: Headers,
    body: Vec<u8>,
}

impl Exported {
    /// Top-level header fields.
    #[must_use]
    pub const fn header(&self) -> &Headers {
        &self.header
    }

    /// Encoded body, everything after the blank line.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Splits the result into header map and body.
    #[must_use]
    pub fn into_parts(self) -> (Headers, Vec<u8>) {
        (self.header, self.body)
    }

    pub(crate) fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Writes the complete message (headers, blank line, body) to `out`
    /// and returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by `out`.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<u64> {
        let head = self.header.to_string();
        out.write_all(head.as_bytes())?;
        out.write_all(b"\r\n")?;
        out.write_all(&self.body)?;
        out.flush()?;
        Ok((head.len() + 2 + self.body.len()) as u64)
    }

    /// Renders the complete message into a new buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = self.header.to_string();
        let mut out = Vec::with_capacity(head.len() + 2 + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }
}

/// Where a file is shown to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// A failed export: the error and the buffer that was handed in.
pub(crate) type Failed = (Error, Vec<u8>);

/// Exports `message` into `buf`, which becomes the body of the result.
///
/// Sections are opened outermost first and closed in reverse: the text
/// parts sit innermost, embedded files next to them, attachments last.
/// On failure `buf` is handed back alongside the error.
pub(crate) fn export(message: &Message, buf: Vec<u8>) -> std::result::Result<Exported, Failed> {
    let structure = Structure::classify(
        message.parts.len(),
        message.embedded.len(),
        message.attachments.len(),
    );
    debug!(
        parts = message.parts.len(),
        embedded = message.embedded.len(),
        attachments = message.attachments.len(),
        ?structure,
        "exporting message"
    );

    let mut header = message.header.clone();
    if !header.contains("Mime-Version") {
        header.set("Mime-Version", "1.0");
    }
    if !header.contains("Date") {
        header.set("Date", format_date(&message.clock.now()));
    }

    let mut w = MessageWriter::new(header, buf);
    if let Err(error) = write_sections(message, structure, &mut w) {
        return Err((error, w.into_buffer()));
    }

    let (header, body) = w.finish();
    Ok(Exported { header, body })
}

fn write_sections(message: &Message, structure: Structure, w: &mut MessageWriter) -> Result<()> {
    for kind in structure.wrappers() {
        w.open(kind)?;
    }

    let config = &message.config;
    for part in &message.parts {
        let content_type = part
            .content_type()
            .clone()
            .with_parameter("charset", config.charset.as_str());
        let mut h = Headers::new();
        h.set("Mime-Version", "1.0");
        h.set("Content-Type", content_type.to_string());
        h.set("Content-Transfer-Encoding", config.encoding.as_str());

        w.write(h, part.body(), config.encoding)?;
    }
    if structure.alternative {
        w.close()?;
    }

    write_files(w, &message.embedded, Disposition::Inline)?;
    if structure.related {
        w.close()?;
    }

    write_files(w, &message.attachments, Disposition::Attachment)?;
    if structure.mixed {
        w.close()?;
    }

    debug_assert_eq!(w.depth(), 0);
    Ok(())
}

fn write_files(w: &mut MessageWriter, files: &[File], disposition: Disposition) -> Result<()> {
    for file in files {
        let name = file.name();
        let mut h = Headers::new();
        h.set(
            "Content-Type",
            file.mime_type()
                .clone()
                .with_parameter("name", name)
                .to_string(),
        );
        // Only the two base64 variants exist for files; both are declared
        // as plain base64.
        h.set("Content-Transfer-Encoding", TransferEncoding::Base64.as_str());
        h.set(
            "Content-Disposition",
            format!("{}; filename={}", disposition.as_str(), quote(name)),
        );
        if disposition == Disposition::Inline {
            let content_id = file.content_id().unwrap_or(name);
            h.set("Content-ID", format!("<{content_id}>"));
        }

        debug!(name, disposition = disposition.as_str(), size = file.content().len(), "writing file");
        w.write(h, file.content(), file.encoding().into())?;
    }
    Ok(())
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
    use crate::clock::FixedClock;
    use chrono::DateTime;
    use mailpress_mime::ContentType;
    use std::io;
    use std::sync::Arc;

    fn message() -> Message {
        let date = DateTime::parse_from_rfc3339("2014-06-25T17:46:00+02:00").unwrap();
        Message::new().with_clock(Arc::new(FixedClock(date)))
    }

    struct FailingSink {
        accepted: usize,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.accepted + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            self.accepted += buf.len();
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_default_headers() {
        let mut message = message();
        let exported = message.export().unwrap();

        assert_eq!(exported.header().get("Mime-Version"), Some("1.0"));
        assert_eq!(
            exported.header().get("Date"),
            Some("Wed, 25 Jun 2014 17:46:00 +0200")
        );
        assert!(exported.body().is_empty());
    }

    #[test]
    fn test_caller_date_kept() {
        let mut message = message();
        message.set_header("Date", "Mon, 01 Jan 2024 00:00:00 +0000");
        let exported = message.export().unwrap();

        assert_eq!(
            exported.header().get_all("Date"),
            ["Mon, 01 Jan 2024 00:00:00 +0000"]
        );
    }

    #[test]
    fn test_export_does_not_modify_message_headers() {
        let mut message = message();
        message.set_body(ContentType::text_plain(), "hi");
        message.export().unwrap();

        assert!(!message.header().contains("Date"));
        assert!(!message.header().contains("Content-Type"));
    }

    #[test]
    fn test_write_to_renders_headers_then_body() {
        let mut message = message();
        message.set_header("Subject", "Hello");
        message.set_body(ContentType::text_plain(), "Hi there");
        let exported = message.export().unwrap();

        let mut out = Vec::new();
        let written = exported.write_to(&mut out).unwrap();
        assert_eq!(written, out.len() as u64);
        assert_eq!(out, exported.to_bytes());

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            concat!(
                "Content-Transfer-Encoding: quoted-printable\r\n",
                "Content-Type: text/plain; charset=UTF-8\r\n",
                "Date: Wed, 25 Jun 2014 17:46:00 +0200\r\n",
                "Mime-Version: 1.0\r\n",
                "Subject: Hello\r\n",
                "\r\n",
                "Hi there"
            )
        );
    }

    #[test]
    fn test_write_to_propagates_sink_errors() {
        let mut message = message();
        message.set_body(ContentType::text_plain(), "x".repeat(500));
        let exported = message.export().unwrap();

        let sink = FailingSink {
            accepted: 0,
            limit: 100,
        };
        let err = exported.write_to(sink).unwrap_err();
        assert!(matches!(err, crate::Error::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_inline_file_content_id_defaults_to_name() {
        let mut message = message();
        message.embed(File::new("logo.png", vec![1, 2, 3]).with_mime_type(ContentType::new("image", "png")));
        let exported = message.export().unwrap();
        let header = exported.header();

        assert_eq!(header.get("Content-Type"), Some("image/png; name=\"logo.png\""));
        assert_eq!(header.get("Content-Disposition"), Some("inline; filename=\"logo.png\""));
        assert_eq!(header.get("Content-ID"), Some("<logo.png>"));
        assert_eq!(header.get("Content-Transfer-Encoding"), Some("base64"));
        assert_eq!(exported.body(), b"AQID");
    }

    #[test]
    fn test_attachment_has_no_content_id() {
        let mut message = message();
        message.attach(File::new("a.bin", "abc").with_content_id("ignored"));
        let exported = message.export().unwrap();

        assert_eq!(
            exported.header().get("Content-Disposition"),
            Some("attachment; filename=\"a.bin\"")
        );
        assert!(!exported.header().contains("Content-ID"));
    }

    #[test]
    fn test_export_twice_reuses_buffer() {
        let mut message = message();
        message.set_body(ContentType::text_plain(), "body");
        let first = message.export().unwrap().body().to_vec();
        let second = message.export().unwrap().body().to_vec();

        assert_eq!(first, second);
        assert_eq!(message.pool().idle(), 0);
    }
}
