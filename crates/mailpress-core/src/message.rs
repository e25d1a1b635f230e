//! Message model: headers, text parts, embedded files and attachments.

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use mailpress_mime::{ContentType, FileEncoding, Headers, quote};

use crate::clock::{Clock, SystemClock};
use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::export::{Exported, Failed};
use crate::pool::BufferPool;

/// Format of the `Date` header (RFC 5322 section 3.3).
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// A textual body part, such as the plain-text or HTML version of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    content_type: ContentType,
    body: Vec<u8>,
}

impl Part {
    /// Content type of the part, without charset.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// A file embedded in or attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    name: String,
    mime_type: ContentType,
    content: Vec<u8>,
    content_id: Option<String>,
    encoding: FileEncoding,
}

impl File {
    /// Creates a file of type `application/octet-stream`.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            mime_type: ContentType::octet_stream(),
            content: content.into(),
            content_id: None,
            encoding: FileEncoding::Base64,
        }
    }

    /// Reads a file from disk. The name is the file name of `path` and the
    /// MIME type is guessed from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&name);

        Ok(Self::new(name, content).with_mime_type(mime_type))
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: ContentType) -> Self {
        self.mime_type = mime_type;
        self
    }

    /// Sets the Content-ID used to reference an embedded file.
    #[must_use]
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Sets how the content is encoded.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: FileEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Changes the name shown to the recipient.
    #[must_use]
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// MIME type.
    #[must_use]
    pub const fn mime_type(&self) -> &ContentType {
        &self.mime_type
    }

    /// Raw content (already base64 for [`FileEncoding::Base64PreEncoded`]).
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Content-ID, if one was set.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    /// Content encoding.
    #[must_use]
    pub const fn encoding(&self) -> FileEncoding {
        self.encoding
    }
}

/// Guesses a MIME type from a file name's extension.
#[must_use]
pub fn guess_mime_type(name: &str) -> ContentType {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let (main, sub) = match extension.as_str() {
        "txt" => ("text", "plain"),
        "htm" | "html" => ("text", "html"),
        "css" => ("text", "css"),
        "csv" => ("text", "csv"),
        "png" => ("image", "png"),
        "jpg" | "jpeg" => ("image", "jpeg"),
        "gif" => ("image", "gif"),
        "svg" => ("image", "svg+xml"),
        "webp" => ("image", "webp"),
        "pdf" => ("application", "pdf"),
        "json" => ("application", "json"),
        "zip" => ("application", "zip"),
        "ics" => ("text", "calendar"),
        _ => return ContentType::octet_stream(),
    };
    ContentType::new(main, sub)
}

/// Formats a date for a header field.
#[must_use]
pub fn format_date(date: &DateTime<FixedOffset>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Formats an address with an optional display name (`"Name" <address>`).
#[must_use]
pub fn format_address(address: &str, name: &str) -> String {
    if name.is_empty() {
        address.to_string()
    } else {
        format!("{} <{address}>", quote(name))
    }
}

/// An email message ready to be exported.
///
/// The message owns its parts and files. Part bodies live in buffers taken
/// from the message's [`BufferPool`]; [`reset`](Self::reset) returns them,
/// so one message object can be filled and exported repeatedly.
#[derive(Debug)]
pub struct Message {
    pub(crate) header: Headers,
    pub(crate) parts: Vec<Part>,
    pub(crate) embedded: Vec<File>,
    pub(crate) attachments: Vec<File>,
    pub(crate) config: ExportConfig,
    pool: Arc<BufferPool>,
    pub(crate) clock: Arc<dyn Clock>,
    exported: Option<Exported>,
}

impl Message {
    /// Creates an empty message with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ExportConfig::default())
    }

    /// Creates an empty message with the given configuration.
    #[must_use]
    pub fn with_config(config: ExportConfig) -> Self {
        Self {
            header: Headers::new(),
            parts: Vec::new(),
            embedded: Vec::new(),
            attachments: Vec::new(),
            config,
            pool: Arc::new(BufferPool::new()),
            clock: Arc::new(SystemClock),
            exported: None,
        }
    }

    /// Uses a shared buffer pool.
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Uses the given clock for the default `Date` header.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Export configuration.
    #[must_use]
    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Buffer pool backing the part bodies.
    #[must_use]
    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Caller-set header fields.
    #[must_use]
    pub const fn header(&self) -> &Headers {
        &self.header
    }

    /// Text parts in the order they were added.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Embedded files.
    #[must_use]
    pub fn embedded(&self) -> &[File] {
        &self.embedded
    }

    /// Attached files.
    #[must_use]
    pub fn attachments(&self) -> &[File] {
        &self.attachments
    }

    /// Sets a header field, replacing previous values.
    pub fn set_header(&mut self, field: &str, value: impl Into<String>) {
        self.header.set(field, value);
    }

    /// Sets a header field to several values.
    pub fn set_header_values(&mut self, field: &str, values: Vec<String>) {
        self.header.set_all(field, values);
    }

    /// Sets several header fields at once.
    pub fn set_headers<I, V>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, V)>,
        V: Into<Vec<String>>,
    {
        for (field, values) in fields {
            self.header.set_all(&field, values.into());
        }
    }

    /// Sets an address header field.
    pub fn set_address_header(&mut self, field: &str, address: &str, name: &str) {
        self.header.set(field, format_address(address, name));
    }

    /// Sets a date header field.
    pub fn set_date_header(&mut self, field: &str, date: &DateTime<FixedOffset>) {
        self.header.set(field, format_date(date));
    }

    /// Replaces all parts with a single body.
    pub fn set_body(&mut self, content_type: ContentType, body: impl AsRef<[u8]>) {
        self.release_parts();
        self.add_alternative(content_type, body);
    }

    /// Adds an alternative part, e.g. an HTML version after a plain-text one.
    pub fn add_alternative(&mut self, content_type: ContentType, body: impl AsRef<[u8]>) {
        let mut buf = self.pool.acquire();
        buf.extend_from_slice(body.as_ref());
        self.parts.push(Part {
            content_type,
            body: buf,
        });
    }

    /// Adds an alternative part whose body is produced by `write`.
    ///
    /// # Errors
    ///
    /// Returns the error of `write`; no part is added in that case.
    pub fn add_alternative_writer<F>(&mut self, content_type: ContentType, write: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = self.pool.acquire();
        if let Err(e) = write(&mut buf) {
            self.pool.release(buf);
            return Err(e.into());
        }
        self.parts.push(Part {
            content_type,
            body: buf,
        });
        Ok(())
    }

    /// Embeds a file, to be referenced from an HTML part by Content-ID.
    pub fn embed(&mut self, file: File) {
        self.embedded.push(file);
    }

    /// Attaches a file.
    pub fn attach(&mut self, file: File) {
        self.attachments.push(file);
    }

    /// Renders the message as MIME.
    ///
    /// The result stays owned by the message until the next export or
    /// [`reset`](Self::reset).
    ///
    /// # Errors
    ///
    /// Returns an error if writing the body fails.
    pub fn export(&mut self) -> Result<&Exported> {
        if let Some(previous) = self.exported.take() {
            self.pool.release(previous.into_body());
        }
        let result = crate::export::export(self, self.pool.acquire());
        self.store_export(result)
    }

    /// Keeps a successful export, or returns the buffer of a failed one to
    /// the pool.
    fn store_export(&mut self, result: std::result::Result<Exported, Failed>) -> Result<&Exported> {
        match result {
            Ok(exported) => Ok(self.exported.insert(exported)),
            Err((error, buf)) => {
                self.pool.release(buf);
                Err(error)
            }
        }
    }

    /// Result of the last [`export`](Self::export), if any.
    #[must_use]
    pub const fn exported(&self) -> Option<&Exported> {
        self.exported.as_ref()
    }

    /// Clears headers, parts and files and returns every buffer to the
    /// pool. Configuration, pool and clock are kept.
    pub fn reset(&mut self) {
        self.release_parts();
        if let Some(exported) = self.exported.take() {
            self.pool.release(exported.into_body());
        }
        self.header.clear();
        self.embedded.clear();
        self.attachments.clear();
    }

    fn release_parts(&mut self) {
        for part in self.parts.drain(..) {
            self.pool.release(part.body);
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
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
    use crate::clock::FixedClock;

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2014-06-25T17:46:00+02:00").unwrap()
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&fixed_date()), "Wed, 25 Jun 2014 17:46:00 +0200");
    }

    #[test]
    fn test_format_address() {
        assert_eq!(format_address("a@example.com", ""), "a@example.com");
        assert_eq!(
            format_address("a@example.com", "Alice \"Al\" Smith"),
            "\"Alice \\\"Al\\\" Smith\" <a@example.com>"
        );
    }

    #[test]
    fn test_headers() {
        let mut message = Message::new();
        message.set_header("subject", "Hello");
        message.set_address_header("From", "from@example.com", "Sender");
        message.set_date_header("X-Date", &fixed_date());
        message.set_headers(vec![(
            "To".to_string(),
            vec!["a@example.com".to_string(), "b@example.com".to_string()],
        )]);

        assert_eq!(message.header().get("Subject"), Some("Hello"));
        assert_eq!(
            message.header().get("From"),
            Some("\"Sender\" <from@example.com>")
        );
        assert_eq!(
            message.header().get("X-Date"),
            Some("Wed, 25 Jun 2014 17:46:00 +0200")
        );
        assert_eq!(message.header().get_all("to").len(), 2);
    }

    #[test]
    fn test_set_body_replaces_parts() {
        let mut message = Message::new();
        message.set_body(ContentType::text_plain(), "one");
        message.add_alternative(ContentType::text_html(), "<b>two</b>");
        assert_eq!(message.parts().len(), 2);

        message.set_body(ContentType::text_plain(), "three");
        assert_eq!(message.parts().len(), 1);
        assert_eq!(message.parts()[0].body(), b"three");
        // The two replaced bodies went back to the pool, one was reused.
        assert_eq!(message.pool().idle(), 1);
    }

    #[test]
    fn test_add_alternative_writer() {
        use std::io::Write;

        let mut message = Message::new();
        message
            .add_alternative_writer(ContentType::text_plain(), |w| write!(w, "n={}", 42))
            .unwrap();
        assert_eq!(message.parts()[0].body(), b"n=42");

        let err = message.add_alternative_writer(ContentType::text_html(), |_| {
            Err(io::Error::other("boom"))
        });
        assert!(matches!(err, Err(Error::Io(_))));
        assert_eq!(message.parts().len(), 1);
    }

    #[test]
    fn test_file_builders() {
        let file = File::new("data.bin", vec![1, 2, 3])
            .rename("renamed.bin")
            .with_content_id("cid-1")
            .with_encoding(FileEncoding::Base64PreEncoded);

        assert_eq!(file.name(), "renamed.bin");
        assert_eq!(file.content_id(), Some("cid-1"));
        assert_eq!(file.encoding(), FileEncoding::Base64PreEncoded);
        assert_eq!(file.mime_type(), &ContentType::octet_stream());
        assert_eq!(file.content(), [1, 2, 3]);
    }

    #[test]
    fn test_file_from_path() {
        let dir = std::env::temp_dir().join(format!("mailpress-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Logo.PNG");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let file = File::from_path(&path).unwrap();
        assert_eq!(file.name(), "Logo.PNG");
        assert_eq!(file.mime_type(), &ContentType::new("image", "png"));
        assert_eq!(file.content(), b"\x89PNG");

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(File::from_path(&path), Err(Error::Read { .. })));
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("a.jpeg").to_string(), "image/jpeg");
        assert_eq!(guess_mime_type("report.PDF").to_string(), "application/pdf");
        assert_eq!(guess_mime_type("noext").to_string(), "application/octet-stream");
    }

    #[test]
    fn test_failed_export_returns_buffer_to_pool() {
        let pool = Arc::new(BufferPool::new());
        let mut message = Message::new().with_pool(Arc::clone(&pool));
        let buf = Vec::with_capacity(128);

        let result = message.store_export(Err((Error::Io(io::Error::other("sink closed")), buf)));

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(pool.idle(), 1);
        assert!(message.exported().is_none());
        assert_eq!(message.pool.acquire().capacity(), 128);
    }

    #[test]
    fn test_reset_returns_buffers_and_keeps_config() {
        let config = ExportConfig::builder().charset("ISO-8859-1").build();
        let pool = Arc::new(BufferPool::new());
        let mut message = Message::with_config(config.clone())
            .with_pool(Arc::clone(&pool))
            .with_clock(Arc::new(FixedClock(fixed_date())));

        message.set_header("Subject", "Hi");
        message.set_body(ContentType::text_plain(), "body");
        message.add_alternative(ContentType::text_html(), "<p>body</p>");
        message.attach(File::new("a.txt", "a"));
        message.embed(File::new("b.png", "b"));
        message.export().unwrap();
        assert_eq!(pool.idle(), 0);

        message.reset();

        assert!(message.header().is_empty());
        assert!(message.parts().is_empty());
        assert!(message.embedded().is_empty());
        assert!(message.attachments().is_empty());
        assert!(message.exported().is_none());
        assert_eq!(message.config(), &config);
        assert_eq!(pool.idle(), 3);
    }
}
