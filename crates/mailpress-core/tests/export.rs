//! End-to-end export tests.
//!
//! Each test exports a message and walks the produced MIME tree with a small
//! splitter, checking structure, headers and decoded bodies.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use mailpress_core::{
    BufferPool, ContentType, ExportConfig, File, FileEncoding, FixedClock, Message,
    TransferEncoding,
};
use proptest::prelude::*;

/// A parsed MIME entity: header lines and raw body.
#[derive(Debug)]
struct Entity {
    headers: Vec<(String, String)>,
    body: String,
}

impl Entity {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn content_type(&self) -> &str {
        self.header("Content-Type").unwrap()
    }

    fn boundary(&self) -> Option<String> {
        let ct = ContentType::parse(self.header("Content-Type")?).ok()?;
        ct.boundary().map(str::to_string)
    }

    fn children(&self) -> Vec<Self> {
        let boundary = self.boundary().expect("not a multipart entity");
        split_multipart(&self.body, &boundary)
    }

    fn decoded(&self) -> Vec<u8> {
        match self.header("Content-Transfer-Encoding") {
            Some("base64") => STANDARD.decode(self.body.replace("\r\n", "")).unwrap(),
            Some("quoted-printable") => decode_qp(&self.body),
            _ => self.body.clone().into_bytes(),
        }
    }
}

fn parse_entity(text: &str) -> Entity {
    let (head, body) = text.split_once("\r\n\r\n").unwrap_or((text, ""));
    let headers = head
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| {
            let (name, value) = line.split_once(": ").unwrap();
            (name.to_string(), value.to_string())
        })
        .collect();
    Entity {
        headers,
        body: body.to_string(),
    }
}

fn split_multipart(body: &str, boundary: &str) -> Vec<Entity> {
    let delimiter = format!("--{boundary}");
    let rest = body
        .strip_prefix(&delimiter)
        .expect("body does not start with delimiter");

    let mut entities = Vec::new();
    let mut closed = false;
    for segment in rest.split(&format!("\r\n{delimiter}")) {
        if let Some(after) = segment.strip_prefix("--") {
            assert_eq!(after, "\r\n", "data after closing delimiter");
            closed = true;
            break;
        }
        let part = segment.strip_prefix("\r\n").unwrap();
        entities.push(parse_entity(part));
    }
    assert!(closed, "multipart section not closed");
    entities
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

fn message() -> Message {
    let date = DateTime::parse_from_rfc3339("2014-06-25T17:46:00+02:00").unwrap();
    let mut message = Message::new().with_clock(Arc::new(FixedClock(date)));
    message.set_address_header("From", "from@example.com", "Sender");
    message.set_header("To", "to@example.com");
    message.set_header("Subject", "Hello!");
    message
}

fn export(message: &mut Message) -> Entity {
    let bytes = message.export().unwrap().to_bytes();
    parse_entity(&String::from_utf8(bytes).unwrap())
}

fn assert_lines_bounded(body: &str) {
    for line in body.split("\r\n") {
        assert!(!line.contains(['\r', '\n']), "bare line terminator in {line:?}");
        assert!(line.len() <= 76, "line too long: {line:?}");
    }
}

/// Rewrites every hard line break (`\r\n`, `\n`, `\r`) as CRLF.
fn crlf_breaks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'\r' if data.get(i + 1) == Some(&b'\n') => {
                out.extend_from_slice(b"\r\n");
                i += 1;
            }
            b'\r' | b'\n' => out.extend_from_slice(b"\r\n"),
            byte => out.push(byte),
        }
        i += 1;
    }
    out
}

#[test]
fn test_single_part_has_no_wrapper() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "Café au lait");
    let root = export(&mut message);

    assert_eq!(root.content_type(), "text/plain; charset=UTF-8");
    assert_eq!(root.header("Content-Transfer-Encoding"), Some("quoted-printable"));
    assert_eq!(root.header("Mime-Version"), Some("1.0"));
    assert_eq!(root.header("Date"), Some("Wed, 25 Jun 2014 17:46:00 +0200"));
    assert_eq!(root.header("From"), Some("\"Sender\" <from@example.com>"));
    assert_eq!(root.body, "Caf=C3=A9 au lait");
}

#[test]
fn test_two_parts_use_alternative() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "plain");
    message.add_alternative(ContentType::text_html(), "<p>html</p>");
    let root = export(&mut message);

    assert!(root.content_type().starts_with("multipart/alternative; boundary="));
    let children = root.children();
    assert_eq!(children.len(), 2);

    assert_eq!(children[0].content_type(), "text/plain; charset=UTF-8");
    assert_eq!(children[1].content_type(), "text/html; charset=UTF-8");
    for child in &children {
        assert_eq!(child.header("Content-Transfer-Encoding"), Some("quoted-printable"));
        assert_eq!(child.header("Mime-Version"), Some("1.0"));
    }
    assert_eq!(children[0].decoded(), b"plain");
    assert_eq!(children[1].decoded(), b"<p>html</p>");
}

#[test]
fn test_part_and_attachment_use_mixed() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "see attached");
    message.attach(
        File::new("report.pdf", vec![0u8, 1, 2, 255])
            .with_mime_type(ContentType::new("application", "pdf")),
    );
    let root = export(&mut message);

    assert!(root.content_type().starts_with("multipart/mixed; boundary="));
    let children = root.children();
    assert_eq!(children.len(), 2);

    assert_eq!(children[0].content_type(), "text/plain; charset=UTF-8");
    let attachment = &children[1];
    assert_eq!(attachment.content_type(), "application/pdf; name=\"report.pdf\"");
    assert_eq!(
        attachment.header("Content-Disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );
    assert_eq!(attachment.header("Content-Transfer-Encoding"), Some("base64"));
    assert_eq!(attachment.decoded(), [0u8, 1, 2, 255]);
}

#[test]
fn test_full_nesting_mixed_related_alternative() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "plain");
    message.add_alternative(ContentType::text_html(), "<img src=\"cid:logo\">");
    message.embed(
        File::new("logo.png", vec![0x89, b'P', b'N', b'G'])
            .with_mime_type(ContentType::new("image", "png"))
            .with_content_id("logo"),
    );
    message.attach(File::new("notes.txt", "some notes").with_mime_type(ContentType::text_plain()));
    let root = export(&mut message);

    assert!(root.content_type().starts_with("multipart/mixed;"));
    let mixed = root.children();
    assert_eq!(mixed.len(), 2);

    assert!(mixed[0].content_type().starts_with("multipart/related;"));
    let related = mixed[0].children();
    assert_eq!(related.len(), 2);

    assert!(related[0].content_type().starts_with("multipart/alternative;"));
    let alternative = related[0].children();
    assert_eq!(alternative.len(), 2);
    assert_eq!(alternative[0].decoded(), b"plain");
    assert_eq!(alternative[1].decoded(), b"<img src=\"cid:logo\">");

    let inline = &related[1];
    assert_eq!(inline.header("Content-ID"), Some("<logo>"));
    assert_eq!(inline.header("Content-Disposition"), Some("inline; filename=\"logo.png\""));
    assert_eq!(inline.decoded(), [0x89, b'P', b'N', b'G']);

    assert_eq!(mixed[1].header("Content-Disposition"), Some("attachment; filename=\"notes.txt\""));
    assert_eq!(mixed[1].decoded(), b"some notes");

    // Sections close innermost first.
    let alt = related[0].boundary().unwrap();
    let rel = mixed[0].boundary().unwrap();
    let mix = root.boundary().unwrap();
    let close_alt = root.body.find(&format!("--{alt}--")).unwrap();
    let close_rel = root.body.find(&format!("--{rel}--")).unwrap();
    let close_mix = root.body.find(&format!("--{mix}--")).unwrap();
    assert!(close_alt < close_rel && close_rel < close_mix);
}

#[test]
fn test_boundaries_are_distinct() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "a");
    message.add_alternative(ContentType::text_html(), "b");
    message.embed(File::new("x.png", "x"));
    message.attach(File::new("y.bin", "y"));
    let root = export(&mut message);

    let mixed = root.children();
    let related = mixed[0].children();
    let boundaries = [
        root.boundary().unwrap(),
        mixed[0].boundary().unwrap(),
        related[0].boundary().unwrap(),
    ];
    assert_ne!(boundaries[0], boundaries[1]);
    assert_ne!(boundaries[1], boundaries[2]);
    assert_ne!(boundaries[0], boundaries[2]);
}

#[test]
fn test_two_attachments_without_body() {
    let mut message = message();
    message.attach(File::new("a.bin", "a"));
    message.attach(File::new("b.bin", "b"));
    let root = export(&mut message);

    assert!(root.content_type().starts_with("multipart/mixed;"));
    let children = root.children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].decoded(), b"a");
    assert_eq!(children[1].decoded(), b"b");
}

#[test]
fn test_embedded_only_related() {
    let mut message = message();
    message.embed(File::new("a.png", "a"));
    message.embed(File::new("b.png", "b").with_content_id("bee"));
    let root = export(&mut message);

    assert!(root.content_type().starts_with("multipart/related;"));
    let children = root.children();
    assert_eq!(children[0].header("Content-ID"), Some("<a.png>"));
    assert_eq!(children[1].header("Content-ID"), Some("<bee>"));
}

#[test]
fn test_embedded_and_attachment_without_body_share_root() {
    // Neither related (one embedded, no text) nor mixed (one attachment,
    // no text) is needed, so both files are written at the root.
    let mut message = message();
    message.embed(File::new("a.png", "aaaa"));
    message.attach(File::new("b.bin", "bbbb"));
    let exported = message.export().unwrap();
    let header = exported.header();

    assert_eq!(header.get("Content-Type"), Some("application/octet-stream; name=\"b.bin\""));
    assert_eq!(header.get("Content-Disposition"), Some("attachment; filename=\"b.bin\""));
    assert_eq!(header.get("Content-ID"), Some("<a.png>"));
    assert_eq!(exported.body(), b"YWFhYQ==YmJiYg==");
}

#[test]
fn test_attachment_after_root_related_section() {
    let mut message = message();
    message.embed(File::new("a.png", "aaaa"));
    message.embed(File::new("b.png", "bbbb"));
    message.attach(File::new("c.bin", "cccc"));
    let exported = message.export().unwrap();
    let body = String::from_utf8(exported.body().to_vec()).unwrap();

    assert_eq!(
        exported.header().get("Content-Type"),
        Some("application/octet-stream; name=\"c.bin\"")
    );
    assert!(body.starts_with("--=_"));
    assert!(body.ends_with("--\r\nY2NjYw=="));
    assert_eq!(body.matches("Content-ID: ").count(), 2);
}

#[test]
fn test_pre_encoded_attachment() {
    let raw = vec![42u8; 300];
    let encoded = STANDARD.encode(&raw);
    let mut message = message();
    message.set_body(ContentType::text_plain(), "x");
    message.attach(File::new("blob.bin", encoded).with_encoding(FileEncoding::Base64PreEncoded));
    let root = export(&mut message);

    let children = root.children();
    assert_eq!(children[1].header("Content-Transfer-Encoding"), Some("base64"));
    assert_eq!(children[1].decoded(), raw);
    assert_lines_bounded(&children[1].body);
}

#[test]
fn test_base64_body_encoding() {
    let config = ExportConfig::builder()
        .encoding(TransferEncoding::Base64)
        .charset("ISO-8859-1")
        .build();
    let mut message = Message::with_config(config);
    message.set_body(ContentType::text_plain(), [b'z'; 100]);
    let root = export(&mut message);

    assert_eq!(root.content_type(), "text/plain; charset=ISO-8859-1");
    assert_eq!(root.header("Content-Transfer-Encoding"), Some("base64"));
    let lines: Vec<&str> = root.body.split("\r\n").collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].len(), 76);
    assert_eq!(lines[1].len(), 60);
}

#[test]
fn test_unencoded_body_passthrough() {
    let config = ExportConfig::builder()
        .encoding(TransferEncoding::Unencoded)
        .build();
    let mut message = Message::with_config(config);
    message.set_body(ContentType::text_plain(), "ünïcode = raw");
    let root = export(&mut message);

    assert_eq!(root.header("Content-Transfer-Encoding"), Some("8bit"));
    assert_eq!(root.body, "ünïcode = raw");
}

#[test]
fn test_reset_and_reuse() {
    let pool = Arc::new(BufferPool::new());
    let mut message = message().with_pool(Arc::clone(&pool));
    message.set_body(ContentType::text_plain(), "first");
    message.attach(File::new("a.bin", "a"));
    export(&mut message);

    message.reset();
    let idle = pool.idle();
    assert!(idle >= 2);

    message.set_body(ContentType::text_plain(), "second");
    let root = export(&mut message);
    assert_eq!(root.content_type(), "text/plain; charset=UTF-8");
    assert_eq!(root.decoded(), b"second");
    assert!(root.header("Subject").is_none());
    assert_eq!(pool.idle(), idle - 2);
}

#[test]
fn test_long_text_wrapped() {
    let text = "Lorem ipsum dolor sit amet, é consectetur = adipiscing elit. ".repeat(20);
    let mut message = message();
    message.set_body(ContentType::text_plain(), &text);
    message.add_alternative(ContentType::text_html(), format!("<p>{text}</p>"));
    let root = export(&mut message);

    for child in root.children() {
        assert_lines_bounded(&child.body);
    }
    assert_eq!(root.children()[0].decoded(), text.as_bytes());
}

#[test]
fn test_bare_line_breaks_leave_as_crlf() {
    let mut message = message();
    message.set_body(ContentType::text_plain(), "line one\nline two\rthree");
    let root = export(&mut message);

    assert_eq!(root.body, "line one\r\nline two\r\nthree");
    assert_lines_bounded(&root.body);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_round_trip(
        parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..400), 1..3),
        embedded in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 0..3),
        attachments in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 0..3),
    ) {
        let mut message = message();
        for (i, body) in parts.iter().enumerate() {
            let ct = if i == 0 { ContentType::text_plain() } else { ContentType::text_html() };
            message.add_alternative(ct, body);
        }
        for (i, content) in embedded.iter().enumerate() {
            message.embed(File::new(format!("e{i}.bin"), content.clone()));
        }
        for (i, content) in attachments.iter().enumerate() {
            message.attach(File::new(format!("a{i}.bin"), content.clone()));
        }
        let root = export(&mut message);

        // Flatten the tree in document order.
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(entity) = stack.pop() {
            if entity.content_type().starts_with("multipart/") {
                let mut children = entity.children();
                children.reverse();
                stack.extend(children);
            } else {
                leaves.push(entity);
            }
        }

        // Text parts come back with CRLF line breaks, files byte for byte.
        let expected: Vec<Vec<u8>> = parts
            .iter()
            .map(|body| crlf_breaks(body))
            .chain(embedded.iter().chain(&attachments).cloned())
            .collect();
        prop_assert_eq!(leaves.len(), expected.len());
        for (leaf, original) in leaves.iter().zip(&expected) {
            prop_assert_eq!(&leaf.decoded(), original);
            for line in leaf.body.split("\r\n") {
                prop_assert!(!line.contains(['\r', '\n']));
                prop_assert!(line.len() <= 76);
            }
        }
    }
}
