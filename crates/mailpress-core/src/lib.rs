//! # mailpress-core
//!
//! Serializes an in-memory email message into a MIME byte stream ready for
//! transmission.
//!
//! This crate provides:
//! - The message model: headers, text parts, embedded files, attachments
//! - Structure classification: which of `multipart/mixed`,
//!   `multipart/related` and `multipart/alternative` a message needs
//! - A bounded multipart writer nesting at most three sections
//! - Export into a header map plus a body encoded as line-wrapped base64
//!   or quoted-printable
//! - A buffer pool so message objects can be reused without reallocating
//!
//! ## Example
//!
//! ```ignore
//! use mailpress_core::{ContentType, File, Message};
//!
//! let mut message = Message::new();
//! message.set_address_header("From", "alice@example.com", "Alice");
//! message.set_header("Subject", "Report");
//! message.set_body(ContentType::text_plain(), "See attachment.");
//! message.add_alternative(ContentType::text_html(), "<p>See attachment.</p>");
//! message.attach(File::from_path("report.pdf")?);
//!
//! let exported = message.export()?;
//! exported.write_to(std::io::stdout())?;
//!
//! message.reset();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod clock;
mod config;
mod error;
mod export;
mod message;
pub mod pool;
pub mod structure;
pub mod writer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{DEFAULT_CHARSET, ExportConfig, ExportConfigBuilder};
pub use error::{Error, Result};
pub use export::Exported;
pub use message::{
    DATE_FORMAT, File, Message, Part, format_address, format_date, guess_mime_type,
};
pub use pool::BufferPool;
pub use structure::{MultipartKind, Structure};
pub use writer::{MAX_DEPTH, MessageWriter};

pub use mailpress_mime::{ContentType, FileEncoding, Headers, TransferEncoding};
