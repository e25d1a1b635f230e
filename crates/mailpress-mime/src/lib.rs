//! # mailpress-mime
//!
//! MIME wire primitives used to render email messages.
//!
//! ## Features
//!
//! - **Line wrapping**: base64 and quoted-printable writers that keep every
//!   line within the RFC 2045 limit of 76 characters
//! - **Quoted-Printable**: byte encoder producing `=XX` escapes
//! - **Headers**: case-insensitive, multi-valued header map
//! - **Content types**: MIME content types with parameter quoting
//! - **Multipart**: boundary generation and boundary-delimited sections
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpress_mime::write_base64;
//!
//! let mut out = Vec::new();
//! write_base64(&mut out, &[0u8; 100])?;
//! assert!(out.split(|&b| b == b'\n').all(|line| line.len() <= 77));
//! ```
//!
//! ### Multipart sections
//!
//! ```ignore
//! use mailpress_mime::{Headers, Section};
//!
//! let mut out = Vec::new();
//! let mut section = Section::new();
//! section.create_part(&mut out, &Headers::new())?;
//! out.extend_from_slice(b"Hello");
//! section.close(&mut out)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod boundary;
mod content_type;
mod error;
mod header;
mod multipart;

pub mod encoding;
pub mod wrap;

pub use boundary::{BOUNDARY_PREFIX, generate_boundary};
pub use content_type::{ContentType, quote};
pub use encoding::{FileEncoding, TransferEncoding, encode_quoted_printable};
pub use error::{Error, Result};
pub use header::{Headers, canonical_name};
pub use multipart::Section;
pub use wrap::{Base64LineWriter, MAX_LINE_LEN, QpLineWriter, write_base64};
