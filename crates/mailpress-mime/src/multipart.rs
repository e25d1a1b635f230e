//! Boundary-delimited multipart sections (RFC 2046 section 5.1).

use std::io::Write;

use crate::boundary::generate_boundary;
use crate::error::Result;
use crate::header::Headers;

/// One open multipart body.
///
/// A section does not own the output; the caller passes the sink to every
/// call so that nested sections can write into the same buffer. Part bodies
/// are written by the caller between [`Section::create_part`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    boundary: String,
    parts: usize,
}

impl Section {
    /// Opens a section with a fresh random boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(generate_boundary())
    }

    /// Opens a section with the given boundary.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: 0,
        }
    }

    /// The boundary delimiting this section's parts.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Number of parts created so far.
    #[must_use]
    pub const fn parts(&self) -> usize {
        self.parts
    }

    /// Starts a new part: writes the delimiter line, the part headers and
    /// the blank line separating them from the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub fn create_part<W: Write>(&mut self, out: &mut W, headers: &Headers) -> Result<()> {
        if self.parts > 0 {
            out.write_all(b"\r\n")?;
        }
        write!(out, "--{}\r\n{headers}\r\n", self.boundary)?;
        self.parts += 1;
        Ok(())
    }

    /// Writes the closing delimiter and consumes the section.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub fn close<W: Write>(self, out: &mut W) -> Result<()> {
        write!(out, "\r\n--{}--\r\n", self.boundary)?;
        Ok(())
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}
