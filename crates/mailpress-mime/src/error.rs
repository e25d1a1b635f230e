//! Error types for MIME operations.

use std::io;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The output sink rejected a write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),
}
