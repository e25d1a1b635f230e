//! Error types for message export.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or exporting a message.
#[derive(Debug, Error)]
pub enum Error {
    /// MIME primitive failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailpress_mime::Error),

    /// The output sink rejected a write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file could not be read from disk.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
