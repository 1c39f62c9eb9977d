//! Error types for casebook-cases

use std::path::PathBuf;
use thiserror::Error;

/// Error type for case loading
#[derive(Error, Debug)]
pub enum Error {
    /// Case directory or file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Candidate document is not a well-formed case mapping
    #[error("{}: {message}", .path.display())]
    Parse {
        /// Offending document
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// Case has no usable identifier
    #[error("{}: case is missing a non-empty `id`", .path.display())]
    MissingId {
        /// Offending document
        path: PathBuf,
    },
}

/// Result type for case loading
pub type Result<T> = std::result::Result<T, Error>;
