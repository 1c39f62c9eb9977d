//! Error types for casebook-search

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error type for index build, load and retrieval
#[derive(Error, Debug)]
pub enum Error {
    /// Case loading failed
    #[error(transparent)]
    Case(#[from] casebook_cases::Error),

    /// Case directory held no cases
    #[error("no cases found in {}", .dir.display())]
    EmptyCaseSet {
        /// Directory that was scanned
        dir: PathBuf,
    },

    /// Index artifacts are missing
    #[error("index not found in {}: {missing} is missing. Run `{command}` first", .dir.display())]
    IndexNotFound {
        /// Index directory
        dir: PathBuf,
        /// First missing artifact
        missing: &'static str,
        /// Command that produces the index
        command: &'static str,
    },

    /// Index artifacts are inconsistent
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// Embedding provider failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Embedding provider did not answer in time
    #[error("embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// Embedding provider returned a vector that is not unit length
    #[error("embedding for {subject} is not L2-normalized (norm={norm:.4})")]
    NotNormalized {
        /// What was embedded (case id or "query")
        subject: String,
        /// Observed norm
        norm: f32,
    },

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: usize,
        /// Actual dimensions
        actual: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error comes from the embedding capability rather than the index
    pub fn is_embedding_failure(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::EmbeddingTimeout(_) | Error::NotNormalized { .. }
        )
    }
}

/// Result type for casebook-search operations
pub type Result<T> = std::result::Result<T, Error>;
