//! Error types for guideline-index.

use thiserror::Error;

/// Result type for guideline-index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in guideline-index operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The index is empty or was never built.
    #[error("Invalid index state: {0}")]
    InvalidState(String),

    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Invalid vector (e.g., empty, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Persistence error (malformed blob, version mismatch, serialization).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
