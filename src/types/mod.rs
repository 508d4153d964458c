//! Core error types.

use crate::utils::toml_config::ConfigError;

// ============= Error Types =============

/// Errors surfaced by the retrieval-to-generation pipeline.
///
/// The first four variants are the pipeline taxonomy; callers can tell a
/// broken system (`ModelUnavailable`, `Generation`) apart from an honest
/// abstention, which is a successful answer.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Operating on an unbuilt or empty index.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Embedding or generation backend cannot be reached or loaded.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Generation call failed, timed out, or returned malformed output.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Persisted chunk/index/question files are malformed or out of lockstep.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Configuration file missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Caller supplied an unusable argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<guideline_index::Error> for AppError {
    fn from(err: guideline_index::Error) -> Self {
        use guideline_index::Error as IndexError;

        match err {
            IndexError::InvalidState(msg) => AppError::InvalidState(msg),
            IndexError::DimensionMismatch { expected, actual } => AppError::DataFormat(format!(
                "embedding dimension mismatch: index has {}, got {}",
                expected, actual
            )),
            IndexError::InvalidVector(msg) | IndexError::Persistence(msg) => {
                AppError::DataFormat(msg)
            }
            IndexError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            if let csv::ErrorKind::Io(io) = err.into_kind() {
                return AppError::Io(io);
            }
            return AppError::Internal("csv I/O error without source".to_string());
        }
        AppError::DataFormat(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AppError>;
