//! Error types for brandlex.
//!
//! Library crates use [`BrandlexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all brandlex operations.
#[derive(Debug, thiserror::Error)]
pub enum BrandlexError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP error (connect, timeout, non-2xx on a page fetch).
    #[error("network error: {0}")]
    Network(String),

    /// Input unit could not be decoded (bad CSV, invalid JSON, bad UTF-8).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Completion service error (auth, service status, empty response).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unexpected shape, bad argument, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BrandlexError>;

impl BrandlexError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the completion service boundary.
    ///
    /// These are the errors the pipeline absorbs into a null result.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Enrichment(_))
    }
}
