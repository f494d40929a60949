//! Error types for the due-diligence pipeline.
//!
//! Library crates use [`DueDiligenceError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all due-diligence operations.
#[derive(Debug, thiserror::Error)]
pub enum DueDiligenceError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a page or calling a service.
    #[error("network error: {0}")]
    Network(String),

    /// HTML, JSON, or caption parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// External search service error.
    #[error("search error: {0}")]
    Search(String),

    /// Video transcript retrieval error.
    #[error("transcript error: {0}")]
    Transcript(String),

    /// Language-model completion error. Fatal to a pipeline run.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Stage graph construction error (unknown reads, cycles, duplicate writers).
    #[error("pipeline error: {message}")]
    Pipeline { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (bad URL, empty query, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DueDiligenceError>;

impl DueDiligenceError {
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

    /// Create a pipeline graph error from any displayable message.
    pub fn pipeline(msg: impl Into<String>) -> Self {
        Self::Pipeline {
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
}
