//! Error types for fsdgen.
//!
//! Library crates use [`FsdGenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all fsdgen operations.
#[derive(Debug, thiserror::Error)]
pub enum FsdGenError {
    /// Application configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The FDD→FSD mapping configuration could not be loaded.
    ///
    /// This is fatal at startup: nothing may be generated without a valid mapping.
    #[error("mapping config error at {path:?}: {message}")]
    MappingLoad { path: PathBuf, message: String },

    /// Request payload or template parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// LLM text generation error (transport, API, or response shape).
    #[error("generation error: {0}")]
    Generation(String),

    /// Network/HTTP error reaching the generation service.
    #[error("network error: {0}")]
    Network(String),

    /// Document rendering or output error.
    #[error("render error: {0}")]
    Render(String),

    /// Job bookkeeping error.
    #[error("job error: {0}")]
    Job(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FsdGenError>;

impl FsdGenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a mapping-load error for the given source path.
    pub fn mapping(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::MappingLoad {
            path: path.into(),
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

    /// Whether this error must stop the process before any request is served.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::MappingLoad { .. } | Self::Config { .. })
    }
}
