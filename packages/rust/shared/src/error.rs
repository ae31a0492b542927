//! Error types for AlphaWatch.
//!
//! Library crates use [`AlphaWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AlphaWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum AlphaWatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the monitored page.
    #[error("network error: {0}")]
    Network(String),

    /// Notification transport failure.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Markup or pattern processing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Detected-set persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AlphaWatchError>;

impl AlphaWatchError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from fetching the page (short backoff class).
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
