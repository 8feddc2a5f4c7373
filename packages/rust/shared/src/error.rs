//! Error types for DocuMint.
//!
//! Library crates use [`DocumintError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Variants fall into three scopes:
//! - run-fatal: [`DocumintError::SourceInaccessible`], [`DocumintError::DataRead`]
//! - row-scoped: everything that maps to a [`FailureKind`]
//! - run-scoped after processing: [`DocumintError::LogPersist`]

use std::path::PathBuf;

use crate::types::FailureKind;

/// Top-level error type for all DocuMint operations.
#[derive(Debug, thiserror::Error)]
pub enum DocumintError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The data source path cannot be opened for reading.
    #[error("data source '{path}' is not accessible: {reason}")]
    SourceInaccessible { path: PathBuf, reason: String },

    /// The data source was opened but could not be parsed.
    #[error("error reading data source: {0}")]
    DataRead(String),

    /// Template loading, substitution, or artifact serialization failed.
    #[error("render error: {0}")]
    Render(String),

    /// A name or body template referenced an unknown field or was malformed.
    #[error("format error: {0}")]
    Format(String),

    /// The converter failed to produce the distributable file.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Message delivery failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outcome journal could not be persisted.
    #[error("could not save journal: {0}")]
    LogPersist(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad input values, schema mismatch, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocumintError>;

impl DocumintError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a source-inaccessible error for `path`.
    pub fn inaccessible(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceInaccessible {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The row-scoped failure category for this error, if it is row-scoped.
    ///
    /// Run-fatal and run-scoped errors return `None`.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Render(_) => Some(FailureKind::RenderError),
            Self::Format(_) => Some(FailureKind::FormatError),
            Self::Conversion(_) => Some(FailureKind::ConversionError),
            Self::Transport(_) => Some(FailureKind::TransportError),
            Self::Config { .. }
            | Self::SourceInaccessible { .. }
            | Self::DataRead(_)
            | Self::LogPersist(_)
            | Self::Io { .. }
            | Self::Validation { .. } => None,
        }
    }

    /// The bare message without the category prefix, for outcome records.
    pub fn reason(&self) -> String {
        match self {
            Self::Render(m)
            | Self::Format(m)
            | Self::Conversion(m)
            | Self::Transport(m)
            | Self::DataRead(m)
            | Self::LogPersist(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocumintError::config("retries must be set");
        assert_eq!(err.to_string(), "config error: retries must be set");

        let err = DocumintError::inaccessible("/tmp/data.csv", "permission denied");
        assert!(err.to_string().contains("/tmp/data.csv"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn row_scoped_errors_map_to_failure_kinds() {
        assert_eq!(
            DocumintError::Transport("smtp down".into()).failure_kind(),
            Some(FailureKind::TransportError)
        );
        assert_eq!(
            DocumintError::Format("missing field".into()).failure_kind(),
            Some(FailureKind::FormatError)
        );
        assert_eq!(DocumintError::DataRead("bad csv".into()).failure_kind(), None);
        assert_eq!(DocumintError::LogPersist("disk full".into()).failure_kind(), None);
    }

    #[test]
    fn reason_strips_category_prefix() {
        let err = DocumintError::Conversion("office suite exited with 1".into());
        assert_eq!(err.reason(), "office suite exited with 1");

        let err = DocumintError::io("/x", std::io::Error::other("boom"));
        assert!(err.reason().contains("boom"));
    }
}
