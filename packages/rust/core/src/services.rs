//! Contracts for the pluggable collaborators the pipeline drives.
//!
//! Concrete implementations live in `documint-adapters`; tests use in-memory fakes.

use std::path::{Path, PathBuf};

use documint_shared::{Dataset, Document, Result};

/// Reads the tabular data source.
pub trait DataSource: Send + Sync {
    /// Read headers (trimmed) and all rows in source order.
    ///
    /// Fails with `DataRead` when the content cannot be parsed.
    fn read(&self, path: &Path) -> Result<Dataset>;
}

/// Loads templates and serializes rendered documents.
pub trait TemplateEngine: Send + Sync {
    /// Return a fresh document instance; callers may mutate it freely.
    fn load(&self, path: &Path) -> Result<Document>;

    /// Write a rendered document to `path`.
    fn save(&self, document: &Document, path: &Path) -> Result<()>;

    /// File extension of the serialized form, without the dot.
    fn extension(&self) -> &str;
}

/// Turns a serialized document into the distributable format.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    /// File extension of the distributable format, without the dot.
    fn extension(&self) -> &str;
}

/// One outgoing message with a single attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: PathBuf,
}

/// Delivers messages. Errors are retried by the caller.
pub trait Transport: Send + Sync {
    fn send(&self, message: &Message) -> Result<()>;
}

/// Sink for free-text progress lines. Observability only.
pub trait LogSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Discards every line.
pub struct SilentLog;

impl LogSink for SilentLog {
    fn line(&self, _line: &str) {}
}
