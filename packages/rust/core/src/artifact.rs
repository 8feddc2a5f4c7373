//! Scoped ownership of transient files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// A file that is removed when the guard goes out of scope, including on unwind.
///
/// The guard may be created before the file exists; a missing file at drop
/// time is not an error. [`ScopedArtifact::keep`] releases the file instead.
#[derive(Debug)]
pub struct ScopedArtifact {
    path: PathBuf,
    armed: bool,
}

impl ScopedArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarm the guard and leave the file on disk.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScopedArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed transient artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove transient artifact"),
        }
    }
}
