//! Template engine storing the document model as JSON.

use std::path::Path;

use tracing::debug;

use documint_core::TemplateEngine;
use documint_shared::{Document, DocumintError, Result};

/// Loads `.json` templates and writes rendered documents in the same shape.
pub struct JsonTemplateEngine;

impl TemplateEngine for JsonTemplateEngine {
    fn load(&self, path: &Path) -> Result<Document> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumintError::io(path, e))?;
        let document: Document = serde_json::from_str(&content)
            .map_err(|e| DocumintError::Render(format!("template {}: {e}", path.display())))?;
        debug!(path = %path.display(), blocks = document.blocks.len(), "template loaded");
        Ok(document)
    }

    fn save(&self, document: &Document, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| DocumintError::Render(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| DocumintError::io(path, e))
    }

    fn extension(&self) -> &str {
        "json"
    }
}
