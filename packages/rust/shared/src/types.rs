//! Core domain types for DocuMint: rows, the rich-text document model,
//! and per-row outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one dispatch run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One source record: an ordered mapping from trimmed column name to raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Zero-based position within the data source (header excluded).
    pub index: usize,
    /// Column name / raw value pairs in source column order.
    pub cells: Vec<(String, String)>,
}

impl Row {
    /// Build a row, trimming column names.
    pub fn new<K, V>(index: usize, cells: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            index,
            cells: cells
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
        }
    }

    /// Raw value for `column`, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Column names in source order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Human-facing row number as a spreadsheet user would count it
    /// (header on line 1, first data row on line 2).
    pub fn line_number(&self) -> usize {
        self.index + 2
    }
}

/// Everything read from a data source: trimmed headers plus rows in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// A rich-text document: an ordered list of paragraphs and tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// A top-level document block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// A paragraph made of formatting runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub runs: Vec<Run>,
}

impl Paragraph {
    /// A paragraph holding a single unformatted run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::plain(text)],
        }
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A span of text sharing one set of character formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
}

impl Run {
    /// An unformatted run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }
}

/// A table of rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
    pub paragraphs: Vec<Paragraph>,
}

impl Document {
    /// Visit every paragraph, top-level and inside every table cell, mutably.
    pub fn paragraphs_mut(&mut self) -> Vec<&mut Paragraph> {
        let mut out = Vec::new();
        for block in &mut self.blocks {
            match block {
                Block::Paragraph(p) => out.push(p),
                Block::Table(table) => {
                    for row in &mut table.rows {
                        for cell in &mut row.cells {
                            out.extend(cell.paragraphs.iter_mut());
                        }
                    }
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Row-scoped failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    InvalidAddress,
    RenderError,
    FormatError,
    ConversionError,
    TransportError,
    RowProcessingError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidAddress => "InvalidAddress",
            Self::RenderError => "RenderError",
            Self::FormatError => "FormatError",
            Self::ConversionError => "ConversionError",
            Self::TransportError => "TransportError",
            Self::RowProcessingError => "RowProcessingError",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal disposition of one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message was delivered.
    Success,
    /// Dry-run: the document was generated, nothing was sent.
    DryRunGenerated,
    /// The row failed at some stage.
    Failed { kind: FailureKind, reason: String },
}

impl Outcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Failure category, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Status string as written to the journal.
impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::DryRunGenerated => f.write_str("Dry Run - Document Generated"),
            Self::Failed { kind, reason } => write!(f, "Failed: {kind}: {reason}"),
        }
    }
}

/// Durable audit entry describing one row's final disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    /// Recipient display name (best effort, `N/A` when unknown).
    pub name: String,
    /// Recipient address as found in the row.
    pub email: String,
    pub status: Outcome,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeRecord {
    /// Record `status` for a recipient, stamped now.
    pub fn now(name: impl Into<String>, email: impl Into<String>, status: Outcome) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            status,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn row_trims_column_names() {
        let row = Row::new(0, [(" Name ", "Ada"), ("Email", "ada@example.com")]);
        assert_eq!(row.get("Name"), Some("Ada"));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["Name", "Email"]);
        assert_eq!(row.line_number(), 2);
    }

    #[test]
    fn document_json_shape() {
        let json = r#"{
            "blocks": [
                { "type": "paragraph", "runs": [{ "text": "Dear ", "bold": true }, { "text": "<Name>" }] },
                { "type": "table", "rows": [ { "cells": [ { "paragraphs": [ { "runs": [ { "text": "<ID>" } ] } ] } ] } ] }
            ]
        }"#;
        let mut doc: Document = serde_json::from_str(json).expect("deserialize");
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.paragraphs_mut().len(), 2);
        match &doc.blocks[0] {
            Block::Paragraph(p) => {
                assert!(p.runs[0].bold);
                assert_eq!(p.text(), "Dear <Name>");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn outcome_status_strings() {
        assert_eq!(Outcome::Success.to_string(), "Success");
        assert_eq!(
            Outcome::DryRunGenerated.to_string(),
            "Dry Run - Document Generated"
        );
        let failed = Outcome::failed(FailureKind::InvalidAddress, "not-an-email");
        assert_eq!(failed.to_string(), "Failed: InvalidAddress: not-an-email");
        assert!(failed.is_failure());
        assert_eq!(failed.failure_kind(), Some(FailureKind::InvalidAddress));
    }
}
