//! Persisted outcome journal.
//!
//! The [`Journal`] is a CSV table (`documint_log.csv`) inside the configured log
//! directory. Every run loads the existing entries, appends its own records in
//! row order, and rewrites the whole file.
//!
//! **Access rules:**
//! - one writer at a time; concurrent runs against the same directory are unsupported
//! - rewrites go through a dot-prefixed temp file and a rename

use std::path::{Path, PathBuf};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use documint_shared::{DocumintError, OutcomeRecord, Result};

/// File name of the journal inside the log directory.
pub const JOURNAL_FILE_NAME: &str = "documint_log.csv";

// ---------------------------------------------------------------------------
// JournalEntry
// ---------------------------------------------------------------------------

/// One persisted row of the journal.
///
/// Entries written by earlier runs are carried through verbatim, so every field
/// is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

impl From<&OutcomeRecord> for JournalEntry {
    fn from(record: &OutcomeRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            status: record.status.to_string(),
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

impl JournalEntry {
    fn disposition(&self) -> Disposition {
        if self.status.starts_with("Success") {
            Disposition::Succeeded
        } else if self.status.starts_with("Dry Run") {
            Disposition::DryRun
        } else {
            Disposition::Failed
        }
    }
}

enum Disposition {
    Succeeded,
    DryRun,
    Failed,
}

/// Aggregate counts over every entry in the journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalSummary {
    pub total: usize,
    pub succeeded: usize,
    pub dry_run: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

/// Handle to the journal file in a log directory.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Journal stored as [`JOURNAL_FILE_NAME`] inside `log_dir`.
    pub fn in_dir(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(JOURNAL_FILE_NAME),
        }
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every persisted entry. A missing file is an empty journal.
    pub fn load(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_error(e))?;
        let mut entries = Vec::new();
        for entry in reader.deserialize() {
            entries.push(entry.map_err(|e| self.csv_error(e))?);
        }

        debug!(path = %self.path.display(), count = entries.len(), "loaded journal");
        Ok(entries)
    }

    /// Append `records` after all previously persisted entries and rewrite the file.
    ///
    /// Returns the total number of entries now in the journal. Any failure is
    /// reported as [`DocumintError::LogPersist`].
    #[instrument(skip_all, fields(path = %self.path.display(), new = records.len()))]
    pub fn append(&self, records: &[OutcomeRecord]) -> Result<usize> {
        self.try_append(records)
            .map_err(|e| DocumintError::LogPersist(e.to_string()))
    }

    /// Count successes, dry runs, and failures across the whole journal.
    pub fn summary(&self) -> Result<JournalSummary> {
        let mut summary = JournalSummary::default();
        for entry in self.load()? {
            summary.total += 1;
            match entry.disposition() {
                Disposition::Succeeded => summary.succeeded += 1,
                Disposition::DryRun => summary.dry_run += 1,
                Disposition::Failed => summary.failed += 1,
            }
        }
        Ok(summary)
    }

    fn try_append(&self, records: &[OutcomeRecord]) -> Result<usize> {
        let mut entries = self.load()?;
        let previous = entries.len();
        entries.extend(records.iter().map(JournalEntry::from));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocumintError::io(parent, e))?;
        }

        self.persist(&entries)?;

        info!(previous, total = entries.len(), "journal saved");
        Ok(entries.len())
    }

    /// Write `entries` to a temp file beside the journal, then move it into place.
    /// The temp file never outlives a failed attempt.
    fn persist(&self, entries: &[JournalEntry]) -> Result<()> {
        let temp = self.temp_path();
        let result = self.write_entries(&temp, entries).and_then(|()| {
            std::fs::rename(&temp, &self.path).map_err(|e| DocumintError::io(&self.path, e))
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }
        result
    }

    fn write_entries(&self, path: &Path, entries: &[JournalEntry]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(|e| self.csv_error(e))?;
        if entries.is_empty() {
            // serialize() only emits the header with the first record
            writer
                .write_record(["Name", "Email", "Status", "Timestamp"])
                .map_err(|e| self.csv_error(e))?;
        }
        for entry in entries {
            writer.serialize(entry).map_err(|e| self.csv_error(e))?;
        }
        writer.flush().map_err(|e| DocumintError::io(path, e))
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| JOURNAL_FILE_NAME.to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn csv_error(&self, e: csv::Error) -> DocumintError {
        DocumintError::validation(format!("journal {}: {e}", self.path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use documint_shared::{FailureKind, Outcome};

    fn records(prefix: &str, n: usize) -> Vec<OutcomeRecord> {
        (0..n)
            .map(|i| {
                OutcomeRecord::now(
                    format!("{prefix}-{i}"),
                    format!("{prefix}{i}@example.com"),
                    Outcome::Success,
                )
            })
            .collect()
    }

    #[test]
    fn missing_file_is_empty_journal() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());
        assert!(journal.load().unwrap().is_empty());
        assert_eq!(journal.summary().unwrap(), JournalSummary::default());
    }

    #[test]
    fn two_runs_accumulate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());

        assert_eq!(journal.append(&records("first", 3)).unwrap(), 3);
        assert_eq!(journal.append(&records("second", 3)).unwrap(), 6);

        let names: Vec<String> = journal.load().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["first-0", "first-1", "first-2", "second-0", "second-1", "second-2"]
        );
    }

    #[test]
    fn entries_from_older_runs_survive_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(JOURNAL_FILE_NAME);
        std::fs::write(
            &path,
            "Name,Email,Status,Timestamp\nAda,ada@example.com,Failed to send email: timeout,2024-05-01 10:00:00\n",
        )
        .unwrap();

        let journal = Journal::in_dir(dir.path());
        journal.append(&records("new", 1)).unwrap();

        let entries = journal.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, "Failed to send email: timeout");
        assert_eq!(entries[0].timestamp, "2024-05-01 10:00:00");
        assert_eq!(entries[1].status, "Success");
    }

    #[test]
    fn status_and_timestamp_columns() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());
        let record = OutcomeRecord::now(
            "Bob",
            "bob@",
            Outcome::failed(FailureKind::InvalidAddress, "bob@"),
        );
        journal.append(std::slice::from_ref(&record)).unwrap();

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert!(raw.starts_with("Name,Email,Status,Timestamp"));
        assert!(raw.contains("Failed: InvalidAddress: bob@"));

        let entry = &journal.load().unwrap()[0];
        assert!(entry.timestamp.ends_with('Z'));
    }

    #[test]
    fn empty_run_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());
        assert_eq!(journal.append(&[]).unwrap(), 0);
        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert_eq!(raw.trim(), "Name,Email,Status,Timestamp");
        assert!(journal.load().unwrap().is_empty());
    }

    #[test]
    fn creates_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(&dir.path().join("logs").join("nested"));
        journal.append(&records("x", 1)).unwrap();
        assert!(journal.path().exists());
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());
        journal.append(&records("x", 2)).unwrap();
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.starts_with('.'), "temp file left behind: {name}");
        }
    }

    #[test]
    fn unwritable_target_is_log_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the journal file name makes the rename fail.
        std::fs::create_dir_all(dir.path().join(JOURNAL_FILE_NAME).join("blocker")).unwrap();
        let journal = Journal::in_dir(dir.path());
        let err = journal.append(&records("x", 1)).unwrap_err();
        assert!(matches!(err, DocumintError::LogPersist(_)), "got {err:?}");
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(JOURNAL_FILE_NAME).join("blocker")).unwrap();
        let journal = Journal::in_dir(dir.path());

        let entries: Vec<JournalEntry> = records("x", 1).iter().map(JournalEntry::from).collect();
        assert!(journal.persist(&entries).is_err());
        assert!(!journal.temp_path().exists());
    }

    #[test]
    fn summary_counts_dispositions() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::in_dir(dir.path());
        journal
            .append(&[
                OutcomeRecord::now("a", "a@example.com", Outcome::Success),
                OutcomeRecord::now("b", "b@example.com", Outcome::DryRunGenerated),
                OutcomeRecord::now(
                    "c",
                    "c@example.com",
                    Outcome::failed(FailureKind::TransportError, "relay refused"),
                ),
                OutcomeRecord::now("d", "d@example.com", Outcome::Success),
            ])
            .unwrap();

        let summary = journal.summary().unwrap();
        assert_eq!(
            summary,
            JournalSummary {
                total: 4,
                succeeded: 2,
                dry_run: 1,
                failed: 1,
            }
        );
    }
}
