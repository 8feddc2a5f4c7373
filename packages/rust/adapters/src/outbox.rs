//! Transport that queues messages as files in an outbox directory.
//!
//! Each message becomes `<id>.json` plus a copy of its attachment named
//! `<id>-<file name>`. A relay picks up the JSON files and sends them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use documint_core::{Message, Transport};
use documint_shared::{DocumintError, Result};

/// One queued message as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    /// File name of the attachment copy, relative to the outbox directory.
    pub attachment: String,
    pub queued_at: DateTime<Utc>,
}

/// Writes messages into `dir` for pickup by a mail relay.
#[derive(Debug, Clone)]
pub struct OutboxTransport {
    dir: PathBuf,
}

impl OutboxTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every queued entry, oldest first.
    pub fn pending(&self) -> Result<Vec<OutboxEntry>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DocumintError::io(&self.dir, e)),
        };

        let mut queued = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| DocumintError::io(&self.dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = std::fs::read_to_string(&path).map_err(|e| DocumintError::io(&path, e))?;
            let entry: OutboxEntry = serde_json::from_str(&content).map_err(|e| {
                DocumintError::validation(format!("outbox entry {}: {e}", path.display()))
            })?;
            queued.push(entry);
        }
        queued.sort_by_key(|e| e.id);
        Ok(queued)
    }

    fn enqueue(&self, message: &Message) -> Result<OutboxEntry> {
        let file_name = message
            .attachment
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DocumintError::Transport(format!(
                    "attachment {} has no file name",
                    message.attachment.display()
                ))
            })?;

        std::fs::create_dir_all(&self.dir).map_err(|e| DocumintError::io(&self.dir, e))?;

        let id = Uuid::now_v7();
        let entry = OutboxEntry {
            id,
            to: message.to.clone(),
            subject: message.subject.clone(),
            html_body: message.html_body.clone(),
            attachment: format!("{id}-{file_name}"),
            queued_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| DocumintError::Transport(e.to_string()))?;

        place_entry(
            &message.attachment,
            &self.dir.join(&entry.attachment),
            &self.dir.join(format!("{id}.json")),
            &json,
        )?;
        Ok(entry)
    }
}

/// Copy the attachment to `copy`, then publish `json` at `dest` via a dot-temp file.
///
/// Relays only look at `*.json`, so the entry appears complete or not at all.
/// On failure neither the copy nor the temp file is left behind.
fn place_entry(attachment: &Path, copy: &Path, dest: &Path, json: &str) -> Result<()> {
    let temp = dest.with_file_name(format!(
        ".{}.tmp",
        dest.file_name().unwrap_or_default().to_string_lossy()
    ));
    let placed = std::fs::copy(attachment, copy)
        .map_err(|e| DocumintError::io(attachment, e))
        .and_then(|_| std::fs::write(&temp, json).map_err(|e| DocumintError::io(&temp, e)))
        .and_then(|()| std::fs::rename(&temp, dest).map_err(|e| DocumintError::io(dest, e)));
    if placed.is_err() {
        let _ = std::fs::remove_file(&temp);
        let _ = std::fs::remove_file(copy);
    }
    placed
}

impl Transport for OutboxTransport {
    #[instrument(skip_all, fields(to = %message.to))]
    fn send(&self, message: &Message) -> Result<()> {
        let entry = self
            .enqueue(message)
            .map_err(|e| DocumintError::Transport(e.to_string()))?;
        info!(id = %entry.id, outbox = %self.dir.display(), "message queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(attachment: PathBuf) -> Message {
        Message {
            to: "ada@example.com".into(),
            subject: "Your Document".into(),
            html_body: "<p>Dear Ada,</p>".into(),
            attachment,
        }
    }

    #[test]
    fn send_queues_entry_and_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("Admit_42.html");
        std::fs::write(&attachment, "<p>card</p>").unwrap();
        let outbox = OutboxTransport::new(dir.path().join("outbox"));

        outbox.send(&message(attachment)).unwrap();

        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 1);
        let entry = &pending[0];
        assert_eq!(entry.to, "ada@example.com");
        assert_eq!(entry.html_body, "<p>Dear Ada,</p>");
        assert!(entry.attachment.ends_with("-Admit_42.html"));
        assert_eq!(
            std::fs::read_to_string(outbox.dir().join(&entry.attachment)).unwrap(),
            "<p>card</p>"
        );
    }

    #[test]
    fn entries_are_listed_in_queue_order() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("a.html");
        std::fs::write(&attachment, "x").unwrap();
        let outbox = OutboxTransport::new(dir.path().join("outbox"));

        for to in ["a@example.com", "b@example.com", "c@example.com"] {
            let mut m = message(attachment.clone());
            m.to = to.into();
            outbox.send(&m).unwrap();
        }

        let to: Vec<String> = outbox.pending().unwrap().into_iter().map(|e| e.to).collect();
        assert_eq!(to, vec!["a@example.com", "b@example.com", "c@example.com"]);
    }

    #[test]
    fn missing_attachment_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxTransport::new(dir.path().join("outbox"));

        let err = outbox
            .send(&message(dir.path().join("missing.html")))
            .unwrap_err();
        assert!(matches!(err, DocumintError::Transport(_)));
        assert!(outbox.pending().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(outbox.dir()).unwrap().count(), 0);
    }

    #[test]
    fn failed_entry_write_removes_attachment_copy() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("Admit_42.html");
        std::fs::write(&attachment, "<p>card</p>").unwrap();
        let outbox = dir.path().join("outbox");
        // A non-empty directory squatting on the entry name makes the rename fail.
        std::fs::create_dir_all(outbox.join("entry.json").join("blocker")).unwrap();

        let result = place_entry(
            &attachment,
            &outbox.join("entry-Admit_42.html"),
            &outbox.join("entry.json"),
            "{}",
        );

        assert!(result.is_err());
        let mut left: Vec<String> = std::fs::read_dir(&outbox)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        left.sort();
        assert_eq!(left, vec!["entry.json"]);
    }

    #[test]
    fn empty_outbox_has_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = OutboxTransport::new(dir.path().join("never-created"));
        assert!(outbox.pending().unwrap().is_empty());
    }
}
