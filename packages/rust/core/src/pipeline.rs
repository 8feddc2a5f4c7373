//! End-to-end dispatch run: data source → per-row render/convert/send → journal.
//!
//! Rows are processed one at a time in source order. Each row ends in exactly
//! one [`OutcomeRecord`]; only an unreadable data source aborts the run.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use documint_journal::Journal;
use documint_shared::{
    ColumnFormat, Dataset, DispatchConfig, DocumintError, FailureKind, Outcome, OutcomeRecord,
    Result, Row, RunId,
};

use crate::artifact::ScopedArtifact;
use crate::placeholder::{self, TokenMap};
use crate::retry::{Exhausted, Pacer, PauseReason, RetryPolicy};
use crate::services::{Converter, DataSource, LogSink, Message, TemplateEngine, Transport};
use crate::template::{format_name, format_template};
use crate::validator::is_valid_address;

/// Name recorded when a row has no usable name value.
const UNKNOWN: &str = "N/A";

/// The collaborators a run drives. Created once and reused for every row.
pub struct Services<'a> {
    pub source: &'a dyn DataSource,
    pub engine: &'a dyn TemplateEngine,
    pub converter: &'a dyn Converter,
    pub transport: &'a dyn Transport,
    pub pacer: &'a dyn Pacer,
    pub log: &'a dyn LogSink,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    /// One record per processed row, in row order.
    pub records: Vec<OutcomeRecord>,
    pub journal_path: PathBuf,
    /// Set when the journal could not be saved; `records` are still valid.
    pub journal_error: Option<DocumintError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Success))
    }

    pub fn dry_run(&self) -> usize {
        self.count(|o| matches!(o, Outcome::DryRunGenerated))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.status)).count()
    }
}

/// Run the full dispatch pipeline.
///
/// 1. Check the data source is readable, then read it (run-fatal on failure)
/// 2. In test-dispatch mode, replace the rows with one synthetic row
/// 3. Process every row; failures are recorded, never propagated
/// 4. Append the run's records to the journal
pub fn run_dispatch(config: &DispatchConfig, services: &Services<'_>) -> Result<RunReport> {
    let start = Instant::now();
    let run_id = RunId::new();
    let span = info_span!("dispatch", %run_id, dry_run = config.dry_run);
    let _enter = span.enter();

    services.log.line(&format!(
        "Process started{}",
        if config.dry_run { " (dry run)" } else { "" }
    ));

    let dataset = match load_dataset(config, services.source) {
        Ok(dataset) => dataset,
        Err(e) => {
            services.log.line(&format!("ERROR: {e}"));
            return Err(e);
        }
    };

    let rows = match &config.test_recipient {
        Some(address) => {
            info!(%address, "test dispatch: replacing data set with one synthetic row");
            vec![test_dispatch_row(&dataset.columns, &config.recipient_column, address)]
        }
        None => dataset.rows,
    };

    if let Err(e) = std::fs::create_dir_all(&config.output_dir) {
        warn!(path = %config.output_dir.display(), error = %e, "could not create output directory");
    }

    info!(rows = rows.len(), "processing rows");

    let no_formatters = BTreeMap::new();
    let processor = RowProcessor {
        config,
        services,
        // Synthetic placeholder values would not survive numeric/date formatters.
        formatters: if config.test_recipient.is_some() {
            &no_formatters
        } else {
            &config.formatters
        },
        retry: RetryPolicy::new(config.retries, config.delay),
    };

    let total = rows.len();
    let mut records = Vec::with_capacity(total);
    for row in &rows {
        let result = processor.process_guarded(row);
        services.log.line(&result.describe(row, total));
        debug!(row = row.line_number(), status = %result.record.status, "row finished");
        records.push(result.record);

        if result.paced {
            services.pacer.pause(config.delay, PauseReason::RowPacing);
        }
    }

    let journal = Journal::in_dir(&config.log_dir);
    let journal_error = match journal.append(&records) {
        Ok(total) => {
            debug!(total, "journal updated");
            None
        }
        Err(e) => {
            warn!(error = %e, "journal not saved");
            services.log.line(&format!("ERROR: {e}"));
            Some(e)
        }
    };

    let report = RunReport {
        run_id,
        records,
        journal_path: journal.path().to_path_buf(),
        journal_error,
        elapsed: start.elapsed(),
    };

    services.log.line(&format!(
        "Process completed: {} sent, {} dry run, {} failed",
        report.succeeded(),
        report.dry_run(),
        report.failed()
    ));
    info!(
        rows = report.records.len(),
        succeeded = report.succeeded(),
        dry_run = report.dry_run(),
        failed = report.failed(),
        elapsed_ms = report.elapsed.as_millis(),
        "dispatch run complete"
    );

    Ok(report)
}

/// Verify the source can be opened, then hand it to the data source.
fn load_dataset(config: &DispatchConfig, source: &dyn DataSource) -> Result<Dataset> {
    check_readable(&config.data_path)?;
    let dataset = source.read(&config.data_path)?;
    info!(
        path = %config.data_path.display(),
        columns = dataset.columns.len(),
        rows = dataset.rows.len(),
        "data source loaded"
    );
    Ok(dataset)
}

fn check_readable(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(DocumintError::inaccessible(path, "path is a directory"));
    }
    std::fs::File::open(path)
        .map(|_| ())
        .map_err(|e| DocumintError::inaccessible(path, e.to_string()))
}

/// A single row whose every value is `Test <column>`, addressed to `address`.
pub fn test_dispatch_row(columns: &[String], recipient_column: &str, address: &str) -> Row {
    let mut cells: Vec<(String, String)> = columns
        .iter()
        .map(|c| (c.clone(), format!("Test {c}")))
        .collect();

    match cells.iter_mut().find(|(c, _)| c == recipient_column) {
        Some(cell) => cell.1 = address.to_string(),
        None => cells.push((recipient_column.to_string(), address.to_string())),
    }

    Row { index: 0, cells }
}

// ---------------------------------------------------------------------------
// Per-row processing
// ---------------------------------------------------------------------------

struct RowResult {
    record: OutcomeRecord,
    /// A message was sent (or attempted) or a dry-run document generated, so
    /// the row is followed by a pacing wait.
    paced: bool,
    /// Distributable file left in the output directory.
    output: Option<PathBuf>,
}

impl RowResult {
    fn describe(&self, row: &Row, total: usize) -> String {
        let position = format!("[{}/{}]", row.index + 1, total);
        let email = &self.record.email;
        match &self.record.status {
            Outcome::Success => format!("{position} SUCCESS: Sent document to {email}"),
            Outcome::DryRunGenerated => {
                let file = self
                    .output
                    .as_deref()
                    .and_then(Path::file_name)
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{position} DRY RUN: Generated {file} for {email}")
            }
            Outcome::Failed {
                kind: FailureKind::RowProcessingError,
                reason,
            } => format!(
                "{position} FAILED: Could not process row {}: {reason}",
                row.line_number()
            ),
            Outcome::Failed { kind, reason } => {
                format!("{position} FAILED: {kind} for {email}: {reason}")
            }
        }
    }
}

/// Outcome of the stages after validation.
struct Dispatched {
    status: Outcome,
    paced: bool,
    output: Option<PathBuf>,
}

impl Dispatched {
    fn failed(kind: FailureKind, reason: impl Into<String>, paced: bool) -> Self {
        Self {
            status: Outcome::failed(kind, reason),
            paced,
            output: None,
        }
    }
}

struct RowProcessor<'a> {
    config: &'a DispatchConfig,
    services: &'a Services<'a>,
    formatters: &'a BTreeMap<String, ColumnFormat>,
    retry: RetryPolicy,
}

impl RowProcessor<'_> {
    /// Process one row; a panic inside any stage becomes a `RowProcessingError`.
    fn process_guarded(&self, row: &Row) -> RowResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.process(row))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(row = row.line_number(), %message, "row processing panicked");
                RowResult {
                    record: OutcomeRecord::now(
                        self.name_of(row),
                        row.get(&self.config.recipient_column)
                            .map(str::trim)
                            .unwrap_or(UNKNOWN),
                        Outcome::failed(FailureKind::RowProcessingError, message),
                    ),
                    paced: false,
                    output: None,
                }
            }
        }
    }

    fn process(&self, row: &Row) -> RowResult {
        let name = self.name_of(row);

        // --- Validating ---
        let Some(raw_email) = row.get(&self.config.recipient_column) else {
            return RowResult {
                record: OutcomeRecord::now(
                    name,
                    UNKNOWN,
                    Outcome::failed(
                        FailureKind::RowProcessingError,
                        format!("row has no '{}' column", self.config.recipient_column),
                    ),
                ),
                paced: false,
                output: None,
            };
        };
        let email = raw_email.trim();

        if !is_valid_address(email) {
            return RowResult {
                record: OutcomeRecord::now(
                    name,
                    email,
                    Outcome::failed(FailureKind::InvalidAddress, "Invalid address format"),
                ),
                paced: false,
                output: None,
            };
        }

        let dispatched = self.render_and_dispatch(row, email);
        RowResult {
            record: OutcomeRecord::now(name, email, dispatched.status),
            paced: dispatched.paced,
            output: dispatched.output,
        }
    }

    /// Rendering → Converting → Sending. The transient artifact is removed
    /// once conversion finishes, or on any earlier return or unwind. An output
    /// file created by a failed or panicking conversion is removed the same way.
    fn render_and_dispatch(&self, row: &Row, email: &str) -> Dispatched {
        // --- Rendering ---
        let rendered = placeholder::resolve_with(row, self.formatters)
            .and_then(|tokens| self.render(&tokens).map(|paths| (tokens, paths)));
        let (tokens, (artifact, output)) = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                let kind = stage_kind(&e, FailureKind::RenderError);
                return Dispatched::failed(kind, e.reason(), false);
            }
        };

        // --- Converting ---
        // A file already at the output path is left alone whatever happens.
        let created = (!output.exists()).then(|| ScopedArtifact::new(&output));
        if let Err(e) = self.services.converter.convert(artifact.path(), &output) {
            return Dispatched::failed(FailureKind::ConversionError, e.reason(), false);
        }
        drop(artifact);
        if let Some(created) = created {
            created.keep();
        }

        // --- Dry run ---
        if self.config.dry_run {
            return Dispatched {
                status: Outcome::DryRunGenerated,
                paced: true,
                output: Some(output),
            };
        }

        // --- Sending ---
        let html_body = match format_template(&self.config.body, &tokens) {
            Ok(body) => body,
            Err(e) => return Dispatched::failed(FailureKind::FormatError, e.reason(), false),
        };
        let message = Message {
            to: email.to_string(),
            subject: self.config.subject.clone(),
            html_body,
            attachment: output.clone(),
        };

        let status = match self
            .retry
            .run(self.services.pacer, |_| self.services.transport.send(&message))
        {
            Ok(()) => Outcome::Success,
            Err(Exhausted::NoAttempts) => Outcome::failed(
                FailureKind::TransportError,
                "no delivery attempts configured (retries = 0)",
            ),
            Err(Exhausted::Failed { attempts, last }) => Outcome::failed(
                FailureKind::TransportError,
                format!("{} (after {attempts} attempts)", last.reason()),
            ),
        };

        Dispatched {
            status,
            paced: true,
            output: Some(output),
        }
    }

    /// Load the template, fill it, and write the transient artifact.
    ///
    /// Returns the artifact guard and the path the distributable file goes to.
    fn render(&self, tokens: &TokenMap) -> Result<(ScopedArtifact, PathBuf)> {
        let template = self.services.engine.load(&self.config.template_path)?;
        let document = placeholder::render(&template, tokens);

        let basename = format_name(&self.config.filename_pattern, tokens)?;
        let output = self
            .config
            .output_dir
            .join(format!("{basename}.{}", self.services.converter.extension()));
        let mut artifact_path = self
            .config
            .output_dir
            .join(format!("{basename}.{}", self.services.engine.extension()));
        if artifact_path == output {
            artifact_path = self
                .config
                .output_dir
                .join(format!("~{basename}.{}", self.services.engine.extension()));
        }

        let artifact = ScopedArtifact::new(artifact_path);
        self.services.engine.save(&document, artifact.path())?;
        debug!(artifact = %artifact.path().display(), "transient artifact written");

        Ok((artifact, output))
    }

    fn name_of(&self, row: &Row) -> String {
        row.get(&self.config.name_column)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    }
}

/// Keep format failures distinct; everything else in a stage takes the stage's kind.
fn stage_kind(e: &DocumintError, stage: FailureKind) -> FailureKind {
    match e.failure_kind() {
        Some(FailureKind::FormatError) => FailureKind::FormatError,
        _ => stage,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}
