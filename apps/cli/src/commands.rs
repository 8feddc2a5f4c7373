//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use documint_adapters::{CsvDataSource, JsonTemplateEngine, OutboxTransport, converter_for};
use documint_core::{LogSink, RunReport, Services, ThreadPacer, is_valid_address, run_dispatch};
use documint_journal::Journal;
use documint_shared::{
    AppConfig, ConverterKind, DispatchConfig, Outcome, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocuMint: generate and deliver one personalized document per data row.
#[derive(Parser)]
#[command(
    name = "documint",
    version,
    about = "Generate a personalized document for every row of a data sheet and deliver it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.documint/documint.toml.
    #[arg(long, global = true, env = "DOCUMINT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate and deliver documents for every row of the data file.
    Run(RunArgs),

    /// Summarize the outcome journal.
    Journal {
        /// Log directory holding the journal (defaults to the configured one).
        #[arg(long)]
        logs: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `documint run`. Every flag overrides the config file.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Data file (CSV, first row names the columns).
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Template document (JSON).
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Output directory for generated documents.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Directory holding the outcome journal.
    #[arg(long)]
    pub logs: Option<PathBuf>,

    /// Message subject.
    #[arg(long)]
    pub subject: Option<String>,

    /// File whose contents become the HTML message body.
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Output file name pattern, e.g. `Admit_{<ID>}`.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Maximum delivery attempts per row.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds between attempts and after each row.
    #[arg(long)]
    pub delay: Option<f64>,

    /// Generate documents without sending anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Send a single test document to this address instead of the data rows.
    #[arg(long, value_name = "ADDR")]
    pub test_email: Option<String>,

    /// Converter producing the distributable file.
    #[arg(long)]
    pub converter: Option<ConverterArg>,

    /// Outbox directory messages are queued into.
    #[arg(long)]
    pub outbox: Option<PathBuf>,
}

/// Converter selection on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum ConverterArg {
    Html,
    Command,
}

impl From<ConverterArg> for ConverterKind {
    fn from(arg: ConverterArg) -> Self {
        match arg {
            ConverterArg::Html => ConverterKind::Html,
            ConverterArg::Command => ConverterKind::Command,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "documint=info",
        1 => "documint=debug",
        _ => "documint=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Run(args) => cmd_run(config, args).await,
        Command::Journal { logs } => cmd_journal(&config, logs),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(mut config: AppConfig, args: RunArgs) -> Result<()> {
    apply_overrides(&mut config, &args)?;

    let mut dispatch = DispatchConfig::try_from(&config)?;
    dispatch.dry_run = args.dry_run;
    if let Some(address) = &args.test_email {
        let address = address.trim();
        if !is_valid_address(address) {
            return Err(eyre!("--test-email '{address}' is not a valid address"));
        }
        dispatch.test_recipient = Some(address.to_string());
    }
    dispatch.validate()?;

    info!(
        data = %dispatch.data_path.display(),
        template = %dispatch.template_path.display(),
        dry_run = dispatch.dry_run,
        test = dispatch.test_recipient.is_some(),
        "starting dispatch"
    );

    let progress = CliProgress::new();
    let sink = progress.clone();
    let output = config.output.clone();
    let outbox_dir = PathBuf::from(&config.paths.outbox_dir);

    // The pipeline blocks on conversion and pacing, so it runs off the async runtime.
    let report = tokio::task::spawn_blocking(move || {
        let converter = converter_for(&output)?;
        let transport = OutboxTransport::new(outbox_dir);
        let services = Services {
            source: &CsvDataSource,
            engine: &JsonTemplateEngine,
            converter: converter.as_ref(),
            transport: &transport,
            pacer: &ThreadPacer,
            log: &sink,
        };
        run_dispatch(&dispatch, &services)
    })
    .await
    .map_err(|e| eyre!("dispatch worker stopped unexpectedly: {e}"));
    progress.finish();

    let report = report??;
    print_report(&report);

    match report.journal_error {
        Some(e) => Err(eyre!("run finished but the journal was not saved: {e}")),
        None => Ok(()),
    }
}

/// Merge command-line flags into the loaded config.
fn apply_overrides(config: &mut AppConfig, args: &RunArgs) -> Result<()> {
    let paths = &mut config.paths;
    if let Some(data) = &args.data {
        paths.data_file = data.display().to_string();
    }
    if let Some(template) = &args.template {
        paths.template_file = template.display().to_string();
    }
    if let Some(out) = &args.out {
        paths.output_dir = out.display().to_string();
    }
    if let Some(logs) = &args.logs {
        paths.log_dir = logs.display().to_string();
    }
    if let Some(outbox) = &args.outbox {
        paths.outbox_dir = outbox.display().to_string();
    }

    if let Some(subject) = &args.subject {
        config.message.subject = subject.clone();
    }
    if let Some(body_file) = &args.body_file {
        config.message.body = std::fs::read_to_string(body_file)
            .map_err(|e| eyre!("cannot read body file '{}': {e}", body_file.display()))?;
    }
    if let Some(pattern) = &args.pattern {
        config.output.filename_pattern = pattern.clone();
    }
    if let Some(converter) = args.converter {
        config.output.converter = converter.into();
    }
    if let Some(retries) = args.retries {
        config.delivery.retries = retries;
    }
    if let Some(delay) = args.delay {
        config.delivery.delay_secs = delay;
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("  Dispatch finished");
    println!("  Run:      {}", report.run_id);
    println!("  Rows:     {}", report.records.len());
    println!("  Sent:     {}", report.succeeded());
    println!("  Dry run:  {}", report.dry_run());
    println!("  Failed:   {}", report.failed());
    println!("  Journal:  {}", report.journal_path.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());

    let failures: Vec<_> = report
        .records
        .iter()
        .filter_map(|r| match &r.status {
            Outcome::Failed { kind, reason } => Some((r, kind, reason)),
            _ => None,
        })
        .collect();
    if !failures.is_empty() {
        println!();
        println!("  Failures:");
        for (record, kind, reason) in failures {
            println!("    {} <{}>: {kind}: {reason}", record.name, record.email);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress sink
// ---------------------------------------------------------------------------

/// Prints pipeline progress lines above an indicatif spinner.
#[derive(Clone)]
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl LogSink for CliProgress {
    fn line(&self, line: &str) {
        self.spinner.println(line);
        self.spinner.set_message(line.to_string());
    }
}

// ---------------------------------------------------------------------------
// journal / config
// ---------------------------------------------------------------------------

fn cmd_journal(config: &AppConfig, logs: Option<PathBuf>) -> Result<()> {
    let log_dir = logs.unwrap_or_else(|| PathBuf::from(&config.paths.log_dir));
    let journal = Journal::in_dir(&log_dir);
    let summary = journal.summary()?;

    println!();
    println!("  Journal:  {}", journal.path().display());
    println!("  Entries:  {}", summary.total);
    println!("  Sent:     {}", summary.succeeded);
    println!("  Dry run:  {}", summary.dry_run);
    println!("  Failed:   {}", summary.failed);
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
