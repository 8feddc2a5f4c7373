//! Application configuration for DocuMint.
//!
//! User config lives at `~/.documint/documint.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocumintError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "documint.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".documint";

// ---------------------------------------------------------------------------
// Config structs (matching documint.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Outgoing message settings.
    #[serde(default)]
    pub message: MessageConfig,

    /// Output naming and conversion.
    #[serde(default)]
    pub output: OutputConfig,

    /// Retry and pacing.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Column roles and per-column value formatting.
    #[serde(default)]
    pub columns: ColumnsConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Tabular data source (CSV).
    #[serde(default)]
    pub data_file: String,

    /// Rich-text template.
    #[serde(default)]
    pub template_file: String,

    /// Directory receiving generated documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory holding the outcome journal.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Directory the outbox transport queues messages into.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_file: String::new(),
            template_file: String::new(),
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "output".into()
}
fn default_log_dir() -> String {
    "logs".into()
}
fn default_outbox_dir() -> String {
    "outbox".into()
}

/// `[message]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_subject")]
    pub subject: String,

    /// HTML body; `{<Column>}` fields are filled per row.
    #[serde(default = "default_body")]
    pub body: String,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            body: default_body(),
        }
    }
}

fn default_subject() -> String {
    "Your Document".into()
}
fn default_body() -> String {
    "<html>\n<body style=\"font-family: sans-serif;\">\n  <p>Dear {<Name>},</p>\n  <p>Your document is attached.</p>\n</body>\n</html>\n"
        .into()
}

/// Which converter produces the distributable file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    /// Built-in HTML rendering.
    #[default]
    Html,
    /// External program (e.g. a headless office suite).
    Command,
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Basename pattern, e.g. `Admit_{<ID>}`.
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    #[serde(default)]
    pub converter: ConverterKind,

    /// Program and arguments for [`ConverterKind::Command`];
    /// `{input}` and `{output}` are replaced with file paths.
    #[serde(default)]
    pub command: Vec<String>,

    /// File extension the external command produces.
    #[serde(default = "default_command_extension")]
    pub command_extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            filename_pattern: default_filename_pattern(),
            converter: ConverterKind::default(),
            command: Vec::new(),
            command_extension: default_command_extension(),
        }
    }
}

fn default_filename_pattern() -> String {
    "Admit_{<ID>}".into()
}
fn default_command_extension() -> String {
    "pdf".into()
}

/// `[delivery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum send attempts per row.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds between send attempts and after each dispatched row.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_secs: default_delay_secs(),
        }
    }
}

fn default_retries() -> u32 {
    2
}
fn default_delay_secs() -> f64 {
    2.0
}

/// `[columns]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Column holding the recipient address.
    #[serde(default = "default_recipient_column")]
    pub recipient: String,

    /// Column holding the recipient display name.
    #[serde(default = "default_name_column")]
    pub name: String,

    /// Per-column value formatters; unlisted columns are used as-is.
    #[serde(default)]
    pub formatters: BTreeMap<String, ColumnFormat>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            recipient: default_recipient_column(),
            name: default_name_column(),
            formatters: BTreeMap::new(),
        }
    }
}

fn default_recipient_column() -> String {
    "Email".into()
}
fn default_name_column() -> String {
    "Name".into()
}

/// How a column's raw value is turned into substitution text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnFormat {
    /// The source text, trimmed.
    #[default]
    Raw,
    /// A number printed without a fractional part (`42.0` → `42`).
    Integer,
    /// A number printed with a fixed count of decimal places.
    Fixed { places: usize },
    Upper,
    Lower,
    /// A date re-formatted from `input` to `output` (chrono strftime syntax).
    Date { input: String, output: String },
}

// ---------------------------------------------------------------------------
// Dispatch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Immutable runtime configuration for one dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub data_path: PathBuf,
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub subject: String,
    pub body: String,
    pub filename_pattern: String,
    /// Maximum send attempts per row; zero means no attempt is made.
    pub retries: u32,
    /// Wait between attempts and after each dispatched row.
    pub delay: Duration,
    /// Generate documents without sending.
    pub dry_run: bool,
    /// Replace the data set with one synthetic row addressed here.
    pub test_recipient: Option<String>,
    pub recipient_column: String,
    pub name_column: String,
    pub formatters: BTreeMap<String, ColumnFormat>,
}

impl TryFrom<&AppConfig> for DispatchConfig {
    type Error = DocumintError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            data_path: PathBuf::from(&config.paths.data_file),
            template_path: PathBuf::from(&config.paths.template_file),
            output_dir: PathBuf::from(&config.paths.output_dir),
            log_dir: PathBuf::from(&config.paths.log_dir),
            subject: config.message.subject.clone(),
            body: config.message.body.clone(),
            filename_pattern: config.output.filename_pattern.clone(),
            retries: config.delivery.retries,
            delay: delay_from_secs(config.delivery.delay_secs)?,
            dry_run: false,
            test_recipient: None,
            recipient_column: config.columns.recipient.clone(),
            name_column: config.columns.name.clone(),
            formatters: config.columns.formatters.clone(),
        })
    }
}

impl DispatchConfig {
    /// Check that required inputs are set and the template is present on disk.
    ///
    /// The data file is only checked for being set: whether it can be opened is
    /// reported by the run itself as [`DocumintError::SourceInaccessible`].
    /// Output and log directories are created on demand and only need to be set.
    pub fn validate(&self) -> Result<()> {
        if self.template_path.as_os_str().is_empty() {
            return Err(DocumintError::config("template file is not set"));
        }
        if !self.template_path.exists() {
            return Err(DocumintError::config(format!(
                "template file not found at: {}",
                self.template_path.display()
            )));
        }

        let required = [
            ("data file", &self.data_path),
            ("output directory", &self.output_dir),
            ("log directory", &self.log_dir),
        ];
        for (label, path) in required {
            if path.as_os_str().is_empty() {
                return Err(DocumintError::config(format!("{label} is not set")));
            }
        }

        if self.filename_pattern.trim().is_empty() {
            return Err(DocumintError::config("filename pattern is empty"));
        }
        if self.recipient_column.trim().is_empty() {
            return Err(DocumintError::config("recipient column is not set"));
        }

        Ok(())
    }
}

/// Convert a seconds value from config or CLI into a `Duration`.
pub fn delay_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        DocumintError::config(format!(
            "delay must be a finite, non-negative number of seconds (got {secs})"
        ))
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.documint/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocumintError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.documint/documint.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocumintError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocumintError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocumintError::io(parent, e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| DocumintError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| DocumintError::io(path, e))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config_to(&AppConfig::default(), &path)?;
    tracing::info!(?path, "created default config file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("filename_pattern"));
        assert!(toml_str.contains("Admit_{<ID>}"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.delivery.retries, 2);
        assert_eq!(parsed.columns.recipient, "Email");
        assert_eq!(parsed.output.converter, ConverterKind::Html);
    }

    #[test]
    fn config_with_formatters() {
        let toml_str = r#"
[paths]
data_file = "students.csv"

[output]
converter = "command"
command = ["soffice", "--headless", "--convert-to", "pdf", "{input}"]

[columns.formatters]
ID = { kind = "integer" }
Fee = { kind = "fixed", places = 2 }
Exam = { kind = "date", input = "%Y-%m-%d", output = "%d %B %Y" }
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.data_file, "students.csv");
        assert_eq!(config.output.converter, ConverterKind::Command);
        assert_eq!(config.columns.formatters["ID"], ColumnFormat::Integer);
        assert_eq!(
            config.columns.formatters["Fee"],
            ColumnFormat::Fixed { places: 2 }
        );
        assert_eq!(config.delivery.delay_secs, 2.0);
    }

    #[test]
    fn dispatch_config_from_app_config() {
        let app = AppConfig::default();
        let dispatch = DispatchConfig::try_from(&app).expect("convert");
        assert_eq!(dispatch.retries, 2);
        assert_eq!(dispatch.delay, Duration::from_secs(2));
        assert!(!dispatch.dry_run);
        assert_eq!(dispatch.recipient_column, "Email");
    }

    #[test]
    fn negative_delay_is_rejected() {
        let mut app = AppConfig::default();
        app.delivery.delay_secs = -1.0;
        let err = DispatchConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
        assert!(delay_from_secs(f64::NAN).is_err());
    }

    #[test]
    fn validate_reports_unset_data_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("template.json");
        std::fs::write(&template, "{}").expect("write");

        let mut dispatch = DispatchConfig::try_from(&AppConfig::default()).expect("convert");
        dispatch.template_path = template;
        let err = dispatch.validate().unwrap_err();
        assert!(err.to_string().contains("data file is not set"));
    }

    #[test]
    fn validate_leaves_missing_data_file_to_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = dir.path().join("template.json");
        std::fs::write(&template, "{}").expect("write");

        let mut dispatch = DispatchConfig::try_from(&AppConfig::default()).expect("convert");
        dispatch.data_path = dir.path().join("missing.csv");
        dispatch.template_path = template;
        dispatch.validate().expect("missing data file is not a config error");
    }

    #[test]
    fn validate_reports_missing_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("data.csv");
        std::fs::write(&data, "Email\n").expect("write");

        let mut dispatch = DispatchConfig::try_from(&AppConfig::default()).expect("convert");
        dispatch.data_path = data;
        dispatch.template_path = dir.path().join("missing.json");
        let err = dispatch.validate().unwrap_err();
        assert!(err.to_string().contains("template file not found"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("documint.toml");
        let mut config = AppConfig::default();
        config.message.subject = "Admit card".into();
        save_config_to(&config, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.message.subject, "Admit card");
    }
}
