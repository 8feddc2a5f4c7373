//! Converter delegating to an external program.

use std::path::Path;
use std::process::Command;

use tracing::{debug, instrument, warn};

use documint_core::Converter;
use documint_shared::{DocumintError, Result};

/// Runs `program args...` once per document.
///
/// Arguments may contain `{input}`, `{output}` and `{output_dir}`, which are
/// replaced with the corresponding paths before the program starts.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    extension: String,
}

impl CommandConverter {
    /// Build from a configured command line: the first element is the program.
    pub fn from_command(command: &[String], extension: &str) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(DocumintError::config(
                "output.command must name a program when converter = \"command\"",
            ));
        };
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(DocumintError::config("output.command_extension is empty"));
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            extension: extension.to_string(),
        })
    }

    fn expand(&self, input: &Path, output: &Path) -> Vec<String> {
        let output_dir = output
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.display().to_string())
                    .replace("{output_dir}", &output_dir)
                    .replace("{output}", &output.display().to_string())
            })
            .collect()
    }
}

impl Converter for CommandConverter {
    #[instrument(skip_all, fields(program = %self.program))]
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let args = self.expand(input, output);
        debug!(?args, "running converter");

        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                DocumintError::Conversion(format!("could not start '{}': {e}", self.program))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr.trim().lines().last().unwrap_or_default().to_string();
            warn!(status = %result.status, %detail, "converter failed");
            return Err(DocumintError::Conversion(if detail.is_empty() {
                format!("'{}' exited with {}", self.program, result.status)
            } else {
                format!("'{}' exited with {}: {detail}", self.program, result.status)
            }));
        }

        if !output.exists() {
            return Err(DocumintError::Conversion(format!(
                "'{}' did not produce {}",
                self.program,
                output.display()
            )));
        }

        Ok(())
    }

    fn extension(&self) -> &str {
        &self.extension
    }
}
