//! Built-in implementations of the DocuMint service contracts.
//!
//! - [`CsvDataSource`]: header row plus data rows from a CSV file
//! - [`JsonTemplateEngine`]: the document model stored as JSON
//! - [`HtmlConverter`] and [`CommandConverter`]: produce the distributable file
//! - [`OutboxTransport`]: queues messages as files for a mail relay

mod command;
mod csv_source;
mod html;
mod json_engine;
mod outbox;

use documint_core::Converter;
use documint_shared::{ConverterKind, OutputConfig, Result};

pub use command::CommandConverter;
pub use csv_source::CsvDataSource;
pub use html::{HtmlConverter, render_html};
pub use json_engine::JsonTemplateEngine;
pub use outbox::{OutboxEntry, OutboxTransport};

/// Build the converter selected by the `[output]` section.
pub fn converter_for(output: &OutputConfig) -> Result<Box<dyn Converter>> {
    match output.converter {
        ConverterKind::Html => Ok(Box::new(HtmlConverter)),
        ConverterKind::Command => Ok(Box::new(CommandConverter::from_command(
            &output.command,
            &output.command_extension,
        )?)),
    }
}
