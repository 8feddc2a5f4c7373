//! DocuMint CLI: personalized document generation and delivery from a data sheet.
//!
//! Fills a template once per data row, converts it to a distributable file,
//! and sends it to the row's recipient, recording every outcome in a journal.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
