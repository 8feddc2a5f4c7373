//! Shared types, error model, and configuration for DocuMint.
//!
//! This crate is the foundation depended on by all other DocuMint crates.
//! It provides:
//! - [`DocumintError`]: the unified error type
//! - Domain types ([`Row`], [`Dataset`], [`Document`], [`Outcome`], [`OutcomeRecord`], [`RunId`])
//! - Configuration ([`AppConfig`], [`DispatchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnFormat, ColumnsConfig, ConverterKind, DeliveryConfig, DispatchConfig,
    MessageConfig, OutputConfig, PathsConfig, config_dir, config_file_path, delay_from_secs,
    init_config, load_config, load_config_from, save_config_to,
};
pub use error::{DocumintError, Result};
pub use types::{
    Block, Dataset, Document, FailureKind, Outcome, OutcomeRecord, Paragraph, Row, Run, RunId, Table,
    TableCell, TableRow,
};
