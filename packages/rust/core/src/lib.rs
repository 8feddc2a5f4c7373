//! Row-processing pipeline for DocuMint.
//!
//! This crate holds the dispatch logic: address validation, placeholder
//! resolution, name templates, bounded retry, and the orchestrator that ties
//! them to the pluggable services in [`services`].

pub mod artifact;
pub mod pipeline;
pub mod placeholder;
pub mod retry;
pub mod services;
pub mod template;
pub mod validator;

pub use pipeline::{RunReport, Services, run_dispatch, test_dispatch_row};
pub use placeholder::{TokenMap, render, resolve, resolve_with};
pub use retry::{Exhausted, Pacer, PauseReason, RetryPolicy, ThreadPacer};
pub use services::{Converter, DataSource, LogSink, Message, SilentLog, TemplateEngine, Transport};
pub use template::{format_name, format_template};
pub use validator::is_valid_address;
