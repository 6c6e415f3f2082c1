//! Command-line interface for the symbol index
//!
//! Subcommand handlers live in [`commands`]; [`export`] renders an index as
//! Markdown or XML.

pub mod cli;
pub mod commands;
pub mod export;

pub use cli::Cli;
pub use export::{ExportFormat, Exporter};
