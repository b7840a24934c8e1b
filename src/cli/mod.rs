//! CLI module
//!
//! Command-line interface for running pipelines.
//!
//! # Commands
//!
//! - `run` - Fetch resources and load them into DuckDB
//! - `plan` - Print the fetch order and dependencies
//! - `validate` - Validate a pipeline definition
//! - `list` - List built-in pipelines
//! - `state` - Print or reset stored cursors

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::Runner;
