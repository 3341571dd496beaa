//! Formprobe CLI Library
//!
//! Command-line interface for the Formprobe form validator.

#![warn(missing_docs)]

mod commands;
mod config;
mod error;
pub mod logging;
mod runner;

pub use commands::{Cli, Commands, ConfigArgs, ConfigOverrides, RunArgs};
pub use config::Verbosity;
pub use error::{CliError, CliResult, EXIT_ERROR, EXIT_FAILED};
pub use runner::{run_scenario, write_report, ReportFormat};
