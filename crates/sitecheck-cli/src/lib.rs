//! Sitecheck CLI Library
//!
//! Command-line interface for the Sitecheck smoke harness: argument
//! parsing, configuration from flags and environment, logging setup,
//! scenario loading and verdict reporting.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
mod logging;
mod output;
mod runner;

pub use commands::{Cli, Commands, RunArgs};
pub use config::{harness_config, Verbosity};
pub use error::{CliError, CliResult};
pub use logging::{env_filter, init_logging};
pub use output::CheckReporter;
pub use runner::{run_target, RunTarget};
