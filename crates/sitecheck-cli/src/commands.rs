//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand};
use sitecheck::runner::{BASE_URL_ENV, DEFAULT_BASE_URL};
use std::path::PathBuf;

/// Sitecheck: scripted browser smoke checks with evidence capture
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors are logged, no per-check lines)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one built-in scenario
    Run {
        /// Scenario name (see `sitecheck list`)
        scenario: String,

        /// Run options
        #[command(flatten)]
        args: RunArgs,
    },

    /// Run a scenario loaded from a YAML file
    RunFile {
        /// Path to the scenario YAML
        path: PathBuf,

        /// Run options
        #[command(flatten)]
        args: RunArgs,
    },

    /// List built-in scenarios
    List,

    /// Print a built-in scenario as YAML
    Show {
        /// Scenario name
        scenario: String,
    },
}

/// Options shared by `run` and `run-file`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Base URL of the site under test
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Root directory for timestamped evidence
    #[arg(long, env = "SITECHECK_EVIDENCE_DIR", default_value = "evidence")]
    pub evidence_dir: PathBuf,

    /// Chromium executable (auto-detected when unset)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the chromium sandbox (containers running as root)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Maximum console errors / failed requests kept in samples
    #[arg(long)]
    pub sample_limit: Option<usize>,

    /// Navigation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}
