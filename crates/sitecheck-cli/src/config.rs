//! CLI configuration

use crate::commands::RunArgs;
use serde::{Deserialize, Serialize};
use sitecheck::{BrowserConfig, HarnessConfig};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - per-step logs
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Derive from the `-q` and `-v` flags; quiet wins
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Default `tracing` filter directive for this level
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,sitecheck=info",
            Self::Verbose => "info,sitecheck=debug",
            Self::Debug => "debug,sitecheck=trace",
        }
    }
}

/// Build the harness configuration from run options
#[must_use]
pub fn harness_config(args: &RunArgs) -> HarnessConfig {
    let mut browser = BrowserConfig::default().with_headless(!args.headed);
    if let Some(path) = &args.chromium_path {
        browser = browser.with_chromium_path(path.clone());
    }
    if args.no_sandbox {
        browser = browser.with_no_sandbox();
    }

    let mut builder = HarnessConfig::builder()
        .base_url(args.base_url.clone())
        .evidence_root(args.evidence_dir.clone())
        .browser(browser);
    if let Some(limit) = args.sample_limit {
        builder = builder.sample_limit(limit);
    }
    if let Some(ms) = args.timeout_ms {
        builder = builder.navigation_timeout_ms(ms);
    }
    builder.build()
}
