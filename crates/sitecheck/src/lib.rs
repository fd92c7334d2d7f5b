//! Sitecheck: evidence-capturing browser smoke checks
//!
//! Drives a headless Chromium against a deployed single-page application,
//! asserts UI behaviour (dialogs, form state, URL markers, storage
//! mutations) and writes timestamped evidence for every run.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    SITECHECK Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Scenario   │    │ PageDriver │            │
//! │   │ (data /    │───►│ Runner     │───►│ (chromium  │            │
//! │   │  YAML)     │    │            │    │  or mock)  │            │
//! │   └────────────┘    └─────┬──────┘    └─────┬──────┘            │
//! │                           │                 │ events            │
//! │                     ┌─────▼──────┐    ┌─────▼──────┐            │
//! │                     │ Evidence   │◄───│ Diagnostic │            │
//! │                     │ + Verdict  │    │ Observer   │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sitecheck::{catalog, HarnessConfig, MockDriver, MockLauncher, ScenarioRunner, StaticProbe};
//!
//! # async fn demo() -> sitecheck::SiteCheckResult<()> {
//! let runner = ScenarioRunner::new(
//!     HarnessConfig::from_env(),
//!     MockLauncher::new(MockDriver::new()),
//!     StaticProbe::new(),
//! )?;
//! let outcome = runner.run(&catalog::deep_link_modal()).await?;
//! println!("{}", outcome.verdict.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Named conditions evaluated against captures and diagnostics
pub mod assertion;

/// Browser launch options and the chromiumoxide backend
pub mod browser;

/// Built-in scenarios for the Yiyu site
pub mod catalog;

/// Native dialog records
pub mod dialog;

/// The page capability the runner drives, plus the mock
#[allow(clippy::missing_errors_doc)]
pub mod driver;

/// Timestamped evidence directories with atomic writes
pub mod evidence;

/// Element locators
pub mod locator;

/// Failed-request records and in-flight tracking
pub mod network;

/// Append-only diagnostic log of one page
pub mod observer;

/// Plain HTTP status probes
pub mod reachability;

/// Error types
pub mod result;

/// Scenario runner, its configuration and run states
pub mod runner;

/// Scenario model and YAML loading
pub mod scenario;

/// Storage seed payloads
pub mod seed;

/// Checks and verdicts
pub mod verdict;

/// Bounded waits
pub mod wait;

pub use assertion::{Assertion, AssertionKind, Captures, EvalContext, ParamCheck};
pub use browser::BrowserConfig;
#[cfg(feature = "browser")]
pub use browser::{ChromiumDriver, ChromiumLauncher};
pub use dialog::{Dialog, DialogResponse, DialogType};
pub use driver::{Launcher, MockDriver, MockEffect, MockElement, MockLauncher, PageDriver};
pub use evidence::EvidenceSession;
pub use locator::{ElementState, Locator, Pick, Role, Selector};
pub use network::{ErrorResponse, FailedRequest};
pub use observer::{
    ConsoleLevel, ConsoleSummary, DiagnosticEntry, DiagnosticObserver, DiagnosticSummary,
    DialogSummary, NetworkSummary,
};
pub use reachability::{base_url, resolve_url, HttpProber, StaticProbe, StatusProbe};
pub use result::{ErrorKind, SiteCheckError, SiteCheckResult};
pub use runner::{
    HarnessConfig, HarnessConfigBuilder, RunOutcome, RunState, RunStateMachine, ScenarioRunner,
};
pub use scenario::{HttpCheck, Scenario, Snapshot, Step};
pub use seed::{SeedPayload, StorageArea};
pub use verdict::{AssertionSet, Check, Severity, Verdict, EXIT_FAILURE, EXIT_OK};
pub use wait::{LoadState, WaitOptions, WaitState};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::*;
    pub use super::browser::*;
    pub use super::driver::*;
    pub use super::locator::*;
    pub use super::result::*;
    pub use super::runner::*;
    pub use super::scenario::*;
    pub use super::seed::*;
    pub use super::verdict::*;
    pub use super::wait::*;
}
