//! Checks, assertion sets and the final verdict.
//!
//! Overall `ok` is the AND of every required check. The console rule is a
//! required check of its own (`console_errors`), added when the verdict is
//! computed, so a run with any console error always fails.

use crate::observer::DiagnosticSummary;
use crate::result::{ErrorKind, SiteCheckError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Exit status for a passing run
pub const EXIT_OK: u8 = 0;

/// Exit status for any failure, including aborted runs
pub const EXIT_FAILURE: u8 = 2;

/// Name of the automatic console check
pub const CONSOLE_CHECK: &str = "console_errors";

/// Name of the check recording an aborted run
pub const ABORT_CHECK: &str = "run_aborted";

/// Whether a check takes part in the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Part of the AND
    #[default]
    Required,
    /// Reported, never fails the run
    WarningOnly,
}

/// One named outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    /// Outcome
    pub ok: bool,
    /// Check name
    pub name: String,
    /// Supporting data
    #[serde(default)]
    pub details: Value,
    /// Severity
    #[serde(default)]
    pub severity: Severity,
}

impl Check {
    /// Required check
    #[must_use]
    pub fn required(name: impl Into<String>, ok: bool, details: Value) -> Self {
        Self {
            ok,
            name: name.into(),
            details,
            severity: Severity::Required,
        }
    }

    /// Warning-only check
    #[must_use]
    pub fn warning_only(name: impl Into<String>, ok: bool, details: Value) -> Self {
        Self {
            ok,
            name: name.into(),
            details,
            severity: Severity::WarningOnly,
        }
    }

    /// Failing check describing `err`
    #[must_use]
    pub fn from_error(name: impl Into<String>, err: &SiteCheckError) -> Self {
        Self::required(name, false, error_details(err))
    }

    /// Whether this check fails the run
    #[must_use]
    pub fn is_blocking_failure(&self) -> bool {
        !self.ok && self.severity == Severity::Required
    }
}

/// `{"kind": ..., "message": ...}` for an error
#[must_use]
pub fn error_details(err: &SiteCheckError) -> Value {
    json!({ "kind": err.kind(), "message": err.to_string() })
}

/// Checks collected during a run, in order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssertionSet {
    checks: Vec<Check>,
}

impl AssertionSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check; a later check with the same name replaces the earlier one
    pub fn record(&mut self, check: Check) {
        if let Some(existing) = self.checks.iter_mut().find(|c| c.name == check.name) {
            *existing = check;
        } else {
            self.checks.push(check);
        }
    }

    /// Record an aborted run
    pub fn abort(&mut self, err: &SiteCheckError) {
        self.record(Check::from_error(ABORT_CHECK, err));
    }

    /// Look up a check
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Whether the run was aborted
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.get(ABORT_CHECK).is_some()
    }

    /// name → outcome
    #[must_use]
    pub fn outcomes(&self) -> BTreeMap<String, bool> {
        self.checks.iter().map(|c| (c.name.clone(), c.ok)).collect()
    }

    /// All checks
    #[must_use]
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Number of checks
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether no check was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Final result of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Overall outcome
    pub ok: bool,
    /// Scenario name
    pub scenario: String,
    /// Check identifier
    pub check_id: String,
    /// Base URL the run targeted
    pub base: String,
    /// Evidence directory, when one was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_dir: Option<String>,
    /// Every check, in recording order
    pub checks: Vec<Check>,
    /// Diagnostics gathered while the page was open
    #[serde(default)]
    pub diagnostics: DiagnosticSummary,
    /// Artifacts written to the evidence directory
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
}

impl Verdict {
    /// Freeze `set` into a verdict, adding the console check
    #[must_use]
    pub fn compute(
        scenario: impl Into<String>,
        check_id: impl Into<String>,
        base: impl Into<String>,
        mut set: AssertionSet,
        diagnostics: DiagnosticSummary,
    ) -> Self {
        let errors = diagnostics.console.error_count;
        let mut details = json!({
            "error_count": errors,
            "errors_sample": diagnostics.console.errors_sample,
        });
        if errors > 0 {
            details["kind"] = json!(ErrorKind::UnexpectedConsoleError);
        }
        set.record(Check::required(CONSOLE_CHECK, errors == 0, details));
        let ok = set.checks.iter().all(|c| !c.is_blocking_failure());
        Self {
            ok,
            scenario: scenario.into(),
            check_id: check_id.into(),
            base: base.into(),
            evidence_dir: None,
            checks: set.checks,
            diagnostics,
            artifacts: Vec::new(),
        }
    }

    /// Verdict for a run that failed before any evidence existed
    #[must_use]
    pub fn aborted(
        scenario: impl Into<String>,
        check_id: impl Into<String>,
        base: impl Into<String>,
        err: &SiteCheckError,
    ) -> Self {
        let mut set = AssertionSet::new();
        set.abort(err);
        Self::compute(scenario, check_id, base, set, DiagnosticSummary::default())
    }

    /// Attach the evidence directory
    #[must_use]
    pub fn with_evidence(mut self, dir: impl Into<String>, artifacts: Vec<String>) -> Self {
        self.evidence_dir = Some(dir.into());
        self.artifacts = artifacts;
        self
    }

    /// Add a check after the fact (replacing one with the same name) and
    /// recompute `ok`
    pub fn add_check(&mut self, check: Check) {
        if let Some(existing) = self.checks.iter_mut().find(|c| c.name == check.name) {
            *existing = check;
        } else {
            self.checks.push(check);
        }
        self.ok = self.checks.iter().all(|c| !c.is_blocking_failure());
    }

    /// Look up a check
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Names of required checks that failed
    #[must_use]
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.is_blocking_failure())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Names of warning-only checks that failed
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| !c.ok && c.severity == Severity::WarningOnly)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Process exit status
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.ok {
            EXIT_OK
        } else {
            EXIT_FAILURE
        }
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
