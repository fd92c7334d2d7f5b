//! Human-readable check lines on stderr

use console::{style, Term};
use sitecheck::{Check, Severity, Verdict};

/// Writes one line per check, plus a summary, to stderr
#[derive(Debug)]
pub struct CheckReporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for CheckReporter {
    fn default() -> Self {
        Self::new(Term::stderr().is_term(), false)
    }
}

impl CheckReporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Render the line for one check
    #[must_use]
    pub fn check_line(&self, check: &Check) -> String {
        let (symbol, plain) = match (check.ok, check.severity) {
            (true, _) => (style("✓").green().bold(), "PASS"),
            (false, Severity::Required) => (style("✗").red().bold(), "FAIL"),
            (false, Severity::WarningOnly) => (style("⚠").yellow().bold(), "WARN"),
        };
        let prefix = if self.use_color {
            symbol.to_string()
        } else {
            plain.to_string()
        };
        match check.details.get("message").and_then(|m| m.as_str()) {
            Some(message) if !check.ok => format!("{prefix} {} ({message})", check.name),
            _ => format!("{prefix} {}", check.name),
        }
    }

    /// Render the closing summary line
    #[must_use]
    pub fn summary_line(&self, verdict: &Verdict) -> String {
        let failures = verdict.failures().len();
        let warnings = verdict.warnings().len();
        let head = format!("{} [{}]", verdict.scenario, verdict.check_id);
        let tail = format!(
            "{} checks, {failures} failed, {warnings} warnings, {} console errors",
            verdict.checks.len(),
            verdict.diagnostics.console.error_count
        );
        let status = match (verdict.ok, self.use_color) {
            (true, true) => style("ok").green().bold().to_string(),
            (false, true) => style("FAILED").red().bold().to_string(),
            (true, false) => "ok".to_string(),
            (false, false) => "FAILED".to_string(),
        };
        format!("{head}: {status} ({tail})")
    }

    /// Print every check and the summary
    ///
    /// Failed required checks are printed even in quiet mode.
    pub fn report(&self, verdict: &Verdict) {
        for check in &verdict.checks {
            if self.quiet && !check.is_blocking_failure() {
                continue;
            }
            let _ = self.term.write_line(&self.check_line(check));
        }
        if !self.quiet {
            if let Some(dir) = &verdict.evidence_dir {
                let _ = self.term.write_line(&format!("evidence: {dir}"));
            }
        }
        let _ = self.term.write_line(&self.summary_line(verdict));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitecheck::{AssertionSet, DiagnosticSummary};

    fn plain() -> CheckReporter {
        CheckReporter::new(false, false)
    }

    #[test]
    fn test_check_line_pass() {
        let check = Check::required("url_has_open_param", true, json!({}));
        assert_eq!(plain().check_line(&check), "PASS url_has_open_param");
    }

    #[test]
    fn test_check_line_failure_with_message() {
        let check = Check::required(
            "run",
            false,
            json!({"kind": "ElementNotFound", "message": "element not found"}),
        );
        assert_eq!(plain().check_line(&check), "FAIL run (element not found)");
    }

    #[test]
    fn test_check_line_warning() {
        let check = Check::warning_only("vite_svg_status", false, json!({"status": 404}));
        assert_eq!(plain().check_line(&check), "WARN vite_svg_status");
    }

    #[test]
    fn test_summary_line() {
        let mut set = AssertionSet::new();
        set.record(Check::required("a", true, json!({})));
        set.record(Check::warning_only("b", false, json!({})));
        let verdict = Verdict::compute(
            "deep-link-modal",
            "P0-IX-06",
            "https://site.test/",
            set,
            DiagnosticSummary::default(),
        );
        let line = plain().summary_line(&verdict);
        assert!(line.starts_with("deep-link-modal [P0-IX-06]: ok"));
        assert!(line.contains("3 checks, 0 failed, 1 warnings, 0 console errors"));
    }

    #[test]
    fn test_summary_line_failed() {
        let err = sitecheck::SiteCheckError::invalid_scenario("empty");
        let verdict = Verdict::aborted("custom", "X-1", "https://site.test/", &err);
        assert!(plain().summary_line(&verdict).contains("FAILED"));
    }
}
