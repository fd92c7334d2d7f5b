//! Scenario loading and execution for the `run` commands

use crate::error::{CliError, CliResult};
use chrono::Local;
use sitecheck::{catalog, HarnessConfig, Scenario, Verdict};
use std::path::PathBuf;

/// Where the scenario comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// Built-in catalog entry
    Builtin(String),
    /// YAML file
    File(PathBuf),
}

impl RunTarget {
    /// Name used in the verdict when the scenario never loaded
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Builtin(name) => name.clone(),
            Self::File(path) => path.display().to_string(),
        }
    }

    /// Load and validate the scenario
    pub fn load(&self) -> CliResult<Scenario> {
        let scenario = match self {
            Self::Builtin(name) => catalog::find(name, Local::now())
                .ok_or_else(|| CliError::unknown_scenario(name.clone()))?,
            Self::File(path) => Scenario::load(path)?,
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

/// Load and run `target`, folding every failure into the verdict
#[must_use]
pub fn run_target(target: &RunTarget, config: HarnessConfig) -> Verdict {
    let base = config.base_url.clone();
    match target.load() {
        Ok(scenario) => match execute(&scenario, config) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(scenario = %scenario.name, error = %e, "run failed before evidence");
                Verdict::aborted(scenario.name, scenario.check_id, base, &e.into_site_error())
            }
        },
        Err(e) => {
            tracing::error!(scenario = %target.label(), error = %e, "scenario not loaded");
            Verdict::aborted(target.label(), "", base, &e.into_site_error())
        }
    }
}

#[cfg(feature = "browser")]
fn execute(scenario: &Scenario, config: HarnessConfig) -> CliResult<Verdict> {
    use sitecheck::{ChromiumLauncher, HttpProber, ScenarioRunner};
    use std::time::Duration;

    let probe = HttpProber::new(Duration::from_secs(config.probe_timeout_secs));
    let runner = ScenarioRunner::new(config, ChromiumLauncher::new(), probe)?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = rt.block_on(runner.run(scenario))?;
    tracing::info!(
        scenario = %scenario.name,
        evidence = %outcome.evidence_dir.display(),
        ok = outcome.verdict.ok,
        "run finished"
    );
    Ok(outcome.verdict)
}

#[cfg(not(feature = "browser"))]
fn execute(_scenario: &Scenario, _config: HarnessConfig) -> CliResult<Verdict> {
    Err(CliError::BrowserUnavailable)
}
