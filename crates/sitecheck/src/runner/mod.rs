//! Scenario Runner
//!
//! Drives one [`Scenario`] through a fresh browser page and turns what it
//! sees into a [`Verdict`]:
//!
//! 1. open the evidence session
//! 2. probe HTTP reachability (independent check)
//! 3. launch the browser and attach the diagnostic observer
//! 4. seed, navigate and wait for network quiescence
//! 5. run the interaction steps with bounded waits
//! 6. evaluate every assertion
//! 7. persist snapshots, `console_summary.json` and `verdict.json`
//!
//! A failure in 3-6 aborts the remaining steps and becomes a failing
//! `run_aborted` check. The browser is closed on every path.

mod config;
mod state;

pub use config::{HarnessConfig, HarnessConfigBuilder, BASE_URL_ENV, DEFAULT_BASE_URL};
pub use state::{RunState, RunStateMachine};

use crate::assertion::{Captures, EvalContext};
use crate::driver::{Launcher, PageDriver};
use crate::evidence::EvidenceSession;
use crate::observer::DiagnosticObserver;
use crate::reachability::{resolve_url, StatusProbe};
use crate::result::{SiteCheckError, SiteCheckResult};
use crate::scenario::{
    Scenario, Step, CAPTURE_DIALOGS, CAPTURE_ENTRY_URL, CAPTURE_FINAL_URL, CAPTURE_NAV_STATUS,
};
use crate::verdict::{error_details, AssertionSet, Check, Verdict};
use crate::wait::{
    wait_for_element, wait_for_network_idle, wait_for_url, LoadState, WaitOptions, WaitState,
};
use chrono::{DateTime, Local};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Screenshot taken when a run aborts
pub const ABORT_SCREENSHOT: &str = "aborted.png";

/// Always-written diagnostics file
pub const CONSOLE_SUMMARY_FILE: &str = "console_summary.json";

/// Copy of the printed verdict
pub const VERDICT_FILE: &str = "verdict.json";

/// Check recording a failed evidence write
pub const PERSISTENCE_CHECK: &str = "evidence_persistence";

/// Result of one run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final verdict
    pub verdict: Verdict,
    /// Evidence directory
    pub evidence_dir: PathBuf,
    /// States visited
    pub states: Vec<RunState>,
}

/// Runs scenarios against one configured site
#[derive(Debug)]
pub struct ScenarioRunner<L, P> {
    config: HarnessConfig,
    launcher: L,
    probe: P,
}

impl<L, P> ScenarioRunner<L, P>
where
    L: Launcher,
    P: StatusProbe,
{
    /// Create a runner; fails on an unusable configuration
    pub fn new(config: HarnessConfig, launcher: L, probe: P) -> SiteCheckResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            launcher,
            probe,
        })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `scenario` with the session stamped now
    pub async fn run(&self, scenario: &Scenario) -> SiteCheckResult<RunOutcome> {
        self.run_at(scenario, Local::now()).await
    }

    /// Run `scenario` with the session stamped `timestamp`.
    ///
    /// Returns `Err` only when the scenario is invalid, its entry URL does
    /// not resolve, or the evidence directory cannot be created; every later
    /// failure is in the verdict.
    pub async fn run_at(
        &self,
        scenario: &Scenario,
        timestamp: DateTime<Local>,
    ) -> SiteCheckResult<RunOutcome> {
        scenario.validate()?;
        let entry = resolve_url(&self.config.base_url, &scenario.url)?;
        let mut machine = RunStateMachine::new();
        let session = match EvidenceSession::open(&self.config.evidence_root, timestamp) {
            Ok(session) => session,
            Err(err) => {
                machine.finish();
                return Err(err);
            }
        };
        machine.advance(RunState::SessionReady)?;
        info!(
            scenario = %scenario.name,
            check_id = %scenario.check_id,
            base = %self.config.base_url,
            dir = %session.dir().display(),
            "run started"
        );

        let mut run = Run {
            config: &self.config,
            scenario,
            entry: entry.clone(),
            session,
            observer: DiagnosticObserver::new(),
            captures: Captures::new(),
            set: AssertionSet::new(),
            machine,
        };
        run.captures.insert(CAPTURE_ENTRY_URL, entry);

        if let Some(http) = &scenario.http_check {
            let check = match resolve_url(&self.config.base_url, &http.url) {
                Ok(url) => match self.probe.status(&url).await {
                    Ok(status) => Check::required(
                        &http.name,
                        status == http.expect_status,
                        json!({ "url": url, "status": status, "expected": http.expect_status }),
                    ),
                    Err(err) => {
                        let mut details = error_details(&err);
                        details["url"] = json!(url);
                        Check::required(&http.name, false, details)
                    }
                },
                Err(err) => Check::required(&http.name, false, error_details(&err)),
            };
            info!(check = %check.name, ok = check.ok, "reachability");
            run.set.record(check);
        }

        match self.launcher.launch(&self.config.browser).await {
            Ok(mut driver) => {
                if let Err(err) = run.drive(&mut driver, &self.probe).await {
                    run.abort(&mut driver, &err).await;
                }
                if let Err(err) = driver.close().await {
                    warn!(error = %err, "closing browser failed");
                }
            }
            Err(err) => {
                error!(error = %err, "browser launch failed");
                run.set.abort(&err);
            }
        }

        Ok(run.persist())
    }
}

/// Mutable state of one run
struct Run<'a> {
    config: &'a HarnessConfig,
    scenario: &'a Scenario,
    entry: String,
    session: EvidenceSession,
    observer: DiagnosticObserver,
    captures: Captures,
    set: AssertionSet,
    machine: RunStateMachine,
}

impl Run<'_> {
    fn options(&self, timeout_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(timeout_ms)
            .with_poll_interval(self.config.poll_interval_ms)
    }

    async fn drive<D, P>(&mut self, driver: &mut D, probe: &P) -> SiteCheckResult<()>
    where
        D: PageDriver,
        P: StatusProbe,
    {
        let scenario = self.scenario;
        driver.attach_observer(self.observer.clone()).await?;
        self.machine.advance(RunState::BrowserReady)?;

        let seed = scenario.seed.as_ref();
        if let Some(seed) = seed.filter(|s| s.inject.before_navigation) {
            driver.install_seed(seed).await?;
        }
        self.machine.advance(RunState::Seeded)?;

        let entry = self.entry.clone();
        let status = self.navigate(driver, &entry, scenario.wait_until).await?;
        self.captures.insert(CAPTURE_NAV_STATUS, json!(status));
        if let Some(seed) = seed.filter(|s| s.inject.after_load) {
            driver.apply_seed(seed).await?;
        }
        self.machine.advance(RunState::Navigated)?;

        self.machine.advance(RunState::Interacting)?;
        for (index, step) in scenario.steps.iter().enumerate() {
            debug!(index, step = %step.describe(), "step");
            self.run_step(driver, step).await?;
        }
        let final_url = driver.current_url().await?;
        self.captures.insert(CAPTURE_FINAL_URL, final_url);
        self.captures
            .insert(CAPTURE_DIALOGS, json!(self.observer.dialog_messages()));

        let statuses = self.asset_statuses(probe).await;
        let dialogs = self.observer.dialog_messages();
        let responses = self.observer.error_responses();
        let ctx = EvalContext {
            captures: &self.captures,
            dialogs: &dialogs,
            asset_statuses: &statuses,
            error_responses: &responses,
            base: &self.config.base_url,
        };
        for assertion in &scenario.assertions {
            let check = assertion.evaluate(&ctx);
            if check.ok {
                info!(assertion = %check.name, "passed");
            } else {
                warn!(assertion = %check.name, severity = ?check.severity, details = %check.details, "failed");
            }
            self.set.record(check);
        }
        self.machine.advance(RunState::Asserted)?;
        Ok(())
    }

    async fn navigate<D>(
        &self,
        driver: &mut D,
        url: &str,
        wait_until: LoadState,
    ) -> SiteCheckResult<Option<u16>>
    where
        D: PageDriver,
    {
        let started = Instant::now();
        let bound = self.config.navigation_timeout();
        let status = driver.navigate(url, wait_until, bound).await?;
        if wait_until == LoadState::NetworkIdle {
            let remaining = bound.saturating_sub(started.elapsed());
            let options = self.options(millis(remaining));
            wait_for_network_idle(&self.observer, self.config.network_idle(), &options).await?;
        }
        debug!(url, status = ?status, "navigated");
        Ok(status)
    }

    async fn run_step<D>(&mut self, driver: &mut D, step: &Step) -> SiteCheckResult<()>
    where
        D: PageDriver,
    {
        let scenario = self.scenario;
        match step {
            Step::Click { target, timeout_ms } => {
                wait_for_element(&*driver, target, WaitState::Visible, &self.options(*timeout_ms))
                    .await?;
                driver.click(target).await
            }
            Step::Fill {
                target,
                value,
                timeout_ms,
            } => {
                wait_for_element(&*driver, target, WaitState::Visible, &self.options(*timeout_ms))
                    .await?;
                driver.fill(target, value).await
            }
            Step::WaitFor {
                target,
                state,
                timeout_ms,
                record,
            } => {
                let outcome =
                    wait_for_element(&*driver, target, *state, &self.options(*timeout_ms)).await;
                self.settle(record.as_deref(), outcome.map(|_| ()))
            }
            Step::WaitForUrl {
                contains,
                timeout_ms,
                record,
            } => {
                let outcome = wait_for_url(&*driver, contains, &self.options(*timeout_ms)).await;
                self.settle(record.as_deref(), outcome.map(|_| ()))
            }
            Step::WaitForNetworkIdle { timeout_ms } => {
                wait_for_network_idle(
                    &self.observer,
                    self.config.network_idle(),
                    &self.options(*timeout_ms),
                )
                .await
            }
            Step::Screenshot { name } => {
                self.session.save_screenshot(&*driver, name).await?;
                Ok(())
            }
            Step::Pause { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(())
            }
            Step::ScrollToBottom => driver.scroll_to_bottom().await,
            Step::Navigate { url, wait_until } => {
                let url = resolve_url(&self.config.base_url, url)?;
                self.navigate(driver, &url, *wait_until).await?;
                Ok(())
            }
            Step::Reseed => match &scenario.seed {
                Some(seed) => driver.apply_seed(seed).await,
                None => Err(SiteCheckError::invalid_scenario("reseed without a seed")),
            },
            Step::CaptureUrl { name } => {
                let url = driver.current_url().await?;
                self.captures.insert(name, url);
                Ok(())
            }
            Step::CaptureValue {
                target,
                name,
                timeout_ms,
            } => {
                let state =
                    wait_for_element(&*driver, target, WaitState::Attached, &self.options(*timeout_ms))
                        .await?;
                self.captures.insert(name, json!(state.value));
                Ok(())
            }
            Step::CaptureText {
                target,
                name,
                timeout_ms,
            } => {
                let state =
                    wait_for_element(&*driver, target, WaitState::Visible, &self.options(*timeout_ms))
                        .await?;
                self.captures.insert(name, json!(state.text));
                Ok(())
            }
            Step::CaptureCount { target, name } => {
                let state = driver.query(target).await?;
                self.captures.insert(name, state.count);
                Ok(())
            }
            Step::CaptureStorage {
                area,
                key,
                name,
                parse_json,
            } => {
                let raw = driver.read_storage(*area, key).await?;
                let value = match raw {
                    Some(text) if *parse_json => match serde_json::from_str(&text) {
                        Ok(value) => value,
                        Err(err) => {
                            warn!(key = %key, error = %err, "stored value is not JSON, keeping text");
                            Value::String(text)
                        }
                    },
                    Some(text) => Value::String(text),
                    None => Value::Null,
                };
                self.captures.insert(name, value);
                Ok(())
            }
            Step::CaptureDialogCount { name } => {
                self.captures.insert(name, self.observer.dialog_count());
                Ok(())
            }
            Step::Evaluate { script, name } => {
                let value = driver.evaluate(script).await?;
                if let Some(name) = name {
                    self.captures.insert(name, value);
                }
                Ok(())
            }
        }
    }

    /// Soft waits become a boolean capture; hard waits pass the error on
    fn settle(&mut self, record: Option<&str>, outcome: SiteCheckResult<()>) -> SiteCheckResult<()> {
        match (record, outcome) {
            (Some(name), Ok(())) => {
                self.captures.insert(name, true);
                Ok(())
            }
            (
                Some(name),
                Err(err @ (SiteCheckError::ElementNotFound { .. } | SiteCheckError::Timeout { .. })),
            ) => {
                warn!(capture = name, error = %err, "soft wait not satisfied");
                self.captures.insert(name, false);
                Ok(())
            }
            (_, outcome) => outcome,
        }
    }

    async fn asset_statuses<P>(&self, probe: &P) -> HashMap<String, Result<u16, String>>
    where
        P: StatusProbe,
    {
        let mut statuses = HashMap::new();
        for assertion in &self.scenario.assertions {
            match assertion.kind.asset_url(&self.captures, &self.config.base_url) {
                Some(Ok(url)) => {
                    let status = probe.status(&url).await.map_err(|e| e.to_string());
                    debug!(url = %url, status = ?status, "asset status");
                    statuses.insert(url, status);
                }
                Some(Err(err)) => {
                    debug!(assertion = %assertion.name, error = %err, "asset URL unresolved");
                }
                None => {}
            }
        }
        statuses
    }

    async fn abort<D>(&mut self, driver: &mut D, err: &SiteCheckError)
    where
        D: PageDriver,
    {
        error!(state = %self.machine.state(), error = %err, "run aborted");
        self.set.abort(err);
        if let Ok(url) = driver.current_url().await {
            self.captures.insert(CAPTURE_FINAL_URL, url);
        }
        if let Err(shot) = self.session.save_screenshot(&*driver, ABORT_SCREENSHOT).await {
            warn!(error = %shot, "abort screenshot failed");
        }
    }

    fn persist(mut self) -> RunOutcome {
        self.captures
            .insert(CAPTURE_DIALOGS, json!(self.observer.dialog_messages()));
        if let Err(err) = self.machine.advance(RunState::Persisted) {
            warn!(error = %err, "unexpected state before persisting");
        }

        let mut failures = Vec::new();
        for snapshot in &self.scenario.snapshots {
            let document = snapshot.render(&self.captures);
            if let Err(err) = self.session.save_json(&snapshot.file, &document) {
                failures.push(err);
            }
        }

        let summary = self.observer.summary(self.config.sample_limit);
        let mut verdict = Verdict::compute(
            &self.scenario.name,
            &self.scenario.check_id,
            &self.config.base_url,
            self.set,
            summary.clone(),
        );
        let evidence_dir = self.session.dir().to_path_buf();
        let dir_text = evidence_dir.display().to_string();

        let console_summary = json!({
            "base": self.config.base_url,
            "check": self.scenario.check_id,
            "scenario": self.scenario.name,
            "description": self.scenario.description,
            "url": self.captures.get(CAPTURE_ENTRY_URL),
            "evidence_dir": dir_text,
            "params": self.scenario.params,
            "assertions": verdict
                .checks
                .iter()
                .map(|c| (c.name.clone(), Value::Bool(c.ok)))
                .collect::<serde_json::Map<_, _>>(),
            "captures": self.captures,
            "console": summary.console,
            "network": summary.network,
            "dialogs": summary.dialogs,
            "run_states": self.machine.history(),
            "ts": Local::now().to_rfc3339(),
        });
        if let Err(err) = self.session.save_json(CONSOLE_SUMMARY_FILE, &console_summary) {
            failures.push(err);
        }
        for err in &failures {
            error!(error = %err, "evidence write failed");
        }
        if let Some(err) = failures.first() {
            verdict.add_check(Check::from_error(PERSISTENCE_CHECK, err));
        }

        verdict = verdict.with_evidence(dir_text, self.session.artifacts().to_vec());
        if let Err(err) = self.session.save_json(VERDICT_FILE, &verdict) {
            error!(error = %err, "verdict write failed");
            verdict.add_check(Check::from_error(PERSISTENCE_CHECK, &err));
        }

        self.machine.finish();
        info!(
            scenario = %self.scenario.name,
            ok = verdict.ok,
            failures = ?verdict.failures(),
            "run finished"
        );
        RunOutcome {
            verdict,
            evidence_dir,
            states: self.machine.history().to_vec(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
