//! Scenarios as data.
//!
//! A [`Scenario`] names a target URL relative to the configured base, an
//! optional seed payload, the interaction steps, the assertions and the
//! snapshot files to write. Nothing here talks to a browser; the runner
//! interprets it. Scenarios round-trip through YAML.

use crate::assertion::{Assertion, AssertionKind, Captures};
use crate::locator::{Locator, DEFAULT_TIMEOUT_MS};
use crate::result::{SiteCheckError, SiteCheckResult};
use crate::seed::{SeedPayload, StorageArea};
use crate::wait::{LoadState, WaitState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Resolved target URL, captured before navigation
pub const CAPTURE_ENTRY_URL: &str = "entry_url";
/// HTTP status of the first navigation (`null` when unknown)
pub const CAPTURE_NAV_STATUS: &str = "nav_status";
/// Page URL after the last step
pub const CAPTURE_FINAL_URL: &str = "final_url";
/// Every dialog message observed
pub const CAPTURE_DIALOGS: &str = "dialogs";

/// Captures the runner always fills
pub const BUILTIN_CAPTURES: [&str; 4] = [
    CAPTURE_ENTRY_URL,
    CAPTURE_NAV_STATUS,
    CAPTURE_FINAL_URL,
    CAPTURE_DIALOGS,
];

/// Evidence names the runner writes itself
pub const RESERVED_ARTIFACTS: [&str; 2] = ["console_summary.json", "verdict.json"];

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_expected_status() -> u16 {
    200
}

/// One interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Wait for the target to be visible, then click it
    Click {
        /// Element
        target: Locator,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    /// Wait for the target to be visible, then replace its value
    Fill {
        /// Element
        target: Locator,
        /// New value
        value: String,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    /// Wait for an element state.
    ///
    /// With `record` set the wait is soft: the outcome is captured as a
    /// boolean under that name and the run continues.
    WaitFor {
        /// Element
        target: Locator,
        /// Expected state
        #[serde(default)]
        state: WaitState,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
        /// Capture name for a soft wait
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<String>,
    },
    /// Wait until the URL contains any of the substrings (soft with `record`)
    WaitForUrl {
        /// Accepted substrings
        contains: Vec<String>,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
        /// Capture name for a soft wait
        #[serde(default, skip_serializing_if = "Option::is_none")]
        record: Option<String>,
    },
    /// Wait until no request has been in flight for the idle threshold
    WaitForNetworkIdle {
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    /// Full-page PNG into the evidence directory
    Screenshot {
        /// File name
        name: String,
    },
    /// Fixed delay
    Pause {
        /// Milliseconds
        ms: u64,
    },
    /// Scroll to the end of the document
    ScrollToBottom,
    /// Navigate again (URL relative to the base)
    Navigate {
        /// Target
        url: String,
        /// Load condition
        #[serde(default)]
        wait_until: LoadState,
    },
    /// Write the scenario's seed into the current document again
    Reseed,
    /// Capture the page URL
    CaptureUrl {
        /// Capture name
        name: String,
    },
    /// Capture an input's value
    CaptureValue {
        /// Element
        target: Locator,
        /// Capture name
        name: String,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    /// Capture an element's text
    CaptureText {
        /// Element
        target: Locator,
        /// Capture name
        name: String,
        /// Wait bound
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
    },
    /// Capture the number of matches (no wait)
    CaptureCount {
        /// Elements
        target: Locator,
        /// Capture name
        name: String,
    },
    /// Capture a storage key, optionally parsed as JSON
    CaptureStorage {
        /// Storage area
        #[serde(default)]
        area: StorageArea,
        /// Key
        key: String,
        /// Capture name
        name: String,
        /// Parse the stored text as JSON (`null` when it is not JSON)
        #[serde(default)]
        parse_json: bool,
    },
    /// Capture the number of dialogs seen so far
    CaptureDialogCount {
        /// Capture name
        name: String,
    },
    /// Evaluate a script, optionally capturing its result
    Evaluate {
        /// JavaScript expression
        script: String,
        /// Capture name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Step {
    /// Click with the default timeout
    #[must_use]
    pub fn click(target: Locator) -> Self {
        Self::Click {
            target,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Fill with the default timeout
    #[must_use]
    pub fn fill(target: Locator, value: impl Into<String>) -> Self {
        Self::Fill {
            target,
            value: value.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Hard wait for `state`
    #[must_use]
    pub fn wait_for(target: Locator, state: WaitState, timeout_ms: u64) -> Self {
        Self::WaitFor {
            target,
            state,
            timeout_ms,
            record: None,
        }
    }

    /// Screenshot step
    #[must_use]
    pub fn screenshot(name: impl Into<String>) -> Self {
        Self::Screenshot { name: name.into() }
    }

    /// Capture the URL
    #[must_use]
    pub fn capture_url(name: impl Into<String>) -> Self {
        Self::CaptureUrl { name: name.into() }
    }

    /// Pause step
    #[must_use]
    pub const fn pause(ms: u64) -> Self {
        Self::Pause { ms }
    }

    /// Short label for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Click { target, .. } => format!("click {target}"),
            Self::Fill { target, .. } => format!("fill {target}"),
            Self::WaitFor { target, state, .. } => format!("wait for {target} ({state})"),
            Self::WaitForUrl { contains, .. } => format!("wait for url {contains:?}"),
            Self::WaitForNetworkIdle { .. } => "wait for network idle".to_string(),
            Self::Screenshot { name } => format!("screenshot {name}"),
            Self::Pause { ms } => format!("pause {ms}ms"),
            Self::ScrollToBottom => "scroll to bottom".to_string(),
            Self::Navigate { url, .. } => format!("navigate {url}"),
            Self::Reseed => "reseed".to_string(),
            Self::CaptureUrl { name } => format!("capture url as {name}"),
            Self::CaptureValue { target, name, .. } => format!("capture value of {target} as {name}"),
            Self::CaptureText { target, name, .. } => format!("capture text of {target} as {name}"),
            Self::CaptureCount { target, name } => format!("capture count of {target} as {name}"),
            Self::CaptureStorage { area, key, name, .. } => {
                format!("capture {}[{key}] as {name}", area.js_name())
            }
            Self::CaptureDialogCount { name } => format!("capture dialog count as {name}"),
            Self::Evaluate { .. } => "evaluate".to_string(),
        }
    }

    /// Capture name this step writes, if any
    #[must_use]
    pub fn capture_written(&self) -> Option<&str> {
        match self {
            Self::WaitFor { record, .. } | Self::WaitForUrl { record, .. } => record.as_deref(),
            Self::CaptureUrl { name }
            | Self::CaptureValue { name, .. }
            | Self::CaptureText { name, .. }
            | Self::CaptureCount { name, .. }
            | Self::CaptureStorage { name, .. }
            | Self::CaptureDialogCount { name } => Some(name),
            Self::Evaluate { name, .. } => name.as_deref(),
            _ => None,
        }
    }
}

/// Independent HTTP reachability check run before the browser starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCheck {
    /// Check name
    pub name: String,
    /// URL relative to the base
    #[serde(default)]
    pub url: String,
    /// Expected status
    #[serde(default = "default_expected_status")]
    pub expect_status: u16,
}

/// A JSON file built from captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// File name in the evidence directory
    pub file: String,
    /// Write this capture as the whole document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
    /// Or an object of output key → capture name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl Snapshot {
    /// Object snapshot
    #[must_use]
    pub fn fields<K, V>(file: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            file: file.into(),
            capture: None,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Whole-capture snapshot
    #[must_use]
    pub fn capture(file: impl Into<String>, capture: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            capture: Some(capture.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Build the document; missing captures become `null`
    #[must_use]
    pub fn render(&self, captures: &Captures) -> Value {
        if let Some(ref name) = self.capture {
            return captures.get(name).cloned().unwrap_or(Value::Null);
        }
        Value::Object(
            self.fields
                .iter()
                .map(|(key, name)| (key.clone(), captures.get(name).cloned().unwrap_or(Value::Null)))
                .collect(),
        )
    }

    fn captures_read(&self) -> Vec<&str> {
        self.capture
            .iter()
            .map(String::as_str)
            .chain(self.fields.values().map(String::as_str))
            .collect()
    }
}

/// A complete check definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Short name
    pub name: String,
    /// Check identifier reported in evidence
    pub check_id: String,
    /// One-line description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Entry URL relative to the base
    #[serde(default)]
    pub url: String,
    /// Load condition for the entry navigation
    #[serde(default)]
    pub wait_until: LoadState,
    /// Fixed values reported in the console summary
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
    /// Storage preconditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<SeedPayload>,
    /// Reachability check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_check: Option<HttpCheck>,
    /// Interaction steps
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Assertions
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Snapshot files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<Snapshot>,
}

impl Scenario {
    /// Create a scenario with no steps
    #[must_use]
    pub fn new(name: impl Into<String>, check_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            check_id: check_id.into(),
            description: String::new(),
            url: url.into(),
            wait_until: LoadState::NetworkIdle,
            params: BTreeMap::new(),
            seed: None,
            http_check: None,
            steps: Vec::new(),
            assertions: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    /// Set description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set entry load condition
    #[must_use]
    pub const fn with_wait_until(mut self, wait_until: LoadState) -> Self {
        self.wait_until = wait_until;
        self
    }

    /// Add a reported parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set seed payload
    #[must_use]
    pub fn with_seed(mut self, seed: SeedPayload) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set reachability check
    #[must_use]
    pub fn with_http_check(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.http_check = Some(HttpCheck {
            name: name.into(),
            url: url.into(),
            expect_status: default_expected_status(),
        });
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an assertion
    #[must_use]
    pub fn assert(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Append a snapshot
    #[must_use]
    pub fn snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshots.push(snapshot);
        self
    }

    /// Parse YAML and validate
    pub fn from_yaml(text: &str) -> SiteCheckResult<Self> {
        let scenario: Self = serde_yaml_ng::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a YAML file and validate
    pub fn load(path: &Path) -> SiteCheckResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> SiteCheckResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check internal consistency
    pub fn validate(&self) -> SiteCheckResult<()> {
        if self.name.trim().is_empty() {
            return Err(SiteCheckError::invalid_scenario("scenario name is empty"));
        }
        if self.check_id.trim().is_empty() {
            return Err(SiteCheckError::invalid_scenario(format!(
                "scenario '{}' has no check_id",
                self.name
            )));
        }

        let mut produced: HashSet<&str> = BUILTIN_CAPTURES.into_iter().collect();
        let mut files: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if let Some(name) = step.capture_written() {
                produced.insert(name);
            }
            match step {
                Step::Screenshot { name } => {
                    if !name.ends_with(".png") {
                        return Err(SiteCheckError::invalid_scenario(format!(
                            "screenshot '{name}' must end with .png"
                        )));
                    }
                    files.insert(name);
                }
                Step::Reseed if self.seed.is_none() => {
                    return Err(SiteCheckError::invalid_scenario(
                        "reseed step without a seed payload",
                    ));
                }
                Step::WaitForUrl { contains, .. } if contains.is_empty() => {
                    return Err(SiteCheckError::invalid_scenario(
                        "wait_for_url needs at least one substring",
                    ));
                }
                _ => {}
            }
        }

        let mut names = HashSet::new();
        for assertion in &self.assertions {
            if assertion.name.trim().is_empty() {
                return Err(SiteCheckError::invalid_scenario("assertion with empty name"));
            }
            if !names.insert(assertion.name.as_str()) {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "duplicate assertion '{}'",
                    assertion.name
                )));
            }
            if let AssertionKind::AssetStatus { url, capture, .. } = &assertion.kind {
                if url.is_some() == capture.is_some() {
                    return Err(SiteCheckError::invalid_scenario(format!(
                        "asset_status '{}' needs either a url or a capture",
                        assertion.name
                    )));
                }
            }
            if let Some(missing) = assertion
                .captures_read()
                .into_iter()
                .find(|c| !produced.contains(c))
            {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "assertion '{}' reads capture '{missing}' that no step writes",
                    assertion.name
                )));
            }
        }

        for snapshot in &self.snapshots {
            let file = snapshot.file.as_str();
            if !file.ends_with(".json") || RESERVED_ARTIFACTS.contains(&file) {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "snapshot file '{file}' must be a non-reserved .json name"
                )));
            }
            if !files.insert(file) {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "evidence file '{file}' written twice"
                )));
            }
            if snapshot.capture.is_some() == !snapshot.fields.is_empty() {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "snapshot '{file}' needs either a capture or fields"
                )));
            }
            if let Some(missing) = snapshot
                .captures_read()
                .into_iter()
                .find(|c| !produced.contains(c))
            {
                return Err(SiteCheckError::invalid_scenario(format!(
                    "snapshot '{file}' reads capture '{missing}' that no step writes"
                )));
            }
        }
        Ok(())
    }
}
