//! Assertions over captured values.
//!
//! Assertions never touch the page. Interaction steps fill [`Captures`]; the
//! runner then evaluates every assertion against the captures, the dialog
//! log, recorded error responses and pre-fetched asset statuses. A failing assertion produces a failing
//! [`Check`] and evaluation continues with the next one.

use crate::network::ErrorResponse;
use crate::reachability::{base_url, resolve_url};
use crate::result::{SiteCheckError, SiteCheckResult};
use crate::scenario::CAPTURE_ENTRY_URL;
use crate::verdict::{Check, Severity};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use url::{Origin, Url};

/// Placeholder expanded to the configured base URL
pub const BASE_PLACEHOLDER: &str = "{base}";

/// Placeholder expanded to the origin of the base URL
pub const ORIGIN_PLACEHOLDER: &str = "{origin}";

/// Named values collected while a scenario runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Captures(BTreeMap<String, Value>);

impl Captures {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Raw value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Value as text: strings verbatim, `null` as absent, anything else as JSON
    #[must_use]
    pub fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Whether `name` was captured
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Underlying map
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    /// Number of captures
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a `query_param` assertion expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamCheck {
    /// Parameter present (any value)
    #[default]
    Present,
    /// Parameter absent
    Absent,
    /// Parameter present with a non-empty value
    NonEmpty,
    /// Parameter present with the given value
    Equals,
}

/// The condition an assertion tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertionKind {
    /// Capture equals a literal
    Equals {
        /// Capture name
        capture: String,
        /// Expected value
        expected: Value,
    },
    /// A field of a captured JSON document equals a literal
    JsonFieldEquals {
        /// Capture holding the document (or its JSON text)
        capture: String,
        /// JSON pointer, e.g. `/email`
        pointer: String,
        /// Expected value
        expected: Value,
    },
    /// Capture text contains a substring
    Contains {
        /// Capture name
        capture: String,
        /// Substring
        needle: String,
    },
    /// Capture text contains every substring
    ContainsAll {
        /// Capture name
        capture: String,
        /// Substrings
        needles: Vec<String>,
    },
    /// Capture text does not contain a substring
    NotContains {
        /// Capture name
        capture: String,
        /// Substring
        needle: String,
    },
    /// Capture text starts with a prefix (`{base}` and `{origin}` expand)
    StartsWith {
        /// Capture name
        capture: String,
        /// Prefix
        prefix: String,
    },
    /// Capture is truthy
    Truthy {
        /// Capture name
        capture: String,
    },
    /// Two captures are equal
    Same {
        /// First capture
        left: String,
        /// Second capture
        right: String,
    },
    /// Two captures differ
    Differs {
        /// First capture
        left: String,
        /// Second capture
        right: String,
    },
    /// Numeric capture is at least `min`
    AtLeast {
        /// Capture name
        capture: String,
        /// Lower bound
        min: i64,
    },
    /// Query parameter of a captured URL
    QueryParam {
        /// Capture holding a URL
        capture: String,
        /// Parameter name
        param: String,
        /// Expectation
        #[serde(default)]
        expect: ParamCheck,
        /// Value for `equals`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    /// Two captured URLs share origin and path
    SamePath {
        /// First capture
        left: String,
        /// Second capture
        right: String,
    },
    /// Number of dialogs observed
    DialogCount {
        /// Lower bound
        #[serde(default, skip_serializing_if = "Option::is_none")]
        at_least: Option<usize>,
        /// Exact count
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exactly: Option<usize>,
    },
    /// Dialog messages contain a substring
    DialogsContain {
        /// Substring
        needle: String,
        /// Every message (true) or any message (false)
        #[serde(default = "every_default")]
        every: bool,
    },
    /// Plain GET of an asset answers below a status
    AssetStatus {
        /// Asset URL, relative to the base
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Capture holding the asset reference, resolved against the entry page
        #[serde(default, skip_serializing_if = "Option::is_none")]
        capture: Option<String>,
        /// Exclusive upper bound
        #[serde(default = "below_default")]
        below: u16,
    },
    /// The browser saw no response of 400 or more for a URL
    NoErrorResponse {
        /// Response URL, relative to the base (`{origin}` expands)
        url: String,
    },
}

const fn every_default() -> bool {
    true
}

const fn below_default() -> u16 {
    400
}

/// Inputs an assertion is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    /// Captured values
    pub captures: &'a Captures,
    /// Dialog messages, in order
    pub dialogs: &'a [String],
    /// Asset status per resolved URL (`Err` holds the failure message)
    pub asset_statuses: &'a HashMap<String, Result<u16, String>>,
    /// Responses of 400 or more the browser saw
    pub error_responses: &'a [ErrorResponse],
    /// Configured base URL
    pub base: &'a str,
}

/// A named condition with a severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Name reported in the verdict
    pub name: String,
    /// Whether a failure fails the run
    #[serde(default)]
    pub severity: Severity,
    /// Condition
    #[serde(flatten)]
    pub kind: AssertionKind,
}

impl Assertion {
    /// Required assertion
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AssertionKind) -> Self {
        Self {
            name: name.into(),
            severity: Severity::Required,
            kind,
        }
    }

    /// Downgrade to warning-only
    #[must_use]
    pub fn warning_only(mut self) -> Self {
        self.severity = Severity::WarningOnly;
        self
    }

    /// Captures this assertion reads
    #[must_use]
    pub fn captures_read(&self) -> Vec<&str> {
        match &self.kind {
            AssertionKind::Equals { capture, .. }
            | AssertionKind::JsonFieldEquals { capture, .. }
            | AssertionKind::Contains { capture, .. }
            | AssertionKind::ContainsAll { capture, .. }
            | AssertionKind::NotContains { capture, .. }
            | AssertionKind::StartsWith { capture, .. }
            | AssertionKind::Truthy { capture }
            | AssertionKind::AtLeast { capture, .. }
            | AssertionKind::QueryParam { capture, .. } => vec![capture.as_str()],
            AssertionKind::Same { left, right }
            | AssertionKind::Differs { left, right }
            | AssertionKind::SamePath { left, right } => vec![left.as_str(), right.as_str()],
            AssertionKind::AssetStatus { capture, .. } => {
                capture.iter().map(String::as_str).collect()
            }
            AssertionKind::DialogCount { .. }
            | AssertionKind::DialogsContain { .. }
            | AssertionKind::NoErrorResponse { .. } => Vec::new(),
        }
    }

    /// Evaluate into a check
    #[must_use]
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Check {
        let (ok, details) = evaluate_kind(&self.kind, ctx);
        Check {
            ok,
            name: self.name.clone(),
            details,
            severity: self.severity,
        }
    }
}

impl AssertionKind {
    /// `capture == expected`
    #[must_use]
    pub fn equals(capture: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self::Equals {
            capture: capture.into(),
            expected: expected.into(),
        }
    }

    /// `capture` contains `needle`
    #[must_use]
    pub fn contains(capture: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains {
            capture: capture.into(),
            needle: needle.into(),
        }
    }

    /// `capture` does not contain `needle`
    #[must_use]
    pub fn not_contains(capture: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::NotContains {
            capture: capture.into(),
            needle: needle.into(),
        }
    }

    /// `capture` is truthy
    #[must_use]
    pub fn truthy(capture: impl Into<String>) -> Self {
        Self::Truthy {
            capture: capture.into(),
        }
    }

    /// `capture >= min`
    #[must_use]
    pub fn at_least(capture: impl Into<String>, min: i64) -> Self {
        Self::AtLeast {
            capture: capture.into(),
            min,
        }
    }

    /// `left == right`
    #[must_use]
    pub fn same(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::Same {
            left: left.into(),
            right: right.into(),
        }
    }

    /// `left != right`
    #[must_use]
    pub fn differs(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::Differs {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Query parameter check
    #[must_use]
    pub fn query_param(capture: impl Into<String>, param: impl Into<String>, expect: ParamCheck) -> Self {
        Self::QueryParam {
            capture: capture.into(),
            param: param.into(),
            expect,
            value: None,
        }
    }
}

fn missing(name: &str) -> (bool, Value) {
    (false, json!({ "error": format!("capture '{name}' missing") }))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Expand `{base}` and `{origin}` in `text`
pub fn expand_placeholders(text: &str, base: &str) -> SiteCheckResult<String> {
    let base = base_url(base)?;
    Ok(text
        .replace(BASE_PLACEHOLDER, base.as_str())
        .replace(ORIGIN_PLACEHOLDER, &base.origin().ascii_serialization()))
}

/// Percent-decoded query parameters of `url` in order; empty when `url`
/// does not parse
#[must_use]
pub fn query_params(url: &str) -> Vec<(String, String)> {
    Url::parse(url)
        .map(|u| u.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

/// Origin and path of `url`, ignoring query and fragment
#[must_use]
pub fn origin_and_path(url: &str) -> Option<(Origin, String)> {
    let url = Url::parse(url).ok()?;
    Some((url.origin(), url.path().to_string()))
}

/// Whether two URLs are the same once parsed
fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// URL an `asset_status` assertion fetches
pub fn asset_url(
    url: Option<&str>,
    capture: Option<&str>,
    captures: &Captures,
    base: &str,
) -> SiteCheckResult<String> {
    match (url, capture) {
        (Some(url), _) => resolve_url(base, url),
        (None, Some(name)) => {
            let reference = captures
                .text(name)
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| SiteCheckError::AssertionFailed {
                    message: format!("capture '{name}' holds no asset reference"),
                })?;
            let page = match captures.text(CAPTURE_ENTRY_URL) {
                Some(entry) => Url::parse(&entry).map_err(|e| SiteCheckError::InvalidState {
                    message: format!("invalid entry URL {entry}: {e}"),
                })?,
                None => base_url(base)?,
            };
            page.join(reference.trim())
                .map(String::from)
                .map_err(|e| SiteCheckError::AssertionFailed {
                    message: format!("cannot resolve {reference:?} against {page}: {e}"),
                })
        }
        (None, None) => Err(SiteCheckError::invalid_scenario(
            "asset_status needs a url or a capture",
        )),
    }
}

impl AssertionKind {
    /// URL this assertion fetches; `None` unless it is `asset_status`
    #[must_use]
    pub fn asset_url(&self, captures: &Captures, base: &str) -> Option<SiteCheckResult<String>> {
        match self {
            Self::AssetStatus { url, capture, .. } => Some(asset_url(
                url.as_deref(),
                capture.as_deref(),
                captures,
                base,
            )),
            _ => None,
        }
    }
}

fn evaluate_kind(kind: &AssertionKind, ctx: &EvalContext<'_>) -> (bool, Value) {
    let captures = ctx.captures;
    match kind {
        AssertionKind::Equals { capture, expected } => match captures.get(capture) {
            Some(actual) => (
                actual == expected,
                json!({ "capture": capture, "expected": expected, "actual": actual }),
            ),
            None => missing(capture),
        },
        AssertionKind::JsonFieldEquals {
            capture,
            pointer,
            expected,
        } => {
            let Some(raw) = captures.get(capture) else {
                return missing(capture);
            };
            let doc = match raw {
                Value::String(text) => serde_json::from_str(text).unwrap_or(Value::Null),
                other => other.clone(),
            };
            let actual = doc.pointer(pointer).cloned().unwrap_or(Value::Null);
            (
                &actual == expected,
                json!({ "capture": capture, "pointer": pointer, "expected": expected, "actual": actual }),
            )
        }
        AssertionKind::Contains { capture, needle } => match captures.text(capture) {
            Some(text) => (
                text.contains(needle.as_str()),
                json!({ "capture": capture, "needle": needle, "actual": text }),
            ),
            None => missing(capture),
        },
        AssertionKind::ContainsAll { capture, needles } => match captures.text(capture) {
            Some(text) => {
                let absent: Vec<&String> =
                    needles.iter().filter(|n| !text.contains(n.as_str())).collect();
                (
                    absent.is_empty(),
                    json!({ "capture": capture, "missing": absent, "actual": text }),
                )
            }
            None => missing(capture),
        },
        AssertionKind::NotContains { capture, needle } => match captures.text(capture) {
            Some(text) => (
                !text.contains(needle.as_str()),
                json!({ "capture": capture, "needle": needle, "actual": text }),
            ),
            None => missing(capture),
        },
        AssertionKind::StartsWith { capture, prefix } => {
            let prefix = match expand_placeholders(prefix, ctx.base) {
                Ok(prefix) => prefix,
                Err(err) => return (false, json!({ "prefix": prefix, "error": err.to_string() })),
            };
            match captures.text(capture) {
                Some(text) => (
                    text.starts_with(&prefix),
                    json!({ "capture": capture, "prefix": prefix, "actual": text }),
                ),
                None => missing(capture),
            }
        }
        AssertionKind::Truthy { capture } => match captures.get(capture) {
            Some(value) => (truthy(value), json!({ "capture": capture, "actual": value })),
            None => missing(capture),
        },
        AssertionKind::Same { left, right } | AssertionKind::Differs { left, right } => {
            let (Some(l), Some(r)) = (captures.get(left), captures.get(right)) else {
                return missing(if captures.contains(left) { right } else { left });
            };
            let equal = l == r;
            let ok = if matches!(kind, AssertionKind::Same { .. }) {
                equal
            } else {
                !equal
            };
            (ok, json!({ left.as_str(): l, right.as_str(): r }))
        }
        AssertionKind::AtLeast { capture, min } => match captures.get(capture) {
            Some(value) => {
                let ok = value.as_f64().is_some_and(|n| n >= *min as f64);
                (ok, json!({ "capture": capture, "min": min, "actual": value }))
            }
            None => missing(capture),
        },
        AssertionKind::QueryParam {
            capture,
            param,
            expect,
            value,
        } => {
            let Some(url) = captures.text(capture) else {
                return missing(capture);
            };
            let parsed = match Url::parse(&url) {
                Ok(parsed) => parsed,
                Err(err) => {
                    return (false, json!({ "url": url, "param": param, "error": err.to_string() }))
                }
            };
            let found = parsed
                .query_pairs()
                .find(|(k, _)| k == param.as_str())
                .map(|(_, v)| v.into_owned());
            let ok = match expect {
                ParamCheck::Present => found.is_some(),
                ParamCheck::Absent => found.is_none(),
                ParamCheck::NonEmpty => found.as_deref().is_some_and(|v| !v.is_empty()),
                ParamCheck::Equals => found.is_some() && found == *value,
            };
            (
                ok,
                json!({ "url": url, "param": param, "expect": expect, "value": value, "actual": found }),
            )
        }
        AssertionKind::SamePath { left, right } => {
            let (Some(l), Some(r)) = (captures.text(left), captures.text(right)) else {
                return missing(if captures.contains(left) { right } else { left });
            };
            let same = matches!(
                (origin_and_path(&l), origin_and_path(&r)),
                (Some(a), Some(b)) if a == b
            );
            (same, json!({ left.as_str(): l, right.as_str(): r }))
        }
        AssertionKind::DialogCount { at_least, exactly } => {
            let count = ctx.dialogs.len();
            let ok = at_least.map_or(true, |min| count >= min)
                && exactly.map_or(true, |n| count == n);
            (
                ok,
                json!({ "count": count, "at_least": at_least, "exactly": exactly }),
            )
        }
        AssertionKind::DialogsContain { needle, every } => {
            let dialogs = ctx.dialogs;
            let ok = !dialogs.is_empty()
                && if *every {
                    dialogs.iter().all(|m| m.contains(needle.as_str()))
                } else {
                    dialogs.iter().any(|m| m.contains(needle.as_str()))
                };
            (
                ok,
                json!({ "needle": needle, "every": every, "dialogs": dialogs }),
            )
        }
        AssertionKind::AssetStatus {
            url,
            capture,
            below,
        } => {
            let resolved = match asset_url(url.as_deref(), capture.as_deref(), captures, ctx.base)
            {
                Ok(resolved) => resolved,
                Err(err) => return (false, json!({ "capture": capture, "error": err.to_string() })),
            };
            match ctx.asset_statuses.get(&resolved) {
                Some(Ok(status)) => (
                    status < below,
                    json!({ "url": resolved, "status": status, "below": below }),
                ),
                Some(Err(message)) => (false, json!({ "url": resolved, "error": message })),
                None => (false, json!({ "url": resolved, "error": "status not fetched" })),
            }
        }
        AssertionKind::NoErrorResponse { url } => {
            let target = match expand_placeholders(url, ctx.base)
                .and_then(|expanded| resolve_url(ctx.base, &expanded))
            {
                Ok(target) => target,
                Err(err) => return (false, json!({ "url": url, "error": err.to_string() })),
            };
            let hits: Vec<&ErrorResponse> = ctx
                .error_responses
                .iter()
                .filter(|r| same_url(&r.url, &target))
                .collect();
            (
                hits.is_empty(),
                json!({ "url": target, "error_responses": hits }),
            )
        }
    }
}
