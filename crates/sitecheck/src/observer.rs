//! Diagnostic observer: an append-only log of console problems, failed
//! requests, error responses and native dialogs for one page.
//!
//! The observer is a cheap cloneable handle. The browser backend holds one
//! clone and writes from its event listeners; the runner holds another and
//! only reads counts and bounded samples. Entries are never removed, and a
//! listener that panicked mid-write does not stop the others from recording.

use crate::dialog::{Dialog, DialogType};
use crate::network::{ErrorResponse, FailedRequest, RequestTracker};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Default number of entries per category embedded in evidence
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Severity of a console message as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    /// `console.error`, uncaught exceptions, failed resource loads
    Error,
    /// `console.warn` and browser warnings
    Warning,
    /// `console.info`
    Info,
    /// `console.log`
    Log,
    /// `console.debug`
    Debug,
}

impl ConsoleLevel {
    /// Whether messages of this level are kept
    #[must_use]
    pub const fn is_retained(self) -> bool {
        matches!(self, Self::Error | Self::Warning)
    }
}

/// One entry of the diagnostic record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticEntry {
    /// Console error
    ConsoleError {
        /// Message text
        text: String,
    },
    /// Console warning
    ConsoleWarning {
        /// Message text
        text: String,
    },
    /// Request that failed to load
    NetworkFailure {
        /// HTTP method
        method: String,
        /// Request URL
        url: String,
        /// Failure reason
        reason: String,
    },
    /// Response with a status of 400 or more
    ErrorResponse {
        /// Response URL
        url: String,
        /// HTTP status
        status: u16,
    },
    /// Native dialog, auto-accepted
    Dialog {
        /// Dialog type
        dialog_type: DialogType,
        /// Message text
        message: String,
    },
}

#[derive(Debug, Default)]
struct ObserverState {
    entries: Vec<DiagnosticEntry>,
    requests: RequestTracker,
}

/// Handle to the shared diagnostic log of one page
#[derive(Debug, Clone, Default)]
pub struct DiagnosticObserver {
    state: Arc<Mutex<ObserverState>>,
}

impl DiagnosticObserver {
    /// Create an empty observer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ObserverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, entry: DiagnosticEntry) {
        self.lock().entries.push(entry);
    }

    /// Record a console message; levels other than error and warning are dropped
    pub fn record_console(&self, level: ConsoleLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            ConsoleLevel::Error => self.push(DiagnosticEntry::ConsoleError { text }),
            ConsoleLevel::Warning => self.push(DiagnosticEntry::ConsoleWarning { text }),
            ConsoleLevel::Info | ConsoleLevel::Log | ConsoleLevel::Debug => {}
        }
    }

    /// Record a failed request directly
    pub fn record_network_failure(&self, failure: FailedRequest) {
        self.push(DiagnosticEntry::NetworkFailure {
            method: failure.method,
            url: failure.url,
            reason: failure.reason,
        });
    }

    /// Record a response; statuses below 400 are dropped
    pub fn record_response(&self, url: impl Into<String>, status: u16) {
        if let Some(response) = ErrorResponse::from_status(url, status) {
            self.push(DiagnosticEntry::ErrorResponse {
                url: response.url,
                status: response.status,
            });
        }
    }

    /// Record a native dialog
    pub fn record_dialog(&self, dialog: &Dialog) {
        self.push(DiagnosticEntry::Dialog {
            dialog_type: dialog.dialog_type,
            message: dialog.message.clone(),
        });
    }

    /// A request was sent
    pub fn request_started(&self, id: &str, method: &str, url: &str) {
        self.lock().requests.started(id, method, url);
    }

    /// A request finished loading
    pub fn request_finished(&self, id: &str) {
        self.lock().requests.finished(id);
    }

    /// A request failed; recorded only if it had been seen starting
    pub fn request_failed(&self, id: &str, reason: impl Into<String>) {
        let mut state = self.lock();
        if let Some(failure) = state.requests.failed(id, reason) {
            state.entries.push(DiagnosticEntry::NetworkFailure {
                method: failure.method,
                url: failure.url,
                reason: failure.reason,
            });
        }
    }

    /// Number of requests in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().requests.in_flight()
    }

    /// Whether the network has been quiet for at least `threshold`
    #[must_use]
    pub fn is_network_quiet(&self, threshold: Duration) -> bool {
        self.lock().requests.is_quiet(threshold)
    }

    /// Snapshot of every entry in arrival order
    #[must_use]
    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        self.lock().entries.clone()
    }

    /// Total number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn texts<F>(&self, select: F) -> Vec<String>
    where
        F: Fn(&DiagnosticEntry) -> Option<String>,
    {
        self.lock().entries.iter().filter_map(select).collect()
    }

    /// Console error texts in arrival order
    #[must_use]
    pub fn console_errors(&self) -> Vec<String> {
        self.texts(|e| match e {
            DiagnosticEntry::ConsoleError { text } => Some(text.clone()),
            _ => None,
        })
    }

    /// Console warning texts in arrival order
    #[must_use]
    pub fn console_warnings(&self) -> Vec<String> {
        self.texts(|e| match e {
            DiagnosticEntry::ConsoleWarning { text } => Some(text.clone()),
            _ => None,
        })
    }

    /// Dialog messages in arrival order
    #[must_use]
    pub fn dialog_messages(&self) -> Vec<String> {
        self.texts(|e| match e {
            DiagnosticEntry::Dialog { message, .. } => Some(message.clone()),
            _ => None,
        })
    }

    /// Failed requests in arrival order
    #[must_use]
    pub fn network_failures(&self) -> Vec<FailedRequest> {
        self.lock()
            .entries
            .iter()
            .filter_map(|e| match e {
                DiagnosticEntry::NetworkFailure {
                    method,
                    url,
                    reason,
                } => Some(FailedRequest::new(method, url, reason)),
                _ => None,
            })
            .collect()
    }

    /// Error responses in arrival order
    #[must_use]
    pub fn error_responses(&self) -> Vec<ErrorResponse> {
        self.lock()
            .entries
            .iter()
            .filter_map(|e| match e {
                DiagnosticEntry::ErrorResponse { url, status } => Some(ErrorResponse {
                    url: url.clone(),
                    status: *status,
                }),
                _ => None,
            })
            .collect()
    }

    /// Number of console errors
    #[must_use]
    pub fn console_error_count(&self) -> usize {
        self.console_errors().len()
    }

    /// Number of dialogs
    #[must_use]
    pub fn dialog_count(&self) -> usize {
        self.dialog_messages().len()
    }

    /// Counts plus the first `limit` entries of each category
    #[must_use]
    pub fn summary(&self, limit: usize) -> DiagnosticSummary {
        let errors = self.console_errors();
        let warnings = self.console_warnings();
        let failures = self.network_failures();
        let responses = self.error_responses();
        let dialogs = self.dialog_messages();
        DiagnosticSummary {
            console: ConsoleSummary {
                error_count: errors.len(),
                warning_count: warnings.len(),
                errors_sample: errors.into_iter().take(limit).collect(),
                warnings_sample: warnings.into_iter().take(limit).collect(),
            },
            network: NetworkSummary {
                failed_count: failures.len(),
                failed_sample: failures.into_iter().take(limit).collect(),
                error_response_count: responses.len(),
                error_responses_sample: responses.into_iter().take(limit).collect(),
            },
            dialogs: DialogSummary {
                count: dialogs.len(),
                messages_sample: dialogs.into_iter().take(limit).collect(),
            },
        }
    }
}

/// Console counts and samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSummary {
    /// Number of console errors
    pub error_count: usize,
    /// Number of console warnings
    pub warning_count: usize,
    /// First errors
    pub errors_sample: Vec<String>,
    /// First warnings
    pub warnings_sample: Vec<String>,
}

/// Failed request and error response counts and samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    /// Number of failed requests
    pub failed_count: usize,
    /// First failures
    pub failed_sample: Vec<FailedRequest>,
    /// Number of responses with status 400 or more
    #[serde(default)]
    pub error_response_count: usize,
    /// First error responses
    #[serde(default)]
    pub error_responses_sample: Vec<ErrorResponse>,
}

/// Dialog counts and samples
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogSummary {
    /// Number of dialogs
    pub count: usize,
    /// First messages
    pub messages_sample: Vec<String>,
}

/// Everything the observer saw, bounded for embedding into evidence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSummary {
    /// Console messages
    pub console: ConsoleSummary,
    /// Failed requests and error responses
    pub network: NetworkSummary,
    /// Native dialogs
    pub dialogs: DialogSummary,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // =========================================================================
    // Recording
    // =========================================================================

    #[test]
    fn h0_observer_01_new_is_empty() {
        let observer = DiagnosticObserver::new();
        assert!(observer.is_empty());
        assert_eq!(observer.console_error_count(), 0);
        assert_eq!(observer.in_flight(), 0);
    }

    #[test]
    fn h0_observer_02_only_error_and_warning_retained() {
        let observer = DiagnosticObserver::new();
        observer.record_console(ConsoleLevel::Log, "hello");
        observer.record_console(ConsoleLevel::Info, "info");
        observer.record_console(ConsoleLevel::Debug, "debug");
        observer.record_console(ConsoleLevel::Error, "boom");
        observer.record_console(ConsoleLevel::Warning, "careful");
        assert_eq!(observer.len(), 2);
        assert_eq!(observer.console_errors(), vec!["boom".to_string()]);
        assert_eq!(observer.console_warnings(), vec!["careful".to_string()]);
    }

    #[test]
    fn h0_observer_03_clones_share_log() {
        let writer = DiagnosticObserver::new();
        let reader = writer.clone();
        writer.record_dialog(&Dialog::alert("暂未开放"));
        assert_eq!(reader.dialog_messages(), vec!["暂未开放".to_string()]);
    }

    #[test]
    fn h0_observer_04_request_failure_recorded() {
        let observer = DiagnosticObserver::new();
        observer.request_started("1", "GET", "https://example.com/vite.svg");
        assert_eq!(observer.in_flight(), 1);
        observer.request_failed("1", "net::ERR_ABORTED");
        assert_eq!(observer.in_flight(), 0);
        let failures = observer.network_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].url, "https://example.com/vite.svg");
    }

    #[test]
    fn h0_observer_05_unknown_request_failure_ignored() {
        let observer = DiagnosticObserver::new();
        observer.request_failed("ghost", "net::ERR_FAILED");
        assert!(observer.network_failures().is_empty());
    }

    #[test]
    fn h0_observer_06_entries_keep_order() {
        let observer = DiagnosticObserver::new();
        observer.record_console(ConsoleLevel::Warning, "w1");
        observer.record_dialog(&Dialog::alert("d1"));
        observer.record_console(ConsoleLevel::Error, "e1");
        let entries = observer.entries();
        assert!(matches!(entries[0], DiagnosticEntry::ConsoleWarning { .. }));
        assert!(matches!(entries[1], DiagnosticEntry::Dialog { .. }));
        assert!(matches!(entries[2], DiagnosticEntry::ConsoleError { .. }));
    }

    // =========================================================================
    // Summary
    // =========================================================================

    #[test]
    fn h0_observer_07_summary_bounds_samples_not_counts() {
        let observer = DiagnosticObserver::new();
        for i in 0..25 {
            observer.record_console(ConsoleLevel::Error, format!("e{i}"));
        }
        let summary = observer.summary(10);
        assert_eq!(summary.console.error_count, 25);
        assert_eq!(summary.console.errors_sample.len(), 10);
        assert_eq!(summary.console.errors_sample[0], "e0");
        assert_eq!(summary.console.errors_sample[9], "e9");
    }

    #[test]
    fn h0_observer_08_summary_serializes() {
        let observer = DiagnosticObserver::new();
        observer.record_network_failure(FailedRequest::new("GET", "https://x/a.js", "net::ERR_FAILED"));
        let json = serde_json::to_value(observer.summary(DEFAULT_SAMPLE_LIMIT)).unwrap();
        assert_eq!(json["network"]["failed_count"], 1);
        assert_eq!(json["network"]["failed_sample"][0]["method"], "GET");
        assert_eq!(json["console"]["error_count"], 0);
    }

    #[test]
    fn h0_observer_09_entry_tagged_by_kind() {
        let entry = DiagnosticEntry::Dialog {
            dialog_type: DialogType::Alert,
            message: "hi".to_string(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "dialog");
        assert_eq!(json["dialog_type"], "alert");
    }

    #[test]
    fn h0_observer_10_level_retention() {
        assert!(ConsoleLevel::Error.is_retained());
        assert!(ConsoleLevel::Warning.is_retained());
        assert!(!ConsoleLevel::Log.is_retained());
    }

    #[test]
    fn h0_observer_11_error_responses_recorded() {
        let observer = DiagnosticObserver::new();
        observer.record_response("https://site.test/app/", 200);
        observer.record_response("https://site.test/vite.svg", 404);
        observer.record_response("https://site.test/app/api", 500);
        let responses = observer.error_responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].url, "https://site.test/vite.svg");
        assert_eq!(responses[0].status, 404);

        let summary = observer.summary(1);
        assert_eq!(summary.network.error_response_count, 2);
        assert_eq!(summary.network.error_responses_sample.len(), 1);
        assert_eq!(summary.network.failed_count, 0);
    }

    #[test]
    fn h0_observer_12_summary_without_response_fields_deserializes() {
        let json = r#"{"failed_count":0,"failed_sample":[]}"#;
        let network: NetworkSummary = serde_json::from_str(json).unwrap();
        assert_eq!(network.error_response_count, 0);
    }

    #[test]
    fn h0_observer_13_recording_survives_poisoned_lock() {
        let observer = DiagnosticObserver::new();
        observer.record_console(ConsoleLevel::Error, "before");
        let writer = observer.clone();
        let panicked = std::thread::spawn(move || {
            let _guard = writer.state.lock().unwrap();
            panic!("listener panicked while recording");
        })
        .join();
        assert!(panicked.is_err());
        assert!(observer.state.is_poisoned());

        observer.record_console(ConsoleLevel::Error, "after");
        observer.record_dialog(&Dialog::alert("暂未开放"));
        observer.request_started("1", "GET", "https://site.test/");
        assert_eq!(observer.console_errors(), vec!["before".to_string(), "after".to_string()]);
        assert_eq!(observer.dialog_count(), 1);
        assert_eq!(observer.in_flight(), 1);
        assert_eq!(observer.summary(DEFAULT_SAMPLE_LIMIT).console.error_count, 2);
    }
}
