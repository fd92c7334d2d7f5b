//! Network request tracking.
//!
//! Requests are keyed by the protocol's request id from the moment they are
//! sent until they finish or fail. Failures are turned into
//! [`FailedRequest`] records for the diagnostic log; the pending set backs
//! the network-quiescence wait.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A request that failed to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRequest {
    /// HTTP method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Human-readable failure reason
    pub reason: String,
}

impl FailedRequest {
    /// Create a new failed request record
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Lowest status recorded as an error response
pub const ERROR_STATUS_MIN: u16 = 400;

/// A response that arrived with an error status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Response URL
    pub url: String,
    /// HTTP status, at least [`ERROR_STATUS_MIN`]
    pub status: u16,
}

impl ErrorResponse {
    /// Record `status` for `url` when it is an error status
    #[must_use]
    pub fn from_status(url: impl Into<String>, status: u16) -> Option<Self> {
        (status >= ERROR_STATUS_MIN).then(|| Self {
            url: url.into(),
            status,
        })
    }
}

/// Render the browser's failure text, noting client-side cancellation
#[must_use]
pub fn failure_reason(error_text: &str, canceled: bool) -> String {
    let text = error_text.trim();
    match (text.is_empty(), canceled) {
        (true, true) => "canceled".to_string(),
        (true, false) => "unknown failure".to_string(),
        (false, true) => format!("{text} (canceled)"),
        (false, false) => text.to_string(),
    }
}

#[derive(Debug, Clone)]
struct PendingRequest {
    method: String,
    url: String,
}

/// Tracks in-flight requests and the time of the last network event
#[derive(Debug, Clone)]
pub struct RequestTracker {
    pending: HashMap<String, PendingRequest>,
    last_activity: Instant,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            last_activity: Instant::now(),
        }
    }

    /// A request was sent. Redirects reuse the id and replace the entry.
    pub fn started(&mut self, id: impl Into<String>, method: impl Into<String>, url: impl Into<String>) {
        self.pending.insert(
            id.into(),
            PendingRequest {
                method: method.into(),
                url: url.into(),
            },
        );
        self.last_activity = Instant::now();
    }

    /// A request finished loading
    pub fn finished(&mut self, id: &str) {
        self.pending.remove(id);
        self.last_activity = Instant::now();
    }

    /// A request failed; returns the failure record if the request was known
    pub fn failed(&mut self, id: &str, reason: impl Into<String>) -> Option<FailedRequest> {
        self.last_activity = Instant::now();
        self.pending
            .remove(id)
            .map(|req| FailedRequest::new(req.method, req.url, reason))
    }

    /// Number of requests still in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Time since the last request started, finished or failed
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Whether no request is pending and none changed within `threshold`
    #[must_use]
    pub fn is_quiet(&self, threshold: Duration) -> bool {
        self.pending.is_empty() && self.idle_for() >= threshold
    }

    /// Forget all pending requests (e.g. after the page is torn down)
    pub fn reset(&mut self) {
        self.pending.clear();
        self.last_activity = Instant::now();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod failure_reason_tests {
        use super::*;

        #[test]
        fn test_plain_text() {
            assert_eq!(
                failure_reason("net::ERR_NAME_NOT_RESOLVED", false),
                "net::ERR_NAME_NOT_RESOLVED"
            );
        }

        #[test]
        fn test_canceled() {
            assert_eq!(
                failure_reason("net::ERR_ABORTED", true),
                "net::ERR_ABORTED (canceled)"
            );
            assert_eq!(failure_reason("", true), "canceled");
            assert_eq!(failure_reason("  ", false), "unknown failure");
        }
    }

    mod error_response_tests {
        use super::*;

        #[test]
        fn test_only_error_statuses_recorded() {
            assert!(ErrorResponse::from_status("https://x/app.js", 200).is_none());
            assert!(ErrorResponse::from_status("https://x/moved", 304).is_none());
            let missing = ErrorResponse::from_status("https://x/vite.svg", 404).unwrap();
            assert_eq!(missing.status, 404);
            assert!(ErrorResponse::from_status("https://x/api", 503).is_some());
        }
    }

    mod request_tracker_tests {
        use super::*;

        #[test]
        fn test_started_and_finished() {
            let mut tracker = RequestTracker::new();
            tracker.started("1", "GET", "https://example.com/");
            tracker.started("2", "GET", "https://example.com/app.js");
            assert_eq!(tracker.in_flight(), 2);
            tracker.finished("1");
            assert_eq!(tracker.in_flight(), 1);
        }

        #[test]
        fn test_failed_returns_record() {
            let mut tracker = RequestTracker::new();
            tracker.started("7", "POST", "https://example.com/api");
            let failure = tracker.failed("7", "net::ERR_FAILED").unwrap();
            assert_eq!(failure.method, "POST");
            assert_eq!(failure.url, "https://example.com/api");
            assert_eq!(failure.reason, "net::ERR_FAILED");
            assert_eq!(tracker.in_flight(), 0);
        }

        #[test]
        fn test_failed_unknown_id() {
            let mut tracker = RequestTracker::new();
            assert!(tracker.failed("missing", "x").is_none());
        }

        #[test]
        fn test_redirect_reuses_id() {
            let mut tracker = RequestTracker::new();
            tracker.started("1", "GET", "http://example.com/");
            tracker.started("1", "GET", "https://example.com/");
            assert_eq!(tracker.in_flight(), 1);
        }

        #[test]
        fn test_is_quiet() {
            let mut tracker = RequestTracker::new();
            assert!(tracker.is_quiet(Duration::ZERO));
            tracker.started("1", "GET", "https://example.com/");
            assert!(!tracker.is_quiet(Duration::ZERO));
            tracker.finished("1");
            assert!(tracker.is_quiet(Duration::ZERO));
            assert!(!tracker.is_quiet(Duration::from_secs(3600)));
        }

        #[test]
        fn test_reset() {
            let mut tracker = RequestTracker::new();
            tracker.started("1", "GET", "https://example.com/");
            tracker.reset();
            assert_eq!(tracker.in_flight(), 0);
        }
    }
}
