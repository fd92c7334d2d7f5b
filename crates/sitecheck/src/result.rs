//! Result and error types for Sitecheck.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Sitecheck operations
pub type SiteCheckResult<T> = Result<T, SiteCheckError>;

/// Errors that can occur while running a scenario
#[derive(Debug, Error)]
pub enum SiteCheckError {
    /// Target could not be reached over HTTP or by navigation
    #[error("Target unreachable: {url}: {message}")]
    UnreachableTarget {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A required element never satisfied its wait condition
    #[error("Element not found: {locator} ({state}) within {timeout_ms}ms")]
    ElementNotFound {
        /// Locator description
        locator: String,
        /// Awaited state
        state: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// A computed value differs from the expected one
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Browser console reported errors during the run
    #[error("Unexpected console errors: {count}")]
    UnexpectedConsoleError {
        /// Number of console errors observed
        count: usize,
    },

    /// Evidence directory or artifact could not be written
    #[error("Evidence persistence failed for {path}: {message}")]
    EvidencePersistenceFailure {
        /// Path that failed
        path: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Script evaluation failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("{operation} timed out after {ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Scenario definition is malformed
    #[error("Invalid scenario: {message}")]
    InvalidScenario {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Serializable error classification embedded in verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// HTTP or navigation failure
    UnreachableTarget,
    /// Wait condition never satisfied
    ElementNotFound,
    /// Value mismatch
    AssertionFailed,
    /// Console errors observed
    UnexpectedConsoleError,
    /// Evidence could not be written
    EvidencePersistenceFailure,
    /// Browser could not start
    BrowserLaunch,
    /// Page-level CDP failure
    Page,
    /// Script evaluation failure
    Script,
    /// Bounded wait expired
    Timeout,
    /// Operation out of order
    InvalidState,
    /// Malformed scenario
    InvalidScenario,
    /// Filesystem failure
    Io,
    /// JSON failure
    Json,
    /// YAML failure
    Yaml,
}

impl SiteCheckError {
    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnreachableTarget { .. } => ErrorKind::UnreachableTarget,
            Self::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Self::AssertionFailed { .. } => ErrorKind::AssertionFailed,
            Self::UnexpectedConsoleError { .. } => ErrorKind::UnexpectedConsoleError,
            Self::EvidencePersistenceFailure { .. } => ErrorKind::EvidencePersistenceFailure,
            Self::BrowserLaunch { .. } => ErrorKind::BrowserLaunch,
            Self::Page { .. } => ErrorKind::Page,
            Self::Script { .. } => ErrorKind::Script,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::InvalidScenario { .. } => ErrorKind::InvalidScenario,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
            Self::Yaml(_) => ErrorKind::Yaml,
        }
    }

    /// Shorthand for a page error
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Shorthand for a script error
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Shorthand for an invalid scenario error
    pub fn invalid_scenario(message: impl Into<String>) -> Self {
        Self::InvalidScenario {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiteCheckError::ElementNotFound {
            locator: "role=button[name=\"关闭\"]".to_string(),
            state: "visible".to_string(),
            timeout_ms: 20_000,
        };
        assert_eq!(
            err.to_string(),
            "Element not found: role=button[name=\"关闭\"] (visible) within 20000ms"
        );

        let err = SiteCheckError::Timeout {
            operation: "navigation".to_string(),
            ms: 60_000,
        };
        assert_eq!(err.to_string(), "navigation timed out after 60000ms");
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            SiteCheckError::page("closed").kind(),
            ErrorKind::Page
        );
        assert_eq!(
            SiteCheckError::UnexpectedConsoleError { count: 2 }.kind(),
            ErrorKind::UnexpectedConsoleError
        );
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(SiteCheckError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::EvidencePersistenceFailure).unwrap();
        assert_eq!(json, "\"evidence_persistence_failure\"");
    }
}
