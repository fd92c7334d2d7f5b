//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario name not in the built-in catalog
    #[error("Unknown scenario: {name} (see `sitecheck list`)")]
    UnknownScenario {
        /// Requested name
        name: String,
    },

    /// Browser support was compiled out
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sitecheck library error
    #[error("Sitecheck error: {0}")]
    SiteCheck(#[from] sitecheck::SiteCheckError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown scenario error
    #[must_use]
    pub fn unknown_scenario(name: impl Into<String>) -> Self {
        Self::UnknownScenario { name: name.into() }
    }

    /// The library error to embed in an aborted verdict
    #[must_use]
    pub fn into_site_error(self) -> sitecheck::SiteCheckError {
        match self {
            Self::SiteCheck(e) => e,
            other => sitecheck::SiteCheckError::InvalidState {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let err = CliError::config("bad base url");
        assert!(err.to_string().contains("Configuration"));
        assert!(err.to_string().contains("bad base url"));
    }

    #[test]
    fn test_unknown_scenario_error() {
        let err = CliError::unknown_scenario("nope");
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("sitecheck list"));
    }

    #[test]
    fn test_browser_unavailable_error() {
        assert!(CliError::BrowserUnavailable.to_string().contains("--features browser"));
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err: CliError = io.into();
        assert!(err.to_string().contains("I/O"));
    }

    #[test]
    fn test_library_error_from() {
        let err: CliError = sitecheck::SiteCheckError::invalid_scenario("no steps").into();
        assert!(err.to_string().contains("no steps"));
        assert_eq!(
            err.into_site_error().kind(),
            sitecheck::ErrorKind::InvalidScenario
        );
    }

    #[test]
    fn test_non_library_error_maps_to_invalid_state() {
        let err = CliError::unknown_scenario("nope");
        assert_eq!(
            err.into_site_error().kind(),
            sitecheck::ErrorKind::InvalidState
        );
    }
}
