//! Harness Configuration
//!
//! Everything a run needs besides the scenario itself. The base URL is
//! always passed in; [`HarnessConfig::from_env`] is one way to obtain it.

use crate::browser::BrowserConfig;
use crate::observer::DEFAULT_SAMPLE_LIMIT;
use crate::reachability::{base_url, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::result::{SiteCheckError, SiteCheckResult};
use crate::wait::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, NETWORK_IDLE_THRESHOLD_MS};
use crate::evidence::DEFAULT_EVIDENCE_ROOT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Deployed site checked when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://guyuan9300.github.io/yiyu-think-tank-website/";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "YIYU_BASE";

/// Configuration for the scenario runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Site under test
    pub base_url: String,
    /// Parent of the per-run evidence directories
    pub evidence_root: PathBuf,
    /// Bound for each navigation including network quiescence
    pub navigation_timeout_ms: u64,
    /// Quiet period that counts as network idle
    pub network_idle_ms: u64,
    /// Polling interval for bounded waits
    pub poll_interval_ms: u64,
    /// Number of entries kept in each diagnostic sample
    pub sample_limit: usize,
    /// Timeout for plain HTTP probes
    pub probe_timeout_secs: u64,
    /// Browser launch options
    pub browser: BrowserConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            evidence_root: PathBuf::from(DEFAULT_EVIDENCE_ROOT),
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            network_idle_ms: NETWORK_IDLE_THRESHOLD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            browser: BrowserConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Create a new builder
    #[must_use]
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Defaults, with the base URL taken from `YIYU_BASE` when set
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base) = std::env::var(BASE_URL_ENV) {
            if !base.trim().is_empty() {
                config.base_url = base.trim().to_string();
            }
        }
        config
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> SiteCheckResult<()> {
        let base = base_url(&self.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SiteCheckError::InvalidState {
                message: format!("base URL must be http(s): {base}"),
            });
        }
        if self.navigation_timeout_ms == 0 {
            return Err(SiteCheckError::InvalidState {
                message: "navigation timeout must be positive".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(SiteCheckError::InvalidState {
                message: "poll interval must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Navigation bound
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Network idle threshold
    #[must_use]
    pub const fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
}

/// Builder for `HarnessConfig`
#[derive(Debug, Clone, Default)]
pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    /// Set base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set evidence root
    #[must_use]
    pub fn evidence_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.evidence_root = root.into();
        self
    }

    /// Set navigation timeout
    #[must_use]
    pub fn navigation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.navigation_timeout_ms = ms;
        self
    }

    /// Set network idle threshold
    #[must_use]
    pub fn network_idle_ms(mut self, ms: u64) -> Self {
        self.config.network_idle_ms = ms;
        self
    }

    /// Set poll interval
    #[must_use]
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Set diagnostic sample size
    #[must_use]
    pub fn sample_limit(mut self, limit: usize) -> Self {
        self.config.sample_limit = limit;
        self
    }

    /// Set probe timeout
    #[must_use]
    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.probe_timeout_secs = secs;
        self
    }

    /// Set browser options
    #[must_use]
    pub fn browser(mut self, browser: BrowserConfig) -> Self {
        self.config.browser = browser;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn h0_config_01_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.evidence_root, PathBuf::from("evidence"));
        assert_eq!(config.navigation_timeout(), Duration::from_secs(60));
        assert_eq!(config.network_idle(), Duration::from_millis(500));
        assert_eq!(config.sample_limit, 10);
        assert_eq!(config.browser.viewport_width, 1280);
        config.validate().unwrap();
    }

    #[test]
    fn h0_config_02_builder() {
        let config = HarnessConfig::builder()
            .base_url("http://localhost:5173/")
            .evidence_root("/tmp/ev")
            .navigation_timeout_ms(1_000)
            .network_idle_ms(0)
            .poll_interval_ms(5)
            .sample_limit(3)
            .probe_timeout_secs(2)
            .browser(BrowserConfig::default().with_no_sandbox())
            .build();
        assert_eq!(config.base_url, "http://localhost:5173/");
        assert_eq!(config.sample_limit, 3);
        assert!(!config.browser.sandbox);
        config.validate().unwrap();
    }

    #[test]
    fn h0_config_03_rejects_non_http_base() {
        let config = HarnessConfig::builder().base_url("file:///tmp/site").build();
        assert!(config.validate().is_err());
        let config = HarnessConfig::builder().base_url("site.test/app").build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn h0_config_04_rejects_zero_timeouts() {
        let config = HarnessConfig::builder().navigation_timeout_ms(0).build();
        assert!(config.validate().is_err());
        let config = HarnessConfig::builder().poll_interval_ms(0).build();
        assert!(config.validate().is_err());
    }
}
