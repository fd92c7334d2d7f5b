//! Plain HTTP reachability, independent of the browser.
//!
//! A reachability result is its own check; the runner never merges it with
//! what the browser later observes for the same URL.

use crate::result::{SiteCheckError, SiteCheckResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default request timeout for probes
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 30;

/// Parse `base` as a directory URL: its path always ends in `/` so that
/// joining keeps the last segment.
pub fn base_url(base: &str) -> SiteCheckResult<Url> {
    let mut url = Url::parse(base).map_err(|e| SiteCheckError::InvalidState {
        message: format!("invalid base URL {base}: {e}"),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Resolve `target` against `base`.
///
/// Absolute http(s) targets are returned as parsed; anything else resolves
/// under the base directory, a leading `/` included, so `""` yields the base
/// itself and `"/?page=login"` yields `<base>?page=login`.
pub fn resolve_url(base: &str, target: &str) -> SiteCheckResult<String> {
    if let Ok(absolute) = Url::parse(target) {
        if matches!(absolute.scheme(), "http" | "https") {
            return Ok(absolute.into());
        }
    }
    base_url(base)?
        .join(target.trim_start_matches('/'))
        .map(String::from)
        .map_err(|e| SiteCheckError::InvalidScenario {
            message: format!("cannot resolve {target:?} against {base}: {e}"),
        })
}

/// Returns the HTTP status of a GET
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Status code for `url`; transport failures are `UnreachableTarget`
    async fn status(&self, url: &str) -> SiteCheckResult<u16>;
}

/// reqwest-backed probe
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }
}

impl HttpProber {
    /// Create a probe with a per-request timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Create a probe with a custom reqwest client
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusProbe for HttpProber {
    async fn status(&self, url: &str) -> SiteCheckResult<u16> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SiteCheckError::UnreachableTarget {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = resp.status().as_u16();
        debug!(url, status, "probe");
        Ok(status)
    }
}

/// Fixed answers, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    statuses: HashMap<String, u16>,
}

impl StaticProbe {
    /// Create an empty probe; every URL is unreachable
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status` for `url`
    #[must_use]
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }
}

#[async_trait]
impl StatusProbe for StaticProbe {
    async fn status(&self, url: &str) -> SiteCheckResult<u16> {
        self.statuses
            .get(url)
            .copied()
            .ok_or_else(|| SiteCheckError::UnreachableTarget {
                url: url.to_string(),
                message: "no route to host".to_string(),
            })
    }
}
