//! Bounded waits.
//!
//! Every wait polls a condition until it holds or its timeout expires.
//! There is no unbounded wait anywhere in the harness; an expired wait is an
//! error unless the caller explicitly treats it as a recorded outcome.

use crate::driver::PageDriver;
use crate::locator::{ElementState, Locator};
use crate::observer::DiagnosticObserver;
use crate::result::{SiteCheckError, SiteCheckResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (20 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 20_000;

/// Default navigation timeout (60 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 60_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

// =============================================================================
// LOAD STATE
// =============================================================================

/// How far a navigation waits before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// Wait for the `load` event to fire
    Load,
    /// Wait for `DOMContentLoaded` event
    DomContentLoaded,
    /// Wait for `load`, then for the network to be idle
    #[default]
    NetworkIdle,
}

impl LoadState {
    /// Get the event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

// =============================================================================
// ELEMENT STATE
// =============================================================================

/// Condition an element wait is satisfied by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// At least one match in the DOM
    Attached,
    /// The picked match is visible
    #[default]
    Visible,
    /// No visible match (absent counts as hidden)
    Hidden,
    /// No match in the DOM
    Detached,
}

impl WaitState {
    /// Whether `state` satisfies this condition
    #[must_use]
    pub const fn is_satisfied(&self, state: &ElementState) -> bool {
        match self {
            Self::Attached => state.count > 0,
            Self::Visible => state.count > 0 && state.visible,
            Self::Hidden => state.count == 0 || !state.visible,
            Self::Detached => state.count == 0,
        }
    }

    /// Whether strict picking matters for this condition
    #[must_use]
    pub const fn needs_single_target(&self) -> bool {
        matches!(self, Self::Attached | Self::Visible)
    }
}

impl std::fmt::Display for WaitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Hidden => "hidden",
            Self::Detached => "detached",
        };
        f.write_str(name)
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Timeout as duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Polling interval as duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `probe` until it yields `Some`, or return `None` once the timeout
/// expires. The probe always runs at least once; probe errors end the wait.
pub async fn poll_until<T, F, Fut>(
    options: &WaitOptions,
    mut probe: F,
) -> SiteCheckResult<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SiteCheckResult<Option<T>>>,
{
    let deadline = Instant::now() + options.timeout();
    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        let remaining = deadline - now;
        tokio::time::sleep(options.poll_interval().min(remaining)).await;
    }
}

/// Wait until `locator` reaches `state`
pub async fn wait_for_element<D>(
    driver: &D,
    locator: &Locator,
    state: WaitState,
    options: &WaitOptions,
) -> SiteCheckResult<ElementState>
where
    D: PageDriver + ?Sized,
{
    let outcome = poll_until(options, move || async move {
        let current = driver.query(locator).await?;
        if current.ambiguous && state.needs_single_target() {
            return Err(strict_violation(locator, current.count));
        }
        Ok(state.is_satisfied(&current).then_some(current))
    })
    .await?;

    outcome.ok_or_else(|| SiteCheckError::ElementNotFound {
        locator: locator.describe(),
        state: state.to_string(),
        timeout_ms: options.timeout_ms,
    })
}

/// Wait until the page URL contains any of `needles`; returns the URL
pub async fn wait_for_url<D>(
    driver: &D,
    needles: &[String],
    options: &WaitOptions,
) -> SiteCheckResult<String>
where
    D: PageDriver + ?Sized,
{
    let outcome = poll_until(options, move || async move {
        let url = driver.current_url().await?;
        Ok(needles
            .iter()
            .any(|needle| url.contains(needle.as_str()))
            .then_some(url))
    })
    .await?;

    outcome.ok_or_else(|| SiteCheckError::Timeout {
        operation: format!("waiting for URL containing any of {needles:?}"),
        ms: options.timeout_ms,
    })
}

/// Wait until no request has been in flight for `threshold`
pub async fn wait_for_network_idle(
    observer: &DiagnosticObserver,
    threshold: Duration,
    options: &WaitOptions,
) -> SiteCheckResult<()> {
    let outcome = poll_until(options, move || async move {
        Ok(observer.is_network_quiet(threshold).then_some(()))
    })
    .await?;

    outcome.ok_or_else(|| SiteCheckError::Timeout {
        operation: "waiting for network idle".to_string(),
        ms: options.timeout_ms,
    })
}

/// Error for a strict locator that matched several elements
#[must_use]
pub fn strict_violation(locator: &Locator, count: usize) -> SiteCheckError {
    SiteCheckError::page(format!(
        "strict mode violation: {locator} resolved to {count} elements"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // =========================================================================
    // Load / wait states
    // =========================================================================

    #[test]
    fn h0_wait_01_load_state_names() {
        assert_eq!(LoadState::NetworkIdle.to_string(), "networkidle");
        assert_eq!(LoadState::DomContentLoaded.event_name(), "DOMContentLoaded");
        assert_eq!(LoadState::default(), LoadState::NetworkIdle);
    }

    #[test]
    fn h0_wait_02_state_satisfaction() {
        let missing = ElementState::missing();
        let visible = ElementState::visible();
        let hidden = ElementState {
            count: 1,
            ..ElementState::default()
        };

        assert!(!WaitState::Attached.is_satisfied(&missing));
        assert!(WaitState::Attached.is_satisfied(&hidden));
        assert!(WaitState::Visible.is_satisfied(&visible));
        assert!(!WaitState::Visible.is_satisfied(&hidden));
        assert!(WaitState::Hidden.is_satisfied(&hidden));
        assert!(WaitState::Hidden.is_satisfied(&missing));
        assert!(!WaitState::Hidden.is_satisfied(&visible));
        assert!(WaitState::Detached.is_satisfied(&missing));
        assert!(!WaitState::Detached.is_satisfied(&hidden));
    }

    #[test]
    fn h0_wait_03_state_yaml_names() {
        let state: WaitState = serde_yaml_ng::from_str("detached").unwrap();
        assert_eq!(state, WaitState::Detached);
        assert_eq!(WaitState::default(), WaitState::Visible);
    }

    // =========================================================================
    // Options
    // =========================================================================

    #[test]
    fn h0_wait_04_options_builder() {
        let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(10);
        assert_eq!(opts.timeout(), Duration::from_secs(1));
        assert_eq!(opts.poll_interval(), Duration::from_millis(10));
        assert_eq!(WaitOptions::default().timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
    }

    // =========================================================================
    // Polling
    // =========================================================================

    #[tokio::test]
    async fn h0_wait_05_poll_until_succeeds_after_attempts() {
        let calls = Cell::new(0);
        let opts = WaitOptions::new().with_timeout(1_000).with_poll_interval(1);
        let value = poll_until(&opts, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { Ok((n >= 3).then_some(n)) }
        })
        .await
        .unwrap();
        assert_eq!(value, Some(3));
    }

    #[tokio::test]
    async fn h0_wait_06_poll_until_times_out() {
        let opts = WaitOptions::new().with_timeout(20).with_poll_interval(5);
        let value: Option<()> = poll_until(&opts, || async { Ok(None) }).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn h0_wait_07_poll_until_probe_runs_once_with_zero_timeout() {
        let calls = Cell::new(0);
        let opts = WaitOptions::new().with_timeout(0);
        let _ = poll_until(&opts, || {
            calls.set(calls.get() + 1);
            async { Ok::<Option<()>, SiteCheckError>(None) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn h0_wait_08_poll_until_propagates_errors() {
        let opts = WaitOptions::new().with_timeout(1_000);
        let result: SiteCheckResult<Option<()>> =
            poll_until(&opts, || async { Err(SiteCheckError::page("gone")) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn h0_wait_09_network_idle_with_quiet_observer() {
        let observer = DiagnosticObserver::new();
        let opts = WaitOptions::new().with_timeout(500).with_poll_interval(1);
        wait_for_network_idle(&observer, Duration::ZERO, &opts)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn h0_wait_10_network_idle_times_out_with_pending_request() {
        let observer = DiagnosticObserver::new();
        observer.request_started("1", "GET", "https://example.com/slow");
        let opts = WaitOptions::new().with_timeout(20).with_poll_interval(5);
        let err = wait_for_network_idle(&observer, Duration::ZERO, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteCheckError::Timeout { ms: 20, .. }));
    }
}
