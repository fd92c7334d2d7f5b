//! Browser control over the Chrome `DevTools` Protocol.
//!
//! [`BrowserConfig`] is always available. The real driver lives behind the
//! `browser` feature and uses chromiumoxide; without it only the mock driver
//! in [`crate::driver`] can run scenarios.

use serde::{Deserialize, Serialize};

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening)]
mod cdp {
    use super::BrowserConfig;
    use crate::dialog::{Dialog, DialogType};
    use crate::driver::{Launcher, PageDriver};
    use crate::locator::{ElementState, Locator, LocatorAction, TARGET_MARKER};
    use crate::network::failure_reason;
    use crate::observer::{ConsoleLevel, DiagnosticObserver};
    use crate::result::{SiteCheckError, SiteCheckResult};
    use crate::seed::{storage_read_script, SeedPayload, StorageArea};
    use crate::wait::{strict_violation, LoadState};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::log::{self, EventEntryAdded, LogEntryLevel};
    use chromiumoxide::cdp::browser_protocol::network::{
        EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
        EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
    };
    use chromiumoxide::cdp::js_protocol::runtime::{
        ConsoleApiCalledType, EventConsoleApiCalled, RemoteObject,
    };
    use chromiumoxide::handler::viewport::Viewport;
    use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    const NAVIGATION_STATUS_JS: &str =
        "(() => { const e = performance.getEntriesByType('navigation')[0]; \
         return e && e.responseStatus ? e.responseStatus : null; })()";

    const SCROLL_TO_BOTTOM_JS: &str =
        "window.scrollTo(0, document.documentElement.scrollHeight || document.body.scrollHeight)";

    fn page_err(e: impl std::fmt::Display) -> SiteCheckError {
        SiteCheckError::page(e.to_string())
    }

    fn script_err(e: impl std::fmt::Display) -> SiteCheckError {
        SiteCheckError::script(e.to_string())
    }

    /// Page viewport; chromiumoxide otherwise emulates 800x600
    pub(crate) fn viewport(config: &BrowserConfig) -> Viewport {
        Viewport {
            width: config.viewport_width,
            height: config.viewport_height,
            ..Viewport::default()
        }
    }

    /// Launches a private chromium per run
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ChromiumLauncher;

    impl ChromiumLauncher {
        /// Create a launcher
        #[must_use]
        pub const fn new() -> Self {
            Self
        }
    }

    #[async_trait]
    impl Launcher for ChromiumLauncher {
        type Driver = ChromiumDriver;

        async fn launch(&self, config: &BrowserConfig) -> SiteCheckResult<ChromiumDriver> {
            ChromiumDriver::launch(config).await
        }
    }

    /// One chromium page with its private browser
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: Mutex<CdpBrowser>,
        page: CdpPage,
        handler: JoinHandle<()>,
        listeners: Vec<JoinHandle<()>>,
        observer: Option<DiagnosticObserver>,
        closed: bool,
    }

    impl ChromiumDriver {
        /// Launch chromium and open a blank page
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: &BrowserConfig) -> SiteCheckResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .viewport(viewport(config));

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder
                .build()
                .map_err(|message| SiteCheckError::BrowserLaunch { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                SiteCheckError::BrowserLaunch {
                    message: e.to_string(),
                }
            })?;

            // Spawn handler task
            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = match browser.new_page("about:blank").await {
                Ok(page) => page,
                Err(e) => {
                    handle.abort();
                    return Err(SiteCheckError::BrowserLaunch {
                        message: e.to_string(),
                    });
                }
            };
            debug!(headless = config.headless, "chromium launched");

            Ok(Self {
                browser: Mutex::new(browser),
                page,
                handler: handle,
                listeners: Vec::new(),
                observer: None,
                closed: false,
            })
        }

        async fn run_locator(
            &self,
            locator: &Locator,
            action: &LocatorAction,
        ) -> SiteCheckResult<ElementState> {
            let value = self.evaluate(&locator.script(action)).await?;
            serde_json::from_value(value).map_err(script_err)
        }
    }

    fn console_level(kind: &ConsoleApiCalledType) -> ConsoleLevel {
        match kind {
            ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => ConsoleLevel::Error,
            ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
            ConsoleApiCalledType::Info => ConsoleLevel::Info,
            ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
            _ => ConsoleLevel::Log,
        }
    }

    fn console_text(args: &[RemoteObject]) -> String {
        args.iter()
            .map(|arg| match (&arg.value, &arg.description) {
                (Some(serde_json::Value::String(s)), _) => s.clone(),
                (Some(v), _) => v.to_string(),
                (None, Some(d)) => d.clone(),
                (None, None) => String::new(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn attach_observer(&mut self, observer: DiagnosticObserver) -> SiteCheckResult<()> {
            self.page
                .execute(log::EnableParams::default())
                .await
                .map_err(page_err)?;

            let mut console = self
                .page
                .event_listener::<EventConsoleApiCalled>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = console.next().await {
                    obs.record_console(console_level(&event.r#type), console_text(&event.args));
                }
            }));

            let mut entries = self
                .page
                .event_listener::<EventEntryAdded>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = entries.next().await {
                    let level = match event.entry.level {
                        LogEntryLevel::Error => ConsoleLevel::Error,
                        LogEntryLevel::Warning => ConsoleLevel::Warning,
                        _ => continue,
                    };
                    obs.record_console(level, event.entry.text.clone());
                }
            }));

            let mut sent = self
                .page
                .event_listener::<EventRequestWillBeSent>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = sent.next().await {
                    obs.request_started(
                        event.request_id.inner(),
                        &event.request.method,
                        &event.request.url,
                    );
                }
            }));

            let mut finished = self
                .page
                .event_listener::<EventLoadingFinished>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = finished.next().await {
                    obs.request_finished(event.request_id.inner());
                }
            }));

            let mut failed = self
                .page
                .event_listener::<EventLoadingFailed>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = failed.next().await {
                    let reason = failure_reason(&event.error_text, event.canceled.unwrap_or(false));
                    obs.request_failed(event.request_id.inner(), reason);
                }
            }));

            let mut responses = self
                .page
                .event_listener::<EventResponseReceived>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = responses.next().await {
                    if let Ok(status) = u16::try_from(event.response.status) {
                        obs.record_response(event.response.url.clone(), status);
                    }
                }
            }));

            let mut dialogs = self
                .page
                .event_listener::<EventJavascriptDialogOpening>()
                .await
                .map_err(page_err)?;
            let obs = observer.clone();
            let page = self.page.clone();
            self.listeners.push(tokio::spawn(async move {
                while let Some(event) = dialogs.next().await {
                    let mut dialog = Dialog::new(
                        DialogType::from_protocol(event.r#type.as_ref()),
                        event.message.clone(),
                    );
                    if let Some(ref prompt) = event.default_prompt {
                        dialog = dialog.with_default_prompt(prompt.clone());
                    }
                    obs.record_dialog(&dialog);
                    let response = dialog.auto_response();
                    let params = HandleJavaScriptDialogParams {
                        accept: response.accept,
                        prompt_text: response.prompt_text,
                    };
                    if let Err(e) = page.execute(params).await {
                        warn!(error = %e, "failed to answer dialog");
                    }
                }
            }));

            self.observer = Some(observer);
            Ok(())
        }

        async fn install_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()> {
            self.page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(seed.init_script()))
                .await
                .map_err(script_err)?;
            Ok(())
        }

        async fn navigate(
            &mut self,
            url: &str,
            _wait_until: LoadState,
            timeout: Duration,
        ) -> SiteCheckResult<Option<u16>> {
            if self.observer.is_none() {
                return Err(SiteCheckError::InvalidState {
                    message: "observer must be attached before navigation".to_string(),
                });
            }
            match tokio::time::timeout(timeout, self.page.goto(url)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    return Err(SiteCheckError::UnreachableTarget {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(SiteCheckError::Timeout {
                        operation: format!("navigation to {url}"),
                        ms: timeout.as_millis() as u64,
                    })
                }
            }
            let status = self.evaluate(NAVIGATION_STATUS_JS).await?;
            Ok(status.as_u64().and_then(|s| u16::try_from(s).ok()))
        }

        async fn apply_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()> {
            self.evaluate(&seed.apply_script()).await?;
            Ok(())
        }

        async fn read_storage(
            &self,
            area: StorageArea,
            key: &str,
        ) -> SiteCheckResult<Option<String>> {
            let value = self.evaluate(&storage_read_script(area, key)).await?;
            Ok(value.as_str().map(String::from))
        }

        async fn query(&self, locator: &Locator) -> SiteCheckResult<ElementState> {
            self.run_locator(locator, &LocatorAction::Query).await
        }

        async fn click(&mut self, locator: &Locator) -> SiteCheckResult<()> {
            let state = self.run_locator(locator, &LocatorAction::Mark).await?;
            if state.ambiguous {
                return Err(strict_violation(locator, state.count));
            }
            if state.count == 0 {
                return Err(SiteCheckError::page(format!("no element matches {locator}")));
            }
            let element = self
                .page
                .find_element(format!("[{TARGET_MARKER}]"))
                .await
                .map_err(page_err)?;
            element.click().await.map_err(page_err)?;
            Ok(())
        }

        async fn fill(&mut self, locator: &Locator, value: &str) -> SiteCheckResult<()> {
            let action = LocatorAction::Fill {
                value: value.to_string(),
            };
            let state = self.run_locator(locator, &action).await?;
            if state.ambiguous {
                return Err(strict_violation(locator, state.count));
            }
            if state.count == 0 {
                return Err(SiteCheckError::page(format!("no element matches {locator}")));
            }
            Ok(())
        }

        async fn current_url(&self) -> SiteCheckResult<String> {
            let url = self.page.url().await.map_err(page_err)?;
            Ok(url.unwrap_or_default())
        }

        async fn scroll_to_bottom(&mut self) -> SiteCheckResult<()> {
            self.evaluate(SCROLL_TO_BOTTOM_JS).await?;
            Ok(())
        }

        async fn evaluate(&self, expression: &str) -> SiteCheckResult<serde_json::Value> {
            let result = self.page.evaluate(expression).await.map_err(script_err)?;
            Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
        }

        async fn screenshot_full_page(&self) -> SiteCheckResult<Vec<u8>> {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(true)
                .build();
            self.page.screenshot(params).await.map_err(page_err)
        }

        async fn close(&mut self) -> SiteCheckResult<()> {
            if self.closed {
                return Ok(());
            }
            self.closed = true;
            for listener in self.listeners.drain(..) {
                listener.abort();
            }
            let result = {
                let mut browser = self.browser.lock().await;
                let closed = browser.close().await.map(|_| ());
                // Reap the child even when the close command failed.
                let _ = browser.wait().await;
                closed
            };
            self.handler.abort();
            result.map_err(|e| SiteCheckError::BrowserLaunch {
                message: e.to_string(),
            })
        }
    }

    impl Drop for ChromiumDriver {
        fn drop(&mut self) {
            for listener in &self.listeners {
                listener.abort();
            }
            self.handler.abort();
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{ChromiumDriver, ChromiumLauncher};

#[cfg(all(test, feature = "browser"))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod cdp_tests {
    use super::*;

    #[test]
    fn test_viewport_follows_config() {
        let viewport = cdp::viewport(&BrowserConfig::default());
        assert_eq!((viewport.width, viewport.height), (1280, 720));
        assert!(!viewport.emulating_mobile);

        let viewport = cdp::viewport(&BrowserConfig::default().with_viewport(390, 844));
        assert_eq!((viewport.width, viewport.height), (390, 844));
    }
}
