//! PageDriver - the browser capability the runner drives.
//!
//! The runner never talks to chromiumoxide directly. It sees one page
//! through [`PageDriver`] and obtains it from a [`Launcher`]. Two
//! implementations exist:
//!
//! - `ChromiumDriver` (feature `browser`): a real page over CDP
//! - [`MockDriver`]: a scripted in-memory page for unit tests
//!
//! The mock models just enough of a page to exercise closed loops: elements
//! keyed by their selector description, click effects that change the URL,
//! raise dialogs, show or hide elements and touch storage.

use crate::browser::BrowserConfig;
use crate::dialog::Dialog;
use crate::locator::{ElementState, Locator, Pick};
use crate::network::FailedRequest;
use crate::observer::{ConsoleLevel, DiagnosticObserver};
use crate::result::{SiteCheckError, SiteCheckResult};
use crate::seed::{SeedPayload, StorageArea};
use crate::wait::{strict_violation, LoadState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Minimal PNG returned by the mock (signature only)
pub const MOCK_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// One browser page under automation
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Start feeding console, network and dialog events into `observer`.
    /// Must be called before the first navigation.
    async fn attach_observer(&mut self, observer: DiagnosticObserver) -> SiteCheckResult<()>;

    /// Register `seed` to be written into every new document before its scripts run
    async fn install_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()>;

    /// Navigate and wait for the document to load; returns its HTTP status
    /// when known. Network quiescence for `wait_until` is awaited by the
    /// runner through the observer.
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: LoadState,
        timeout: Duration,
    ) -> SiteCheckResult<Option<u16>>;

    /// Write `seed` into the current document
    async fn apply_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()>;

    /// Read one storage key
    async fn read_storage(&self, area: StorageArea, key: &str) -> SiteCheckResult<Option<String>>;

    /// Current state of the locator's target
    async fn query(&self, locator: &Locator) -> SiteCheckResult<ElementState>;

    /// Click the locator's target
    async fn click(&mut self, locator: &Locator) -> SiteCheckResult<()>;

    /// Replace the value of the locator's target
    async fn fill(&mut self, locator: &Locator, value: &str) -> SiteCheckResult<()>;

    /// Current page URL
    async fn current_url(&self) -> SiteCheckResult<String>;

    /// Scroll the document to its end
    async fn scroll_to_bottom(&mut self) -> SiteCheckResult<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&self, expression: &str) -> SiteCheckResult<serde_json::Value>;

    /// PNG of the full scrollable page
    async fn screenshot_full_page(&self) -> SiteCheckResult<Vec<u8>>;

    /// Release the page and its browser
    async fn close(&mut self) -> SiteCheckResult<()>;
}

/// Starts an isolated browser and hands out its page
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Driver type produced
    type Driver: PageDriver;

    /// Launch with `config`
    async fn launch(&self, config: &BrowserConfig) -> SiteCheckResult<Self::Driver>;
}

// =============================================================================
// Mock driver
// =============================================================================

/// Something a mocked click or navigation does to the page
#[derive(Debug, Clone)]
pub enum MockEffect {
    /// Change the page URL
    SetUrl(String),
    /// Raise a native dialog
    Dialog(Dialog),
    /// Make an element present and visible
    Show(String),
    /// Keep an element attached but invisible
    Hide(String),
    /// Detach an element
    Remove(String),
    /// Set an element's text
    SetText {
        /// Element key
        element: String,
        /// New text
        text: String,
    },
    /// Emit a console message
    Console(ConsoleLevel, String),
    /// Report a failed request
    NetworkFailure(FailedRequest),
    /// Report a response and its status
    Response {
        /// Response URL
        url: String,
        /// HTTP status
        status: u16,
    },
    /// Write a storage key
    SetStorage {
        /// Storage area
        area: StorageArea,
        /// Key
        key: String,
        /// Raw value
        value: String,
    },
    /// Copy an input's value into a field of a JSON document in storage
    StoreValue {
        /// Element key of the input
        element: String,
        /// Storage area
        area: StorageArea,
        /// Key of the JSON document
        key: String,
        /// JSON pointer of the field
        pointer: String,
    },
    /// Prefill an input from a field of a JSON document in storage
    PrefillFromStorage {
        /// Element key of the input
        element: String,
        /// Storage area
        area: StorageArea,
        /// Key of the JSON document
        key: String,
        /// JSON pointer of the field
        pointer: String,
    },
}

/// A scripted element
#[derive(Debug, Clone, Default)]
pub struct MockElement {
    /// Number of matches
    pub count: usize,
    /// Visibility of the picked match
    pub visible: bool,
    /// Input value
    pub value: Option<String>,
    /// Text content
    pub text: Option<String>,
    /// Effects applied on click
    pub on_click: Vec<MockEffect>,
}

impl MockElement {
    /// One visible element
    #[must_use]
    pub fn visible() -> Self {
        Self {
            count: 1,
            visible: true,
            ..Self::default()
        }
    }

    /// Attached but invisible element
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            count: 1,
            ..Self::default()
        }
    }

    /// Set match count
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set input value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Add a click effect
    #[must_use]
    pub fn on_click(mut self, effect: MockEffect) -> Self {
        self.on_click.push(effect);
        self
    }
}

#[derive(Debug, Default)]
struct MockRoute {
    status: Option<u16>,
    effects: Vec<MockEffect>,
}

#[derive(Debug, Default)]
struct MockPage {
    url: String,
    observer: Option<DiagnosticObserver>,
    elements: HashMap<String, MockElement>,
    routes: HashMap<String, MockRoute>,
    local: HashMap<String, String>,
    session: HashMap<String, String>,
    installed_seeds: Vec<SeedPayload>,
    eval_results: HashMap<String, serde_json::Value>,
    navigation_error: Option<String>,
    call_history: Vec<String>,
    closed: bool,
}

impl MockPage {
    fn storage_mut(&mut self, area: StorageArea) -> &mut HashMap<String, String> {
        match area {
            StorageArea::Local => &mut self.local,
            StorageArea::Session => &mut self.session,
        }
    }

    fn write_seed(&mut self, seed: &SeedPayload) {
        for (k, v) in &seed.local_storage {
            self.local.insert(k.clone(), v.clone());
        }
        for (k, v) in &seed.session_storage {
            self.session.insert(k.clone(), v.clone());
        }
    }

    fn state_of(&self, locator: &Locator) -> ElementState {
        if let Some(scope) = locator.scope() {
            let scope_state = self.state_of(scope);
            if scope_state.count == 0 {
                return ElementState::missing();
            }
        }
        let Some(el) = self.elements.get(&locator.selector().describe()) else {
            return ElementState::missing();
        };
        ElementState {
            count: el.count,
            visible: el.count > 0 && el.visible,
            value: el.value.clone(),
            text: el.text.clone(),
            ambiguous: locator.pick() == Pick::Strict && el.count > 1,
        }
    }

    fn apply(&mut self, effect: MockEffect) {
        match effect {
            MockEffect::SetUrl(url) => self.url = url,
            MockEffect::Dialog(dialog) => {
                if let Some(observer) = &self.observer {
                    observer.record_dialog(&dialog);
                }
            }
            MockEffect::Show(key) => {
                let el = self.elements.entry(key).or_default();
                el.count = el.count.max(1);
                el.visible = true;
            }
            MockEffect::Hide(key) => {
                if let Some(el) = self.elements.get_mut(&key) {
                    el.visible = false;
                }
            }
            MockEffect::Remove(key) => {
                if let Some(el) = self.elements.get_mut(&key) {
                    el.count = 0;
                    el.visible = false;
                }
            }
            MockEffect::SetText { element, text } => {
                self.elements.entry(element).or_default().text = Some(text);
            }
            MockEffect::Console(level, text) => {
                if let Some(observer) = &self.observer {
                    observer.record_console(level, text);
                }
            }
            MockEffect::NetworkFailure(failure) => {
                if let Some(observer) = &self.observer {
                    observer.record_network_failure(failure);
                }
            }
            MockEffect::Response { url, status } => {
                if let Some(observer) = &self.observer {
                    observer.record_response(url, status);
                }
            }
            MockEffect::SetStorage { area, key, value } => {
                self.storage_mut(area).insert(key, value);
            }
            MockEffect::StoreValue {
                element,
                area,
                key,
                pointer,
            } => {
                let value = self
                    .elements
                    .get(&element)
                    .and_then(|el| el.value.clone())
                    .unwrap_or_default();
                let storage = self.storage_mut(area);
                let mut doc: serde_json::Value = storage
                    .get(&key)
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| serde_json::json!({}));
                if let Some(slot) = doc.pointer_mut(&pointer) {
                    *slot = serde_json::Value::String(value);
                } else if let Some(map) = doc.as_object_mut() {
                    map.insert(pointer.trim_start_matches('/').to_string(), value.into());
                }
                storage.insert(key, doc.to_string());
            }
            MockEffect::PrefillFromStorage {
                element,
                area,
                key,
                pointer,
            } => {
                let value = self
                    .storage_mut(area)
                    .get(&key)
                    .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
                    .and_then(|doc| doc.pointer(&pointer).and_then(|v| v.as_str().map(String::from)));
                self.elements.entry(element).or_default().value = value;
            }
        }
    }

    fn target(&self, locator: &Locator) -> SiteCheckResult<String> {
        let state = self.state_of(locator);
        if state.ambiguous {
            return Err(strict_violation(locator, state.count));
        }
        if state.count == 0 {
            return Err(SiteCheckError::page(format!("no element matches {locator}")));
        }
        Ok(locator.selector().describe())
    }
}

/// Mock driver for unit testing.
///
/// Clones share one page, so a test can keep a handle for inspection after
/// handing another clone to the runner.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    page: Arc<Mutex<MockPage>>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn page(&self) -> MutexGuard<'_, MockPage> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an element under the locator's selector
    pub fn add_element(&self, locator: &Locator, element: MockElement) {
        self.page()
            .elements
            .insert(locator.selector().describe(), element);
    }

    /// Set the HTTP status reported for `url`
    pub fn set_status(&self, url: impl Into<String>, status: u16) {
        self.page().routes.entry(url.into()).or_default().status = Some(status);
    }

    /// Effects applied after navigating to `url`
    pub fn on_navigate(&self, url: impl Into<String>, effect: MockEffect) {
        self.page()
            .routes
            .entry(url.into())
            .or_default()
            .effects
            .push(effect);
    }

    /// Make every navigation fail with `message`
    pub fn fail_navigation(&self, message: impl Into<String>) {
        self.page().navigation_error = Some(message.into());
    }

    /// Set the result of evaluating `expression`
    pub fn set_eval_result(&self, expression: impl Into<String>, value: serde_json::Value) {
        self.page().eval_results.insert(expression.into(), value);
    }

    /// Write a storage key directly
    pub fn set_storage(&self, area: StorageArea, key: impl Into<String>, value: impl Into<String>) {
        self.page().storage_mut(area).insert(key.into(), value.into());
    }

    /// Read a storage key directly
    #[must_use]
    pub fn storage(&self, area: StorageArea, key: &str) -> Option<String> {
        self.page().storage_mut(area).get(key).cloned()
    }

    /// State of a registered element
    #[must_use]
    pub fn element(&self, locator: &Locator) -> Option<MockElement> {
        self.page()
            .elements
            .get(&locator.selector().describe())
            .cloned()
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.page().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.page().call_history.iter().any(|c| c.starts_with(method))
    }

    /// Whether `close` ran
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.page().closed
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn attach_observer(&mut self, observer: DiagnosticObserver) -> SiteCheckResult<()> {
        let mut page = self.page();
        page.call_history.push("attach_observer".to_string());
        page.observer = Some(observer);
        Ok(())
    }

    async fn install_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()> {
        let mut page = self.page();
        page.call_history.push("install_seed".to_string());
        page.installed_seeds.push(seed.clone());
        Ok(())
    }

    async fn navigate(
        &mut self,
        url: &str,
        wait_until: LoadState,
        _timeout: Duration,
    ) -> SiteCheckResult<Option<u16>> {
        let mut page = self.page();
        page.call_history.push(format!("navigate:{url}:{wait_until}"));
        if page.observer.is_none() {
            return Err(SiteCheckError::InvalidState {
                message: "observer must be attached before navigation".to_string(),
            });
        }
        if let Some(message) = page.navigation_error.clone() {
            return Err(SiteCheckError::UnreachableTarget {
                url: url.to_string(),
                message,
            });
        }
        let seeds = page.installed_seeds.clone();
        for seed in &seeds {
            page.write_seed(seed);
        }
        page.url = url.to_string();
        let (status, effects) = page
            .routes
            .get(url)
            .map(|r| (r.status, r.effects.clone()))
            .unwrap_or((Some(200), Vec::new()));
        if let (Some(status), Some(observer)) = (status, &page.observer) {
            observer.record_response(url, status);
        }
        for effect in effects {
            page.apply(effect);
        }
        Ok(status)
    }

    async fn apply_seed(&mut self, seed: &SeedPayload) -> SiteCheckResult<()> {
        let mut page = self.page();
        page.call_history.push("apply_seed".to_string());
        page.write_seed(seed);
        Ok(())
    }

    async fn read_storage(&self, area: StorageArea, key: &str) -> SiteCheckResult<Option<String>> {
        Ok(self.storage(area, key))
    }

    async fn query(&self, locator: &Locator) -> SiteCheckResult<ElementState> {
        Ok(self.page().state_of(locator))
    }

    async fn click(&mut self, locator: &Locator) -> SiteCheckResult<()> {
        let mut page = self.page();
        let key = page.target(locator)?;
        page.call_history.push(format!("click:{key}"));
        let effects = page
            .elements
            .get(&key)
            .map(|el| el.on_click.clone())
            .unwrap_or_default();
        for effect in effects {
            page.apply(effect);
        }
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> SiteCheckResult<()> {
        let mut page = self.page();
        let key = page.target(locator)?;
        page.call_history.push(format!("fill:{key}={value}"));
        if let Some(el) = page.elements.get_mut(&key) {
            el.value = Some(value.to_string());
        }
        Ok(())
    }

    async fn current_url(&self) -> SiteCheckResult<String> {
        Ok(self.page().url.clone())
    }

    async fn scroll_to_bottom(&mut self) -> SiteCheckResult<()> {
        self.page().call_history.push("scroll_to_bottom".to_string());
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> SiteCheckResult<serde_json::Value> {
        Ok(self
            .page()
            .eval_results
            .get(expression)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot_full_page(&self) -> SiteCheckResult<Vec<u8>> {
        let mut page = self.page();
        if page.closed {
            return Err(SiteCheckError::page("page is closed"));
        }
        page.call_history.push("screenshot".to_string());
        Ok(MOCK_PNG.to_vec())
    }

    async fn close(&mut self) -> SiteCheckResult<()> {
        let mut page = self.page();
        page.call_history.push("close".to_string());
        page.closed = true;
        Ok(())
    }
}

/// Launcher handing out a shared [`MockDriver`], or failing on demand
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    driver: MockDriver,
    failure: Option<String>,
}

impl MockLauncher {
    /// Launch `driver` every time
    #[must_use]
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            failure: None,
        }
    }

    /// Fail every launch with `message`
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            driver: MockDriver::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    type Driver = MockDriver;

    async fn launch(&self, _config: &BrowserConfig) -> SiteCheckResult<MockDriver> {
        match &self.failure {
            Some(message) => Err(SiteCheckError::BrowserLaunch {
                message: message.clone(),
            }),
            None => Ok(self.driver.clone()),
        }
    }
}
