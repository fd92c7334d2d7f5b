//! Backstage seeding of client-side storage.
//!
//! A [`SeedPayload`] is an opaque set of storage writes plus an optional
//! event to dispatch afterwards. The harness does not interpret the stored
//! values. It can be applied at two points: as an init script registered
//! before the first navigation, and again right after load, since the app's
//! own bootstrap may run before or after the init script.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which storage area a key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageArea {
    /// `window.localStorage`
    #[default]
    Local,
    /// `window.sessionStorage`
    Session,
}

impl StorageArea {
    /// Global name in the page
    #[must_use]
    pub const fn js_name(&self) -> &'static str {
        match self {
            Self::Local => "localStorage",
            Self::Session => "sessionStorage",
        }
    }
}

/// When the payload is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPoints {
    /// Register as an init script before the first navigation
    #[serde(default = "enabled")]
    pub before_navigation: bool,
    /// Write again once the page has loaded
    #[serde(default = "enabled")]
    pub after_load: bool,
}

const fn enabled() -> bool {
    true
}

impl Default for InjectionPoints {
    fn default() -> Self {
        Self {
            before_navigation: true,
            after_load: true,
        }
    }
}

/// Precondition payload written straight into client-side storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPayload {
    /// `localStorage` writes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub local_storage: BTreeMap<String, String>,
    /// `sessionStorage` writes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub session_storage: BTreeMap<String, String>,
    /// Window event dispatched after the writes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch_event: Option<String>,
    /// Injection points
    #[serde(default)]
    pub inject: InjectionPoints,
}

impl SeedPayload {
    /// Create an empty payload
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw string
    #[must_use]
    pub fn with_item(mut self, area: StorageArea, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items_mut(area).insert(key.into(), value.into());
        self
    }

    /// Store a value as compact JSON text
    #[must_use]
    pub fn with_json(mut self, area: StorageArea, key: impl Into<String>, value: &serde_json::Value) -> Self {
        self.items_mut(area).insert(key.into(), value.to_string());
        self
    }

    /// Dispatch `event` on `window` after writing
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.dispatch_event = Some(event.into());
        self
    }

    /// Choose the injection points
    #[must_use]
    pub const fn with_injection(mut self, before_navigation: bool, after_load: bool) -> Self {
        self.inject = InjectionPoints {
            before_navigation,
            after_load,
        };
        self
    }

    fn items_mut(&mut self, area: StorageArea) -> &mut BTreeMap<String, String> {
        match area {
            StorageArea::Local => &mut self.local_storage,
            StorageArea::Session => &mut self.session_storage,
        }
    }

    /// Items of one area
    #[must_use]
    pub fn items(&self, area: StorageArea) -> &BTreeMap<String, String> {
        match area {
            StorageArea::Local => &self.local_storage,
            StorageArea::Session => &self.session_storage,
        }
    }

    /// Whether the payload writes nothing and dispatches nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local_storage.is_empty()
            && self.session_storage.is_empty()
            && self.dispatch_event.is_none()
    }

    fn body(&self) -> String {
        let data = serde_json::json!({
            "local": self.local_storage,
            "session": self.session_storage,
            "event": self.dispatch_event,
        });
        format!(
            "const seed = {data};\n\
             for (const [k, v] of Object.entries(seed.local)) localStorage.setItem(k, v);\n\
             for (const [k, v] of Object.entries(seed.session)) sessionStorage.setItem(k, v);\n\
             if (seed.event) window.dispatchEvent(new Event(seed.event));"
        )
    }

    /// Source registered to run in every new document before its scripts.
    ///
    /// Storage can be unavailable on some documents (e.g. `about:blank`),
    /// so failures are swallowed here.
    #[must_use]
    pub fn init_script(&self) -> String {
        format!("(() => {{\ntry {{\n{}\n}} catch (e) {{}}\n}})();", self.body())
    }

    /// Expression that writes the payload into the loaded page; errors surface
    #[must_use]
    pub fn apply_script(&self) -> String {
        format!("(() => {{\n{}\nreturn true;\n}})()", self.body())
    }
}

/// Expression reading one storage key (string or `null`)
#[must_use]
pub fn storage_read_script(area: StorageArea, key: &str) -> String {
    let key = serde_json::Value::String(key.to_string());
    format!("window.{}.getItem({key})", area.js_name())
}
