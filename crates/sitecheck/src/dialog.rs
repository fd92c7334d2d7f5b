//! Native dialog handling.
//!
//! Every `alert`/`confirm`/`prompt`/`beforeunload` raised by the page is
//! recorded and accepted immediately. An unanswered dialog blocks the page's
//! event loop, so there is no manual mode.

use serde::{Deserialize, Serialize};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl DialogType {
    /// Parse the protocol's dialog type name, defaulting to alert
    #[must_use]
    pub fn from_protocol(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "confirm" => Self::Confirm,
            "prompt" => Self::Prompt,
            "beforeunload" => Self::BeforeUnload,
            _ => Self::Alert,
        }
    }
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// A dialog as raised by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    /// Type of dialog
    pub dialog_type: DialogType,
    /// Message displayed in the dialog
    pub message: String,
    /// Default value (for prompt dialogs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
}

impl Dialog {
    /// Create a new dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            default_prompt: None,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Set the prompt's default value
    #[must_use]
    pub fn with_default_prompt(mut self, value: impl Into<String>) -> Self {
        self.default_prompt = Some(value.into());
        self
    }

    /// The answer sent back to the page
    #[must_use]
    pub fn auto_response(&self) -> DialogResponse {
        DialogResponse {
            accept: true,
            prompt_text: match self.dialog_type {
                DialogType::Prompt => Some(self.default_prompt.clone().unwrap_or_default()),
                _ => None,
            },
        }
    }
}

/// Answer to a dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogResponse {
    /// Accept (OK/Leave) rather than dismiss
    pub accept: bool,
    /// Text typed into a prompt
    pub prompt_text: Option<String>,
}
