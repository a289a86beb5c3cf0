//! The engine's reply shape — the one thing `handle` returns, independent
//! of whatever transport (WhatsApp, loopback) the dispatcher will render it
//! as.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiDirective {
    MainMenu,
    Services,
    Staff,
    Hours,
    ResList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleResult {
    pub reply_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiDirective>,
    /// The page actually rendered to the user this turn (at most one
    /// transport page, e.g. WhatsApp's 10-row list limit).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    /// The full candidate list behind `choices`, when it spans more than one
    /// page — snapshotted by the dispatcher so a later `_NEXT_<p>` can serve
    /// pages beyond the first without re-invoking the engine. `None` when
    /// `choices` already is the whole list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_choices: Option<Vec<Choice>>,
}

impl HandleResult {
    pub fn text(reply_text: impl Into<String>) -> Self {
        HandleResult {
            reply_text: reply_text.into(),
            secondary_text: None,
            ui: None,
            choices: None,
            all_choices: None,
        }
    }

    pub fn with_ui(mut self, ui: UiDirective) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_all_choices(mut self, choices: Vec<Choice>) -> Self {
        self.all_choices = Some(choices);
        self
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary_text = Some(secondary.into());
        self
    }
}
