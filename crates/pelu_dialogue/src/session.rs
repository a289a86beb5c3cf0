//! Per-session state, persisted to the KV store as a tagged union rather
//! than an open key/value bag — each step carries exactly the fields it
//! needs, so a caller can't read a field that hasn't been collected yet.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Book,
    Cancel,
    Faq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub h: u32,
    pub m: u32,
}

impl TimeOfDay {
    pub fn to_hhmm(&self) -> String {
        format!("{:02}:{:02}", self.h, self.m)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum DialogueState {
    Idle,
    PickService,
    PickStaff {
        service_id: i64,
    },
    PickDate {
        service_id: i64,
        professional_id: Option<i64>,
    },
    PickTime {
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
    },
    DisambiguateAmPm {
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        am: TimeOfDay,
        pm: TimeOfDay,
    },
    CollectName {
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
    },
    CollectPhone {
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
        name: String,
    },
    ConfirmBooking {
        service_id: i64,
        professional_id: Option<i64>,
        date: String,
        time: TimeOfDay,
        name: String,
        phone: String,
    },
    PostConfirmBooking,
    AskPhone,
    OfferRetryPhone,
    PickReservation {
        candidates: Vec<i64>,
    },
    ConfirmCancel {
        reservation_id: i64,
    },
    PostConfirmCancel,
    Answering,
    AskMore,
}

impl Default for DialogueState {
    fn default() -> Self {
        DialogueState::Idle
    }
}

/// The ephemeral session record, keyed by `state:<session_id>` with a 5h TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub intent: Option<Intent>,
    pub state: DialogueState,
    /// Set after an unexpected error resets the session, so the next
    /// message re-emits the welcome instead of a bare re-prompt.
    #[serde(default)]
    pub force_welcome: bool,
}

impl Session {
    pub fn new(session_id: &str) -> Self {
        Session {
            session_id: session_id.to_string(),
            intent: None,
            state: DialogueState::Idle,
            force_welcome: true,
        }
    }

    pub fn reset_to_idle(&mut self) {
        self.intent = None;
        self.state = DialogueState::Idle;
        self.force_welcome = false;
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(session_id: &str, raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Session::new(session_id))
    }
}
