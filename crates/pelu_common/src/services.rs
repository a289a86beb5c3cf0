//! Service abstractions for external dependencies (calendar, messaging, NLP).
//!
//! These traits let the dialogue engine and committer be tested against fakes
//! without touching a real calendar or chat transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Wraps any boxed error so it implements `std::error::Error`.
#[derive(Debug)]
pub struct BoxedError(pub Box<dyn StdError + Send + Sync>);

impl fmt::Display for BoxedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StdError for BoxedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<Box<dyn StdError + Send + Sync>> for BoxedError {
    fn from(err: Box<dyn StdError + Send + Sync>) -> Self {
        BoxedError(err)
    }
}

/// Calendar operations needed by the committer and availability calculator.
pub trait CalendarService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Busy intervals overlapping `[start_time, end_time)`, across the whole shop.
    #[allow(clippy::type_complexity)]
    fn get_busy_times(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, Self::Error>;

    /// Creates an event, or patches one in place if `event.gkey` already
    /// exists as a private extended property — the idempotent publish step
    /// of the two-phase commit.
    fn create_or_patch_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> BoxFuture<'_, CalendarEventResult, Self::Error>;

    /// Deletes an event outright.
    fn delete_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> BoxFuture<'_, (), Self::Error>;

    /// Marks an event cancelled (summary prefix + transparency), used for
    /// the cancellation path where the record should remain visible on the
    /// calendar but stop counting toward busy time.
    fn mark_event_cancelled(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> BoxFuture<'_, CalendarEventResult, Self::Error>;
}

/// Natural-language field extraction for free-text user replies.
pub trait NlpService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Attempts to extract `slot_kind` from `text` given the shop's context
    /// (service/professional names, today's date). Returns `None` on
    /// NO_UNDERSTAND rather than an error — a confident "I don't know" is
    /// not a failure of the service.
    fn extract(
        &self,
        text: &str,
        slot_kind: &str,
        context: serde_json::Value,
    ) -> BoxFuture<'_, Option<String>, Self::Error>;
}

/// Outbound messaging (the actual wire send; inbound parsing lives in
/// `pelu_messaging`'s own module since it's not behind a swappable transport).
pub trait MessagingService: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send_text(
        &self,
        to: &str,
        phone_number_id: &str,
        body: &str,
        idempotency_key: &str,
    ) -> BoxFuture<'_, NotificationResult, Self::Error>;

    fn send_menu(
        &self,
        to: &str,
        phone_number_id: &str,
        body: &str,
        options: Vec<(String, String)>,
        idempotency_key: &str,
    ) -> BoxFuture<'_, NotificationResult, Self::Error>;
}

/// Resolves trait-object implementations of the services above, constructed
/// once at startup from `AppConfig` and shared via `AppState`.
pub trait ServiceFactory: Send + Sync {
    fn calendar_service(&self) -> Option<Arc<dyn CalendarService<Error = BoxedError>>>;
    fn nlp_service(&self) -> Option<Arc<dyn NlpService<Error = BoxedError>>>;
    fn messaging_service(&self) -> Option<Arc<dyn MessagingService<Error = BoxedError>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start_time: String,
    pub end_time: String,
    pub summary: String,
    pub description: Option<String>,
    /// Private extended property used as the idempotency key for create-or-patch.
    pub gkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventResult {
    pub event_id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub id: String,
    pub status: String,
}
