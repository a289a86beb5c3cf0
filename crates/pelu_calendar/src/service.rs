//! Calendar client implementation backed by Google Calendar.

use chrono::{DateTime, Utc};
use pelu_common::services::{
    BoxFuture, BoxedError, CalendarEvent, CalendarEventResult, CalendarService,
};
use std::sync::Arc;

use crate::auth::HubType;
use crate::logic::{create_or_patch_event, delete_calendar_event, get_busy_times, mark_event_cancelled};

pub struct GoogleCalendarService {
    calendar_hub: Arc<HubType>,
}

impl GoogleCalendarService {
    pub fn new(calendar_hub: Arc<HubType>) -> Self {
        Self { calendar_hub }
    }
}

impl CalendarService for GoogleCalendarService {
    type Error = BoxedError;

    fn get_busy_times(
        &self,
        calendar_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let hub = self.calendar_hub.clone();
        Box::pin(async move {
            get_busy_times(&hub, &calendar_id, start_time, end_time)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }

    fn create_or_patch_event(
        &self,
        calendar_id: &str,
        event: CalendarEvent,
    ) -> BoxFuture<'_, CalendarEventResult, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let hub = self.calendar_hub.clone();
        Box::pin(async move {
            create_or_patch_event(&hub, &calendar_id, event)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }

    fn delete_event(&self, calendar_id: &str, event_id: &str) -> BoxFuture<'_, (), Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let hub = self.calendar_hub.clone();
        Box::pin(async move {
            delete_calendar_event(&hub, &calendar_id, &event_id)
                .await
                .map_err(|e| BoxedError(Box::new(e)))
        })
    }

    fn mark_event_cancelled(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> BoxFuture<'_, CalendarEventResult, Self::Error> {
        let calendar_id = calendar_id.to_string();
        let event_id = event_id.to_string();
        let hub = self.calendar_hub.clone();
        Box::pin(async move {
            let updated = mark_event_cancelled(&hub, &calendar_id, &event_id)
                .await
                .map_err(|e| BoxedError(Box::new(e)))?;
            Ok(CalendarEventResult {
                event_id: updated.id,
                status: updated.status.unwrap_or_else(|| "cancelled".to_string()),
            })
        })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory calendar for dialogue/committer tests: no network calls,
    /// keyed by gkey the same way the real lookup-or-patch path is.
    pub struct MockCalendarService {
        events: Mutex<HashMap<String, (CalendarEvent, String)>>,
    }

    impl MockCalendarService {
        pub fn new() -> Self {
            Self {
                events: Mutex::new(HashMap::new()),
            }
        }
    }

    impl Default for MockCalendarService {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CalendarService for MockCalendarService {
        type Error = BoxedError;

        fn get_busy_times(
            &self,
            _calendar_id: &str,
            start_time: DateTime<Utc>,
            end_time: DateTime<Utc>,
        ) -> BoxFuture<'_, Vec<(DateTime<Utc>, DateTime<Utc>)>, Self::Error> {
            Box::pin(async move {
                let events = self.events.lock().unwrap();
                let mut busy = Vec::new();
                for (event, status) in events.values() {
                    if status == "cancelled" {
                        continue;
                    }
                    let s = DateTime::parse_from_rfc3339(&event.start_time)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or(start_time);
                    let e = DateTime::parse_from_rfc3339(&event.end_time)
                        .map(|d| d.with_timezone(&Utc))
                        .unwrap_or(end_time);
                    if s < end_time && e > start_time {
                        busy.push((s, e));
                    }
                }
                busy.sort_by_key(|k| k.0);
                Ok(busy)
            })
        }

        fn create_or_patch_event(
            &self,
            _calendar_id: &str,
            event: CalendarEvent,
        ) -> BoxFuture<'_, CalendarEventResult, Self::Error> {
            Box::pin(async move {
                let mut events = self.events.lock().unwrap();
                let event_id = events
                    .iter()
                    .find(|(_, (e, _))| e.gkey == event.gkey)
                    .map(|(id, _)| id.clone())
                    .unwrap_or_else(|| format!("mock-event-{}", uuid::Uuid::new_v4()));
                events.insert(event_id.clone(), (event, "confirmed".to_string()));
                Ok(CalendarEventResult {
                    event_id: Some(event_id),
                    status: "confirmed".to_string(),
                })
            })
        }

        fn delete_event(&self, _calendar_id: &str, event_id: &str) -> BoxFuture<'_, (), Self::Error> {
            let event_id = event_id.to_string();
            Box::pin(async move {
                self.events.lock().unwrap().remove(&event_id);
                Ok(())
            })
        }

        fn mark_event_cancelled(
            &self,
            _calendar_id: &str,
            event_id: &str,
        ) -> BoxFuture<'_, CalendarEventResult, Self::Error> {
            let event_id = event_id.to_string();
            Box::pin(async move {
                let mut events = self.events.lock().unwrap();
                if let Some((_, status)) = events.get_mut(&event_id) {
                    *status = "cancelled".to_string();
                    return Ok(CalendarEventResult {
                        event_id: Some(event_id),
                        status: "cancelled".to_string(),
                    });
                }
                Err(BoxedError(Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("event not found: {}", event_id),
                ))))
            })
        }
    }
}
