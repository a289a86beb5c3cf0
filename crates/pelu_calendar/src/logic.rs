use crate::auth::HubType;
use chrono::{DateTime, Utc};
use google_calendar3::api::{Event, EventDateTime, EventExtendedProperties, FreeBusyRequest, FreeBusyRequestItem};
use pelu_common::services::{CalendarEvent, CalendarEventResult};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcalError {
    #[error("Google API error: {0}")]
    ApiError(#[from] google_calendar3::Error),
    #[error("failed to parse time: {0}")]
    TimeParseError(String),
    #[error("calculation error: {0}")]
    CalculationError(String),
}

/// Fetches busy time intervals from the calendar for a date range.
///
/// Consumed by the availability calculator's capacity count for the
/// unspecified-professional path.
pub async fn get_busy_times(
    hub: &HubType,
    calendar_id: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, GcalError> {
    let req = FreeBusyRequest {
        time_min: Some(start_time),
        time_max: Some(end_time),
        time_zone: Some("UTC".to_string()),
        items: Some(vec![FreeBusyRequestItem {
            id: Some(calendar_id.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let (_response, freebusy_response) = hub.freebusy().query(req).doit().await?;

    let mut busy_periods = Vec::new();
    if let Some(calendars) = freebusy_response.calendars {
        if let Some(cal_info) = calendars.get(calendar_id) {
            if let Some(busy_times) = &cal_info.busy {
                for period in busy_times {
                    if let (Some(start_dt), Some(end_dt)) = (period.start, period.end) {
                        busy_periods.push((start_dt, end_dt));
                    } else {
                        tracing::warn!("skipping busy period with missing start/end: {:?}", period);
                    }
                }
            }
        }
    }
    busy_periods.sort_by_key(|k| k.0);
    Ok(busy_periods)
}

fn parse_event_times(event: &CalendarEvent) -> Result<(DateTime<Utc>, DateTime<Utc>), GcalError> {
    let start_dt = DateTime::parse_from_rfc3339(&event.start_time)
        .map_err(|e| GcalError::TimeParseError(format!("invalid start_time: {}", e)))?
        .with_timezone(&Utc);
    let end_dt = DateTime::parse_from_rfc3339(&event.end_time)
        .map_err(|e| GcalError::TimeParseError(format!("invalid end_time: {}", e)))?
        .with_timezone(&Utc);
    if end_dt <= start_dt {
        return Err(GcalError::CalculationError(
            "end time must be after start time".to_string(),
        ));
    }
    Ok((start_dt, end_dt))
}

fn build_event(event: &CalendarEvent, start_dt: DateTime<Utc>, end_dt: DateTime<Utc>, sequence: Option<i32>) -> Event {
    let mut private = HashMap::new();
    private.insert("gkey".to_string(), event.gkey.clone());
    Event {
        summary: Some(event.summary.clone()),
        description: event.description.clone(),
        start: Some(EventDateTime {
            date_time: Some(start_dt),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }),
        end: Some(EventDateTime {
            date_time: Some(end_dt),
            time_zone: Some("UTC".to_string()),
            ..Default::default()
        }),
        extended_properties: Some(EventExtendedProperties {
            private: Some(private),
            shared: None,
        }),
        sequence,
        ..Default::default()
    }
}

/// Looks up an existing event carrying this `gkey` as a private extended
/// property. The calendar is shared across tenants but a `gkey` is unique
/// per commit, so at most one match is expected.
async fn find_event_by_gkey(
    hub: &HubType,
    calendar_id: &str,
    gkey: &str,
) -> Result<Option<Event>, GcalError> {
    let property_filter = format!("gkey={}", gkey);
    let (_response, list) = hub
        .events()
        .list(calendar_id)
        .private_extended_property(&property_filter)
        .show_deleted(false)
        .single_events(true)
        .doit()
        .await?;
    Ok(list.items.and_then(|items| items.into_iter().next()))
}

/// Idempotent create-or-patch keyed by `event.gkey`: if an event already
/// carries this key, it is patched in place instead of duplicated. This is
/// what lets the committer retry a calendar publish without double-booking
/// the external calendar.
pub async fn create_or_patch_event(
    hub: &HubType,
    calendar_id: &str,
    event: CalendarEvent,
) -> Result<CalendarEventResult, GcalError> {
    let (start_dt, end_dt) = parse_event_times(&event)?;

    if let Some(existing) = find_event_by_gkey(hub, calendar_id, &event.gkey).await? {
        let event_id = existing.id.clone().unwrap_or_default();
        let sequence = existing.sequence.map(|n| n + 1).unwrap_or(1);
        let patch = build_event(&event, start_dt, end_dt, Some(sequence));
        let (_response, patched) = hub
            .events()
            .patch(patch, calendar_id, &event_id)
            .send_updates("none")
            .doit()
            .await?;
        return Ok(CalendarEventResult {
            event_id: patched.id,
            status: patched.status.unwrap_or_else(|| "confirmed".to_string()),
        });
    }

    let new_event = build_event(&event, start_dt, end_dt, None);
    let (_response, created) = hub
        .events()
        .insert(new_event, calendar_id)
        .send_updates("none")
        .doit()
        .await?;
    Ok(CalendarEventResult {
        event_id: created.id,
        status: created.status.unwrap_or_else(|| "confirmed".to_string()),
    })
}

/// Deletes an event, handling an already-cancelled or already-absent event
/// as success (best-effort, called after the committer has already
/// decided the outcome).
pub async fn delete_calendar_event(
    hub: &HubType,
    calendar_id: &str,
    event_id: &str,
) -> Result<(), GcalError> {
    let get_result = hub.events().get(calendar_id, event_id).doit().await;

    if let Err(e) = get_result {
        if e.to_string().contains("404") {
            return Ok(());
        }
        return Err(GcalError::ApiError(e));
    }

    let (_response, event) = get_result.unwrap();
    let status = event.status.as_deref().unwrap_or("confirmed");

    let delete_result = hub
        .events()
        .delete(calendar_id, event_id)
        .send_updates("none")
        .doit()
        .await;

    match delete_result {
        Ok(_) => Ok(()),
        Err(e) => {
            if status == "cancelled" || e.to_string().contains("403") || e.to_string().contains("400") {
                let sequence = event.sequence.map(|n| n + 1).unwrap_or(1);
                let restored_event = Event {
                    status: Some("confirmed".to_string()),
                    sequence: Some(sequence),
                    ..Default::default()
                };
                let restore_result = hub
                    .events()
                    .patch(restored_event, calendar_id, event_id)
                    .send_updates("none")
                    .doit()
                    .await;
                match restore_result {
                    Ok(_) => {
                        hub.events()
                            .delete(calendar_id, event_id)
                            .send_updates("none")
                            .doit()
                            .await?;
                        Ok(())
                    }
                    Err(_) => {
                        tracing::warn!(
                            "could not fully delete event {}, attempted restore and delete",
                            event_id
                        );
                        Ok(())
                    }
                }
            } else {
                Err(GcalError::ApiError(e))
            }
        }
    }
}

/// Marks an event cancelled without removing it, used when a reservation's
/// external event should stay visible (struck through) on the calendar.
pub async fn mark_event_cancelled(
    hub: &HubType,
    calendar_id: &str,
    event_id: &str,
) -> Result<Event, GcalError> {
    let (_response, event) = hub.events().get(calendar_id, event_id).doit().await?;
    let sequence = event.sequence.map(|n| n + 1).unwrap_or(1);

    let cancelled_event = Event {
        status: Some("cancelled".to_string()),
        sequence: Some(sequence),
        ..Default::default()
    };

    let (_response, updated) = hub
        .events()
        .patch(cancelled_event, calendar_id, event_id)
        .send_updates("none")
        .doit()
        .await?;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(gkey: &str) -> CalendarEvent {
        CalendarEvent {
            start_time: "2025-09-20T10:00:00Z".to_string(),
            end_time: "2025-09-20T10:30:00Z".to_string(),
            summary: "Reservation".to_string(),
            description: None,
            gkey: gkey.to_string(),
        }
    }

    #[test]
    fn parse_event_times_rejects_inverted_range() {
        let mut e = event("s1:2025-09-20:10:00:1");
        e.start_time = "2025-09-20T11:00:00Z".to_string();
        e.end_time = "2025-09-20T10:00:00Z".to_string();
        assert!(parse_event_times(&e).is_err());
    }

    #[test]
    fn parse_event_times_rejects_bad_format() {
        let mut e = event("s1:2025-09-20:10:00:1");
        e.start_time = "not-a-date".to_string();
        assert!(parse_event_times(&e).is_err());
    }

    #[test]
    fn build_event_carries_gkey_as_private_property() {
        let e = event("s1:2025-09-20:10:00:42");
        let (start, end) = parse_event_times(&e).unwrap();
        let built = build_event(&e, start, end, None);
        let private = built.extended_properties.unwrap().private.unwrap();
        assert_eq!(private.get("gkey"), Some(&"s1:2025-09-20:10:00:42".to_string()));
    }
}
