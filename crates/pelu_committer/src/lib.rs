//! Two-phase reservation commit.
//!
//! Phase one is guarded by a per-slot advisory lock held in the KV store
//! (`slot:<shop>:<date>:<minute-of-day>`): acquire the lock, open a database
//! transaction, re-check capacity against the shop's confirmed reservations
//! with `SELECT ... FOR UPDATE` on backends that support it, then insert.
//! The `reservations` table's unique constraint is a second backstop for the
//! one-professional-one-chair case, reached if two commits somehow raced
//! past the advisory lock. Phase two is the calendar publish, keyed by a
//! `gkey` derived from the reservation id so a retry never double-books the
//! external calendar. Phase two is best-effort: it is logged on failure but
//! never undoes the phase-one insert.
//!
//! A confirm is additionally deduplicated by an idempotency key derived from
//! `(shop, date, start_time, service, phone)` and cached for
//! `COMMIT_IDEMPOTENCY_TTL_SECONDS`: a retried confirm for the same slot and
//! customer replays the first attempt's outcome rather than racing a second
//! insert through the lock.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Timelike, TimeZone};
use pelu_common::services::{BoxedError, CalendarEvent, CalendarService};
use pelu_config::ShopConfig;
use pelu_db::error::DbError;
use pelu_db::models::{Professional, Reservation};
use pelu_db::repositories::SqlReservationRepository;
use pelu_kv::KvStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// TTL of the KV entry backing a held slot lock — well above the time a
/// single commit attempt should ever take, so a crashed holder doesn't wedge
/// the slot forever.
const LOCK_TTL_SECONDS: u64 = 10;
/// Upper bound on lock-acquisition retries before giving up as contended.
const MAX_LOCK_RETRIES: u32 = 8;
/// Linear backoff step between retries.
const LOCK_RETRY_BASE_DELAY_MS: u64 = 100;
/// How long a commit outcome is replayed for an identical retry.
const COMMIT_IDEMPOTENCY_TTL_SECONDS: u64 = 600;

#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid shop timezone {0}")]
    InvalidTimezone(String),
    #[error("timed out waiting for the slot lock on {0}")]
    LockTimeout(String),
}

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub service_id: i64,
    pub professional_id: Option<i64>,
    pub customer_name: String,
    pub customer_phone: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: i64,
    pub summary: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitOutcome {
    Committed {
        reservation_id: i64,
        event_id: Option<String>,
    },
    NoSlot,
}

fn start_minutes(time: NaiveTime) -> i64 {
    time.hour() as i64 * 60 + time.minute() as i64
}

fn slot_lock_key(shop_id: i64, date: NaiveDate, start_time: NaiveTime) -> String {
    format!("slot:{shop_id}:{}:{}", date.format("%Y-%m-%d"), start_minutes(start_time))
}

fn commit_idempotency_key(shop_id: i64, date: NaiveDate, start_time: NaiveTime, service_id: i64, phone: &str) -> String {
    format!(
        "idemp:book_confirm:{shop_id}:{}:{}:{service_id}:{phone}",
        date.format("%Y-%m-%d"),
        start_time.format("%H:%M"),
    )
}

async fn load_cached_outcome(kv: &dyn KvStore, key: &str) -> Option<CommitOutcome> {
    let raw = kv.get(key).await.ok().flatten()?;
    serde_json::from_str(&raw).ok()
}

async fn store_cached_outcome(kv: &dyn KvStore, key: &str, outcome: &CommitOutcome) {
    let Ok(body) = serde_json::to_string(outcome) else { return };
    if let Err(e) = kv.setex(key, COMMIT_IDEMPOTENCY_TTL_SECONDS, &body).await {
        tracing::warn!(key, error = %e, "failed to persist commit idempotency cache entry");
    }
}

/// Acquires the per-slot advisory lock, retrying with linear backoff.
/// Fails closed: unlike the webhook's rate limiters, this lock is the
/// double-booking guarantee itself, so a KV error or exhausted retries
/// surface as `CommitError::LockTimeout` instead of letting the commit
/// proceed unsynchronized.
async fn acquire_slot_lock(kv: &dyn KvStore, key: &str) -> Result<(), CommitError> {
    for attempt in 0..MAX_LOCK_RETRIES {
        match kv.set_nx(key, LOCK_TTL_SECONDS, "1").await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                let backoff = LOCK_RETRY_BASE_DELAY_MS * (attempt as u64 + 1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "slot lock store unavailable, failing closed");
                return Err(CommitError::LockTimeout(key.to_string()));
            }
        }
    }
    Err(CommitError::LockTimeout(key.to_string()))
}

async fn release_slot_lock(kv: &dyn KvStore, key: &str) {
    if let Err(e) = kv.delete(key).await {
        tracing::warn!(key, error = %e, "failed to release slot lock");
    }
}

fn gkey_for(shop_id: i64, date: NaiveDate, start_time: NaiveTime, reservation_id: i64) -> String {
    format!(
        "{}:{}:{}:{}",
        shop_id,
        date.format("%Y-%m-%d"),
        start_time.format("%H:%M"),
        reservation_id
    )
}

/// Converts the shop-local (date, start_time) into the UTC instant range
/// the calendar API wants, for the given service duration.
fn event_window(
    shop: &ShopConfig,
    date: NaiveDate,
    start_time: NaiveTime,
    duration_minutes: i64,
) -> Result<(String, String), CommitError> {
    let tz: chrono_tz::Tz = shop
        .tz
        .parse()
        .map_err(|_| CommitError::InvalidTimezone(shop.tz.clone()))?;
    let naive_start = date.and_time(start_time);
    let local_start = tz
        .from_local_datetime(&naive_start)
        .single()
        .ok_or_else(|| CommitError::InvalidTimezone(shop.tz.clone()))?;
    let utc_start = local_start.with_timezone(&chrono::Utc);
    let utc_end = utc_start + chrono::Duration::minutes(duration_minutes);
    Ok((utc_start.to_rfc3339(), utc_end.to_rfc3339()))
}

/// Picks the first professional (by `display_order`) with no confirmed
/// reservation overlapping the candidate slot, or `None` if they're all
/// busy. Used when staff selection is enabled but not required and the
/// caller didn't name a professional.
fn pick_any_available(
    professionals: &[Professional],
    existing: &[Reservation],
    start_min: i64,
    duration_minutes: i64,
) -> Option<i64> {
    let mut ordered: Vec<&Professional> = professionals.iter().filter(|p| p.active).collect();
    ordered.sort_by_key(|p| p.display_order);
    ordered.into_iter().find_map(|p| {
        let pid = p.id?;
        let busy = existing
            .iter()
            .any(|r| r.professional_id == Some(pid) && r.overlaps(start_min, duration_minutes));
        (!busy).then_some(pid)
    })
}

/// Runs the full commit: idempotency replay, then (if no cached outcome) the
/// slot-locked capacity check and insert, auto-assigning a professional
/// first if the shop allows it, then a best-effort calendar publish.
/// `capacity` is `shop.num_staff` for the unassigned path, or 1 once a
/// professional is attached (a professional only has one chair).
/// `professionals` is only consulted for the auto-assign path and may be
/// empty when staff selection isn't in play.
pub async fn commit_reservation<C>(
    db: &SqlReservationRepository,
    kv: &dyn KvStore,
    calendar: &C,
    shop: &ShopConfig,
    capacity: i64,
    professionals: &[Professional],
    req: CommitRequest,
) -> Result<CommitOutcome, CommitError>
where
    C: CalendarService<Error = BoxedError>,
{
    let idem_key = commit_idempotency_key(shop.id, req.date, req.start_time, req.service_id, &req.customer_phone);
    if let Some(cached) = load_cached_outcome(kv, &idem_key).await {
        return Ok(cached);
    }

    let lock_key = slot_lock_key(shop.id, req.date, req.start_time);
    acquire_slot_lock(kv, &lock_key).await?;
    let result = commit_locked(db, calendar, shop, capacity, professionals, req).await;
    release_slot_lock(kv, &lock_key).await;

    let outcome = result?;
    store_cached_outcome(kv, &idem_key, &outcome).await;
    Ok(outcome)
}

async fn commit_locked<C>(
    db: &SqlReservationRepository,
    calendar: &C,
    shop: &ShopConfig,
    capacity: i64,
    professionals: &[Professional],
    mut req: CommitRequest,
) -> Result<CommitOutcome, CommitError>
where
    C: CalendarService<Error = BoxedError>,
{
    let date_str = req.date.format("%Y-%m-%d").to_string();
    let start_min = start_minutes(req.start_time);

    let mut tx = db.db_client().begin().await?;
    let existing: Vec<Reservation> = db
        .find_confirmed_by_shop_date_for_update(&mut tx, shop.id, &date_str, db.db_client().supports_row_locks())
        .await?;

    if shop.enable_staff_selection
        && !shop.staff_selection_required
        && req.professional_id.is_none()
    {
        req.professional_id =
            pick_any_available(professionals, &existing, start_min, req.duration_minutes);
    }

    let (overlapping, effective_capacity) = match req.professional_id {
        Some(pid) => {
            let count = existing
                .iter()
                .filter(|r| r.professional_id == Some(pid) && r.overlaps(start_min, req.duration_minutes))
                .count() as i64;
            (count, 1)
        }
        None => {
            let count = existing
                .iter()
                .filter(|r| r.overlaps(start_min, req.duration_minutes))
                .count() as i64;
            (count, capacity)
        }
    };
    if overlapping >= effective_capacity {
        tx.rollback().await.map_err(|e| DbError::TransactionError(e.to_string()))?;
        return Ok(CommitOutcome::NoSlot);
    }

    let start_str = req.start_time.format("%H:%M:%S").to_string();
    let reservation_id = match db
        .insert_confirmed_tx(
            &mut tx,
            shop.id,
            req.service_id,
            req.professional_id,
            &req.customer_name,
            &req.customer_phone,
            &date_str,
            &start_str,
            req.duration_minutes,
        )
        .await
    {
        Ok(id) => id,
        Err(e) if e.is_unique_violation() => {
            let _ = tx.rollback().await;
            return Ok(CommitOutcome::NoSlot);
        }
        Err(e) => {
            let _ = tx.rollback().await;
            return Err(e.into());
        }
    };

    tx.commit().await.map_err(|e| DbError::TransactionError(e.to_string()))?;

    let gkey = gkey_for(shop.id, req.date, req.start_time, reservation_id);
    let event_id = match event_window(shop, req.date, req.start_time, req.duration_minutes) {
        Ok((start_time, end_time)) => {
            match calendar
                .create_or_patch_event(
                    &shop.calendar_id,
                    CalendarEvent {
                        start_time,
                        end_time,
                        summary: req.summary,
                        description: req.description,
                        gkey,
                    },
                )
                .await
            {
                Ok(result) => {
                    if let Some(event_id) = &result.event_id {
                        if let Err(e) = db.set_external_event_id(reservation_id, event_id).await {
                            tracing::warn!(reservation_id, error = %e, "failed to persist external_event_id");
                        }
                    }
                    result.event_id
                }
                Err(e) => {
                    tracing::warn!(reservation_id, error = %e, "calendar publish failed, reservation stays confirmed");
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!(reservation_id, error = %e, "could not build calendar event window");
            None
        }
    };

    Ok(CommitOutcome::Committed {
        reservation_id,
        event_id,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    AlreadyCancelled,
}

/// Cancels a reservation and, best-effort, marks its calendar event
/// cancelled. A reservation with no `external_event_id` (calendar publish
/// never succeeded) is cancelled with no calendar call at all.
pub async fn cancel_reservation<C>(
    db: &SqlReservationRepository,
    calendar: &C,
    shop: &ShopConfig,
    reservation_id: i64,
) -> Result<CancelOutcome, CommitError>
where
    C: CalendarService<Error = BoxedError>,
{
    let Some(reservation) = db.find_by_id(reservation_id).await? else {
        return Ok(CancelOutcome::NotFound);
    };
    if reservation.status == pelu_db::models::ReservationStatus::Cancelled {
        return Ok(CancelOutcome::AlreadyCancelled);
    }

    let changed = db.mark_cancelled(reservation_id).await?;
    if !changed {
        return Ok(CancelOutcome::AlreadyCancelled);
    }

    if let Some(event_id) = reservation.external_event_id {
        if let Err(e) = calendar.mark_event_cancelled(&shop.calendar_id, &event_id).await {
            tracing::warn!(reservation_id, error = %e, "failed to mark calendar event cancelled");
        }
    }

    Ok(CancelOutcome::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gkey_is_deterministic_per_reservation() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
        let time = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(gkey_for(1, date, time, 42), "1:2025-09-20:10:00:42");
    }

    #[test]
    fn start_minutes_converts_correctly() {
        let time = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        assert_eq!(start_minutes(time), 870);
    }

    #[test]
    fn slot_lock_key_is_stable_per_shop_date_minute() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
        let time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert_eq!(slot_lock_key(7, date, time), "slot:7:2025-09-20:630");
    }

    #[test]
    fn commit_idempotency_key_includes_all_dedup_fields() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 20).unwrap();
        let time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            commit_idempotency_key(7, date, time, 3, "600111222"),
            "idemp:book_confirm:7:2025-09-20:10:30:3:600111222"
        );
    }

    #[tokio::test]
    async fn slot_lock_blocks_concurrent_holder_until_released() {
        let kv = pelu_kv::MemoryKv::new();
        acquire_slot_lock(&kv, "slot:1:2025-09-20:600").await.unwrap();
        assert!(!kv.set_nx("slot:1:2025-09-20:600", 10, "1").await.unwrap());
        release_slot_lock(&kv, "slot:1:2025-09-20:600").await;
        assert!(kv.set_nx("slot:1:2025-09-20:600", 10, "1").await.unwrap());
    }

    #[tokio::test]
    async fn cached_outcome_roundtrips_through_kv() {
        let kv = pelu_kv::MemoryKv::new();
        let outcome = CommitOutcome::Committed { reservation_id: 5, event_id: Some("evt".to_string()) };
        store_cached_outcome(&kv, "idemp:x", &outcome).await;
        assert_eq!(load_cached_outcome(&kv, "idemp:x").await, Some(outcome));
    }

    fn professional(id: i64, display_order: i64) -> Professional {
        Professional {
            id: Some(id),
            shop_id: 1,
            name: format!("prof-{id}"),
            active: true,
            display_order,
        }
    }

    fn reservation_for(professional_id: i64, start_time: &str) -> Reservation {
        Reservation {
            id: Some(99),
            shop_id: 1,
            service_id: 1,
            professional_id: Some(professional_id),
            customer_name: "A".to_string(),
            customer_phone: "600".to_string(),
            date: "2025-09-20".to_string(),
            start_time: start_time.to_string(),
            duration_minutes: 30,
            status: pelu_db::models::ReservationStatus::Confirmed,
            external_event_id: None,
        }
    }

    #[test]
    fn pick_any_available_skips_busy_professionals_in_display_order() {
        let professionals = vec![professional(1, 0), professional(2, 1)];
        let existing = vec![reservation_for(1, "10:00:00")];
        let picked = pick_any_available(&professionals, &existing, 600, 30);
        assert_eq!(picked, Some(2));
    }

    #[test]
    fn pick_any_available_returns_none_when_all_busy() {
        let professionals = vec![professional(1, 0)];
        let existing = vec![reservation_for(1, "10:00:00")];
        let picked = pick_any_available(&professionals, &existing, 600, 30);
        assert_eq!(picked, None);
    }
}
