//! Durable entities: shops are read-only from the core's perspective and
//! loaded from `AppConfig`; services, professionals and reservations live in
//! the relational store.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: Option<i64>,
    pub shop_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: Option<i64>,
    pub shop_id: i64,
    pub name: String,
    pub active: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cancelled" => ReservationStatus::Cancelled,
            _ => ReservationStatus::Confirmed,
        }
    }
}

/// The central ledger entry. `date`/`start_time` are stored as text
/// (`YYYY-MM-DD` / `HH:MM:SS`) rather than native date/time columns — the
/// `sqlx::Any` driver's `DateTime<Utc>` decode limitations (documented on
/// `SqlDeviceRegistrationRepository`) extend to `NaiveDate`/`NaiveTime` too,
/// so this crate keeps calendar fields as plain strings at the SQL boundary
/// and parses them in the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Option<i64>,
    pub shop_id: i64,
    pub service_id: i64,
    pub professional_id: Option<i64>,
    pub customer_name: String,
    pub customer_phone: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM:SS`.
    pub start_time: String,
    pub duration_minutes: i64,
    pub status: ReservationStatus,
    pub external_event_id: Option<String>,
}

impl Reservation {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }

    /// Minutes since midnight, for overlap math against `duration_minutes`.
    pub fn start_minutes(&self) -> Option<i64> {
        let mut parts = self.start_time.splitn(3, ':');
        let h: i64 = parts.next()?.parse().ok()?;
        let m: i64 = parts.next()?.parse().ok()?;
        Some(h * 60 + m)
    }

    pub fn overlaps(&self, other_start_minutes: i64, other_duration_minutes: i64) -> bool {
        let Some(start) = self.start_minutes() else {
            return false;
        };
        let end = start + self.duration_minutes;
        let other_end = other_start_minutes + other_duration_minutes;
        start < other_end && other_start_minutes < end
    }
}
