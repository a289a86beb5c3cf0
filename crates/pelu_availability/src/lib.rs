//! Pure slot computation: working hours, lead-time clipping, and capacity
//! counting. No I/O — callers supply the day's confirmed reservations and
//! calendar busy intervals; this crate only does the arithmetic.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use pelu_config::ShopConfig;
use pelu_db::models::Reservation;

/// A candidate start time, already clipped to working hours and lead time,
/// not yet checked against capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotMinutes(pub i64);

impl SlotMinutes {
    pub fn to_hhmm(self) -> String {
        let h = self.0 / 60;
        let m = self.0 % 60;
        format!("{:02}:{:02}", h, m)
    }
}

const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

fn parse_range(range: &str) -> Option<(i64, i64)> {
    let (a, b) = range.split_once('-')?;
    Some((parse_hhmm(a.trim())?, parse_hhmm(b.trim())?))
}

fn parse_hhmm(s: &str) -> Option<i64> {
    let (h, m) = s.split_once(':')?;
    let h: i64 = h.trim().parse().ok()?;
    let m: i64 = m.trim().parse().ok()?;
    Some(h * 60 + m)
}

/// Working-hour ranges (in minutes since midnight) for `date`, honouring
/// closed weekdays/dates/recurring overrides before the per-weekday map. A
/// weekday absent from `shop.working_hours` is closed — there is no
/// implicit "open all day" default.
fn ranges_for_date(shop: &ShopConfig, date: NaiveDate) -> Vec<(i64, i64)> {
    if shop.closed_dates.contains(&date.format("%Y-%m-%d").to_string()) {
        return Vec::new();
    }
    if shop.closed_recurring.contains(&date.format("%m-%d").to_string()) {
        return Vec::new();
    }
    let weekday = date.weekday().num_days_from_monday() as u8;
    if shop.closed_weekdays.contains(&weekday) {
        return Vec::new();
    }

    let key = WEEKDAY_KEYS[weekday as usize];
    let Some(ranges) = shop.working_hours.get(key) else {
        return Vec::new();
    };

    ranges.iter().filter_map(|r| parse_range(r)).collect()
}

/// The earliest minute-of-day bookable on `date`, or `None` if there is no
/// lead-time restriction in effect (any day other than today).
fn lead_time_cutoff(shop: &ShopConfig, date: NaiveDate, now: DateTime<chrono_tz::Tz>) -> Option<i64> {
    if date == now.date_naive() {
        Some(now.hour() as i64 * 60 + now.minute() as i64 + shop.min_lead_minutes)
    } else {
        None
    }
}

/// Whether `date` is past the shop's booking horizon.
fn beyond_max_lead(shop: &ShopConfig, date: NaiveDate, now: DateTime<chrono_tz::Tz>) -> bool {
    date > now.date_naive() + chrono::Duration::days(shop.max_lead_days)
}

fn overlaps(existing: &[&Reservation], start_minutes: i64, duration_minutes: i64) -> usize {
    existing
        .iter()
        .filter(|r| r.overlaps(start_minutes, duration_minutes))
        .count()
}

/// Computes available start times (`HH:MM`) shop-wide: a slot is free if
/// fewer than `shop.num_staff` confirmed reservations overlap it.
pub fn available_slots(
    shop: &ShopConfig,
    date: NaiveDate,
    service_duration_minutes: i64,
    now: DateTime<Utc>,
    confirmed_today: &[Reservation],
) -> Vec<String> {
    let Ok(tz) = shop.tz.parse::<chrono_tz::Tz>() else {
        tracing::warn!(shop_id = shop.id, tz = %shop.tz, "unparseable shop timezone");
        return Vec::new();
    };
    let now_local = now.with_timezone(&tz);

    if beyond_max_lead(shop, date, now_local) {
        return Vec::new();
    }
    let cutoff = lead_time_cutoff(shop, date, now_local);

    let capacity = shop.num_staff as i64;
    let step = shop.slot_step_minutes as i64;
    let existing: Vec<&Reservation> = confirmed_today.iter().collect();

    let mut slots = Vec::new();
    for (start, end) in ranges_for_date(shop, date) {
        let mut cur = start;
        while cur + service_duration_minutes <= end {
            let skip_lead = cutoff.is_some_and(|c| cur < c);
            if !skip_lead && (overlaps(&existing, cur, service_duration_minutes) as i64) < capacity
            {
                slots.push(SlotMinutes(cur).to_hhmm());
            }
            cur += step;
        }
    }
    slots
}

/// Computes available start times for a specific professional: the slot
/// must also be free of any calendar busy interval, and free of that
/// professional's own confirmed reservations (capacity is always 1 per
/// professional).
pub fn available_slots_for_professional(
    shop: &ShopConfig,
    date: NaiveDate,
    service_duration_minutes: i64,
    now: DateTime<Utc>,
    busy_calendar_minutes: &[(i64, i64)],
    professional_reservations: &[Reservation],
) -> Vec<String> {
    let Ok(tz) = shop.tz.parse::<chrono_tz::Tz>() else {
        tracing::warn!(shop_id = shop.id, tz = %shop.tz, "unparseable shop timezone");
        return Vec::new();
    };
    let now_local = now.with_timezone(&tz);

    if beyond_max_lead(shop, date, now_local) {
        return Vec::new();
    }
    let cutoff = lead_time_cutoff(shop, date, now_local);
    let step = shop.slot_step_minutes as i64;
    let existing: Vec<&Reservation> = professional_reservations.iter().collect();

    let mut slots = Vec::new();
    for (start, end) in ranges_for_date(shop, date) {
        let mut cur = start;
        while cur + service_duration_minutes <= end {
            let skip_lead = cutoff.is_some_and(|c| cur < c);
            let blocked_by_calendar = busy_calendar_minutes
                .iter()
                .any(|(b_start, b_end)| cur < *b_end && *b_start < cur + service_duration_minutes);
            if !skip_lead
                && !blocked_by_calendar
                && overlaps(&existing, cur, service_duration_minutes) == 0
            {
                slots.push(SlotMinutes(cur).to_hhmm());
            }
            cur += step;
        }
    }
    slots
}

/// Splits a flat slot list into fixed-size pages for the WhatsApp list
/// message's 10-row limit, used by the dispatcher's pagination resend.
pub fn paginate<'a>(slots: &'a [String], page_size: usize) -> Vec<&'a [String]> {
    if page_size == 0 {
        return vec![slots];
    }
    slots.chunks(page_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use std::collections::BTreeMap;

    fn shop() -> ShopConfig {
        let mut working_hours = BTreeMap::new();
        working_hours.insert("mon".to_string(), vec!["09:00-11:00".to_string()]);
        let working_hours = pelu_config::WorkingHours::from(working_hours);
        ShopConfig {
            id: 1,
            name: "Test".to_string(),
            business_type: "hair_salon".to_string(),
            country_code: "ES".to_string(),
            tz: "Europe/Madrid".to_string(),
            currency_code: "EUR".to_string(),
            num_staff: 1,
            slot_step_minutes: 30,
            min_lead_minutes: 60,
            max_lead_days: 150,
            working_hours,
            closed_weekdays: Default::default(),
            closed_dates: Default::default(),
            closed_recurring: Default::default(),
            wa_phone_number_id: "PH_1".to_string(),
            wa_token: "tok".to_string(),
            calendar_id: "cal".to_string(),
            api_key: "key".to_string(),
            enable_staff_selection: false,
            staff_selection_required: false,
        }
    }

    #[test]
    fn closed_weekday_has_no_slots() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 16).unwrap(); // Tuesday, absent from map
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        let slots = available_slots(&shop(), date, 30, now, &[]);
        assert!(slots.is_empty());
    }

    #[test]
    fn open_weekday_produces_stepped_slots() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap(); // Monday
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        let slots = available_slots(&shop(), date, 30, now, &[]);
        assert_eq!(slots, vec!["09:00", "09:30", "10:00", "10:30"]);
    }

    #[test]
    fn capacity_exhausted_removes_slot() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        let existing = vec![Reservation {
            id: Some(1),
            shop_id: 1,
            service_id: 1,
            professional_id: None,
            customer_name: "A".to_string(),
            customer_phone: "600".to_string(),
            date: "2025-09-15".to_string(),
            start_time: "09:00:00".to_string(),
            duration_minutes: 30,
            status: pelu_db::models::ReservationStatus::Confirmed,
            external_event_id: None,
        }];
        let slots = available_slots(&shop(), date, 30, now, &existing);
        assert!(!slots.contains(&"09:00".to_string()));
        assert!(slots.contains(&"09:30".to_string()));
    }

    #[test]
    fn closed_date_override_wins_over_weekly_hours() {
        let mut s = shop();
        s.closed_dates.insert("2025-09-15".to_string());
        let date = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        assert!(available_slots(&s, date, 30, now, &[]).is_empty());
    }

    #[test]
    fn beyond_max_lead_days_has_no_slots() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        assert!(available_slots(&shop(), date, 30, now, &[]).is_empty());
    }
}
