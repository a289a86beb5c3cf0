//! Locale-aware date parsing (day-month-year order) plus the four business
//! checks the engine runs before accepting a candidate date.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use pelu_config::ShopConfig;

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
];

fn next_weekday_on_or_after(today: NaiveDate, target: Weekday) -> NaiveDate {
    let mut d = today;
    loop {
        if d.weekday() == target {
            return d;
        }
        d += Duration::days(1);
    }
}

/// `text` is already lowercased/accent-stripped. `today` is "today" in the
/// shop's own timezone.
pub fn parse_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();
    if text == "hoy" {
        return Some(today);
    }
    if text == "manana" {
        return Some(today + Duration::days(1));
    }
    if text == "pasado manana" {
        return Some(today + Duration::days(2));
    }
    for (name, weekday) in WEEKDAYS {
        if text == *name || text == format!("el {name}") {
            let candidate = next_weekday_on_or_after(today + Duration::days(1), *weekday);
            return Some(candidate);
        }
    }

    for sep in ['/', '-'] {
        let parts: Vec<&str> = text.split(sep).collect();
        if parts.len() == 3 {
            let day: u32 = parts[0].parse().ok()?;
            let month: u32 = parts[1].parse().ok()?;
            let year: i32 = parts[2].parse().ok()?;
            let year = if year < 100 { 2000 + year } else { year };
            return NaiveDate::from_ymd_opt(year, month, day);
        }
        if parts.len() == 2 {
            let day: u32 = parts[0].parse().ok()?;
            let month: u32 = parts[1].parse().ok()?;
            let mut candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if candidate < today {
                candidate = NaiveDate::from_ymd_opt(today.year() + 1, month, day)?;
            }
            return Some(candidate);
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRejection {
    InPast,
    ClosedWeekday,
    ClosedDate,
    BeyondLeadWindow,
}

/// The four business checks, applied in order — the first failure wins.
pub fn check_date(shop: &ShopConfig, date: NaiveDate, today: NaiveDate) -> Result<(), DateRejection> {
    if date < today {
        return Err(DateRejection::InPast);
    }
    let weekday = date.weekday().num_days_from_monday() as u8;
    if shop.closed_weekdays.contains(&weekday) {
        return Err(DateRejection::ClosedWeekday);
    }
    if shop.closed_dates.contains(&date.format("%Y-%m-%d").to_string())
        || shop.closed_recurring.contains(&date.format("%m-%d").to_string())
    {
        return Err(DateRejection::ClosedDate);
    }
    if date > today + Duration::days(shop.max_lead_days) {
        return Err(DateRejection::BeyondLeadWindow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_words() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        assert_eq!(parse_date("hoy", today), Some(today));
        assert_eq!(parse_date("manana", today), Some(NaiveDate::from_ymd_opt(2025, 9, 19).unwrap()));
    }

    #[test]
    fn parses_dd_mm_yyyy() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        assert_eq!(parse_date("20/09/2025", today), Some(NaiveDate::from_ymd_opt(2025, 9, 20).unwrap()));
    }

    #[test]
    fn parses_weekday_name_rolls_forward() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap(); // Thursday
        let parsed = parse_date("viernes", today).unwrap();
        assert_eq!(parsed.weekday(), Weekday::Fri);
        assert!(parsed > today);
    }

    #[test]
    fn rejects_past_date() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        let shop = test_shop();
        let past = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(check_date(&shop, past, today), Err(DateRejection::InPast));
    }

    #[test]
    fn rejects_beyond_lead_window() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 18).unwrap();
        let shop = test_shop();
        let far = today + Duration::days(200);
        assert_eq!(check_date(&shop, far, today), Err(DateRejection::BeyondLeadWindow));
    }

    fn test_shop() -> ShopConfig {
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
            working_hours: Default::default(),
            closed_weekdays: Default::default(),
            closed_dates: Default::default(),
            closed_recurring: Default::default(),
            wa_phone_number_id: "PH".to_string(),
            wa_token: "tok".to_string(),
            calendar_id: "cal".to_string(),
            api_key: "key".to_string(),
            enable_staff_selection: false,
            staff_selection_required: false,
        }
    }
}
