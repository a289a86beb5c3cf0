//! Spanish-ish free-text time parsing. Handles `HH:MM`, bare hours, the
//! `"y cuarto/media/veinte"` and `"menos cuarto"` constructions, and an
//! explicit am/pm marker; flags the 1..12-without-marker case as ambiguous
//! for the engine to disambiguate against the day's free slots.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmPmClue {
    Am,
    Pm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTime {
    pub h: u32,
    pub m: u32,
    pub ampm_clue: Option<AmPmClue>,
    pub ambiguous: bool,
}

fn detect_ampm(text: &str) -> Option<AmPmClue> {
    if text.contains("pm") || text.contains("tarde") || text.contains("noche") {
        Some(AmPmClue::Pm)
    } else if text.contains("am") || text.contains("manana") || text.contains("madrugada") {
        Some(AmPmClue::Am)
    } else {
        None
    }
}

fn strip_ampm_words(text: &str) -> String {
    text.replace("pm", "")
        .replace("am", "")
        .replace("de la tarde", "")
        .replace("de la manana", "")
        .replace("tarde", "")
        .replace("manana", "")
        .replace("noche", "")
        .replace("madrugada", "")
        .trim()
        .to_string()
}

/// `text` must already be lowercased/accent-stripped (see `normalize`).
pub fn normalize_time(text: &str) -> Option<ParsedTime> {
    let ampm_clue = detect_ampm(text);
    let mut core = strip_ampm_words(text);
    core = core.replace("a las", "").replace("las", "").replace('h', ":00");
    let core = core.trim();

    let (mut h, mut m) = if let Some((h_str, m_str)) = core.split_once(':') {
        (h_str.trim().parse::<u32>().ok()?, m_str.trim().parse::<u32>().ok().unwrap_or(0))
    } else if core.contains("y cuarto") {
        (core.replace("y cuarto", "").trim().parse::<u32>().ok()?, 15)
    } else if core.contains("y media") {
        (core.replace("y media", "").trim().parse::<u32>().ok()?, 30)
    } else if core.contains("y veinte") {
        (core.replace("y veinte", "").trim().parse::<u32>().ok()?, 20)
    } else if core.contains("menos cuarto") {
        let base = core.replace("menos cuarto", "").trim().parse::<u32>().ok()?;
        let prev = if base == 0 { 23 } else { base - 1 };
        (prev, 45)
    } else {
        (core.parse::<u32>().ok()?, 0)
    };

    if h == 24 {
        h = 0;
    }
    if h > 23 || m > 59 {
        return None;
    }

    let ambiguous = ampm_clue.is_none() && (1..=12).contains(&h);
    Some(ParsedTime { h, m, ampm_clue, ambiguous })
}

/// Given an ambiguous 1..12 hour, the two candidate 24h hours (am, pm).
pub fn am_pm_candidates(h: u32) -> (u32, u32) {
    let am = if h == 12 { 0 } else { h };
    let pm = if h == 12 { 12 } else { h + 12 };
    (am, pm)
}

/// Resolves a parsed (possibly ambiguous, marker-free) time into the 24h
/// hour it should represent, applying the clue when present.
pub fn resolved_hour(parsed: &ParsedTime) -> u32 {
    match parsed.ampm_clue {
        Some(AmPmClue::Am) => am_pm_candidates(parsed.h).0,
        Some(AmPmClue::Pm) => am_pm_candidates(parsed.h).1,
        None => parsed.h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_hhmm() {
        let p = normalize_time("17:30").unwrap();
        assert_eq!((p.h, p.m), (17, 30));
        assert!(!p.ambiguous);
    }

    #[test]
    fn parses_a_las_with_bare_hour_as_ambiguous() {
        let p = normalize_time("a las 5").unwrap();
        assert_eq!((p.h, p.m), (5, 0));
        assert!(p.ambiguous);
    }

    #[test]
    fn explicit_tarde_resolves_unambiguously_to_pm() {
        let p = normalize_time("5 de la tarde").unwrap();
        assert!(!p.ambiguous);
        assert_eq!(resolved_hour(&p), 17);
    }

    #[test]
    fn y_cuarto_adds_fifteen_minutes() {
        let p = normalize_time("9 y cuarto").unwrap();
        assert_eq!((p.h, p.m), (9, 15));
    }

    #[test]
    fn menos_cuarto_subtracts_an_hour_and_sets_45() {
        let p = normalize_time("10 menos cuarto").unwrap();
        assert_eq!((p.h, p.m), (9, 45));
    }

    #[test]
    fn twenty_four_hour_value_is_unambiguous() {
        let p = normalize_time("18:00").unwrap();
        assert!(!p.ambiguous);
    }

    #[test]
    fn am_pm_candidates_noon_special_case() {
        assert_eq!(am_pm_candidates(12), (0, 12));
        assert_eq!(am_pm_candidates(5), (5, 17));
    }
}
