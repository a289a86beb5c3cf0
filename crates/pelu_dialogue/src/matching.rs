//! Name-matching pipeline for service/professional selection: numeric
//! ordinal, list-reply identifier, or free text matched exact -> prefix ->
//! substring against the normalized candidate names.

use crate::normalize::normalize_for_matching;

/// `1..N` ordinal into a list, one-based as shown to the user.
pub fn parse_ordinal(text: &str) -> Option<usize> {
    text.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

/// Parses a list-reply id of the form `"<prefix>_P<page>_<index>"`, e.g.
/// `SERV_P0_2`. Returns `(page, index)`, both zero-based.
pub fn parse_page_index_reply(text: &str, prefix: &str) -> Option<(usize, usize)> {
    let rest = text.strip_prefix(prefix)?.strip_prefix("_P")?;
    let (page_str, index_str) = rest.split_once('_')?;
    Some((page_str.parse().ok()?, index_str.parse().ok()?))
}

/// Exact -> prefix -> substring match of `needle` against `candidates`
/// (already normalized), returning the first matching index at the
/// strongest precedence level that has any hit at all.
pub fn match_name(candidates: &[String], needle: &str) -> Option<usize> {
    let needle = normalize_for_matching(needle);
    if needle.is_empty() {
        return None;
    }
    if let Some(i) = candidates.iter().position(|c| *c == needle) {
        return Some(i);
    }
    if let Some(i) = candidates.iter().position(|c| c.starts_with(&needle)) {
        return Some(i);
    }
    candidates.iter().position(|c| c.contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_parses_positive_integers_only() {
        assert_eq!(parse_ordinal("2"), Some(2));
        assert_eq!(parse_ordinal("0"), None);
        assert_eq!(parse_ordinal("dos"), None);
    }

    #[test]
    fn page_index_reply_parses() {
        assert_eq!(parse_page_index_reply("SERV_P0_2", "SERV"), Some((0, 2)));
        assert_eq!(parse_page_index_reply("HORA_P1_0", "HORA"), Some((1, 0)));
        assert_eq!(parse_page_index_reply("SERV_P0_2", "HORA"), None);
    }

    #[test]
    fn exact_match_wins_over_prefix_and_substring() {
        let names: Vec<String> = vec!["corte".to_string(), "corte y barba".to_string()];
        assert_eq!(match_name(&names, "corte"), Some(0));
    }

    #[test]
    fn falls_back_to_substring() {
        let names: Vec<String> = vec!["corte y barba".to_string(), "tinte".to_string()];
        assert_eq!(match_name(&names, "barba"), Some(0));
    }

    #[test]
    fn no_match_returns_none() {
        let names: Vec<String> = vec!["corte".to_string()];
        assert_eq!(match_name(&names, "manicura"), None);
    }
}
