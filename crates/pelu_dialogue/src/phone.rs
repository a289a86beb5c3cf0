//! Phone normalisation to E.164, using the shop's `country_code` as the
//! default region for numbers given without a leading `+`.

use phonenumber::country::Id;
use std::str::FromStr;

pub fn parse_phone(text: &str, country_code: &str) -> Option<String> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let region = Id::from_str(country_code).ok();
    let parsed = phonenumber::parse(region, &cleaned).ok()?;
    if !phonenumber::is_valid(&parsed) {
        return None;
    }
    Some(parsed.format().mode(phonenumber::Mode::E164).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_number_with_explicit_plus() {
        assert_eq!(parse_phone("+34600111222", "ES"), Some("+34600111222".to_string()));
    }

    #[test]
    fn parses_national_number_with_region_default() {
        let parsed = parse_phone("600111222", "ES");
        assert_eq!(parsed, Some("+34600111222".to_string()));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_phone("not a phone", "ES"), None);
    }
}
