//! Date normalization to ISO `YYYY-MM-DD`.

use chrono::NaiveDate;

/// Formats tried in order. Two-digit years go first because `%Y` would read
/// `24` as year 24. Day-first layouts come before month-first ones, so
/// `03/04/2024` reads as 3 April.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%y", "%d-%m-%y", "%d.%m.%y", "%d %b %y", "%d-%b-%y",
    "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y",
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d",
    "%d %b %Y", "%d %B %Y", "%d-%b-%Y", "%d-%B-%Y",
    "%b %d %Y", "%B %d %Y",
    "%m/%d/%Y", "%m-%d-%Y",
];

/// Parse a date written in any common layout.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let cleaned = clean_date(s);
    if cleaned.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// ISO form of a date, if it parses.
pub fn normalize_date(s: &str) -> Option<String> {
    parse_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Drop ordinal suffixes, commas and trailing dots on month abbreviations.
fn clean_date(s: &str) -> String {
    s.replace(',', " ")
        .split_whitespace()
        .map(|token| {
            let token = token.trim_end_matches('.');
            let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            let suffix = &token[digits.len()..];
            if !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
                && matches!(suffix.to_lowercase().as_str(), "st" | "nd" | "rd" | "th")
            {
                digits.to_string()
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_common_layouts() {
        assert_eq!(normalize_date("12/01/2024").as_deref(), Some("2024-01-12"));
        assert_eq!(normalize_date("2024-01-12").as_deref(), Some("2024-01-12"));
        assert_eq!(normalize_date("12 Jan 2024").as_deref(), Some("2024-01-12"));
        assert_eq!(normalize_date("12 January 2024").as_deref(), Some("2024-01-12"));
        assert_eq!(normalize_date("January 12th, 2024").as_deref(), Some("2024-01-12"));
        assert_eq!(normalize_date("15.01.24").as_deref(), Some("2024-01-15"));
    }

    #[test]
    fn test_month_first_fallback() {
        assert_eq!(normalize_date("01/31/2024").as_deref(), Some("2024-01-31"));
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(normalize_date("31/31/2024"), None);
        assert_eq!(normalize_date("soon"), None);
        assert_eq!(normalize_date(""), None);
    }
}
