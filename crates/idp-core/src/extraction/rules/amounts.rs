//! Money amount parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a formatted amount (`AED 1,250.00`, `1.234,56`, `$99`) into a decimal.
///
/// Currency codes and symbols are ignored. When both `,` and `.` appear, the
/// one that comes last is the decimal separator. A separator that repeats, or
/// one followed by exactly three digits, is a thousands separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let negative = s.trim_start().starts_with('-') || (s.contains('(') && s.contains(')'));

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == ',' || c == '.');

    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => single_separator(cleaned, ','),
        (None, Some(_)) => single_separator(cleaned, '.'),
        (None, None) => cleaned.to_string(),
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

fn single_separator(s: &str, sep: char) -> String {
    let groups: Vec<&str> = s.split(sep).collect();
    let thousands = groups.len() > 2
        || (groups[1..].iter().all(|g| g.len() == 3) && groups[0].len() <= 3);

    if thousands {
        groups.concat()
    } else {
        s.replace(sep, ".")
    }
}

/// Canonical plain-decimal form of an amount, if it parses.
pub fn normalize_amount(s: &str) -> Option<String> {
    parse_amount(s).map(|d| d.normalize().to_string())
}
