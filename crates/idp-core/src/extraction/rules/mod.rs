//! Rule banks and value helpers shared by the cascade stages.

pub mod amounts;
pub mod dates;
pub mod doctypes;
pub mod patterns;

pub use amounts::{normalize_amount, parse_amount};
pub use dates::normalize_date;
pub use doctypes::{all_rules, rules_for, DocumentRules, FieldRule};
pub use patterns::{universal_rules, AMOUNT_FRAGMENT, DATE_FRAGMENT};

use regex::Regex;

/// Coarse value kind of a field, used for sanity checks and normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Email,
    Phone,
    Amount,
    Date,
    Identifier,
    Text,
}

impl FieldKind {
    /// Kind of a field, derived from its name.
    pub fn of(name: &str) -> Self {
        match name {
            "email" => FieldKind::Email,
            "phone" | "mobile" | "fax" => FieldKind::Phone,
            "total_amount" | "subtotal" | "tax_amount" | "discount" | "unit_price" | "amount"
            | "opening_balance" | "closing_balance" | "contract_value" => FieldKind::Amount,
            n if n == "date" || n.ends_with("_date") || n == "date_of_birth" => FieldKind::Date,
            n if n.ends_with("_number") || n.ends_with("_id") || n == "tax_id" || n == "iban"
                || n == "project_code" || n == "purchase_order" => FieldKind::Identifier,
            _ => FieldKind::Text,
        }
    }
}

/// Check that a candidate value is plausible for its field.
pub fn is_plausible(name: &str, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    match FieldKind::of(name) {
        FieldKind::Email => value.contains('@'),
        FieldKind::Phone => digit_count(value) >= 7,
        FieldKind::Amount | FieldKind::Date => has_digit(value),
        FieldKind::Identifier | FieldKind::Text => true,
    }
}

/// Run patterns in order and return the first match's first capture group
/// (or the whole match when the pattern has no group), trimmed.
pub fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let m = caps.get(1).or_else(|| caps.get(0))?;
        let value = clean_value(m.as_str());
        if value.is_empty() { None } else { Some(value) }
    })
}

/// Like [`first_capture`], but skips matches that fail the field's sanity check
/// and keeps scanning later matches of the same pattern.
pub fn first_plausible_capture(name: &str, patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern.captures_iter(text).find_map(|caps| {
            let m = caps.get(1).or_else(|| caps.get(0))?;
            let value = clean_value(m.as_str());
            is_plausible(name, &value).then_some(value)
        })
    })
}

/// Trim whitespace and dangling separators.
pub fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_end_matches([',', ';', ':', '|'])
        .trim()
        .to_string()
}

pub fn has_digit(value: &str) -> bool {
    value.chars().any(|c| c.is_ascii_digit())
}

pub fn digit_count(value: &str) -> usize {
    value.chars().filter(|c| c.is_ascii_digit()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kinds() {
        assert_eq!(FieldKind::of("email"), FieldKind::Email);
        assert_eq!(FieldKind::of("due_date"), FieldKind::Date);
        assert_eq!(FieldKind::of("total_amount"), FieldKind::Amount);
        assert_eq!(FieldKind::of("invoice_number"), FieldKind::Identifier);
        assert_eq!(FieldKind::of("vendor_name"), FieldKind::Text);
    }

    #[test]
    fn test_sanity_checks() {
        assert!(is_plausible("email", "billing@acme.example"));
        assert!(!is_plausible("email", "billing.acme.example"));
        assert!(is_plausible("phone", "+971 4 123 4567"));
        assert!(!is_plausible("phone", "12-34"));
        assert!(is_plausible("total_amount", "AED 1,250.00"));
        assert!(!is_plausible("total_amount", "AED"));
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("  1,250.00, "), "1,250.00");
        assert_eq!(clean_value("Acme LLC\r"), "Acme LLC");
    }
}
