//! Last-resort heuristics for sparse documents (ID cards, handwritten forms).

use tracing::trace;

use super::rules::patterns::{DATE_TOKEN, DMY_SLASH};
use super::rules::clean_value;
use crate::models::{FieldSet, FieldSource, FieldValue, TextBlock};

/// Keyword triggers for the proximity stage, checked in order per line.
const KEYWORD_TRIGGERS: &[(&str, &str)] = &[
    ("driver name", "driver_name"),
    ("mobile", "phone"),
    ("license", "license_number"),
];

/// Infer fields from the shape of individual text blocks.
///
/// A block of 8-12 digits is a license number (or a document number once the
/// license is taken), 10-15 digits a phone number, `DD/MM/YYYY` a date.
pub fn bbox_fields(blocks: &[TextBlock], fields: &FieldSet) -> FieldSet {
    let mut found = FieldSet::new();
    let taken = |name: &str, found: &FieldSet| fields.contains(name) || found.contains(name);

    for block in blocks {
        let text = block.text.trim();

        if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
            let len = text.len();
            let mut candidates: Vec<&str> = Vec::new();
            if (8..=12).contains(&len) {
                candidates.extend(["license_number", "document_number"]);
            }
            if (10..=15).contains(&len) {
                candidates.push("phone");
            }

            if let Some(name) = candidates.into_iter().find(|n| !taken(*n, &found)) {
                trace!("Bbox heuristic: {} digits -> {}", len, name);
                found.insert_if_absent(FieldValue::new(name, text, FieldSource::BboxHeuristic));
            }
            continue;
        }

        if !taken("date", &found) {
            if let Some(caps) = DMY_SLASH.captures(text) {
                found.insert_if_absent(FieldValue::new("date", &caps[1], FieldSource::BboxHeuristic));
            }
        }
    }

    found
}

/// Infer fields from trigger keywords and the text that follows them.
///
/// The value is the rest of the line after the keyword (and an optional
/// colon), or the next non-empty line when nothing follows.
pub fn keyword_fields(text: &str, fields: &FieldSet) -> FieldSet {
    let mut found = FieldSet::new();
    let lines: Vec<&str> = text.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_ascii_lowercase();

        for &(keyword, name) in KEYWORD_TRIGGERS {
            if fields.contains(name) || found.contains(name) {
                continue;
            }
            let Some(pos) = lower.find(keyword) else {
                continue;
            };

            let rest = line
                .get(pos + keyword.len()..)
                .unwrap_or("")
                .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '-');
            let value = if rest.trim().is_empty() {
                lines[i + 1..].iter().map(|l| l.trim()).find(|l| !l.is_empty()).unwrap_or("")
            } else {
                rest
            };

            let value = clean_value(value);
            if !value.is_empty() {
                trace!("Keyword heuristic: '{}' -> {}", keyword, name);
                found.insert_if_absent(FieldValue::new(name, value, FieldSource::KeywordHeuristic));
            }
        }

        if !fields.contains("date") && !found.contains("date") {
            if let Some(m) = DATE_TOKEN.find(line) {
                found.insert_if_absent(FieldValue::new("date", m.as_str().trim(), FieldSource::KeywordHeuristic));
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_digit_runs() {
        let blocks = vec![
            TextBlock::unlocated("12345678", 0.9),
            TextBlock::unlocated("87654321", 0.9),
            TextBlock::unlocated("0501234567", 0.9),
            TextBlock::unlocated("Issued 14/03/2023", 0.9),
        ];
        let found = bbox_fields(&blocks, &FieldSet::new());

        assert_eq!(found.value("license_number"), Some("12345678"));
        assert_eq!(found.value("document_number"), Some("87654321"));
        assert_eq!(found.value("phone"), Some("0501234567"));
        assert_eq!(found.value("date"), Some("14/03/2023"));
        assert!(found.iter().all(|f| f.confidence == 0.6));
    }

    #[test]
    fn test_existing_fields_are_skipped() {
        let mut existing = FieldSet::new();
        existing.insert_if_absent(FieldValue::new("license_number", "X1", FieldSource::ScopedPattern));

        let found = bbox_fields(&[TextBlock::unlocated("123456789", 0.9)], &existing);
        assert!(!found.contains("license_number"));
        assert_eq!(found.value("document_number"), Some("123456789"));
    }

    #[test]
    fn test_keyword_fields() {
        let text = "Driver Name: Sam Carter\nMobile\n\n050 555 1234\nLicense: DL-99812\nSeen on 3 March 2024";
        let found = keyword_fields(text, &FieldSet::new());

        assert_eq!(found.value("driver_name"), Some("Sam Carter"));
        assert_eq!(found.value("phone"), Some("050 555 1234"));
        assert_eq!(found.value("license_number"), Some("DL-99812"));
        assert_eq!(found.value("date"), Some("3 March 2024"));
        assert!(found.iter().all(|f| f.source == FieldSource::KeywordHeuristic));
    }
}
