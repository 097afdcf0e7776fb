//! Extracted field values and the first-writer-wins field set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::document::clamp_unit;

/// Cascade stage that produced a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    LayoutModel,
    ScopedPattern,
    UniversalPattern,
    BboxHeuristic,
    KeywordHeuristic,
}

impl FieldSource {
    /// Tag used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSource::LayoutModel => "layout_model",
            FieldSource::ScopedPattern => "scoped_pattern",
            FieldSource::UniversalPattern => "universal_pattern",
            FieldSource::BboxHeuristic => "bbox_heuristic",
            FieldSource::KeywordHeuristic => "keyword_heuristic",
        }
    }

    /// Confidence assigned to fields from this stage.
    pub fn base_confidence(&self) -> f32 {
        match self {
            FieldSource::LayoutModel => 0.85,
            FieldSource::ScopedPattern => 0.9,
            FieldSource::UniversalPattern => 0.7,
            FieldSource::BboxHeuristic => 0.6,
            FieldSource::KeywordHeuristic => 0.5,
        }
    }
}

/// A single extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Field name (e.g. `invoice_number`).
    pub name: String,
    /// Raw extracted value.
    pub value: String,
    /// Field confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Stage that produced the value.
    pub source: FieldSource,
    /// Canonical form (ISO date, plain decimal) when the value could be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
}

impl FieldValue {
    /// Create a field with the source's base confidence.
    pub fn new(name: impl Into<String>, value: impl Into<String>, source: FieldSource) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            confidence: source.base_confidence(),
            source,
            normalized: None,
        }
    }

    /// Override the confidence (clamped to [0, 1]).
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }
}

/// Set of extracted fields holding at most one value per name.
///
/// The only way to add a field is [`FieldSet::insert_if_absent`], so a later
/// cascade stage can fill gaps but never overwrite an earlier stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSet {
    fields: BTreeMap<String, FieldValue>,
}

impl FieldSet {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field unless one with the same name exists.
    ///
    /// Returns `true` if the field was inserted. Empty values are rejected.
    pub fn insert_if_absent(&mut self, field: FieldValue) -> bool {
        if field.value.trim().is_empty() || self.fields.contains_key(&field.name) {
            return false;
        }
        self.fields.insert(field.name.clone(), field);
        true
    }

    /// Add every field of `other` that is not already present.
    ///
    /// Returns the number of fields added.
    pub fn absorb(&mut self, other: FieldSet) -> usize {
        other
            .fields
            .into_values()
            .filter(|f| self.insert_if_absent(f.clone()))
            .count()
    }

    /// Merge `other` keeping, per name, whichever value is longer.
    /// Equal lengths keep the existing value.
    pub fn merge_longer(&mut self, other: &FieldSet) {
        for (name, field) in &other.fields {
            match self.fields.get(name) {
                Some(existing) if existing.value.chars().count() >= field.value.chars().count() => {}
                _ => {
                    self.fields.insert(name.clone(), field.clone());
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(name)
    }

    /// Get the raw value of a field.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.values()
    }

    /// Field names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Flatten into a plain `name -> value` map.
    pub fn to_value_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

impl IntoIterator for FieldSet {
    type Item = FieldValue;
    type IntoIter = std::collections::btree_map::IntoValues<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_writer_wins() {
        let mut fields = FieldSet::new();
        assert!(fields.insert_if_absent(FieldValue::new("date", "12 Jan 2024", FieldSource::ScopedPattern)));
        assert!(!fields.insert_if_absent(FieldValue::new("date", "01/02/2024", FieldSource::UniversalPattern)));

        let date = fields.get("date").unwrap();
        assert_eq!(date.value, "12 Jan 2024");
        assert_eq!(date.source, FieldSource::ScopedPattern);
    }

    #[test]
    fn test_empty_values_rejected() {
        let mut fields = FieldSet::new();
        assert!(!fields.insert_if_absent(FieldValue::new("notes", "   ", FieldSource::UniversalPattern)));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_merge_longer() {
        let mut a = FieldSet::new();
        a.insert_if_absent(FieldValue::new("vendor_name", "Acme", FieldSource::ScopedPattern));
        a.insert_if_absent(FieldValue::new("date", "2024-01-12", FieldSource::ScopedPattern));

        let mut b = FieldSet::new();
        b.insert_if_absent(FieldValue::new("vendor_name", "Acme Trading", FieldSource::ScopedPattern));
        b.insert_if_absent(FieldValue::new("date", "2024-01-13", FieldSource::ScopedPattern));
        b.insert_if_absent(FieldValue::new("phone", "555 123 4567", FieldSource::UniversalPattern));

        a.merge_longer(&b);
        assert_eq!(a.value("vendor_name"), Some("Acme Trading"));
        assert_eq!(a.value("date"), Some("2024-01-12"));
        assert_eq!(a.value("phone"), Some("555 123 4567"));
    }

    #[test]
    fn test_serializes_as_map() {
        let mut fields = FieldSet::new();
        fields.insert_if_absent(FieldValue::new("email", "a@b.co", FieldSource::UniversalPattern));
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["email"]["value"], "a@b.co");
        assert_eq!(json["email"]["source"], "universal_pattern");
    }
}
