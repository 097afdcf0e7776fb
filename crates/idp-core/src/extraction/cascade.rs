//! Multi-stage field extraction.
//!
//! Stages run from most to least trusted and only ever add fields:
//!
//! 1. layout model (labelled tokens, needs the page image)
//! 2. type-scoped patterns
//! 3. universal patterns, when fewer than the minimum fields were found
//! 4. single-block shape heuristics
//! 5. keyword proximity, only if stage 4 added nothing

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, warn};

use super::heuristics::{bbox_fields, keyword_fields};
use super::layout::{group_spans, route_spans};
use super::rules::{
    first_capture, first_plausible_capture, normalize_amount, normalize_date, rules_for,
    universal_rules, FieldKind,
};
use crate::models::config::CascadeConfig;
use crate::models::{DocumentType, FieldSet, FieldSource, FieldValue, TextBlock};
use crate::ocr::layout::{LayoutClassifier, LayoutTokens};

/// Labels stripped from the start of party names, longest first.
const NAME_LABELS: &[&str] = &[
    "billed to", "bill to", "sold to", "ship to", "billed by", "customer name", "customer",
    "client", "vendor", "supplier", "seller", "from", "to",
];

/// Per-stage field counts of one cascade run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub document_type: DocumentType,
    pub layout: usize,
    pub scoped: usize,
    pub universal: usize,
    pub bbox: usize,
    pub keyword: usize,
    /// Whether the universal stage ran.
    pub escalated: bool,
    /// Whether the layout stage failed and was skipped.
    pub layout_failed: bool,
    /// Final extraction confidence.
    pub confidence: f32,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.layout + self.scoped + self.universal + self.bbox + self.keyword
    }
}

/// Field extraction cascade.
#[derive(Clone)]
pub struct FieldCascade {
    config: CascadeConfig,
    layout: Option<Arc<dyn LayoutClassifier>>,
}

impl std::fmt::Debug for FieldCascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCascade")
            .field("config", &self.config)
            .field("layout", &self.layout.as_ref().map(|l| l.name().to_string()))
            .finish()
    }
}

impl Default for FieldCascade {
    fn default() -> Self {
        Self::new(CascadeConfig::default())
    }
}

impl FieldCascade {
    pub fn new(config: CascadeConfig) -> Self {
        Self { config, layout: None }
    }

    /// Enable the layout-model stage.
    pub fn with_layout_classifier(mut self, classifier: Arc<dyn LayoutClassifier>) -> Self {
        self.layout = Some(classifier);
        self
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Extract fields from `text` (and its blocks/image when available).
    pub fn extract_fields(
        &self,
        text: &str,
        doc_type: DocumentType,
        blocks: &[TextBlock],
        image: Option<&DynamicImage>,
    ) -> FieldSet {
        self.run(text, doc_type, blocks, image).0
    }

    /// Run the cascade and report per-stage counts.
    pub fn run(
        &self,
        text: &str,
        doc_type: DocumentType,
        blocks: &[TextBlock],
        image: Option<&DynamicImage>,
    ) -> (FieldSet, CascadeReport) {
        let mut fields = FieldSet::new();
        let mut report = CascadeReport {
            document_type: doc_type,
            ..Default::default()
        };
        let min_fields = self.config.min_fields(doc_type);

        if let (Some(classifier), Some(image)) = (self.layout.as_deref(), image) {
            match self.layout_stage(classifier, image, blocks) {
                Ok(found) => report.layout = fields.absorb(found),
                Err(e) => {
                    warn!("Layout stage failed, continuing without it: {}", e);
                    report.layout_failed = true;
                }
            }
            debug!("Cascade layout stage: {} fields", report.layout);
        }

        report.scoped = fields.absorb(scoped_fields(text, doc_type));
        debug!("Cascade scoped stage ({}): {} fields", doc_type, report.scoped);

        if fields.len() < min_fields {
            report.escalated = true;
            report.universal = fields.absorb(universal_fields(text));
            debug!("Cascade universal stage: {} fields", report.universal);
        }

        if fields.len() < min_fields {
            let found = bbox_fields(blocks, &fields);
            report.bbox = fields.absorb(found);
            debug!("Cascade bbox stage: {} fields", report.bbox);

            if report.bbox == 0 && fields.len() < min_fields {
                let found = keyword_fields(text, &fields);
                report.keyword = fields.absorb(found);
                debug!("Cascade keyword stage: {} fields", report.keyword);
            }
        }

        clean_party_names(&mut fields, self.config.max_name_length);
        normalize_fields(&mut fields);

        report.confidence = self.confidence(&fields, doc_type);
        debug!(
            "Cascade done: {} fields (layout {}, scoped {}, universal {}, bbox {}, keyword {}), confidence {:.3}",
            fields.len(),
            report.layout,
            report.scoped,
            report.universal,
            report.bbox,
            report.keyword,
            report.confidence
        );

        (fields, report)
    }

    fn layout_stage(
        &self,
        classifier: &dyn LayoutClassifier,
        image: &DynamicImage,
        blocks: &[TextBlock],
    ) -> Result<FieldSet, crate::error::ExtractionError> {
        let tokens = LayoutTokens::from_blocks(blocks, image.dimensions(), self.config.layout_max_tokens);
        if tokens.is_empty() {
            return Ok(FieldSet::new());
        }

        let labels = tokens.label(classifier, image)?;
        let spans = group_spans(&tokens.words, &labels);
        Ok(route_spans(&tokens.words, &spans))
    }

    /// Overall extraction confidence.
    ///
    /// Weighted average of coverage (`found / expected`, capped at 1) and
    /// quality (share of the type's important fields present). 0.0 when no
    /// fields were found.
    pub fn confidence(&self, fields: &FieldSet, doc_type: DocumentType) -> f32 {
        if fields.is_empty() {
            return 0.0;
        }

        let rules = rules_for(doc_type);
        let coverage = if rules.expected.is_empty() {
            1.0
        } else {
            (fields.len() as f32 / rules.expected.len() as f32).min(1.0)
        };
        let quality = if rules.important.is_empty() {
            1.0
        } else {
            let present = rules.important.iter().filter(|f| fields.contains(f)).count();
            present as f32 / rules.important.len() as f32
        };

        let total_weight = self.config.coverage_weight + self.config.quality_weight;
        if total_weight <= 0.0 {
            return 0.0;
        }

        let score = (coverage * self.config.coverage_weight + quality * self.config.quality_weight) / total_weight;
        score.clamp(0.0, 1.0)
    }
}

/// Run the document type's own field patterns over `text`.
pub fn scoped_fields(text: &str, doc_type: DocumentType) -> FieldSet {
    let mut fields = FieldSet::new();
    for rule in &rules_for(doc_type).fields {
        if let Some(value) = first_capture(&rule.patterns, text) {
            fields.insert_if_absent(FieldValue::new(rule.name, value, FieldSource::ScopedPattern));
        }
    }
    fields
}

/// Run the type-agnostic pattern bank over `text`, with sanity checks.
pub fn universal_fields(text: &str) -> FieldSet {
    let mut fields = FieldSet::new();
    for rule in universal_rules() {
        if let Some(value) = first_plausible_capture(rule.name, &rule.patterns, text) {
            fields.insert_if_absent(FieldValue::new(rule.name, value, FieldSource::UniversalPattern));
        }
    }
    fields
}

/// Strip leading labels from party names and bound their length.
fn clean_party_names(fields: &mut FieldSet, max_len: usize) {
    for name in ["vendor_name", "customer_name"] {
        if let Some(field) = fields.get_mut(name) {
            let cleaned = clean_name(&field.value, max_len);
            if !cleaned.is_empty() {
                field.value = cleaned;
            }
        }
    }
}

/// Remove a leading `label:` from a name and truncate to `max_len` chars.
pub fn clean_name(value: &str, max_len: usize) -> String {
    let mut value = value.trim();

    loop {
        let lower = value.to_ascii_lowercase();
        let stripped = NAME_LABELS.iter().find_map(|label| {
            let rest = lower.strip_prefix(label)?;
            let trimmed = rest.trim_start();
            let trimmed = trimmed.strip_prefix([':', '-']).unwrap_or(trimmed);
            // Require a separator so "Tomlinson" does not lose "to".
            (rest.len() != trimmed.len() || rest.is_empty()).then(|| value.len() - trimmed.len())
        });

        match stripped {
            Some(offset) if offset > 0 => value = value[offset..].trim(),
            _ => break,
        }
    }

    value.chars().take(max_len).collect::<String>().trim().to_string()
}

/// Fill `normalized` for date and amount fields that parse.
fn normalize_fields(fields: &mut FieldSet) {
    let names: Vec<String> = fields.names().map(str::to_string).collect();
    for name in names {
        let Some(field) = fields.get_mut(&name) else {
            continue;
        };
        field.normalized = match FieldKind::of(&name) {
            FieldKind::Date => normalize_date(&field.value),
            FieldKind::Amount => normalize_amount(&field.value),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("From: Acme Trading LLC", 50), "Acme Trading LLC");
        assert_eq!(clean_name("Bill To - Globex", 50), "Globex");
        assert_eq!(clean_name("Tomlinson Ltd", 50), "Tomlinson Ltd");
        assert_eq!(clean_name(&"x".repeat(80), 50).len(), 50);
    }

    #[test]
    fn test_scoped_stage_stops_escalation() {
        let text = "INVOICE\nInvoice Number: INV-7781\nDate: 05/03/2024\nTotal: 420.00\nEmail: ap@globex.example";
        let (fields, report) = FieldCascade::default().run(text, DocumentType::Invoice, &[], None);

        assert_eq!(report.scoped, 3);
        assert!(!report.escalated);
        assert!(!fields.contains("email"));
        assert_eq!(fields.get("date").unwrap().normalized.as_deref(), Some("2024-03-05"));
        assert_eq!(fields.get("total_amount").unwrap().normalized.as_deref(), Some("420"));
    }

    #[test]
    fn test_universal_stage_fills_gaps() {
        let text = "Contact: billing@globex.example\nPhone: +1 555 010 9999";
        let (fields, report) = FieldCascade::default().run(text, DocumentType::Receipt, &[], None);

        assert!(report.escalated);
        assert_eq!(fields.value("email"), Some("billing@globex.example"));
        assert_eq!(fields.get("email").unwrap().source, FieldSource::UniversalPattern);
        assert_eq!(fields.value("phone"), Some("+1 555 010 9999"));
    }

    #[test]
    fn test_confidence() {
        let cascade = FieldCascade::default();
        assert_eq!(cascade.confidence(&FieldSet::new(), DocumentType::Invoice), 0.0);

        let mut fields = FieldSet::new();
        for (name, value) in [("invoice_number", "INV-1"), ("date", "01/01/2024"), ("total_amount", "10.00")] {
            fields.insert_if_absent(FieldValue::new(name, value, FieldSource::ScopedPattern));
        }
        // coverage 3/5, quality 3/3
        assert!((cascade.confidence(&fields, DocumentType::Invoice) - 0.8).abs() < 1e-6);
    }
}
