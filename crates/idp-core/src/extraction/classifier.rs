//! Rule-based document type classification.

use tracing::debug;

use super::rules::all_rules;
use super::rules::patterns::{CURRENCY_AMOUNT, DRAWING_NUMBER};
use crate::models::{DocumentType, TextBlock};

/// Confidence assigned when the type was only guessed from a tiebreaker shape.
const TIEBREAKER_CONFIDENCE: f32 = 0.1;

/// Minimum text length for an extraction to be considered sufficient.
pub const MIN_SUFFICIENT_TEXT_LENGTH: usize = 50;

/// Minimum average block confidence for an extraction to be considered sufficient.
pub const MIN_SUFFICIENT_CONFIDENCE: f32 = 0.5;

/// Classifies documents by counting detection-pattern hits per type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentClassifier;

impl DocumentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Detect the document type of `text`.
    ///
    /// The type with the strictly highest number of matching detection
    /// patterns wins; earlier-declared types win ties. Its confidence is
    /// `hits / patterns` rounded to three decimals.
    ///
    /// With no hits at all a drawing number suggests an engineering document
    /// and a currency amount suggests an invoice. Those guesses get a fixed
    /// confidence of 0.1. Otherwise the result is `(Unknown, 0.0)`.
    pub fn classify(&self, text: &str) -> (DocumentType, f32) {
        let mut best: Option<(DocumentType, usize, usize)> = None;

        for rules in all_rules() {
            let hits = rules.detection.iter().filter(|p| p.is_match(text)).count();
            debug!("Classifier: {} matched {}/{} patterns", rules.doc_type, hits, rules.detection.len());

            if hits > 0 && best.is_none_or(|(_, h, _)| hits > h) {
                best = Some((rules.doc_type, hits, rules.detection.len()));
            }
        }

        if let Some((doc_type, hits, total)) = best {
            return (doc_type, ratio(hits, total));
        }

        if DRAWING_NUMBER.is_match(text) {
            debug!("Classifier: no keyword hits, drawing number found");
            return (DocumentType::EngineeringDoc, TIEBREAKER_CONFIDENCE);
        }
        if CURRENCY_AMOUNT.is_match(text) {
            debug!("Classifier: no keyword hits, currency amount found");
            return (DocumentType::Invoice, TIEBREAKER_CONFIDENCE);
        }

        (DocumentType::Unknown, 0.0)
    }
}

/// `hits / total` rounded to three decimals.
fn ratio(hits: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    let value = hits as f64 / total as f64;
    ((value * 1000.0).round() / 1000.0) as f32
}

/// Check whether extracted blocks carry enough text of good enough quality
/// to skip escalation to the next extractor.
pub fn is_extraction_sufficient(blocks: &[TextBlock]) -> bool {
    meets_thresholds(blocks, MIN_SUFFICIENT_TEXT_LENGTH, MIN_SUFFICIENT_CONFIDENCE)
}

/// [`is_extraction_sufficient`] with explicit thresholds.
pub fn meets_thresholds(blocks: &[TextBlock], min_length: usize, min_confidence: f32) -> bool {
    if blocks.is_empty() {
        return false;
    }

    let length: usize = blocks.iter().map(|b| b.text.trim().chars().count()).sum();
    length >= min_length && average_confidence(blocks) >= min_confidence
}

/// Average confidence of a block list, 0.0 when empty.
pub fn average_confidence(blocks: &[TextBlock]) -> f32 {
    if blocks.is_empty() {
        return 0.0;
    }
    blocks.iter().map(|b| b.confidence).sum::<f32>() / blocks.len() as f32
}
