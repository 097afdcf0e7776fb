//! Turning per-token layout labels into fields.

use super::rules::has_digit;
use super::rules::patterns::{AMOUNT_SHAPE, DATE_TOKEN, IDENTIFIER_SHAPE};
use crate::models::{FieldSet, FieldSource, FieldValue};
use crate::ocr::layout::OUTSIDE_LABEL;

/// Number of tokens before a span that count as its context.
const CONTEXT_TOKENS: usize = 3;

/// A run of consecutive tokens sharing one entity label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSpan {
    /// Entity label without its `B-`/`I-` prefix.
    pub label: String,
    /// Space-joined span text.
    pub text: String,
    /// Index of the span's first token.
    pub start: usize,
}

/// Group consecutive tokens sharing a non-`O` label into spans.
pub fn group_spans(words: &[String], labels: &[String]) -> Vec<LabelSpan> {
    let mut spans: Vec<LabelSpan> = Vec::new();
    let mut current: Option<LabelSpan> = None;

    for (i, (word, label)) in words.iter().zip(labels).enumerate() {
        let entity = strip_prefix(label);
        if entity.is_empty() || entity == OUTSIDE_LABEL {
            spans.extend(current.take());
            continue;
        }

        let begins = label.starts_with("B-");
        match current.as_mut() {
            Some(span) if span.label == entity && !begins => {
                span.text.push(' ');
                span.text.push_str(word);
            }
            _ => {
                spans.extend(current.take());
                current = Some(LabelSpan {
                    label: entity.to_string(),
                    text: word.clone(),
                    start: i,
                });
            }
        }
    }

    spans.extend(current);
    spans
}

fn strip_prefix(label: &str) -> &str {
    label
        .strip_prefix("B-")
        .or_else(|| label.strip_prefix("I-"))
        .unwrap_or(label)
        .trim()
}

/// Route each span to a field name by its shape and context, first writer wins.
pub fn route_spans(words: &[String], spans: &[LabelSpan]) -> FieldSet {
    let mut fields = FieldSet::new();

    for span in spans {
        let context = span_context(words, span);
        if let Some(name) = route(span, &context) {
            fields.insert_if_absent(FieldValue::new(name, span.text.trim(), FieldSource::LayoutModel));
        }
    }

    fields
}

/// Lower-cased label text plus up to three preceding tokens.
fn span_context(words: &[String], span: &LabelSpan) -> String {
    let from = span.start.saturating_sub(CONTEXT_TOKENS);
    let mut context = span.label.replace(['_', '-'], " ");
    for word in &words[from..span.start] {
        context.push(' ');
        context.push_str(word);
    }
    context.to_lowercase()
}

fn route(span: &LabelSpan, context: &str) -> Option<String> {
    let text = span.text.trim();
    let has = |keys: &[&str]| keys.iter().any(|k| context_has(context, k));

    let name = if AMOUNT_SHAPE.is_match(text) && has_digit(text) {
        if has(&["subtotal", "sub total"]) {
            "subtotal"
        } else if has(&["total"]) {
            "total_amount"
        } else if has(&["tax", "vat"]) {
            "tax_amount"
        } else {
            "amount"
        }
    } else if DATE_TOKEN.find(text).is_some_and(|m| m.as_str().len() * 2 >= text.len()) {
        if has(&["due"]) {
            "due_date"
        } else if has(&["issue", "create"]) {
            "issue_date"
        } else {
            "date"
        }
    } else if IDENTIFIER_SHAPE.is_match(text) && has_digit(text) {
        if has(&["invoice", "inv", "bill"]) {
            "document_number"
        } else if has(&["po", "purchase"]) {
            "purchase_order"
        } else {
            "reference_number"
        }
    } else if text.chars().count() >= 3 {
        if has(&["from", "vendor", "seller"]) {
            "vendor_name"
        } else if has(&["to", "customer", "buyer"]) {
            "customer_name"
        } else if has(&["address"]) {
            "address"
        } else if has(&["description"]) {
            "description"
        } else {
            return Some(span.label.to_lowercase());
        }
    } else {
        return None;
    };

    Some(name.to_string())
}

/// Whole-word (or word-prefix for multi-letter keys) match inside the context.
fn context_has(context: &str, key: &str) -> bool {
    context
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == key || (key.len() > 3 && word.starts_with(key)))
}
