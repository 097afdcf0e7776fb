//! Merging of per-page results into one document result.

use crate::models::{DocumentType, FieldSet, ProcessingResult};

/// Combines page-level [`ProcessingResult`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultCombiner;

impl ResultCombiner {
    /// Merge pages in order.
    ///
    /// Text is joined with newlines and lists are concatenated. For each
    /// field the longer value wins, the earlier page on equal length.
    /// Confidence is the page average and the document type is the most
    /// frequent one, ties going to the type seen first.
    pub fn combine(pages: Vec<ProcessingResult>) -> ProcessingResult {
        if pages.is_empty() {
            return ProcessingResult::empty();
        }

        let page_total = pages.len();
        let document_type = majority_type(pages.iter().map(|p| p.document_type));
        let confidence = pages.iter().map(|p| p.confidence).sum::<f32>() / page_total as f32;

        let mut combined = ProcessingResult::empty();
        let mut texts = Vec::with_capacity(page_total);
        let mut fields = FieldSet::new();

        for page in pages {
            texts.push(page.extracted_text);
            fields.merge_longer(&page.fields);
            combined.bounding_boxes.extend(page.bounding_boxes);
            combined.tables.extend(page.tables);
            combined.headers.extend(page.headers);
            combined.footers.extend(page.footers);
            combined.page_count += page.page_count;
            combined.processing_time_ms += page.processing_time_ms;
        }

        combined.extracted_text = texts.join("\n");
        combined.fields = fields;
        combined.confidence = confidence.clamp(0.0, 1.0);
        combined.document_type = document_type;
        combined
    }
}

fn majority_type(types: impl Iterator<Item = DocumentType>) -> DocumentType {
    let mut counts: Vec<(DocumentType, usize)> = Vec::new();
    for doc_type in types {
        match counts.iter_mut().find(|(t, _)| *t == doc_type) {
            Some((_, n)) => *n += 1,
            None => counts.push((doc_type, 1)),
        }
    }

    // `max_by_key` keeps the last maximum, so scan in reverse.
    counts
        .into_iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(t, _)| t)
        .unwrap_or_default()
}
