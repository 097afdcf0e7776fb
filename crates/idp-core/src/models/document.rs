//! Document-level data models: text blocks, document types, tables and results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fields::FieldSet;

/// Quadrilateral as four `[x, y]` points, clockwise from top-left.
pub type Quad = [[f32; 2]; 4];

/// A piece of text produced by a text extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Recognized text content.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,

    /// Bounding quadrilateral, absent for extractors that do not localize text.
    #[serde(rename = "box")]
    pub bbox: Option<Quad>,
}

impl TextBlock {
    /// Create a block with a bounding box. Confidence is clamped to [0, 1].
    pub fn new(text: impl Into<String>, confidence: f32, bbox: Quad) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_unit(confidence),
            bbox: Some(bbox),
        }
    }

    /// Create a block without a bounding box.
    pub fn unlocated(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_unit(confidence),
            bbox: None,
        }
    }

    /// Convenience constructor from an axis-aligned rectangle.
    pub fn from_rect(text: impl Into<String>, confidence: f32, x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(
            text,
            confidence,
            [[x, y], [x + w, y], [x + w, y + h], [x, y + h]],
        )
    }

    /// Get the axis-aligned bounding rectangle (min_x, min_y, max_x, max_y).
    pub fn rect(&self) -> Option<(f32, f32, f32, f32)> {
        let quad = self.bbox.as_ref()?;

        let min_x = quad.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min);
        let max_x = quad.iter().map(|p| p[0]).fold(f32::NEG_INFINITY, f32::max);
        let min_y = quad.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min);
        let max_y = quad.iter().map(|p| p[1]).fold(f32::NEG_INFINITY, f32::max);

        Some((min_x, min_y, max_x, max_y))
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> Option<(f32, f32)> {
        let quad = self.bbox.as_ref()?;
        let x = quad.iter().map(|p| p[0]).sum::<f32>() / 4.0;
        let y = quad.iter().map(|p| p[1]).sum::<f32>() / 4.0;
        Some((x, y))
    }

    /// Check whether the bounding rectangles of two blocks intersect.
    pub fn overlaps(&self, other: &TextBlock) -> bool {
        match (self.rect(), other.rect()) {
            (Some(a), Some(b)) => a.0 <= b.2 && a.2 >= b.0 && a.1 <= b.3 && a.3 >= b.1,
            _ => false,
        }
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Full text of a block list, one block per line.
pub fn blocks_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Document category detected by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Receipt,
    BankStatement,
    IdCard,
    Contract,
    EngineeringDoc,
    TechnicalDoc,
    AccidentReport,
    Unknown,
}

impl DocumentType {
    /// All classifiable types in declaration order. The classifier breaks ties
    /// in this order.
    pub const CLASSIFIABLE: [DocumentType; 8] = [
        DocumentType::Invoice,
        DocumentType::Receipt,
        DocumentType::BankStatement,
        DocumentType::IdCard,
        DocumentType::Contract,
        DocumentType::EngineeringDoc,
        DocumentType::TechnicalDoc,
        DocumentType::AccidentReport,
    ];

    /// Tag used in serialized output and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::IdCard => "id_card",
            DocumentType::Contract => "contract",
            DocumentType::EngineeringDoc => "engineering_doc",
            DocumentType::TechnicalDoc => "technical_doc",
            DocumentType::AccidentReport => "accident_report",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl Default for DocumentType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase().replace([' ', '-'], "_");
        DocumentType::CLASSIFIABLE
            .iter()
            .copied()
            .chain(std::iter::once(DocumentType::Unknown))
            .find(|t| t.as_str() == tag)
            .ok_or_else(|| format!("unknown document type: {}", s))
    }
}

/// Semantic type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Date,
    Boolean,
    Text,
}

/// A table recovered from spatially grouped OCR tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Header cells, when a header line was detected.
    pub header: Option<Vec<String>>,
    /// Data rows, left to right.
    pub rows: Vec<Vec<String>>,
    /// Number of data rows.
    pub row_count: usize,
    /// Number of columns (header width, or widest row without a header).
    pub column_count: usize,
    /// Inferred semantic type per column.
    pub column_types: Vec<ColumnType>,
    /// Coarse table category inferred from the header keywords.
    #[serde(rename = "type")]
    pub table_type: String,
    /// Fields found by running the type-scoped patterns over the cells.
    pub fields: FieldSet,
}

/// Header or footer text of a single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSection {
    /// Page number (1-indexed).
    pub page: u32,
    /// Raw text of the section.
    pub text: String,
    /// Fields extracted from this section alone.
    pub fields: FieldSet,
}

/// Structured output of processing one document.
///
/// Serialized with `fields` as a plain `name -> value` map and the full
/// field records (source, confidence, normalized value) under
/// `field_details`. Deserialization reads the records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ResultRecord", from = "ResultRecord")]
pub struct ProcessingResult {
    /// All extracted text, one block per line.
    pub extracted_text: String,
    /// Detected document type.
    pub document_type: DocumentType,
    /// Overall extraction confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Text blocks the result was built from.
    pub bounding_boxes: Vec<TextBlock>,
    /// Extracted fields keyed by name.
    pub fields: FieldSet,
    /// Detected tables.
    pub tables: Vec<TableCandidate>,
    /// Per-page headers (PDF only).
    pub headers: Vec<PageSection>,
    /// Per-page footers (PDF only).
    pub footers: Vec<PageSection>,
    /// Number of pages that contributed to this result.
    pub page_count: u32,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

impl ProcessingResult {
    /// A well-formed result for a document that yielded no text.
    pub fn empty() -> Self {
        Self {
            extracted_text: String::new(),
            document_type: DocumentType::Unknown,
            confidence: 0.0,
            bounding_boxes: Vec::new(),
            fields: FieldSet::new(),
            tables: Vec::new(),
            headers: Vec::new(),
            footers: Vec::new(),
            page_count: 0,
            processing_time_ms: 0,
        }
    }

    /// Check whether anything at all was extracted.
    pub fn is_empty(&self) -> bool {
        self.extracted_text.trim().is_empty() && self.fields.is_empty()
    }
}

impl Default for ProcessingResult {
    fn default() -> Self {
        Self::empty()
    }
}

/// Wire form of [`ProcessingResult`].
#[derive(Serialize, Deserialize)]
struct ResultRecord {
    extracted_text: String,
    document_type: DocumentType,
    confidence: f32,
    bounding_boxes: Vec<TextBlock>,
    #[serde(default)]
    fields: BTreeMap<String, String>,
    #[serde(default)]
    field_details: FieldSet,
    tables: Vec<TableCandidate>,
    headers: Vec<PageSection>,
    footers: Vec<PageSection>,
    page_count: u32,
    processing_time_ms: u64,
}

impl From<ProcessingResult> for ResultRecord {
    fn from(result: ProcessingResult) -> Self {
        Self {
            extracted_text: result.extracted_text,
            document_type: result.document_type,
            confidence: result.confidence,
            bounding_boxes: result.bounding_boxes,
            fields: result.fields.to_value_map(),
            field_details: result.fields,
            tables: result.tables,
            headers: result.headers,
            footers: result.footers,
            page_count: result.page_count,
            processing_time_ms: result.processing_time_ms,
        }
    }
}

impl From<ResultRecord> for ProcessingResult {
    fn from(record: ResultRecord) -> Self {
        Self {
            extracted_text: record.extracted_text,
            document_type: record.document_type,
            confidence: record.confidence,
            bounding_boxes: record.bounding_boxes,
            fields: record.field_details,
            tables: record.tables,
            headers: record.headers,
            footers: record.footers,
            page_count: record.page_count,
            processing_time_ms: record.processing_time_ms,
        }
    }
}
