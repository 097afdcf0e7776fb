//! Core library for intelligent document processing.
//!
//! This crate provides:
//! - Image preprocessing (CLAHE, denoise, adaptive binarization, upscaling)
//! - Text extractors behind one trait: OCR engines, a vision-to-text
//!   sequence model and PDF text layers, run as an escalating cascade
//! - Document classification by per-type keyword rulebooks
//! - A multi-stage field extraction cascade (layout model, type-scoped and
//!   universal patterns, positional and keyword heuristics)
//! - Table, page header and footer extraction
//! - PDF handling and the [`DocumentProcessor`] entry point

pub mod capabilities;
pub mod combine;
pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod processor;

pub use capabilities::{Capabilities, GpuGate};
pub use combine::ResultCombiner;
pub use error::{ExtractionError, ExtractorError, IdpError, PdfError, Result};
pub use extraction::{CascadeReport, DocumentClassifier, FieldCascade};
pub use models::{
    ColumnType, DocumentType, FieldSet, FieldSource, FieldValue, IdpConfig, PageSection,
    ProcessingResult, TableCandidate, TextBlock,
};
pub use ocr::{
    DirectTextExtractor, ExtractorCascade, ExtractorKind, LayoutClassifier, Preprocessor,
    SequenceModelExtractor, TextExtractor, TextGenerator,
};
#[cfg(feature = "native")]
pub use ocr::OcrEngineExtractor;
pub use pdf::PdfDocument;
pub use processor::{DocumentProcessor, InputFormat};
