//! Document classification and structured field extraction.

pub mod cascade;
pub mod classifier;
pub mod heuristics;
pub mod layout;
pub mod rules;

pub use cascade::{clean_name, scoped_fields, universal_fields, CascadeReport, FieldCascade};
pub use classifier::{
    average_confidence, is_extraction_sufficient, meets_thresholds, DocumentClassifier,
    MIN_SUFFICIENT_CONFIDENCE, MIN_SUFFICIENT_TEXT_LENGTH,
};
pub use layout::{group_spans, route_spans, LabelSpan};
