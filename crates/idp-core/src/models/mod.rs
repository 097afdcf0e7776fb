//! Data models and configuration.

pub mod config;
pub mod document;
pub mod fields;

pub use config::IdpConfig;
pub use document::{
    blocks_text, ColumnType, DocumentType, PageSection, ProcessingResult, Quad, TableCandidate,
    TextBlock,
};
pub use fields::{FieldSet, FieldSource, FieldValue};
