//! Error types for the idp-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the idp library.
///
/// Only conditions with no fallback surface here. Everything that happens
/// inside the extraction cascade is absorbed and logged instead.
#[derive(Error, Debug)]
pub enum IdpError {
    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Text extractor error.
    #[error("extractor error: {0}")]
    Extractor(#[from] ExtractorError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The input file does not exist.
    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The input file extension is not handled by any processor.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to extract images from PDF.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),
}

/// Errors raised by text extractor backends.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Failed to load a model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The backend cannot serve this input.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend failed while running.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The backend returned data of an unexpected shape.
    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

/// Errors raised inside the field extraction cascade.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The layout classifier failed.
    #[error("layout classification failed: {0}")]
    Layout(String),

    /// The layout classifier returned a label count that does not match the tokens.
    #[error("token/label mismatch: {tokens} tokens, {labels} labels")]
    TokenMismatch { tokens: usize, labels: usize },
}

/// Result type for the idp library.
pub type Result<T> = std::result::Result<T, IdpError>;
