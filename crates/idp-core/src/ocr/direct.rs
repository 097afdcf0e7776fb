//! Text taken straight from a PDF text layer.

use image::DynamicImage;
use tracing::debug;

use super::{ExtractorKind, TextExtractor};
use crate::error::{ExtractorError, PdfError};
use crate::models::TextBlock;
use crate::pdf::PdfDocument;

/// Confidence of text read from the text layer.
pub const DIRECT_TEXT_CONFIDENCE: f32 = 1.0;

/// Yields one unlocated, fully confident block per PDF page.
///
/// Used as a [`TextExtractor`] it returns the page text it was built with and
/// ignores the image.
#[derive(Debug, Clone, Default)]
pub struct DirectTextExtractor {
    text: String,
}

impl DirectTextExtractor {
    /// Extractor serving a single page's text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// One block per page with a non-empty text layer, in page order.
    pub fn extract_pages(pdf: &PdfDocument) -> Result<Vec<Option<TextBlock>>, PdfError> {
        let pages = pdf.page_texts()?;
        debug!("Text layer: {} pages", pages.len());
        Ok(pages.iter().map(|text| page_block(text)).collect())
    }
}

fn page_block(text: &str) -> Option<TextBlock> {
    let text = text.trim();
    (!text.is_empty()).then(|| TextBlock::unlocated(text, DIRECT_TEXT_CONFIDENCE))
}

impl TextExtractor for DirectTextExtractor {
    fn name(&self) -> &str {
        "direct"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Direct
    }

    fn extract(&self, _image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
        Ok(page_block(&self.text).into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_page_block() {
        let extractor = DirectTextExtractor::new("  Invoice INV-1\nTotal 5.00 \n");
        let blocks = extractor.extract(&DynamicImage::new_rgb8(1, 1)).unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "Invoice INV-1\nTotal 5.00");
        assert_eq!(blocks[0].confidence, 1.0);
        assert!(blocks[0].bbox.is_none());
    }

    #[test]
    fn test_blank_page() {
        let extractor = DirectTextExtractor::new(" \n ");
        assert!(extractor.extract(&DynamicImage::new_rgb8(1, 1)).unwrap().is_empty());
    }
}
