//! Text extraction from page images.
//!
//! Every backend implements [`TextExtractor`]. An [`ExtractorCascade`] runs
//! them in order, moving to the next one only while the text gathered so far
//! is insufficient.

pub mod direct;
#[cfg(feature = "native")]
pub mod engine;
pub mod layout;
pub mod preprocessing;
pub mod sequence;
pub mod table;

pub use direct::DirectTextExtractor;
#[cfg(feature = "native")]
pub use engine::OcrEngineExtractor;
pub use layout::{LayoutClassifier, LayoutTokens};
pub use preprocessing::Preprocessor;
pub use sequence::{SequenceModelExtractor, TextGenerator};
pub use table::{HeaderFooter, TableExtractor};

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::ExtractorError;
use crate::extraction::classifier::meets_thresholds;
use crate::extraction::{MIN_SUFFICIENT_CONFIDENCE, MIN_SUFFICIENT_TEXT_LENGTH};
use crate::models::TextBlock;

/// Family of a text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    /// Detection + recognition OCR engine; yields boxes.
    Ocr,
    /// Handwriting-tuned OCR engine.
    Handwriting,
    /// Vision-to-text sequence model; yields lines without boxes.
    Sequence,
    /// PDF text layer.
    Direct,
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractorKind::Ocr => "ocr",
            ExtractorKind::Handwriting => "handwriting",
            ExtractorKind::Sequence => "sequence",
            ExtractorKind::Direct => "direct",
        };
        f.write_str(name)
    }
}

/// A backend that turns an image into text blocks.
pub trait TextExtractor: Send + Sync {
    /// Name for logs and diagnostics.
    fn name(&self) -> &str;

    fn kind(&self) -> ExtractorKind;

    /// Extract text blocks from an image.
    fn extract(&self, image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError>;
}

/// Outcome of running an [`ExtractorCascade`].
#[derive(Debug, Clone, Default)]
pub struct ExtractionRun {
    /// Blocks from every extractor that ran, in run order.
    pub blocks: Vec<TextBlock>,
    /// Names of the extractors that ran.
    pub attempted: Vec<String>,
    /// Whether the final block list passed the sufficiency check.
    pub sufficient: bool,
}

/// Ordered extractors with escalation.
///
/// Extractors in the same stage (e.g. one OCR engine per language) all run
/// and their blocks are concatenated. The next stage only runs while the
/// accumulated blocks are insufficient.
#[derive(Clone)]
pub struct ExtractorCascade {
    stages: Vec<Vec<Arc<dyn TextExtractor>>>,
    min_text_length: usize,
    min_avg_confidence: f32,
}

impl fmt::Debug for ExtractorCascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages: Vec<Vec<&str>> = self
            .stages
            .iter()
            .map(|stage| stage.iter().map(|e| e.name()).collect())
            .collect();
        f.debug_struct("ExtractorCascade").field("stages", &stages).finish()
    }
}

impl Default for ExtractorCascade {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorCascade {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            min_text_length: MIN_SUFFICIENT_TEXT_LENGTH,
            min_avg_confidence: MIN_SUFFICIENT_CONFIDENCE,
        }
    }

    /// Override the sufficiency thresholds.
    pub fn with_thresholds(mut self, min_text_length: usize, min_avg_confidence: f32) -> Self {
        self.min_text_length = min_text_length;
        self.min_avg_confidence = min_avg_confidence;
        self
    }

    /// Append a stage with a single extractor.
    pub fn then(self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.then_all(vec![extractor])
    }

    /// Append a stage whose extractors all run together.
    pub fn then_all(mut self, extractors: Vec<Arc<dyn TextExtractor>>) -> Self {
        if !extractors.is_empty() {
            self.stages.push(extractors);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Run stages until the text is sufficient or the stages run out.
    pub fn run(&self, image: &DynamicImage) -> ExtractionRun {
        let mut run = ExtractionRun::default();

        for (i, stage) in self.stages.iter().enumerate() {
            for extractor in stage {
                run.attempted.push(extractor.name().to_string());
                run.blocks.extend(run_extractor(extractor.as_ref(), image));
            }

            run.sufficient = meets_thresholds(&run.blocks, self.min_text_length, self.min_avg_confidence);
            if run.sufficient {
                debug!("Extraction sufficient after stage {} ({} blocks)", i + 1, run.blocks.len());
                break;
            }
            debug!("Extraction insufficient after stage {}, escalating", i + 1);
        }

        run
    }
}

/// Run one extractor, absorbing its failure.
pub fn run_extractor(extractor: &dyn TextExtractor, image: &DynamicImage) -> Vec<TextBlock> {
    match extractor.extract(image) {
        Ok(blocks) => {
            debug!("{} ({}) returned {} blocks", extractor.name(), extractor.kind(), blocks.len());
            blocks
        }
        Err(e) => {
            warn!("{} ({}) failed: {}", extractor.name(), extractor.kind(), e);
            Vec::new()
        }
    }
}

/// Lowercase, trim, and collapse inner whitespace.
fn normalized_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Remove blocks repeating an earlier block's text at the same place.
///
/// Two blocks are duplicates when their normalized text matches and their
/// boxes overlap, or both have no box. The first occurrence is kept.
pub fn dedup_blocks(blocks: Vec<TextBlock>) -> Vec<TextBlock> {
    let mut kept: Vec<(String, TextBlock)> = Vec::with_capacity(blocks.len());

    for block in blocks {
        let key = normalized_text(&block.text);
        let duplicate = kept.iter().any(|(k, b)| {
            *k == key
                && match (&b.bbox, &block.bbox) {
                    (None, None) => true,
                    (Some(_), Some(_)) => b.overlaps(&block),
                    _ => false,
                }
        });

        if !duplicate {
            kept.push((key, block));
        }
    }

    kept.into_iter().map(|(_, b)| b).collect()
}

/// Sort located blocks top-to-bottom, then left-to-right, using 20px rows.
/// Blocks without a box keep their relative order after the located ones.
pub fn sort_reading_order(blocks: &mut [TextBlock]) {
    blocks.sort_by(|a, b| match (a.rect(), b.rect()) {
        (Some(ra), Some(rb)) => {
            let row_a = (ra.1 / 20.0) as i32;
            let row_b = (rb.1 / 20.0) as i32;
            row_a
                .cmp(&row_b)
                .then(ra.0.partial_cmp(&rb.0).unwrap_or(std::cmp::Ordering::Equal))
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Fixed {
        name: &'static str,
        blocks: Vec<TextBlock>,
    }

    impl TextExtractor for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn kind(&self) -> ExtractorKind {
            ExtractorKind::Ocr
        }

        fn extract(&self, _image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
            Ok(self.blocks.clone())
        }
    }

    struct Broken;

    impl TextExtractor for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn kind(&self) -> ExtractorKind {
            ExtractorKind::Sequence
        }

        fn extract(&self, _image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
            Err(ExtractorError::Inference("out of memory".into()))
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    fn fixed(name: &'static str, text: &str, confidence: f32) -> Arc<dyn TextExtractor> {
        Arc::new(Fixed {
            name,
            blocks: vec![TextBlock::unlocated(text, confidence)],
        })
    }

    #[test]
    fn test_stops_when_sufficient() {
        let cascade = ExtractorCascade::new()
            .then(fixed("first", &"a".repeat(80), 0.9))
            .then(fixed("second", "never", 0.9));
        let run = cascade.run(&image());

        assert_eq!(run.attempted, vec!["first"]);
        assert!(run.sufficient);
        assert_eq!(run.blocks.len(), 1);
    }

    #[test]
    fn test_escalates_and_concatenates() {
        let cascade = ExtractorCascade::new()
            .then(fixed("first", "short", 0.9))
            .then(fixed("second", &"b".repeat(80), 0.9));
        let run = cascade.run(&image());

        assert_eq!(run.attempted, vec!["first", "second"]);
        assert_eq!(run.blocks.len(), 2);
        assert!(run.sufficient);
    }

    #[test]
    fn test_failure_contributes_nothing() {
        let cascade = ExtractorCascade::new()
            .then(Arc::new(Broken))
            .then(fixed("second", "tiny", 0.9));
        let run = cascade.run(&image());

        assert_eq!(run.attempted, vec!["broken", "second"]);
        assert_eq!(run.blocks.len(), 1);
        assert!(!run.sufficient);
    }

    #[test]
    fn test_dedup_blocks() {
        let blocks = vec![
            TextBlock::from_rect("Total  Due", 0.9, 0.0, 0.0, 50.0, 10.0),
            TextBlock::from_rect("total due", 0.7, 5.0, 2.0, 50.0, 10.0),
            TextBlock::from_rect("Total Due", 0.8, 500.0, 500.0, 50.0, 10.0),
            TextBlock::unlocated("Line", 0.8),
            TextBlock::unlocated("line", 0.8),
        ];
        let kept = dedup_blocks(blocks);

        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].rect().map(|r| r.0), Some(500.0));
        assert_eq!(kept[2].text, "Line");
    }

    #[test]
    fn test_reading_order() {
        let mut blocks = vec![
            TextBlock::unlocated("tail", 0.9),
            TextBlock::from_rect("right", 0.9, 200.0, 5.0, 10.0, 10.0),
            TextBlock::from_rect("below", 0.9, 0.0, 60.0, 10.0, 10.0),
            TextBlock::from_rect("left", 0.9, 0.0, 2.0, 10.0, 10.0),
        ];
        sort_reading_order(&mut blocks);
        let order: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(order, vec!["left", "right", "below", "tail"]);
    }
}
