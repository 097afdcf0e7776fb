//! Vision-to-text sequence model extractor.

use std::sync::{Arc, Mutex};

use image::DynamicImage;
use tracing::debug;

use super::{ExtractorKind, TextExtractor};
use crate::capabilities::GpuGate;
use crate::error::ExtractorError;
use crate::models::TextBlock;

/// Confidence gained per extracted field.
const BOOST_PER_FIELD: f32 = 0.02;
/// Upper bound for boosted confidence.
const BOOST_CAP: f32 = 0.95;

/// A model that reads a whole page image into plain text.
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str {
        "sequence"
    }

    fn generate(&self, image: &DynamicImage) -> Result<String, ExtractorError>;
}

/// Wraps a [`TextGenerator`] as a [`TextExtractor`]: one unlocated block per
/// non-empty output line.
pub struct SequenceModelExtractor {
    generator: Arc<dyn TextGenerator>,
    lock: Mutex<()>,
    base_confidence: f32,
    gpu: Option<Arc<GpuGate>>,
}

impl std::fmt::Debug for SequenceModelExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceModelExtractor")
            .field("generator", &self.generator.name())
            .field("base_confidence", &self.base_confidence)
            .finish()
    }
}

impl SequenceModelExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            lock: Mutex::new(()),
            base_confidence: 0.8,
            gpu: None,
        }
    }

    /// Set the confidence given to every produced line.
    pub fn with_base_confidence(mut self, confidence: f32) -> Self {
        self.base_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_gpu_gate(mut self, gate: Arc<GpuGate>) -> Self {
        self.gpu = Some(gate);
        self
    }

    pub fn base_confidence(&self) -> f32 {
        self.base_confidence
    }

    /// Raise block confidence by 0.02 per extracted field, capped at 0.95.
    pub fn boost_confidence(&self, blocks: &mut [TextBlock], fields_found: usize) {
        let boosted = (self.base_confidence + BOOST_PER_FIELD * fields_found as f32).min(BOOST_CAP);
        if boosted <= self.base_confidence {
            return;
        }
        for block in blocks.iter_mut().filter(|b| b.bbox.is_none()) {
            block.confidence = block.confidence.max(boosted);
        }
    }
}

impl TextExtractor for SequenceModelExtractor {
    fn name(&self) -> &str {
        self.generator.name()
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Sequence
    }

    fn extract(&self, image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
        let _permit = self.gpu.as_ref().map(|g| g.acquire());
        let output = {
            let _guard = self
                .lock
                .lock()
                .map_err(|_| ExtractorError::Unavailable("sequence model lock poisoned".into()))?;
            self.generator.generate(image)?
        };

        let blocks: Vec<TextBlock> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| TextBlock::unlocated(line, self.base_confidence))
            .collect();

        debug!("{}: {} lines", self.name(), blocks.len());
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Echo(&'static str);

    impl TextGenerator for Echo {
        fn generate(&self, _image: &DynamicImage) -> Result<String, ExtractorError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_lines_become_blocks() {
        let extractor = SequenceModelExtractor::new(Arc::new(Echo("INVOICE\n\n  Total: 10.00  \n")));
        let blocks = extractor.extract(&DynamicImage::new_rgb8(2, 2)).unwrap();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].text, "Total: 10.00");
        assert!(blocks.iter().all(|b| b.bbox.is_none() && b.confidence == 0.8));
    }

    #[test]
    fn test_boost_is_capped() {
        let extractor = SequenceModelExtractor::new(Arc::new(Echo("")));
        let mut blocks = vec![TextBlock::unlocated("a", 0.8)];

        extractor.boost_confidence(&mut blocks, 3);
        assert!((blocks[0].confidence - 0.86).abs() < 1e-6);

        extractor.boost_confidence(&mut blocks, 50);
        assert_eq!(blocks[0].confidence, 0.95);
    }
}
