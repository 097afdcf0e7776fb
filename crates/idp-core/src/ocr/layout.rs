//! Layout-aware token classification.
//!
//! A [`LayoutClassifier`] labels each word of a page given the word's box on
//! a 0..1000 grid. This module owns the input preparation: splitting blocks
//! into words, normalizing boxes, and bounding the sequence length.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::models::TextBlock;

/// Side of the normalized coordinate grid.
pub const GRID_SIZE: u32 = 1000;

/// Label used for tokens outside any entity.
pub const OUTSIDE_LABEL: &str = "O";

/// Per-token labeller over words and their layout boxes.
pub trait LayoutClassifier: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str {
        "layout"
    }

    /// Return one label per word (`O`, `B-TOTAL`, `I-VENDOR`, ...).
    fn classify(
        &self,
        image: &DynamicImage,
        words: &[String],
        boxes: &[[u32; 4]],
    ) -> Result<Vec<String>, ExtractionError>;
}

/// Words and normalized boxes ready for a [`LayoutClassifier`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutTokens {
    /// One entry per word.
    pub words: Vec<String>,
    /// `[x0, y0, x1, y1]` per word on the 0..1000 grid.
    pub boxes: Vec<[u32; 4]>,
    /// Whether boxes were synthesized because the blocks had none.
    pub placeholder_boxes: bool,
}

impl LayoutTokens {
    /// Split blocks into words; each word inherits its block's box.
    ///
    /// Sequences longer than `max_tokens` are truncated.
    pub fn from_blocks(blocks: &[TextBlock], image_size: (u32, u32), max_tokens: usize) -> Self {
        let mut tokens = Self::default();
        let mut located = 0usize;

        for block in blocks {
            let bbox = block.rect().map(|r| normalize_box(r, image_size));
            if bbox.is_some() {
                located += 1;
            }

            for word in block.text.split_whitespace() {
                tokens.words.push(word.to_string());
                tokens.boxes.push(bbox.unwrap_or([0, 0, 0, 0]));
            }
        }

        if located == 0 && !tokens.words.is_empty() {
            warn!("Layout input has no boxes; using placeholder boxes, labels will be unreliable");
            tokens.placeholder_boxes = true;
        }

        tokens.truncate(max_tokens);
        tokens
    }

    /// Bound both sequences to `max_tokens` and to each other's length.
    pub fn truncate(&mut self, max_tokens: usize) {
        let len = self.words.len().min(self.boxes.len()).min(max_tokens);
        if self.words.len() > len || self.boxes.len() > len {
            debug!("Layout input truncated from {} to {} tokens", self.words.len(), len);
        }
        self.words.truncate(len);
        self.boxes.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Run a classifier over the tokens and verify the label count.
    pub fn label(
        &self,
        classifier: &dyn LayoutClassifier,
        image: &DynamicImage,
    ) -> Result<Vec<String>, ExtractionError> {
        let labels = classifier.classify(image, &self.words, &self.boxes)?;
        if labels.len() != self.words.len() {
            return Err(ExtractionError::TokenMismatch {
                tokens: self.words.len(),
                labels: labels.len(),
            });
        }
        Ok(labels)
    }
}

/// Scale a pixel rectangle onto the 0..1000 grid.
pub fn normalize_box(rect: (f32, f32, f32, f32), image_size: (u32, u32)) -> [u32; 4] {
    let (width, height) = (image_size.0.max(1) as f32, image_size.1.max(1) as f32);
    let scale = |v: f32, extent: f32| -> u32 {
        let scaled = (v / extent * GRID_SIZE as f32).round();
        if scaled.is_finite() {
            scaled.clamp(0.0, GRID_SIZE as f32) as u32
        } else {
            0
        }
    };

    [
        scale(rect.0, width),
        scale(rect.1, height),
        scale(rect.2, width),
        scale(rect.3, height),
    ]
}
