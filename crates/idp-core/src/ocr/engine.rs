//! OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, trace};

use super::{sort_reading_order, ExtractorKind, TextExtractor};
use crate::capabilities::GpuGate;
use crate::error::ExtractorError;
use crate::models::config::OcrConfig;
use crate::models::{Quad, TextBlock};

/// Detection + recognition OCR over one model set (one language).
pub struct OcrEngineExtractor {
    name: String,
    kind: ExtractorKind,
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    keep_unk: bool,
    gpu: Option<Arc<GpuGate>>,
}

impl std::fmt::Debug for OcrEngineExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngineExtractor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl OcrEngineExtractor {
    /// Load the detection model, recognition model and dictionary from `model_dir`.
    pub fn from_dir(model_dir: &Path, label: &str, config: &OcrConfig) -> Result<Self, ExtractorError> {
        let det_path = model_dir.join(&config.detection_model);
        let rec_path = model_dir.join(&config.recognition_model);
        let dict_path = model_dir.join(&config.dictionary);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(ExtractorError::ModelLoad(format!("missing model file {}", path.display())));
            }
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| ExtractorError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded OCR engine '{}' from {}", label, model_dir.display());

        Ok(Self {
            name: format!("ocr:{}", label),
            kind: ExtractorKind::Ocr,
            engine: Mutex::new(engine),
            keep_unk: config.keep_unk,
            gpu: None,
        })
    }

    /// Report this engine as a different extractor family.
    pub fn with_kind(mut self, kind: ExtractorKind) -> Self {
        self.kind = kind;
        if kind == ExtractorKind::Handwriting {
            self.name = "handwriting".to_string();
        }
        self
    }

    /// Acquire a permit from `gate` around every call.
    pub fn with_gpu_gate(mut self, gate: Arc<GpuGate>) -> Self {
        self.gpu = Some(gate);
        self
    }
}

impl TextExtractor for OcrEngineExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ExtractorKind {
        self.kind
    }

    fn extract(&self, image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!("{}: processing image {}x{}", self.name, width, height);

        let _permit = self.gpu.as_ref().map(|g| g.acquire());
        let results = {
            let engine = self
                .engine
                .lock()
                .map_err(|_| ExtractorError::Unavailable(format!("{} engine lock poisoned", self.name)))?;
            engine
                .run_from_image(image)
                .map_err(|e| ExtractorError::Inference(format!("pure-onnx-ocr: {}", e)))?
        };

        let mut blocks: Vec<TextBlock> = results
            .iter()
            .filter_map(|r| {
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                let text = text.trim();
                let quad = polygon_to_quad(&r.bounding_box);

                match (text.is_empty(), quad) {
                    (false, Some(quad)) => Some(TextBlock::new(text, r.confidence, quad)),
                    _ => {
                        trace!("{}: skipping malformed region '{}'", self.name, r.text);
                        None
                    }
                }
            })
            .collect();

        sort_reading_order(&mut blocks);

        debug!(
            "{}: {} text blocks in {}ms",
            self.name,
            blocks.len(),
            start.elapsed().as_millis()
        );

        Ok(blocks)
    }
}

/// First four exterior points of a polygon, or `None` when any is non-finite.
fn polygon_to_quad(polygon: &pure_onnx_ocr::Polygon<f64>) -> Option<Quad> {
    let mut quad: Quad = [[0.0; 2]; 4];
    let mut count = 0;

    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return None;
        }
        quad[i] = [coord.x as f32, coord.y as f32];
        count += 1;
    }

    (count == 4).then_some(quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let err = OcrEngineExtractor::from_dir(dir.path(), "en", &OcrConfig::default()).unwrap_err();
        assert!(matches!(err, ExtractorError::ModelLoad(_)));
    }
}
