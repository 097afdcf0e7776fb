//! Registry of optional model backends and the GPU admission gate.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use tracing::{debug, info, warn};

use crate::models::IdpConfig;
use crate::ocr::{LayoutClassifier, TextExtractor, TextGenerator};

/// Counting semaphore bounding concurrent GPU-using calls.
#[derive(Debug)]
pub struct GpuGate {
    permits: Mutex<usize>,
    available: Condvar,
    capacity: usize,
}

/// Held while a GPU call runs; returns its permit on drop.
#[derive(Debug)]
pub struct GpuPermit<'a> {
    gate: &'a GpuGate,
}

impl GpuGate {
    /// Create a gate with `permits` slots (at least one).
    pub fn new(permits: usize) -> Self {
        let capacity = permits.max(1);
        Self {
            permits: Mutex::new(capacity),
            available: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of free permits right now.
    pub fn available(&self) -> usize {
        *self.permits.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> GpuPermit<'_> {
        let mut permits = self.permits.lock().unwrap_or_else(|e| e.into_inner());
        while *permits == 0 {
            permits = self.available.wait(permits).unwrap_or_else(|e| e.into_inner());
        }
        *permits -= 1;
        GpuPermit { gate: self }
    }
}

impl Default for GpuGate {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Drop for GpuPermit<'_> {
    fn drop(&mut self) {
        let mut permits = self.gate.permits.lock().unwrap_or_else(|e| e.into_inner());
        *permits += 1;
        self.gate.available.notify_one();
    }
}

/// Model backends available to the processor, built once and shared.
///
/// A missing backend simply disables the stage that needs it.
#[derive(Clone, Default)]
pub struct Capabilities {
    /// Primary OCR engines, one per configured language.
    pub ocr: Vec<Arc<dyn TextExtractor>>,
    /// Handwriting recognizer used as a low-confidence fallback.
    pub handwriting: Option<Arc<dyn TextExtractor>>,
    /// Vision-to-text sequence model used as a fallback.
    pub sequence: Option<Arc<dyn TextGenerator>>,
    /// Per-token layout classifier for the first cascade stage.
    pub layout: Option<Arc<dyn LayoutClassifier>>,
    /// Gate shared by every GPU-using backend.
    pub gpu: Arc<GpuGate>,
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("ocr", &self.ocr.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("handwriting", &self.handwriting.as_ref().map(|e| e.name().to_string()))
            .field("sequence", &self.sequence.is_some())
            .field("layout", &self.layout.as_ref().map(|l| l.name().to_string()))
            .field("gpu_permits", &self.gpu.capacity())
            .finish()
    }
}

impl Capabilities {
    /// No backends at all: text-only processing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_ocr(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.ocr.push(extractor);
        self
    }

    pub fn with_handwriting(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.handwriting = Some(extractor);
        self
    }

    pub fn with_sequence_model(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.sequence = Some(generator);
        self
    }

    pub fn with_layout_classifier(mut self, classifier: Arc<dyn LayoutClassifier>) -> Self {
        self.layout = Some(classifier);
        self
    }

    pub fn with_gpu_gate(mut self, gate: Arc<GpuGate>) -> Self {
        self.gpu = gate;
        self
    }

    pub fn has_ocr(&self) -> bool {
        !self.ocr.is_empty()
    }

    /// Load every backend the configuration points at.
    ///
    /// Backends that fail to load are logged once here and left out.
    pub fn load(config: &IdpConfig) -> Self {
        let mut caps = Self::none().with_gpu_gate(Arc::new(GpuGate::new(config.ocr.gpu_permits)));

        #[cfg(feature = "native")]
        {
            use crate::ocr::{ExtractorKind, OcrEngineExtractor};

            for (index, lang) in config.ocr.languages.iter().enumerate() {
                let dir = config.ocr.language_dir(index);
                match OcrEngineExtractor::from_dir(&dir, lang, &config.ocr) {
                    Ok(engine) => {
                        caps.ocr.push(Arc::new(engine.with_gpu_gate(caps.gpu.clone())));
                    }
                    Err(e) => warn!("OCR engine for '{}' unavailable: {}", lang, e),
                }
            }

            if let Some(dir) = config.ocr.handwriting_model_dir.as_ref() {
                match OcrEngineExtractor::from_dir(dir, "handwriting", &config.ocr) {
                    Ok(engine) => {
                        let engine = engine
                            .with_kind(ExtractorKind::Handwriting)
                            .with_gpu_gate(caps.gpu.clone());
                        caps.handwriting = Some(Arc::new(engine));
                    }
                    Err(e) => warn!("Handwriting recognizer unavailable: {}", e),
                }
            }
        }

        #[cfg(not(feature = "native"))]
        debug!("Built without the native feature; OCR engines disabled");

        info!(
            "Capabilities: {} OCR engine(s), handwriting {}, sequence {}, layout {}",
            caps.ocr.len(),
            caps.handwriting.is_some(),
            caps.sequence.is_some(),
            caps.layout.is_some()
        );
        debug!("{:?}", caps);

        caps
    }
}
