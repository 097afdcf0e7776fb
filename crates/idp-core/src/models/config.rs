//! Configuration structures for the document processing pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{IdpError, Result};
use crate::models::document::DocumentType;

/// Main configuration for the idp pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdpConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Image preprocessing configuration.
    pub preprocess: PreprocessConfig,

    /// Fallback recognizer configuration.
    pub fallback: FallbackConfig,

    /// Field extraction cascade configuration.
    pub cascade: CascadeConfig,

    /// Table detection configuration.
    pub table: TableConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Language codes; one OCR engine is created per language.
    pub languages: Vec<String>,

    /// Directory containing model files. Languages after the first are
    /// loaded from `<model_dir>/<lang>/`.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Keep `[UNK]` tokens in recognized text.
    pub keep_unk: bool,

    /// Directory with a handwriting-specialized recognizer (same file layout).
    pub handwriting_model_dir: Option<PathBuf>,

    /// Number of concurrent GPU-using calls allowed.
    pub gpu_permits: usize,

    /// Minimum total text length for an extraction to count as sufficient.
    pub min_text_length: usize,

    /// Minimum average block confidence for an extraction to count as sufficient.
    pub min_avg_confidence: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "rec.onnx".to_string(),
            dictionary: "dict.txt".to_string(),
            keep_unk: false,
            handwriting_model_dir: None,
            gpu_permits: 1,
            min_text_length: 50,
            min_avg_confidence: 0.5,
        }
    }
}

impl OcrConfig {
    /// Model directory for a language, by its position in `languages`.
    pub fn language_dir(&self, index: usize) -> PathBuf {
        match (index, self.languages.get(index)) {
            (0, _) | (_, None) => self.model_dir.clone(),
            (_, Some(lang)) => self.model_dir.join(lang),
        }
    }
}

/// Binarization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Binarize only dark, noisy images.
    Auto,
    On,
    Off,
}

impl FromStr for ThresholdMode {
    type Err = IdpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" | "true" | "1" => Ok(Self::On),
            "off" | "false" | "0" => Ok(Self::Off),
            other => Err(IdpError::Config(format!(
                "invalid adaptive threshold mode '{}', expected auto|on|off",
                other
            ))),
        }
    }
}

/// Denoise policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMode {
    None,
    Light,
}

impl FromStr for DenoiseMode {
    type Err = IdpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "light" => Ok(Self::Light),
            other => Err(IdpError::Config(format!(
                "invalid denoise mode '{}', expected none|light",
                other
            ))),
        }
    }
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Run preprocessing at all.
    pub enabled: bool,

    /// Convert to grayscale.
    pub grayscale: bool,

    /// Apply CLAHE local contrast enhancement.
    pub clahe: bool,

    /// CLAHE clip limit (multiple of the average bin height).
    pub clahe_clip_limit: f32,

    /// CLAHE tile grid size (tiles per side).
    pub clahe_tiles: u32,

    /// Denoise policy.
    pub denoise: DenoiseMode,

    /// Binarization policy.
    pub adaptive_threshold: ThresholdMode,

    /// Upscale factor (>= 1.0).
    pub upscale: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grayscale: true,
            clahe: true,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            denoise: DenoiseMode::None,
            adaptive_threshold: ThresholdMode::Auto,
            upscale: 1.0,
        }
    }
}

/// Fallback recognizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Enable the handwriting recognizer fallback.
    pub handwriting_enabled: bool,

    /// Run the handwriting recognizer below this average OCR confidence.
    pub handwriting_threshold: f32,

    /// Enable the sequence-model fallback.
    pub sequence_enabled: bool,

    /// Run the sequence model below this average OCR confidence.
    pub sequence_threshold: f32,

    /// Always run the sequence model for these document types.
    pub force_sequence_for: Vec<DocumentType>,

    /// Confidence given to sequence-model lines.
    pub sequence_base_confidence: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            handwriting_enabled: false,
            handwriting_threshold: 0.65,
            sequence_enabled: false,
            sequence_threshold: 0.60,
            force_sequence_for: Vec::new(),
            sequence_base_confidence: 0.8,
        }
    }
}

/// Field extraction cascade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Minimum field count for invoices and receipts before escalation stops.
    pub min_fields_financial: usize,

    /// Minimum field count for all other types.
    pub min_fields_default: usize,

    /// Weight of field coverage in the final confidence.
    pub coverage_weight: f32,

    /// Weight of important-field presence in the final confidence.
    pub quality_weight: f32,

    /// Maximum length of vendor/customer names.
    pub max_name_length: usize,

    /// Maximum tokens passed to the layout classifier.
    pub layout_max_tokens: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_fields_financial: 3,
            min_fields_default: 1,
            coverage_weight: 0.5,
            quality_weight: 0.5,
            max_name_length: 50,
            layout_max_tokens: 512,
        }
    }
}

impl CascadeConfig {
    /// Minimum field count for a document type.
    pub fn min_fields(&self, doc_type: DocumentType) -> usize {
        match doc_type {
            DocumentType::Invoice | DocumentType::Receipt => self.min_fields_financial,
            _ => self.min_fields_default,
        }
    }
}

/// Table detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Vertical tolerance in pixels for grouping tokens into a line.
    pub y_tolerance: f32,

    /// Minimum data rows for a table to be emitted.
    pub min_rows: usize,

    /// Minimum columns for a table to be emitted.
    pub min_columns: usize,

    /// Maximum characters per cell.
    pub max_cell_length: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            y_tolerance: 10.0,
            min_rows: 2,
            min_columns: 2,
            max_cell_length: 50,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,

    /// Use the embedded text layer when it is sufficient.
    pub prefer_text_layer: bool,

    /// Parent directory for spilled page images (system temp dir if unset).
    pub spill_dir: Option<PathBuf>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            prefer_text_layer: true,
            spill_dir: None,
        }
    }
}

impl IdpConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| IdpError::Config(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| IdpError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment-style overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(langs) = lookup("OCR_LANG") {
            let languages: Vec<String> = split_list(&langs);
            if !languages.is_empty() {
                self.ocr.languages = languages;
            }
        }

        if let Some(value) = lookup("PREPROCESS_UPSCALE") {
            let factor: f32 = parse_value("PREPROCESS_UPSCALE", &value)?;
            self.preprocess.upscale = factor.max(1.0);
        }

        if let Some(value) = lookup("PREPROCESS_ADAPTIVE_THRESHOLD") {
            self.preprocess.adaptive_threshold = value.parse()?;
        }

        if let Some(value) = lookup("PREPROCESS_DENOISE") {
            self.preprocess.denoise = value.parse()?;
        }

        if let Some(value) = lookup("HANDWRITING_FALLBACK") {
            self.fallback.handwriting_enabled = parse_flag("HANDWRITING_FALLBACK", &value)?;
        }

        if let Some(value) = lookup("HANDWRITING_CONFIDENCE_THRESHOLD") {
            self.fallback.handwriting_threshold =
                parse_value("HANDWRITING_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = lookup("SEQUENCE_FALLBACK") {
            self.fallback.sequence_enabled = parse_flag("SEQUENCE_FALLBACK", &value)?;
        }

        if let Some(value) = lookup("SEQUENCE_CONFIDENCE_THRESHOLD") {
            self.fallback.sequence_threshold =
                parse_value("SEQUENCE_CONFIDENCE_THRESHOLD", &value)?;
        }

        if let Some(value) = lookup("SEQUENCE_FORCE_TYPES") {
            self.fallback.force_sequence_for = split_list(&value)
                .iter()
                .map(|t| t.parse::<DocumentType>().map_err(IdpError::Config))
                .collect::<Result<Vec<_>>>()?;
        }

        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| IdpError::Config(format!("invalid value for {}: '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IdpError::Config(format!("invalid flag for {}: '{}'", key, value))),
    }
}
