//! Document processing entry point.
//!
//! [`DocumentProcessor`] picks a path per input format, gathers text blocks
//! and runs classification, the field cascade and table detection over them.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use quick_xml::events::Event;
use quick_xml::Reader;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::combine::ResultCombiner;
use crate::error::{IdpError, Result};
use crate::extraction::{average_confidence, meets_thresholds, DocumentClassifier, FieldCascade};
use crate::models::{blocks_text, IdpConfig, ProcessingResult, TextBlock};
use crate::ocr::{
    dedup_blocks, run_extractor, DirectTextExtractor, ExtractorCascade, HeaderFooter, Preprocessor,
    SequenceModelExtractor, TableExtractor, TextExtractor,
};
use crate::pdf::PdfDocument;

/// Input families handled by [`DocumentProcessor::process_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Image,
    Pdf,
    /// Plain text read as-is.
    Text,
    Docx,
}

impl InputFormat {
    /// Format for a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "tif" | "tiff" | "bmp" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "csv" | "json" | "xml" | "html" | "htm" => Some(Self::Text),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Format for a path, by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Processes documents end to end.
///
/// Built once from configuration and loaded backends, then shared; every
/// method takes `&self`.
#[derive(Debug)]
pub struct DocumentProcessor {
    config: IdpConfig,
    caps: Capabilities,
    preprocessor: Preprocessor,
    classifier: DocumentClassifier,
    fields: FieldCascade,
    tables: TableExtractor,
    sequence: Option<Arc<SequenceModelExtractor>>,
}

/// Blocks read from one prepared image.
struct ImageRead {
    blocks: Vec<TextBlock>,
    sequence_ran: bool,
}

impl DocumentProcessor {
    pub fn new(config: IdpConfig, caps: Capabilities) -> Self {
        let mut fields = FieldCascade::new(config.cascade.clone());
        if let Some(layout) = caps.layout.clone() {
            fields = fields.with_layout_classifier(layout);
        }

        let sequence = caps.sequence.clone().map(|generator| {
            Arc::new(
                SequenceModelExtractor::new(generator)
                    .with_base_confidence(config.fallback.sequence_base_confidence)
                    .with_gpu_gate(caps.gpu.clone()),
            )
        });

        Self {
            preprocessor: Preprocessor::new(config.preprocess.clone()),
            classifier: DocumentClassifier::new(),
            tables: TableExtractor::new(config.table.clone()),
            fields,
            sequence,
            caps,
            config,
        }
    }

    /// Processor with no model backends: text inputs and PDF text layers only.
    pub fn text_only(config: IdpConfig) -> Self {
        Self::new(config, Capabilities::none())
    }

    pub fn config(&self) -> &IdpConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Process a file of any supported format.
    pub fn process_document(&self, path: &Path) -> Result<ProcessingResult> {
        let start = Instant::now();

        if !path.exists() {
            return Err(IdpError::FileNotFound(path.to_path_buf()));
        }
        let format = InputFormat::from_path(path).ok_or_else(|| {
            IdpError::UnsupportedFormat(
                path.extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            )
        })?;

        debug!("Processing {} as {:?}", path.display(), format);

        let mut result = match format {
            InputFormat::Image => {
                let image = image::open(path)?;
                self.process_image(&image)
            }
            InputFormat::Pdf => self.process_pdf(path)?,
            InputFormat::Text => {
                let bytes = std::fs::read(path)?;
                self.process_text(&String::from_utf8_lossy(&bytes))
            }
            InputFormat::Docx => {
                let bytes = std::fs::read(path)?;
                self.process_text(&docx_text(&bytes)?)
            }
        };

        result.processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Processed {}: {} ({} fields, confidence {:.2}) in {}ms",
            path.display(),
            result.document_type,
            result.fields.len(),
            result.confidence,
            result.processing_time_ms
        );

        Ok(result)
    }

    /// Run the full image path: preprocessing, extractors with fallbacks,
    /// classification, fields and tables.
    pub fn process_image(&self, image: &DynamicImage) -> ProcessingResult {
        let start = Instant::now();
        let prepared = self.preprocessor.preprocess(image);
        let read = self.read_image(&prepared);

        let mut result = self.finish_image(read, &prepared);
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Run the extractor stages over a prepared image.
    ///
    /// OCR, handwriting and the sequence model are successive stages, each
    /// reached while the blocks so far are too short or too uncertain. A
    /// fallback the cascade did not reach still runs when the average
    /// confidence drops below its own threshold, and the sequence model also
    /// runs for the forced document types.
    fn read_image(&self, prepared: &DynamicImage) -> ImageRead {
        let fallback = &self.config.fallback;
        let handwriting = self.caps.handwriting.clone().filter(|_| fallback.handwriting_enabled);
        let sequence = self.sequence.clone().filter(|_| fallback.sequence_enabled);

        let mut cascade = ExtractorCascade::new()
            .with_thresholds(self.config.ocr.min_text_length, self.config.ocr.min_avg_confidence)
            .then_all(self.caps.ocr.clone());
        if let Some(handwriting) = &handwriting {
            cascade = cascade.then(handwriting.clone());
        }
        if let Some(sequence) = &sequence {
            cascade = cascade.then(sequence.clone());
        }

        let run = cascade.run(prepared);
        debug!("Extractors attempted: {:?} (sufficient: {})", run.attempted, run.sufficient);

        let attempted = |name: &str| run.attempted.iter().any(|a| a == name);
        let handwriting_ran = handwriting.as_ref().is_some_and(|h| attempted(h.name()));
        let mut sequence_ran = sequence.as_ref().is_some_and(|s| attempted(s.name()));
        let mut blocks = run.blocks;

        if let Some(handwriting) = handwriting.as_deref().filter(|_| !handwriting_ran) {
            let avg = average_confidence(&blocks);
            if avg < fallback.handwriting_threshold {
                debug!("Average confidence {:.2} below handwriting threshold", avg);
                blocks.extend(run_extractor(handwriting, prepared));
            }
        }

        if let Some(sequence) = sequence.as_deref().filter(|_| !sequence_ran) {
            let avg = average_confidence(&blocks);
            let (doc_type, _) = self.classifier.classify(&blocks_text(&blocks));
            if avg < fallback.sequence_threshold || fallback.force_sequence_for.contains(&doc_type) {
                debug!("Running sequence model (confidence {:.2}, type {})", avg, doc_type);
                blocks.extend(run_extractor(sequence, prepared));
                sequence_ran = true;
            }
        }

        ImageRead {
            blocks: dedup_blocks(blocks),
            sequence_ran,
        }
    }

    /// Analyze blocks read from an image, boosting sequence-model blocks by
    /// the number of fields they helped find.
    fn finish_image(&self, read: ImageRead, image: &DynamicImage) -> ProcessingResult {
        let mut result = self.analyze(read.blocks, Some(image));

        if read.sequence_ran {
            if let Some(sequence) = self.sequence.as_ref() {
                sequence.boost_confidence(&mut result.bounding_boxes, result.fields.len());
            }
        }

        result
    }

    /// Run classification and field extraction over plain text.
    pub fn process_text(&self, text: &str) -> ProcessingResult {
        let start = Instant::now();
        let text = text.trim();
        let blocks = if text.is_empty() {
            Vec::new()
        } else {
            vec![TextBlock::unlocated(text, 1.0)]
        };

        let mut result = self.analyze(blocks, None);
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Classification, field cascade and tables over extracted blocks.
    fn analyze(&self, blocks: Vec<TextBlock>, image: Option<&DynamicImage>) -> ProcessingResult {
        let text = blocks_text(&blocks);
        if text.trim().is_empty() {
            debug!("No text extracted");
            return ProcessingResult::empty();
        }

        let (document_type, type_confidence) = self.classifier.classify(&text);
        debug!("Classified as {} ({:.3})", document_type, type_confidence);

        let (fields, report) = self.fields.run(&text, document_type, &blocks, image);
        let tables = self.tables.extract(&blocks, document_type);

        ProcessingResult {
            extracted_text: text,
            document_type,
            confidence: report.confidence,
            bounding_boxes: blocks,
            fields,
            tables,
            page_count: 1,
            ..ProcessingResult::empty()
        }
    }

    fn process_pdf(&self, path: &Path) -> Result<ProcessingResult> {
        let pdf = PdfDocument::open(path)?;
        let page_blocks = DirectTextExtractor::extract_pages(&pdf).unwrap_or_else(|e| {
            warn!("Text layer unreadable, falling back to page images: {}", e);
            vec![None; pdf.page_count() as usize]
        });

        let mut page_total = page_blocks.len().max(pdf.page_count() as usize);
        if self.config.pdf.max_pages > 0 && page_total > self.config.pdf.max_pages {
            warn!(
                "PDF has {} pages, processing the first {}",
                page_total, self.config.pdf.max_pages
            );
            page_total = self.config.pdf.max_pages;
        }

        // Dropped on return, removing any spilled page images.
        let mut spill: Option<TempDir> = None;
        let mut pages = Vec::with_capacity(page_total);

        for index in 0..page_total {
            let page = index as u32 + 1;
            let direct: Vec<TextBlock> = page_blocks.get(index).cloned().flatten().into_iter().collect();
            let text_layer_ok = self.config.pdf.prefer_text_layer
                && meets_thresholds(&direct, self.config.ocr.min_text_length, self.config.ocr.min_avg_confidence);

            let scanned = if text_layer_ok {
                debug!("Page {}: using text layer", page);
                None
            } else {
                self.ocr_page(&pdf, page, &mut spill)
            };

            let mut result = match scanned {
                Some((image, mut read)) if !read.blocks.is_empty() => {
                    debug!("Page {}: {} OCR blocks, merged with the text layer", page, read.blocks.len());
                    read.blocks.extend(direct);
                    read.blocks = dedup_blocks(read.blocks);
                    self.finish_image(read, &image)
                }
                _ => {
                    if !text_layer_ok {
                        debug!("Page {}: nothing read from the page image, using text layer", page);
                    }
                    self.analyze(direct, None)
                }
            };

            result.page_count = 1;
            let (header, footer) = HeaderFooter::extract(page, &result.bounding_boxes, result.document_type);
            result.headers.extend(header);
            result.footers.extend(footer);
            pages.push(result);
        }

        Ok(ResultCombiner::combine(pages))
    }

    /// Read the embedded image of a scanned page, if there is one and any
    /// image extractor is loaded. Returns the prepared image with its blocks.
    ///
    /// Pages are spilled to disk under `spill`, created on first use. Any
    /// failure here is logged and leaves the page to its text layer.
    fn ocr_page(&self, pdf: &PdfDocument, page: u32, spill: &mut Option<TempDir>) -> Option<(DynamicImage, ImageRead)> {
        if !self.caps.has_ocr() && self.caps.handwriting.is_none() && self.sequence.is_none() {
            return None;
        }

        let image = match pdf.page_image(page) {
            Ok(Some(image)) => image,
            Ok(None) => return None,
            Err(e) => {
                warn!("Page {}: image extraction failed: {}", page, e);
                return None;
            }
        };

        if spill.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("idp-pages");
            let dir = match &self.config.pdf.spill_dir {
                Some(parent) => builder.tempdir_in(parent),
                None => builder.tempdir(),
            };
            match dir {
                Ok(dir) => *spill = Some(dir),
                Err(e) => {
                    warn!("Page {}: cannot create spill directory: {}", page, e);
                    return None;
                }
            }
        }
        let page_path = spill.as_ref()?.path().join(format!("page-{:04}.png", page));

        let image = match image.save(&page_path).and_then(|()| image::open(&page_path)) {
            Ok(image) => image,
            Err(e) => {
                warn!("Page {}: cannot spill page image to {}: {}", page, page_path.display(), e);
                return None;
            }
        };
        debug!("Page {}: OCR on {}", page, page_path.display());

        let prepared = self.preprocessor.preprocess(&image);
        let read = self.read_image(&prepared);
        Some((prepared, read))
    }
}

/// Paragraph text of a .docx file, one paragraph per line.
fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(invalid_docx)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(invalid_docx)?
        .read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(invalid_docx)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        paragraphs.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Empty(e) if matches!(e.local_name().as_ref(), b"tab" | b"br") => current.push(' '),
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(invalid_docx)?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs.join("\n"))
}

fn invalid_docx(e: impl std::fmt::Display) -> IdpError {
    IdpError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("unreadable docx: {}", e),
    ))
}
