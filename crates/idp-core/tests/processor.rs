use std::fs;
use std::sync::Arc;

use idp_core::{
    Capabilities, DocumentProcessor, DocumentType, ExtractorError, ExtractorKind, IdpConfig, IdpError,
    TextBlock, TextExtractor,
};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const INVOICE: &str = "\
INVOICE
Invoice Number: INV-2024-0042
Date: 03/04/2024
Due Date: 03/05/2024
Bill To: Harbor Supplies
Total Amount: $2,480.50
Payment Terms: Net 30
";

/// OCR stand-in that always reads the same lines.
struct CannedOcr(Vec<TextBlock>);

impl TextExtractor for CannedOcr {
    fn name(&self) -> &str {
        "canned"
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::Ocr
    }

    fn extract(&self, _image: &DynamicImage) -> Result<Vec<TextBlock>, ExtractorError> {
        Ok(self.0.clone())
    }
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn missing_file_is_an_error() {
    let processor = DocumentProcessor::text_only(IdpConfig::default());
    let err = processor.process_document("does/not/exist.pdf".as_ref()).unwrap_err();
    assert!(matches!(err, IdpError::FileNotFound(_)));
}

#[test]
fn unknown_extension_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "archive.xyz", "data");

    let processor = DocumentProcessor::text_only(IdpConfig::default());
    let err = processor.process_document(&path).unwrap_err();
    assert!(matches!(err, IdpError::UnsupportedFormat(ref ext) if ext == "xyz"));
}

#[test]
fn text_document_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "invoice.txt", INVOICE);

    let processor = DocumentProcessor::text_only(IdpConfig::default());
    let result = processor.process_document(&path).unwrap();

    assert_eq!(result.document_type, DocumentType::Invoice);
    assert_eq!(result.page_count, 1);
    assert_eq!(result.fields.value("invoice_number"), Some("INV-2024-0042"));
    assert_eq!(result.fields.value("due_date"), Some("03/05/2024"));
    assert_eq!(result.fields.value("customer_name"), Some("Harbor Supplies"));
    assert!(result.confidence > 0.5 && result.confidence <= 1.0);
    assert!(result.tables.is_empty());
    assert!(result.headers.is_empty());
}

#[test]
fn empty_text_document() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "blank.md", "\n\n   \n");

    let result = DocumentProcessor::text_only(IdpConfig::default())
        .process_document(&path)
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(result.document_type, DocumentType::Unknown);
    assert_eq!(result.confidence, 0.0);
}

#[test]
fn result_serializes_with_box_keys() {
    let processor = DocumentProcessor::text_only(IdpConfig::default());
    let json = serde_json::to_value(processor.process_text(INVOICE)).unwrap();

    assert_eq!(json["document_type"], "invoice");
    assert!(json["bounding_boxes"][0]["box"].is_null());
    assert_eq!(json["fields"]["invoice_number"], "INV-2024-0042");
    assert_eq!(json["field_details"]["invoice_number"]["source"], "scoped_pattern");

    let back: idp_core::ProcessingResult = serde_json::from_value(json).unwrap();
    assert_eq!(back.fields.value("invoice_number"), Some("INV-2024-0042"));
}

#[test]
fn result_fields_serialize_as_plain_values() {
    let processor = DocumentProcessor::text_only(IdpConfig::default());
    let json = serde_json::to_value(processor.process_text(INVOICE)).unwrap();

    let fields = json["fields"].as_object().unwrap();
    assert!(fields.len() >= 3);
    assert!(fields.values().all(|v| v.is_string()));
}

#[test]
fn image_document_through_ocr_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scan.png");
    RgbImage::from_pixel(320, 200, Rgb([255, 255, 255])).save(&path).unwrap();

    let line = |text: &str, y: f32| TextBlock::from_rect(text, 0.93, 10.0, y, 280.0, 14.0);
    let ocr = CannedOcr(vec![
        line("RECEIPT", 10.0),
        line("Store: Corner Market", 30.0),
        line("Date: 14/02/2024", 50.0),
        line("Total: 18.40", 70.0),
        line("Thank you for shopping", 90.0),
    ]);

    let mut config = IdpConfig::default();
    config.preprocess.enabled = false;
    let processor = DocumentProcessor::new(config, Capabilities::none().with_ocr(Arc::new(ocr)));
    let result = processor.process_document(&path).unwrap();

    assert_eq!(result.document_type, DocumentType::Receipt);
    assert_eq!(result.bounding_boxes.len(), 5);
    assert!(result.bounding_boxes.iter().all(|b| b.bbox.is_some()));
    assert_eq!(result.fields.value("vendor_name"), Some("Corner Market"));
    assert_eq!(result.fields.value("total_amount"), Some("18.40"));
}

#[test]
fn processor_is_shareable_across_threads() {
    let processor = Arc::new(DocumentProcessor::text_only(IdpConfig::default()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let processor = Arc::clone(&processor);
            std::thread::spawn(move || processor.process_text(INVOICE).fields.len())
        })
        .collect();

    let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(counts.windows(2).all(|w| w[0] == w[1]));
    assert!(counts[0] >= 3);
}

const PAGE_ONE: &[&str] = &[
    "ACME SUPPLY CO",
    "INVOICE",
    "Invoice Number: INV-5001",
    "Bill To: Harbor Supplies",
    "Page 1 of 2",
];

/// One page of a generated PDF: its text layer and whether it carries a scan.
struct PdfPage<'a> {
    lines: &'a [&'a str],
    scanned: bool,
}

/// Write a PDF with Helvetica text layers and, on scanned pages, a small
/// white page image.
fn write_pdf(dir: &TempDir, name: &str, pages: &[PdfPage]) -> std::path::PathBuf {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let scan_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 40,
            "Height" => 20,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        vec![255u8; 40 * 20 * 3],
    ));

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![16.into()]),
            Operation::new("Td", vec![50.into(), 750.into()]),
        ];
        for line in page.lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if page.scanned {
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new("cm", vec![400.into(), 0.into(), 0.into(), 200.into(), 50.into(), 300.into()]),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ]);
            resources.set("XObject", dictionary! { "Im1" => scan_id });
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.path().join(name);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

/// OCR reading of the scanned second page.
fn scanned_page_ocr() -> CannedOcr {
    let line = |text: &str, y: f32| TextBlock::from_rect(text, 0.94, 20.0, y, 360.0, 16.0);
    CannedOcr(vec![
        line("INVOICE (continued)", 20.0),
        line("Subtotal: $70.00", 60.0),
        line("Total Amount: $75.00", 100.0),
        line("Thank you for your business", 140.0),
    ])
}

fn pdf_processor(configure: impl FnOnce(&mut IdpConfig)) -> DocumentProcessor {
    let mut config = IdpConfig::default();
    config.preprocess.enabled = false;
    configure(&mut config);
    DocumentProcessor::new(config, Capabilities::none().with_ocr(Arc::new(scanned_page_ocr())))
}

#[test]
fn pdf_mixes_text_layer_and_scanned_pages() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(
        &dir,
        "mixed.pdf",
        &[
            PdfPage { lines: PAGE_ONE, scanned: false },
            PdfPage { lines: &[], scanned: true },
        ],
    );

    let result = pdf_processor(|_| {}).process_document(&path).unwrap();

    assert_eq!(result.page_count, 2);
    assert_eq!(result.document_type, DocumentType::Invoice);
    assert_eq!(result.fields.value("invoice_number"), Some("INV-5001"));
    assert_eq!(result.fields.value("total_amount"), Some("$75.00"));
    assert!(result.extracted_text.contains("Harbor Supplies"));
    assert!(result.extracted_text.contains("Thank you for your business"));

    assert_eq!(result.headers.len(), 2);
    assert_eq!(result.headers[0].page, 1);
    assert!(result.headers[0].text.contains("ACME SUPPLY CO"));
    assert!(result.footers[0].text.contains("Page 1 of 2"));
    assert_eq!(result.headers[1].page, 2);
    assert_eq!(result.headers[1].text, "INVOICE (continued)");
    assert_eq!(result.footers[1].text, "Thank you for your business");
}

#[test]
fn pdf_scanned_page_keeps_its_short_text_layer() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(
        &dir,
        "stamped.pdf",
        &[
            PdfPage { lines: PAGE_ONE, scanned: false },
            PdfPage { lines: &["Scan ref 42"], scanned: true },
        ],
    );

    let result = pdf_processor(|_| {}).process_document(&path).unwrap();

    assert!(result.extracted_text.contains("Scan ref 42"));
    assert!(result.extracted_text.contains("Total Amount: $75.00"));
    assert_eq!(result.headers[1].text, "INVOICE (continued)");
    assert_eq!(result.footers[1].text, "Thank you for your business");
}

#[test]
fn pdf_max_pages_truncates() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(
        &dir,
        "long.pdf",
        &[
            PdfPage { lines: PAGE_ONE, scanned: false },
            PdfPage { lines: &[], scanned: true },
        ],
    );

    let result = pdf_processor(|config| config.pdf.max_pages = 1)
        .process_document(&path)
        .unwrap();

    assert_eq!(result.page_count, 1);
    assert_eq!(result.headers.len(), 1);
    assert_eq!(result.fields.value("invoice_number"), Some("INV-5001"));
    assert!(!result.fields.contains("total_amount"));
}

#[test]
fn pdf_spilled_pages_are_cleaned_up() {
    let dir = TempDir::new().unwrap();
    let spill = TempDir::new().unwrap();
    let path = write_pdf(
        &dir,
        "scan.pdf",
        &[
            PdfPage { lines: PAGE_ONE, scanned: false },
            PdfPage { lines: &[], scanned: true },
        ],
    );

    let spill_dir = spill.path().to_path_buf();
    let result = pdf_processor(|config| config.pdf.spill_dir = Some(spill_dir))
        .process_document(&path)
        .unwrap();

    assert_eq!(result.fields.value("total_amount"), Some("$75.00"));
    assert_eq!(fs::read_dir(spill.path()).unwrap().count(), 0);
}

#[test]
fn pdf_unwritable_spill_dir_falls_back_to_text_layer() {
    let dir = TempDir::new().unwrap();
    let blocker = write(&dir, "not-a-directory", "x");
    let path = write_pdf(
        &dir,
        "scan.pdf",
        &[
            PdfPage { lines: PAGE_ONE, scanned: false },
            PdfPage { lines: &["Scan ref 42"], scanned: true },
        ],
    );

    let result = pdf_processor(|config| config.pdf.spill_dir = Some(blocker.join("pages")))
        .process_document(&path)
        .unwrap();

    assert_eq!(result.page_count, 2);
    assert!(result.extracted_text.contains("Scan ref 42"));
    assert!(!result.fields.contains("total_amount"));
    assert_eq!(result.fields.value("invoice_number"), Some("INV-5001"));
}
