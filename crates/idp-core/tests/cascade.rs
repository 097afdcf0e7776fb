use std::sync::Arc;

use idp_core::extraction::scoped_fields;
use idp_core::models::config::CascadeConfig;
use idp_core::ocr::TableExtractor;
use idp_core::{
    DocumentClassifier, DocumentType, ExtractionError, FieldCascade, FieldSource, LayoutClassifier,
    TextBlock,
};
use image::DynamicImage;
use pretty_assertions::assert_eq;

const INVOICE_TEXT: &str =
    "Invoice Number: INV-000123\nDate: 12 Jan 2024\nTotal: AED 1,250.00\nFrom: Acme Trading LLC";

struct FailingLayout;

impl LayoutClassifier for FailingLayout {
    fn classify(
        &self,
        _image: &DynamicImage,
        _words: &[String],
        _boxes: &[[u32; 4]],
    ) -> Result<Vec<String>, ExtractionError> {
        Err(ExtractionError::Layout("model crashed".into()))
    }
}

/// Returns one label too few.
struct ShortLayout;

impl LayoutClassifier for ShortLayout {
    fn classify(
        &self,
        _image: &DynamicImage,
        words: &[String],
        _boxes: &[[u32; 4]],
    ) -> Result<Vec<String>, ExtractionError> {
        Ok(vec!["O".to_string(); words.len().saturating_sub(1)])
    }
}

/// Labels every amount-shaped word as a total.
struct TotalsLayout;

impl LayoutClassifier for TotalsLayout {
    fn classify(
        &self,
        _image: &DynamicImage,
        words: &[String],
        _boxes: &[[u32; 4]],
    ) -> Result<Vec<String>, ExtractionError> {
        Ok(words
            .iter()
            .map(|w| {
                if w.chars().any(|c| c.is_ascii_digit()) && w.contains('.') {
                    "B-TOTAL".to_string()
                } else {
                    "O".to_string()
                }
            })
            .collect())
    }
}

fn invoice_blocks() -> Vec<TextBlock> {
    INVOICE_TEXT
        .lines()
        .enumerate()
        .map(|(i, line)| TextBlock::from_rect(line, 0.9, 20.0, 20.0 + i as f32 * 30.0, 400.0, 20.0))
        .collect()
}

fn page_image() -> DynamicImage {
    DynamicImage::new_rgb8(600, 200)
}

#[test]
fn invoice_round_trip() {
    let fields = FieldCascade::default().extract_fields(INVOICE_TEXT, DocumentType::Invoice, &[], None);

    assert_eq!(fields.value("invoice_number"), Some("INV-000123"));
    assert_eq!(fields.value("date"), Some("12 Jan 2024"));
    assert_eq!(fields.value("total_amount"), Some("AED 1,250.00"));
    assert_eq!(fields.value("vendor_name"), Some("Acme Trading LLC"));

    assert_eq!(fields.get("date").and_then(|f| f.normalized.as_deref()), Some("2024-01-12"));
    assert_eq!(fields.get("total_amount").and_then(|f| f.normalized.as_deref()), Some("1250"));
    assert_eq!(fields.get("invoice_number").map(|f| f.source), Some(FieldSource::ScopedPattern));
}

#[test]
fn classification_scenario() {
    let classifier = DocumentClassifier::new();

    let (doc_type, confidence) = classifier.classify(
        "Invoice Number: 42\nTotal Amount: 10.00\nPayment Terms: Net 30\nDue Date: 01/02/2024",
    );
    assert_eq!(doc_type, DocumentType::Invoice);
    assert!(confidence > 0.5);

    assert_eq!(classifier.classify("the quick brown fox jumps"), (DocumentType::Unknown, 0.0));
}

#[test]
fn table_grouping_scenario() {
    let cell = |text: &str, x: f32, y: f32| TextBlock::from_rect(text, 0.9, x, y, 80.0, 10.0);
    let mut blocks = Vec::new();
    for (y, row) in [
        (100.0, ["Description", "Qty", "Price", "Total"]),
        (120.0, ["Widget", "2", "10.00", "20.00"]),
        (140.0, ["Bolt", "4", "2.50", "10.00"]),
    ] {
        for (i, text) in row.iter().enumerate() {
            blocks.push(cell(text, 10.0 + i as f32 * 120.0, y));
        }
    }

    let tables = TableExtractor::default().extract(&blocks, DocumentType::Invoice);

    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(table.row_count, 2);
    assert_eq!(table.column_count, 4);
    assert_eq!(table.table_type, "line_items");
    assert_eq!(table.header.as_deref().map(|h| h[0].as_str()), Some("Description"));
    assert_eq!(table.rows[1], vec!["Bolt", "4", "2.50", "10.00"]);
}

#[test]
fn failing_layout_classifier_degrades_gracefully() {
    for classifier in [Arc::new(FailingLayout) as Arc<dyn LayoutClassifier>, Arc::new(ShortLayout)] {
        let cascade = FieldCascade::default().with_layout_classifier(classifier);
        let (fields, report) = cascade.run(INVOICE_TEXT, DocumentType::Invoice, &invoice_blocks(), Some(&page_image()));

        assert!(report.layout_failed);
        assert_eq!(report.layout, 0);
        assert_eq!(fields.value("invoice_number"), Some("INV-000123"));
        assert!(report.scoped >= 4);
    }
}

#[test]
fn layout_stage_writes_first() {
    let cascade = FieldCascade::default().with_layout_classifier(Arc::new(TotalsLayout));
    let (fields, report) = cascade.run(INVOICE_TEXT, DocumentType::Invoice, &invoice_blocks(), Some(&page_image()));

    assert!(!report.layout_failed);
    assert_eq!(report.layout, 1);
    let total = fields.get("total_amount").unwrap();
    assert_eq!(total.source, FieldSource::LayoutModel);
    assert_eq!(total.value, "1,250.00");
}

#[test]
fn layout_stage_needs_an_image() {
    let cascade = FieldCascade::default().with_layout_classifier(Arc::new(FailingLayout));
    let (_, report) = cascade.run(INVOICE_TEXT, DocumentType::Invoice, &invoice_blocks(), None);
    assert!(!report.layout_failed);
}

#[test]
fn extraction_is_idempotent() {
    let cascade = FieldCascade::default();
    let blocks = invoice_blocks();
    let first = cascade.extract_fields(INVOICE_TEXT, DocumentType::Invoice, &blocks, None);
    let second = cascade.extract_fields(INVOICE_TEXT, DocumentType::Invoice, &blocks, None);
    assert_eq!(first, second);
}

#[test]
fn later_stages_only_add_fields() {
    let text = "Receipt\nRef No: R-5521\nContact: jane@example.com\nPhone: +44 20 7946 0958";
    let cascade = FieldCascade::default();

    let scoped = scoped_fields(text, DocumentType::Receipt);
    let (all, report) = cascade.run(text, DocumentType::Receipt, &[], None);

    assert!(report.escalated);
    assert!(all.len() >= scoped.len());
    for name in scoped.names() {
        assert!(all.contains(name), "{} lost", name);
    }
    assert_eq!(all.value("email"), Some("jane@example.com"));
    assert_eq!(all.get("email").map(|f| f.source), Some(FieldSource::UniversalPattern));
}

#[test]
fn confidence_stays_in_bounds() {
    let cascade = FieldCascade::default();
    let texts = [
        "",
        "nothing useful here",
        INVOICE_TEXT,
        "Invoice INV-9\nTotal: 5.00\nDue Date: 2024-03-01\nBill To: Someone\nVAT: 1.00",
    ];

    for text in texts {
        for doc_type in [DocumentType::Invoice, DocumentType::Contract, DocumentType::Unknown] {
            let (fields, report) = cascade.run(text, doc_type, &[], None);
            assert!((0.0..=1.0).contains(&report.confidence));
            if fields.is_empty() {
                assert_eq!(report.confidence, 0.0);
            }
        }
    }
}

#[test]
fn escalation_threshold() {
    let cascade = FieldCascade::default();

    let (_, enough) = cascade.run(
        "Invoice No: INV-77\nDate: 01/02/2024\nTotal: 99.00",
        DocumentType::Invoice,
        &[],
        None,
    );
    assert_eq!(enough.scoped, 3);
    assert!(!enough.escalated);
    assert_eq!(enough.universal, 0);

    let (_, short) = cascade.run(
        "Invoice No: INV-77\nTotal: 99.00\nEmail: ap@example.com",
        DocumentType::Invoice,
        &[],
        None,
    );
    assert_eq!(short.scoped, 2);
    assert!(short.escalated);
    assert!(short.universal >= 1);
}

#[test]
fn minimum_field_counts_are_configurable() {
    let config = CascadeConfig {
        min_fields_default: 10,
        ..CascadeConfig::default()
    };
    let (_, report) = FieldCascade::new(config).run(
        "Agreement between the parties\nEffective Date: 2024-05-01",
        DocumentType::Contract,
        &[],
        None,
    );
    assert!(report.escalated);
}

#[test]
fn bbox_heuristics_when_patterns_fall_short() {
    let blocks = vec![
        TextBlock::from_rect("IDENTITY CARD", 0.9, 0.0, 0.0, 200.0, 20.0),
        TextBlock::from_rect("1234567890", 0.9, 0.0, 30.0, 120.0, 20.0),
        TextBlock::from_rect("15/03/2021", 0.9, 0.0, 60.0, 120.0, 20.0),
    ];
    let text = "IDENTITY CARD\n1234567890\n15/03/2021";

    let (fields, report) = FieldCascade::default().run(text, DocumentType::Invoice, &blocks, None);

    assert!(report.bbox >= 1);
    assert_eq!(report.keyword, 0);
    assert_eq!(fields.value("license_number"), Some("1234567890"));
    assert_eq!(fields.get("license_number").map(|f| f.source), Some(FieldSource::BboxHeuristic));
}
