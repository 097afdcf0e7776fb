//! Per-document-type rulebooks: detection patterns, field patterns and the
//! field lists used for confidence weighting.

use lazy_static::lazy_static;
use regex::Regex;

use super::patterns::field_rule;
use crate::models::DocumentType;

/// Ordered extraction patterns for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    /// Field name.
    pub name: &'static str,
    /// Patterns tried in order; the first match wins.
    pub patterns: Vec<Regex>,
}

/// Everything the pipeline knows about one document type.
#[derive(Debug)]
pub struct DocumentRules {
    /// Type these rules describe.
    pub doc_type: DocumentType,
    /// Case-insensitive keyword/regex detectors used by the classifier.
    pub detection: Vec<Regex>,
    /// Field extraction patterns in application order.
    pub fields: Vec<FieldRule>,
    /// Fields whose presence drives the quality part of the confidence score.
    pub important: &'static [&'static str],
    /// Fields a complete extraction is expected to find.
    pub expected: &'static [&'static str],
}

fn detectors(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

lazy_static! {
    static ref RULEBOOKS: Vec<DocumentRules> = vec![
        DocumentRules {
            doc_type: DocumentType::Invoice,
            detection: detectors(&[
                r"\binvoice\b",
                r"\binvoice\s*(?:number|no\.?|num|#)",
                r"\btotal\s+amount\b",
                r"\bpayment\s+terms\b",
                r"\bdue\s+date\b",
                r"\bbill(?:ed)?\s+to\b",
                r"\bsub\s*-?\s*total\b",
                r"\b(?:vat|tax)\s+invoice\b",
            ]),
            fields: vec![
                field_rule("invoice_number", &[
                    r"(?i)\binvoice\s*(?:number|no\.?|num|#)\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-/]*\d[A-Z0-9\-/]*)",
                    r"\b(INV[-/]?\d{3,}[A-Z0-9\-/]*)\b",
                ]),
                field_rule("date", &[
                    r"(?im)^\s*(?:invoice\s+|issue\s+)?date(?:\s+of\s+issue)?\s*[:\-]?\s*(<DATE>)",
                    r"(?i)\b(?:dated|issued\s+on)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("due_date", &[
                    r"(?i)\b(?:due\s+date|payment\s+due|due\s+by|due\s+on)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("total_amount", &[
                    r"(?im)^\s*(?:grand\s+total|total\s+amount(?:\s+due)?|amount\s+due|total\s+due|balance\s+due|total)\s*(?:\([A-Z]{3}\))?\s*[:\-]?\s*(<AMOUNT>)",
                    r"(?i)\b(?:grand\s+total|total\s+amount|amount\s+due)\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("subtotal", &[
                    r"(?i)\bsub\s*-?\s*total\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("tax_amount", &[
                    r"(?i)\b(?:vat|tax|gst)(?:\s*\(?\d{1,2}(?:\.\d+)?\s*%\)?)?(?:\s+amount)?\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("vendor_name", &[
                    r"(?im)^\s*(?:from|vendor|seller|supplier|billed\s+by)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("customer_name", &[
                    r"(?im)^\s*(?:bill(?:ed)?\s+to|sold\s+to|customer(?:\s+name)?|client)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("purchase_order", &[
                    r"(?i)\b(?:p\.?o\.?|purchase\s+order)\s*(?:number|no\.?|#)?\s*[:#\-]\s*([A-Z0-9][A-Z0-9\-/]{2,})",
                ]),
                field_rule("payment_terms", &[
                    r"(?i)\bpayment\s+terms\s*[:\-]\s*([^\n]{2,60})",
                ]),
                field_rule("tax_id", &[
                    r"(?i)\b(?:trn|tax\s*id|vat\s*(?:no\.?|number|reg(?:istration)?(?:\s*(?:no\.?|number))?))\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{5,20})",
                ]),
            ],
            important: &["invoice_number", "date", "total_amount"],
            expected: &["invoice_number", "date", "total_amount", "vendor_name", "customer_name"],
        },
        DocumentRules {
            doc_type: DocumentType::Receipt,
            detection: detectors(&[
                r"\breceipt\b",
                r"\bcashier\b",
                r"\bchange\s+due\b",
                r"\bthank\s+you\s+for\s+(?:your\s+)?(?:purchase|shopping|visit)",
                r"\b(?:pos|terminal)\b",
                r"\bcash\b",
                r"\bcard\s+(?:ending|no\.?|number)",
                r"\btransaction\s+(?:id|no\.?|number)",
            ]),
            fields: vec![
                field_rule("receipt_number", &[
                    r"(?i)\b(?:receipt|rcpt|bill)\s*(?:number|no\.?|#)\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-/]*)",
                ]),
                field_rule("date", &[
                    r"(?i)\bdate\s*[:\-]?\s*(<DATE>)",
                    r"(?i)\b(<DATE>)",
                ]),
                field_rule("total_amount", &[
                    r"(?im)^\s*(?:grand\s+total|total\s+amount|amount\s+paid|total)\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("tax_amount", &[
                    r"(?i)\b(?:vat|tax|gst)(?:\s*\(?\d{1,2}(?:\.\d+)?\s*%\)?)?\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("vendor_name", &[
                    r"(?im)^\s*(?:store|merchant|shop)\s*[:\-]\s*([^\n]{2,})$",
                    r"\A\s*([A-Z][A-Za-z0-9&'.\- ]{2,40})[ \t]*\r?\n",
                ]),
                field_rule("payment_method", &[
                    r"(?i)\b(cash|visa|mastercard|amex|debit\s+card|credit\s+card|apple\s+pay)\b",
                ]),
                field_rule("transaction_id", &[
                    r"(?i)\btransaction\s*(?:id|no\.?|number)\s*[:#\-]?\s*([A-Z0-9\-]{4,})",
                ]),
            ],
            important: &["date", "total_amount"],
            expected: &["receipt_number", "date", "total_amount", "vendor_name"],
        },
        DocumentRules {
            doc_type: DocumentType::BankStatement,
            detection: detectors(&[
                r"\bbank\s+statement\b",
                r"\bstatement\s+(?:of\s+account|period|date)\b",
                r"\baccount\s+(?:number|no\.?)",
                r"\bopening\s+balance\b",
                r"\bclosing\s+balance\b",
                r"\b(?:deposits?|credits?)\b",
                r"\b(?:withdrawals?|debits?)\b",
                r"\biban\b",
                r"\bavailable\s+balance\b",
            ]),
            fields: vec![
                field_rule("account_number", &[
                    r"(?i)\baccount\s*(?:number|no\.?|#)\s*[:#\-]?\s*([0-9][0-9\- ]{5,24}[0-9])",
                ]),
                field_rule("iban", &[
                    r"(?i)\biban\s*[:#\-]?\s*([A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){2,7}(?:\s?[A-Z0-9]{1,4})?)",
                ]),
                field_rule("account_holder", &[
                    r"(?im)^\s*(?:account\s+(?:holder|name)|customer\s+name|name)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("statement_period", &[
                    r"(?i)\b(?:statement\s+period|period)\s*[:\-]?\s*(<DATE>\s*(?:to|-|–)\s*<DATE>)",
                ]),
                field_rule("opening_balance", &[
                    r"(?i)\bopening\s+balance\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("closing_balance", &[
                    r"(?i)\bclosing\s+balance\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("bank_name", &[
                    r"(?m)^\s*([A-Z][A-Za-z&.' ]{2,40}\s+Bank(?:\s+[A-Z][A-Za-z]+)*)\s*$",
                ]),
            ],
            important: &["account_number", "closing_balance"],
            expected: &["account_number", "account_holder", "statement_period", "opening_balance", "closing_balance"],
        },
        DocumentRules {
            doc_type: DocumentType::IdCard,
            detection: detectors(&[
                r"\bidentity\s+card\b|\bid\s+card\b",
                r"\bdate\s+of\s+birth\b|\bdob\b",
                r"\bnationality\b",
                r"\b(?:id|identity)\s+(?:number|no\.?)",
                r"\bexpiry\s+date\b|\bdate\s+of\s+expiry\b|\bexpires\b",
                r"\bsex\b|\bgender\b",
                r"\bdriving\s+licen[cs]e\b|\bdriver'?s?\s+licen[cs]e\b",
                r"\bpassport\b",
            ]),
            fields: vec![
                field_rule("id_number", &[
                    r"(?i)\b(?:id|identity|card|passport)\s*(?:number|no\.?|#)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{4,24})",
                ]),
                field_rule("full_name", &[
                    r"(?im)^\s*(?:full\s+name|name|holder)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("date_of_birth", &[
                    r"(?i)\b(?:date\s+of\s+birth|dob|birth\s+date)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("nationality", &[
                    r"(?i)\bnationality\s*[:\-]?\s*([A-Za-z][A-Za-z ]{2,30})",
                ]),
                field_rule("expiry_date", &[
                    r"(?i)\b(?:expiry\s+date|date\s+of\s+expiry|expires(?:\s+on)?|valid\s+until)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("gender", &[
                    r"(?i)\b(?:sex|gender)\s*[:\-]?\s*(male|female|m|f)\b",
                ]),
                field_rule("license_number", &[
                    r"(?i)\blicen[cs]e\s*(?:number|no\.?|#)?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{4,20})",
                ]),
            ],
            important: &["id_number", "full_name", "date_of_birth"],
            expected: &["id_number", "full_name", "date_of_birth", "nationality", "expiry_date"],
        },
        DocumentRules {
            doc_type: DocumentType::Contract,
            detection: detectors(&[
                r"\bagreement\b",
                r"\bcontract\b",
                r"\bparty\s+of\s+the\s+(?:first|second)\s+part\b|\bparties\b",
                r"\bhereinafter\b",
                r"\bwhereas\b",
                r"\bterm\s+of\s+(?:the\s+)?(?:agreement|contract)\b",
                r"\bgoverning\s+law\b",
                r"\bin\s+witness\s+whereof\b|\bsignature\b",
                r"\beffective\s+date\b",
            ]),
            fields: vec![
                field_rule("contract_number", &[
                    r"(?i)\b(?:contract|agreement)\s*(?:number|no\.?|#)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-/]{2,})",
                ]),
                field_rule("effective_date", &[
                    r"(?i)\b(?:effective\s+date|commencement\s+date|effective\s+(?:as\s+of|from))\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("expiry_date", &[
                    r"(?i)\b(?:expiry\s+date|expiration\s+date|termination\s+date|end\s+date)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("party_a", &[
                    r"(?i)\bbetween\s+([A-Z][^,\n]{2,60}?)\s*(?:\(|,|\band\b)",
                    r"(?im)^\s*(?:party\s+a|first\s+party|lessor|employer)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("party_b", &[
                    r"(?i)\bbetween\s+[^\n]{2,80}?\band\s+([A-Z][^,\n(]{2,60})",
                    r"(?im)^\s*(?:party\s+b|second\s+party|lessee|employee)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("contract_value", &[
                    r"(?i)\b(?:contract\s+value|total\s+value|consideration|fee)\s*(?:of)?\s*[:\-]?\s*(<AMOUNT>)",
                ]),
                field_rule("governing_law", &[
                    r"(?i)\bgoverned\s+by\s+the\s+laws?\s+of\s+([A-Za-z ]{3,40})",
                ]),
            ],
            important: &["effective_date", "party_a", "party_b"],
            expected: &["contract_number", "effective_date", "party_a", "party_b", "contract_value"],
        },
        DocumentRules {
            doc_type: DocumentType::EngineeringDoc,
            detection: detectors(&[
                r"\bdrawing\s+(?:number|no\.?)|\bdwg\b",
                r"\brevision\b|\brev\.?\s*[A-Z0-9]\b",
                r"\bscale\b\s*[:\-]?\s*\d+\s*:\s*\d+",
                r"\bdrawn\s+by\b",
                r"\bchecked\s+by\b",
                r"\bapproved\s+by\b",
                r"\bmaterial\b",
                r"\btolerances?\b",
                r"\bsheet\s+\d+\s+of\s+\d+\b",
            ]),
            fields: vec![
                field_rule("drawing_number", &[
                    r"(?i)\b(?:drawing|dwg)\s*(?:number|no\.?|#)?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-/.]{2,30})",
                    r"\b((?:DWG|DRG)[-\s]?\d{3,}|[A-Z]{2,4}-[A-Z0-9]{2,5}-\d{3,}(?:-[A-Z0-9]{1,3})?)\b",
                ]),
                field_rule("revision", &[
                    r"(?i)\b(?:revision|rev)\.?\s*[:\-]?\s*([A-Z0-9]{1,3})\b",
                ]),
                field_rule("scale", &[
                    r"(?i)\bscale\s*[:\-]?\s*(\d+\s*:\s*\d+)",
                ]),
                field_rule("drawn_by", &[
                    r"(?i)\bdrawn\s+by\s*[:\-]?\s*([A-Za-z][A-Za-z .]{1,30})",
                ]),
                field_rule("checked_by", &[
                    r"(?i)\bchecked\s+by\s*[:\-]?\s*([A-Za-z][A-Za-z .]{1,30})",
                ]),
                field_rule("approved_by", &[
                    r"(?i)\bapproved\s+by\s*[:\-]?\s*([A-Za-z][A-Za-z .]{1,30})",
                ]),
                field_rule("date", &[
                    r"(?i)\bdate\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("material", &[
                    r"(?i)\bmaterial\s*[:\-]\s*([^\n]{2,40})",
                ]),
                field_rule("sheet", &[
                    r"(?i)\bsheet\s+(\d+\s+of\s+\d+)",
                ]),
                field_rule("project_code", &[
                    r"(?i)\bproject\s*(?:code|no\.?|number)?\s*[:#\-]\s*([A-Z0-9][A-Z0-9\-_/]{2,20})",
                ]),
            ],
            important: &["drawing_number", "revision"],
            expected: &["drawing_number", "revision", "scale", "drawn_by", "date"],
        },
        DocumentRules {
            doc_type: DocumentType::TechnicalDoc,
            detection: detectors(&[
                r"\bspecifications?\b",
                r"\btechnical\s+(?:data|document|manual|specification)\b",
                r"\bmodel\s+(?:number|no\.?)",
                r"\bversion\b",
                r"\bvoltage\b|\bpower\s+supply\b",
                r"\bdimensions?\b",
                r"\boperating\s+(?:temperature|conditions)\b",
                r"\bdatasheet\b",
            ]),
            fields: vec![
                field_rule("model_number", &[
                    r"(?i)\bmodel\s*(?:number|no\.?|#)?\s*[:#\-]\s*([A-Z0-9][A-Z0-9\-/.]{1,30})",
                ]),
                field_rule("version", &[
                    r"(?i)\bversion\s*[:\-]?\s*(v?\d+(?:\.\d+)*[a-z]?)",
                ]),
                field_rule("manufacturer", &[
                    r"(?im)^\s*(?:manufacturer|made\s+by|vendor)\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("voltage", &[
                    r"(?i)\b(?:voltage|input|power\s+supply)\s*[:\-]?\s*(\d+(?:\.\d+)?\s*(?:-\s*\d+(?:\.\d+)?\s*)?V(?:AC|DC)?)\b",
                ]),
                field_rule("dimensions", &[
                    r"(?i)\bdimensions?\s*[:\-]?\s*(\d+(?:\.\d+)?\s*[x×]\s*\d+(?:\.\d+)?(?:\s*[x×]\s*\d+(?:\.\d+)?)?\s*(?:mm|cm|m|in)?)",
                ]),
                field_rule("weight", &[
                    r"(?i)\bweight\s*[:\-]?\s*(\d+(?:\.\d+)?\s*(?:kg|g|lbs?))\b",
                ]),
            ],
            important: &["model_number", "version"],
            expected: &["model_number", "version", "manufacturer", "dimensions"],
        },
        DocumentRules {
            doc_type: DocumentType::AccidentReport,
            detection: detectors(&[
                r"\baccident\b",
                r"\bincident\s+report\b",
                r"\bdriver\s+name\b",
                r"\bvehicle\s+(?:number|no\.?|registration|plate)|\bplate\s+(?:number|no\.?)",
                r"\binsurance\b",
                r"\bpolice\b",
                r"\blocation\s+of\s+(?:accident|incident)\b",
                r"\binjur(?:y|ies|ed)\b",
                r"\bwitness(?:es)?\b",
            ]),
            fields: vec![
                field_rule("report_number", &[
                    r"(?i)\b(?:report|case|reference)\s*(?:number|no\.?|#)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-/]{2,})",
                ]),
                field_rule("date", &[
                    r"(?i)\b(?:date\s+of\s+(?:accident|incident)|accident\s+date|date)\s*[:\-]?\s*(<DATE>)",
                ]),
                field_rule("driver_name", &[
                    r"(?im)\bdriver\s+name\s*[:\-]\s*([^\n]{2,})$",
                ]),
                field_rule("license_number", &[
                    r"(?i)\blicen[cs]e\s*(?:number|no\.?|#)?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{4,20})",
                ]),
                field_rule("vehicle_number", &[
                    r"(?i)\b(?:vehicle|plate|registration)\s*(?:number|no\.?|#)?\s*[:#\-]\s*([A-Z0-9][A-Z0-9\- ]{2,15}[A-Z0-9])",
                ]),
                field_rule("phone", &[
                    r"(?i)\b(?:mobile|phone|tel)\s*(?:number|no\.?)?\s*[:\-]?\s*(\+?\d[\d\s\-]{6,16}\d)",
                ]),
                field_rule("location", &[
                    r"(?im)\b(?:location(?:\s+of\s+(?:accident|incident))?|place)\s*[:\-]\s*([^\n]{3,})$",
                ]),
                field_rule("insurance_policy", &[
                    r"(?i)\b(?:policy|insurance)\s*(?:number|no\.?|#)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-/]{3,})",
                ]),
            ],
            important: &["date", "driver_name", "vehicle_number"],
            expected: &["report_number", "date", "driver_name", "license_number", "vehicle_number", "location"],
        },
    ];

    static ref UNKNOWN_RULES: DocumentRules = DocumentRules {
        doc_type: DocumentType::Unknown,
        detection: Vec::new(),
        fields: Vec::new(),
        important: &[],
        expected: &["date", "vendor_name"],
    };
}

/// Rulebook for a document type. `Unknown` gets an empty rulebook that only
/// carries the default expected fields.
pub fn rules_for(doc_type: DocumentType) -> &'static DocumentRules {
    RULEBOOKS
        .iter()
        .find(|r| r.doc_type == doc_type)
        .unwrap_or(&UNKNOWN_RULES)
}

/// All rulebooks in classifier order.
pub fn all_rules() -> &'static [DocumentRules] {
    &RULEBOOKS
}
