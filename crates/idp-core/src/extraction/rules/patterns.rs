//! Type-agnostic regex patterns used by the universal cascade stage.

use lazy_static::lazy_static;
use regex::Regex;

use super::doctypes::FieldRule;

/// A date in any of the common layouts: `12/01/2024`, `2024-01-12`,
/// `12 Jan 2024`, `January 12, 2024`.
pub const DATE_FRAGMENT: &str = r"(?:\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4}|\d{4}[./\-]\d{1,2}[./\-]\d{1,2}|\d{1,2}(?:st|nd|rd|th)?[\s\-][A-Za-z]{3,9}\.?,?[\s\-]\d{4}|[A-Za-z]{3,9}\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4})";

/// A money amount with an optional currency code or symbol prefix.
pub const AMOUNT_FRAGMENT: &str = r"(?:(?:[A-Z]{3}|[$€£₹¥])\s?)?\d[\d,]*(?:\.\d{1,2})?";

/// Compile a pattern template, expanding `<DATE>` and `<AMOUNT>`.
pub(crate) fn pattern(template: &str) -> Regex {
    let expanded = template
        .replace("<DATE>", DATE_FRAGMENT)
        .replace("<AMOUNT>", AMOUNT_FRAGMENT);
    Regex::new(&expanded).unwrap()
}

pub(crate) fn field_rule(name: &'static str, templates: &[&str]) -> FieldRule {
    FieldRule {
        name,
        patterns: templates.iter().map(|t| pattern(t)).collect(),
    }
}

lazy_static! {
    static ref UNIVERSAL_RULES: Vec<FieldRule> = vec![
        field_rule("document_number", &[
            r"(?i)\b(?:document|doc|invoice|bill|receipt|order)\s*(?:number|no\.?|num|#)\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-/]*\d[A-Z0-9\-/]*)",
            r"\b((?:INV|DOC|BILL|RCPT|ORD)[-/]?\d{3,}[A-Z0-9\-/]*)\b",
        ]),
        field_rule("reference_number", &[
            r"(?i)\b(?:reference|ref)\b\.?\s*(?:number|no\.?|#)?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-/]*\d[A-Z0-9\-/]*)",
        ]),
        field_rule("date", &[
            r"(?i)\b(?:invoice\s+date|issue\s+date|date\s+of\s+issue|dated|issued\s+on|date)\s*[:\-]?\s*(<DATE>)",
            r"(?i)\b(<DATE>)",
        ]),
        field_rule("due_date", &[
            r"(?i)\b(?:due\s+date|payment\s+due|due\s+by|due\s+on|pay\s+by)\s*[:\-]?\s*(<DATE>)",
        ]),
        field_rule("total_amount", &[
            r"(?i)\b(?:grand\s+total|total\s+amount(?:\s+due)?|amount\s+due|total\s+due|balance\s+due|net\s+payable|total)\s*(?:\([A-Z]{3}\))?\s*[:\-]?\s*(<AMOUNT>)",
        ]),
        field_rule("subtotal", &[
            r"(?i)\bsub\s*-?\s*total\s*[:\-]?\s*(<AMOUNT>)",
        ]),
        field_rule("tax_amount", &[
            r"(?i)\b(?:vat|tax|gst|sales\s+tax)(?:\s*\(?\d{1,2}(?:\.\d+)?\s*%\)?)?(?:\s+amount)?\s*[:\-]?\s*(<AMOUNT>)",
        ]),
        field_rule("discount", &[
            r"(?i)\bdiscount(?:\s*\(?\d{1,2}(?:\.\d+)?\s*%\)?)?\s*[:\-]?\s*(<AMOUNT>)",
        ]),
        field_rule("vendor_name", &[
            r"(?im)^\s*(?:from|vendor|seller|supplier|company|billed\s+by|issued\s+by)\s*[:\-]\s*([^\n]{2,})$",
        ]),
        field_rule("customer_name", &[
            r"(?im)^\s*(?:bill(?:ed)?\s+to|sold\s+to|ship\s+to|customer(?:\s+name)?|client(?:\s+name)?|to)\s*[:\-]\s*([^\n]{2,})$",
        ]),
        field_rule("email", &[
            r"([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})",
        ]),
        field_rule("phone", &[
            r"(?i)\b(?:phone|tel|telephone|mobile|cell|contact)\.?\s*(?:no\.?|number|#)?\s*[:\-]?\s*(\+?\d[\d\s\-().]{5,18}\d)",
            r"(\+\d{1,3}[\s\-]?\(?\d{1,4}\)?[\s\-]?\d{3,4}[\s\-]?\d{3,4})",
        ]),
        field_rule("address", &[
            r"(?im)^\s*(?:address|addr|location)\s*[:\-]\s*([^\n]{5,})$",
            r"(?i)\b(\d{1,5}\s+[A-Za-z0-9 .]{2,40}\s(?:street|st|road|rd|avenue|ave|boulevard|blvd|lane|ln|drive|dr)\b\.?)",
        ]),
        field_rule("zip_code", &[
            r"(?i)\b(?:zip|postal|post)\s*(?:code)?\s*[:\-]?\s*([A-Z0-9]{3,5}(?:[\s\-][A-Z0-9]{3,4})?)\b",
        ]),
        field_rule("country", &[
            r"(?im)^\s*country\s*[:\-]\s*([A-Za-z][A-Za-z .]{1,40})$",
        ]),
        field_rule("tax_id", &[
            r"(?i)\b(?:tax\s*id|vat\s*(?:no\.?|number|reg(?:istration)?(?:\s*(?:no\.?|number))?)|trn|tin|gstin|ein)\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{5,20})",
        ]),
        field_rule("license_number", &[
            r"(?i)\b(?:licen[cs]e|dl|permit)\s*(?:number|no\.?|#)?\s*[:#\-]?\s*([A-Z0-9][A-Z0-9\-]{4,20})",
        ]),
        field_rule("payment_terms", &[
            r"(?i)\b(?:payment\s+terms|terms\s+of\s+payment|terms)\s*[:\-]\s*([^\n]{2,60})",
        ]),
        field_rule("quantity", &[
            r"(?i)\b(?:qty|quantity)\s*[:\-]?\s*(\d+(?:\.\d+)?)",
        ]),
        field_rule("unit_price", &[
            r"(?i)\b(?:unit\s+price|price\s+per\s+unit|unit\s+cost|rate)\s*[:\-]?\s*(<AMOUNT>)",
        ]),
        field_rule("notes", &[
            r"(?im)^\s*(?:notes?|remarks?|comments?)\s*[:\-]\s*([^\n]{2,})$",
        ]),
        field_rule("department", &[
            r"(?i)\b(?:department|dept\.?)\s*[:\-]\s*([^\n]{2,50})",
        ]),
        field_rule("project_code", &[
            r"(?i)\bproject\s*(?:code|no\.?|number|id)?\s*[:#\-]\s*([A-Z0-9][A-Z0-9\-_/]{2,20})",
        ]),
    ];

    /// Structured drawing numbers (`DWG-1234`, `ME-AB12-0042-B`).
    pub static ref DRAWING_NUMBER: Regex = Regex::new(
        r"\b(?:DWG|DRG)[-\s]?\d{3,}\b|\b[A-Z]{2,4}-[A-Z0-9]{2,5}-\d{3,}(?:-[A-Z0-9]{1,3})?\b"
    ).unwrap();

    /// A currency-tagged amount anywhere in text.
    pub static ref CURRENCY_AMOUNT: Regex = Regex::new(
        r"[$€£₹]\s?\d[\d,]*(?:\.\d{2})?|\b(?:USD|EUR|GBP|AED|INR|SAR|PLN)\s?\d[\d,]*(?:\.\d{2})?|\d[\d,]*\.\d{2}\s?(?:USD|EUR|GBP|AED|INR|SAR|PLN)\b"
    ).unwrap();

    /// A standalone date token.
    pub static ref DATE_TOKEN: Regex = pattern(r"(?i)\b(<DATE>)");

    /// `DD/MM/YYYY`.
    pub static ref DMY_SLASH: Regex = Regex::new(r"\b(\d{2}/\d{2}/\d{4})\b").unwrap();

    /// A number with an optional currency, as a whole string.
    pub static ref AMOUNT_SHAPE: Regex = pattern(r"(?i)^\s*<AMOUNT>\s*$");

    /// Single-token alphanumeric identifier; callers also require a digit.
    pub static ref IDENTIFIER_SHAPE: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-/#.]*$").unwrap();
}

/// The type-agnostic field bank, in application order.
pub fn universal_rules() -> &'static [FieldRule] {
    &UNIVERSAL_RULES
}
