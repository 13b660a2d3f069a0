//! Turns invoice text into structured fields.
//!
//! Digital PDFs (embedded text or a sidecar `.txt`) and scanned PDFs (OCR text)
//! go through different rule sets; both end as an [`ExtractedInvoice`] with
//! validation issues attached.

pub mod amounts;
pub mod classify;
pub mod codes;
pub mod draft;
pub mod fields;
pub mod items;
pub mod money;
pub mod ocr_fields;
pub mod text;
pub mod validate;
pub mod words;

use crate::domain::{
    CategoryMode, ExtractedInvoice, Invoice, SourceDocument, TextSource,
};
use draft::FieldDraft;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// Tax codes of e-invoice providers that print their own MST on every invoice.
pub const PROVIDER_TAX_CODES: [&str; 6] = [
    "0106869738",
    "0100684378",
    "0101245171",
    "0305482862",
    "0103243195",
    "0101360697",
];

const SIGNATURE_SELLERS: &[&str] = &[
    "đã được ký điện tử bởi",
    "được ký bởi",
    "ký bởi công ty",
    "digitally signed by",
];

static SHOP_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"Quán \d+").unwrap());

/// Compiles a fixed pattern table. Patterns are literals, so failure is a programming error.
pub(crate) fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub ignored_tax_codes: Vec<String>,
    pub category_mode: CategoryMode,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            ignored_tax_codes: PROVIDER_TAX_CODES.iter().map(|s| s.to_string()).collect(),
            category_mode: CategoryMode::Auto,
        }
    }
}

impl ParseOptions {
    /// Provider blacklist plus any extra codes from configuration.
    pub fn with_extra_tax_codes(mut self, extra: &[String]) -> Self {
        for code in extra {
            let code = code.trim();
            if !code.is_empty() && !self.ignored_tax_codes.iter().any(|c| c == code) {
                self.ignored_tax_codes.push(code.to_string());
            }
        }
        self
    }
}

/// Extracts, classifies and validates one document.
pub fn parse_document(doc: &SourceDocument, options: &ParseOptions) -> ExtractedInvoice {
    if !doc.has_text() || doc.source == TextSource::None {
        info!("❓ {}: no text recovered, marking as unrecognized", doc.file_name);
        let mut invoice = Invoice::unrecognized(&doc.file_name);
        invoice.category = Some(classify::choose_category(
            &options.category_mode,
            None,
            &[],
            "",
        ));
        let issues = validate::validate_invoice(&invoice);
        return ExtractedInvoice {
            invoice,
            items: Vec::new(),
            issues,
            source: TextSource::None,
        };
    }

    let (mut draft, items) = match doc.source {
        TextSource::Ocr => (parse_scanned(doc, options), Vec::new()),
        _ => parse_digital(&doc.text, &doc.file_name, options),
    };

    let category = classify::choose_category(
        &options.category_mode,
        draft.category.as_ref(),
        &items,
        &draft.seller,
    );
    draft.category = Some(category);

    let invoice = draft.into_invoice(&doc.file_name);
    let issues = validate::validate_invoice(&invoice);
    debug!(
        "{}: {} items, {} issues ({})",
        doc.file_name,
        items.len(),
        issues.len(),
        doc.source
    );
    ExtractedInvoice {
        invoice,
        items,
        issues,
        source: doc.source,
    }
}

fn parse_scanned(doc: &SourceDocument, options: &ParseOptions) -> FieldDraft {
    let mut draft =
        ocr_fields::extract_ocr_fields(&doc.text, &doc.file_name, &options.ignored_tax_codes);
    ocr_fields::apply_crop_hints(&mut draft, &doc.crops, &options.ignored_tax_codes);
    draft.category = Some(ocr_fields::ocr_category(&doc.text));
    draft
}

/// Rules for text produced by an invoice generator.
pub fn parse_digital(
    raw_text: &str,
    file_name: &str,
    options: &ParseOptions,
) -> (FieldDraft, Vec<crate::domain::LineItem>) {
    let cleaned = text::clean_invoice_text(raw_text);
    let full_text = cleaned.text.as_str();
    let items = items::extract_line_items(full_text);

    let mut draft = FieldDraft {
        date: fields::extract_date(full_text),
        seller_tax_code: fields::extract_tax_code(full_text, &options.ignored_tax_codes),
        number: fields::extract_invoice_number(full_text, file_name),
        seller: fields::extract_seller(full_text),
        ..FieldDraft::default()
    };

    let found = codes::extract_codes(full_text);
    draft.serial = found.serial;
    draft.lookup_code = found.lookup_code;
    draft.authority_code = found.authority_code;
    draft.lookup_link = found.lookup_link;
    if draft.lookup_code.is_empty() {
        if let Some(code) = codes::code_near_link(full_text, &draft.seller_tax_code) {
            draft.lookup_code = code;
        }
    }

    amounts::extract_amounts(&mut draft, full_text, cleaned.hidden_total.as_deref(), &items);

    if draft.lookup_code.is_empty() {
        if let Some(code) = codes::late_lookup_code(full_text) {
            draft.lookup_code = code;
        }
    }

    draft.seller = finalize_seller(&draft.seller, full_text);
    (draft, items)
}

fn is_signature_text(seller: &str) -> bool {
    let lower = seller.to_lowercase();
    SIGNATURE_SELLERS.iter().any(|bad| lower.contains(bad))
}

/// Last pass over the seller name: signature stamps are dropped, small shops
/// named "Quán N" are recovered and leftover labels removed.
fn finalize_seller(seller: &str, text: &str) -> String {
    let mut seller = text::clean_string_value(seller);
    if is_signature_text(&seller) {
        seller.clear();
    }
    if seller.is_empty() {
        if let Some(m) = SHOP_NAME.find(text) {
            seller = m.as_str().to_string();
        }
    }
    if seller.is_empty() {
        return seller;
    }

    let mut seller = fields::strip_seller_labels(&seller);
    if let Some((head, _)) = seller.split_once("Ký hiệu:") {
        seller = head.trim().to_string();
    }
    if is_signature_text(&seller) {
        seller.clear();
    }
    seller
}
