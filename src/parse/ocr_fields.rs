//! Field rules for OCR text.
//!
//! Scans are noisy ("ông tiên hàng", "Ma sé thué"), so the patterns are
//! looser than the digital ones and missing amounts are derived from the
//! ones that were read.

use crate::domain::{Category, CropRegion, CropText, TaxRate};
use crate::parse::compile;
use crate::parse::draft::FieldDraft;
use crate::parse::money::round_half_even;
use crate::parse::text::line_at;
use crate::parse::words::words_to_number;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static SERIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[Kk]ý\s*hiệu[:\s]*([A-Z0-9]+)").unwrap());
static SELLER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(CÔNG TY|CHI NHÁNH|DNTN|TRUNG TÂM|HỘ KINH DOANH|CỬA HÀNG)").unwrap()
});

static NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"[Ss][oố]\s*hóa\s*đơn[:\s]+(\d{5,})",
        r"[Ss]ố\s*(?:HĐ)[:\s]*(\d+)",
        r"[Ss][oố][:\s]+(\d{6,})",
        r"[Nn]o\.?[:\s]*(\d{5,})",
        r"Invoice No\.?[:\s]*(\d+)",
        r"[Ss][ốo]\s*[(/]?\s*No\.?\s*[)/]?[:\s]*(\d+)",
        r"\(\s*VAT\s*INVOICE\s*\)[:\s]*(\d+)",
        r"Số:\s*(\d+)",
    ])
});
static PHONE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(18|19|09|08|07|06|05|03|02|01)\d{6,}").unwrap());
static FILENAME_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d{5,})").unwrap());

static DATE_ACCENTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[Nn]gày\s*(\d{1,2})\s*tháng\s*(\d{1,2})\s*năm\s*(\d{4})").unwrap()
});
static DATE_PLAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[Nn]ga[yỳ]\s*(\d{1,2})\s*thang\s*(\d{1,2})\s*nam\s*(\d{4})").unwrap()
});
static DATE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{4})").unwrap());

static TAX_CODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"[Mm]a\s*số\s*thuế[:\s]*([\d\-\x{AD}\s]+)",
        r"MST[:\s]*([\d\-\x{AD}\s]+)",
        r"[Mm]ã\s*số\s*thuế[:\s]*([\d\-\x{AD}\s]+)",
        r"[Mm]a\s*s[eoc]\s*thu[eé][:\s]*([\d\-\x{AD}\s]+)",
        r"[Mm]a\s*s.\s*thu.[:\s]*([\d\-\x{AD}\s]+)",
        r"tax\s*code[:\s]*([\d\-\x{AD}\s]+)",
    ])
});
static TAX_CODE_NORMALIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:ma se thue|ma so thue|mst)[^0-9]*([0-9]{10,14})").unwrap());

/// Lines naming the e-invoice provider or the buyer, not the seller.
const FOREIGN_TAX_CODE_CONTEXT: &[&str] = &[
    "giải pháp", "phần mềm", "cung cấp bởi", "phát hành bởi", "created by", "signature", "ký bởi",
    "bkav", "ehoadon", "mua hàng", "người mua", "đơn vị mua",
];

static BEFORE_TAX_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"ông\s*tiên\s*hàng[:\s]*([\d.,]+)",
        r"ông\s*tiên\s*hang[:\s]*([\d.,]+)",
        r"[Cc]ộng\s*tiền\s*hàng[:\s]*([\d.,]+)",
        r"[Tt]iền\s*hàng[:\s]*([\d.,]+)",
    ])
});
static VAT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"lên\s*thuê\s*GTGT\s*\(\s*\d+\s*%?\s*\)\s*([\d.,]+)",
        r"ién\s*thuê\s*GTGT\s*\(\s*\d+\s*%?\s*\)\s*([\d.,]+)",
        r"[Tt]iền\s*thuế\s*GTGT[:\s]*([\d.,]+)",
        r"thuê\s*GTGT\s*\(\s*8\s*%?\s*\)\s*([\d.,]+)",
        r"GTGT\s*\(\s*\d+\s*%?\s*\)\s*([\d.,]+)",
        r"[Cc]XC[:\s]*([\d.,]+)",
        r"thuế\s*GTGT[:\s]*([\d.,]+)",
    ])
});
static TOTAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"ông\s*sô\s*tiên\s*thanh\s*toán[:\s]*([\d.,]+)",
        r"[Tt]ổng\s*(?:số\s*)?(?:cộng|tiền)\s*thanh\s*toán[:\s]*([\d.,]+)",
        r"thanh\s*toán[:\s]*([\d.,]+)",
        r"[Tt]ổng\s*(?:cộng|tiền)[:\s]*([\d.,]+)",
    ])
});
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^20[0-9]{2}$").unwrap());
static RATE_8: Lazy<Regex> = Lazy::new(|| Regex::new(r"8\s*%").unwrap());
static RATE_10: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\s*%").unwrap());
static IN_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:bằng chữ|bang chu)[:\s]*(.+?)(?:đồng|dong|$)").unwrap());

static LOOKUP_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Mã|Ma)\s*(?:tra|tro)\s*(?:cứu|cuiu|cuu)[:\s]*([A-Z0-9*]+)").unwrap()
});
static LOOKUP_BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z0-9]{10,})\b").unwrap());
static AUTHORITY_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Mã|Ma)\s*(?:CQT|cơ\s*quan\s*thuế)[:\s]*([A-Z0-9\-]+)").unwrap()
});
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(https?://\S+)").unwrap());

static CROP_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:[Ss][ốoéô]|[Nn]o\.?)\s*[:\s]*(\d{4,})").unwrap());
static CROP_TAX_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Mã\s*số\s*thuế|MST|Ma\s*s.\s*thu.)[:\s]*([\d\-\s]+)").unwrap()
});

fn is_fuel_text(lower: &str) -> bool {
    lower.contains("petrolimex") || lower.contains("xăng") || lower.contains("ron 95")
}

/// Extracts invoice fields from OCR text.
pub fn extract_ocr_fields(text: &str, file_name: &str, ignored_tax_codes: &[String]) -> FieldDraft {
    let mut draft = FieldDraft::default();
    let lower = text.to_lowercase();
    let petrolimex = lower.contains("petrolimex");

    if let Some(caps) = SERIAL.captures(text) {
        draft.serial = caps[1].to_string();
    }
    draft.seller = ocr_seller(text);
    draft.number = ocr_number(text, file_name);
    draft.date = ocr_date(text);
    draft.seller_tax_code = ocr_tax_code(text, ignored_tax_codes);

    if let Some(value) = first_amount(&BEFORE_TAX_PATTERNS, text) {
        draft.before_tax = value;
    }
    if let Some(caps) = VAT_PATTERNS.iter().find_map(|re| re.captures(text)) {
        draft.tax_total = caps[1].to_string();
    }

    if is_fuel_text(&lower) {
        if !draft.tax_total.is_empty() {
            draft.tax_8 = draft.tax_total.clone();
        }
    } else if RATE_8.is_match(text) {
        draft.tax_8 = draft.tax_total.clone();
    } else if RATE_10.is_match(text) {
        draft.tax_10 = draft.tax_total.clone();
    }

    if let Some(value) = first_amount(&TOTAL_PATTERNS, text) {
        draft.after_tax = value;
    }
    if draft.after_tax.is_empty() {
        if let Some(caps) = IN_WORDS.captures(text) {
            let words = caps[1].trim().to_lowercase();
            let value = words_to_number(&words);
            if value > 0 {
                debug!("Total in words '{}' = {}", words, value);
                FieldDraft::set_money(&mut draft.after_tax, value);
            }
        }
    }

    derive_missing_amounts(&mut draft, petrolimex);

    let lookup = LOOKUP_LABELLED
        .captures(text)
        .or_else(|| LOOKUP_BARE.captures(text));
    if let Some(caps) = lookup {
        if caps[1].len() > 5 {
            draft.lookup_code = caps[1].to_string();
        }
    }
    if let Some(caps) = AUTHORITY_CODE.captures(text) {
        draft.authority_code = caps[1].to_string();
    }
    if let Some(caps) = LINK.captures(text) {
        draft.lookup_link = caps[1].to_string();
    }

    draft
}

fn first_amount(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let value = caps[1].trim().to_string();
        (!YEAR.is_match(&value) && value.len() >= 3).then_some(value)
    })
}

fn ocr_seller(text: &str) -> String {
    let candidate = text.split('\n').take(15).map(str::trim).find(|line| {
        SELLER_LINE.is_match(line) || line.to_uppercase().contains("PETROLIMEX")
    });
    match candidate {
        Some(line) => line
            .split("Ký hiệu:")
            .next()
            .unwrap_or(line)
            .trim()
            .to_string(),
        None => String::new(),
    }
}

fn ocr_number(text: &str, file_name: &str) -> String {
    // Only the first hit of each pattern is considered; phone numbers move on to the next pattern.
    for re in NUMBER_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let number = &caps[1];
            if !PHONE_PREFIX.is_match(number) {
                return number.to_string();
            }
        }
    }
    FILENAME_NUMBER
        .captures(file_name)
        .map(|caps| caps[1].to_string())
        .unwrap_or_default()
}

fn ocr_date(text: &str) -> String {
    [&*DATE_ACCENTED, &*DATE_PLAIN, &*DATE_NUMERIC]
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| format!("{}/{}/{}", &caps[1], &caps[2], &caps[3]))
        .unwrap_or_default()
}

fn is_ignored(code: &str, ignored_tax_codes: &[String]) -> bool {
    ignored_tax_codes.iter().any(|ignored| code.contains(ignored.as_str()))
}

fn ocr_tax_code(text: &str, ignored_tax_codes: &[String]) -> String {
    for re in TAX_CODE_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let value: String = m
                .as_str()
                .chars()
                .filter(|c| !matches!(c, ' ' | '.' | '-' | '\u{ad}'))
                .collect::<String>()
                .trim()
                .to_string();
            if !(10..=14).contains(&value.len()) {
                continue;
            }
            if is_ignored(&value, ignored_tax_codes) {
                debug!("Ignored provider tax code {}", value);
                continue;
            }
            let whole = caps.get(0).map(|w| (w.start(), w.end())).unwrap_or((m.start(), m.end()));
            let line = line_at(text, whole.0, whole.1);
            if FOREIGN_TAX_CODE_CONTEXT.iter().any(|kw| line.contains(kw)) {
                debug!("Ignored tax code {} in '{}'", value, line.trim());
                continue;
            }
            return value;
        }
    }

    let normalized = text
        .to_lowercase()
        .replace('é', "e")
        .replace('ú', "u")
        .replace('ế', "e");
    TAX_CODE_NORMALIZED
        .captures(&normalized)
        .map(|caps| caps[1].to_string())
        .filter(|code| !is_ignored(code, ignored_tax_codes))
        .unwrap_or_default()
}

/// Fills in whichever of before-tax, VAT and total is missing.
/// Petrolimex receipts are assumed to carry 8% VAT.
fn derive_missing_amounts(draft: &mut FieldDraft, petrolimex: bool) {
    let before = FieldDraft::money(&draft.before_tax);
    let vat = FieldDraft::money(&draft.tax_total);
    let total = FieldDraft::money(&draft.after_tax);

    if total == 0 && before != 0 && vat != 0 {
        FieldDraft::set_money(&mut draft.after_tax, before + vat);
        debug!("Total = {} + {}", before, vat);
    } else if total == 0 && before != 0 && petrolimex {
        let vat = round_half_even(before as f64 * 0.08);
        FieldDraft::set_money(&mut draft.after_tax, before + vat);
        FieldDraft::set_money(&mut draft.tax_total, vat);
        FieldDraft::set_money(&mut draft.tax_8, vat);
    } else if before == 0 && total != 0 && petrolimex {
        let before = round_half_even(total as f64 / 1.08);
        FieldDraft::set_money(&mut draft.before_tax, before);
        if draft.tax_total.is_empty() {
            FieldDraft::set_money(&mut draft.tax_total, total - before);
            FieldDraft::set_money(&mut draft.tax_8, total - before);
        }
    } else if vat == 0 && before != 0 && total != 0 {
        let vat = total - before;
        FieldDraft::set_money(&mut draft.tax_total, vat);
        let ratio = round_half_even(vat as f64 / before as f64 * 100.0);
        let rate = match TaxRate::from_percent(ratio) {
            Some(rate) if rate != TaxRate::Zero => Some(rate),
            _ if petrolimex => Some(TaxRate::Eight),
            _ => None,
        };
        match rate {
            Some(rate) => FieldDraft::set_money(draft.rate_mut(rate), vat),
            None => FieldDraft::set_money(&mut draft.tax_other, vat),
        }
        debug!("Inferred VAT {} (rate ~{}%)", vat, ratio);
    }
}

/// Fills the invoice number and seller tax code from high resolution crops
/// when the full page OCR missed them.
pub fn apply_crop_hints(draft: &mut FieldDraft, crops: &[CropText], ignored_tax_codes: &[String]) {
    for crop in crops {
        match crop.region {
            CropRegion::InvoiceNumber if draft.number.is_empty() => {
                if let Some(caps) = CROP_NUMBER.captures(&crop.text) {
                    draft.number = caps[1].to_string();
                    debug!("Invoice number {} from crop", draft.number);
                }
            }
            CropRegion::SellerTaxCode if draft.seller_tax_code.is_empty() => {
                for caps in CROP_TAX_CODE.captures_iter(&crop.text) {
                    let value: String = caps[1]
                        .chars()
                        .filter(|c| !c.is_whitespace() && *c != '-')
                        .collect();
                    if value.len() >= 10 && !is_ignored(&value, ignored_tax_codes) {
                        debug!("Seller tax code {} from crop", value);
                        draft.seller_tax_code = value;
                        break;
                    }
                }
            }
            _ => {}
        }
    }
}

/// Category for a scanned invoice. Fuel wins when the seller is a petrol station.
pub fn ocr_category(text: &str) -> Category {
    crate::parse::classify::classify_ocr_text(text)
}
