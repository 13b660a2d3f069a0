//! Identity fields of a digital invoice: date, seller tax code, invoice
//! number and seller name.
//!
//! Each field has an ordered list of rules; the first rule that yields an
//! acceptable value wins. Generators differ wildly (MISA, VNPT, M-Invoice,
//! Sapo, hotel PMS exports), so the lists are long and order matters.

use crate::parse::compile;
use crate::parse::text::{is_upper_text, line_at};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?is)Ngày\s*(\d{1,2})\s*tháng\s*(\d{1,2})\s*năm\s*(\d{4})",
        r"(?is)Ngày\s*(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})",
        r"(?is)(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})",
        r"(?is)Ngày[:\s]*(\d{1,2})[\s\S]{0,100}tháng[:\s]*(\d{1,2})[\s\S]{0,100}năm[:\s]*(\d{4})",
        r"(?is)Ngày(?:[^0-9]{0,35})?(\d{1,2})[\s\S]{0,35}tháng(?:[^0-9]{0,35})?(\d{1,2})[\s\S]{0,35}năm(?:[^0-9]{0,35})?(\d{4})",
    ])
});

/// Issue date as `dd/mm/yyyy`.
pub fn extract_date(text: &str) -> String {
    for re in DATE_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            return format!("{:02}/{:02}/{}", day, month, &caps[3]);
        }
    }
    String::new()
}

static SPACED_TAX_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Mã số thuế[:\s]*((?:\d\s+){9,}[\d\s-]*\d)").unwrap());
static VAT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)VAT\s*Code[:\s]*(\d{10,14})").unwrap());
static SELLER_BLOCK_TAX_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(?:Đơn vị bán|Người bán|Seller)[^:]*[:\s]+(.*?)(?:Mã số thuế|MST|Tax code)[^:]*[:\s]*([0-9\s-]+)")
        .unwrap()
});
static ANY_TAX_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Mã số thuế|MST|Tax code)[^:]*[:\s]*([0-9\s-]+)").unwrap()
});
static TAX_CODE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d-]+").unwrap());
static LABELLED_TAX_CODES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Mã số thuế\s*\([Tt]ax\s*code\)[:\s]*([\d\-\x{AD}\s]+)",
        r"(?i)(?:MST|Mã số thuế)[/\s]*\([Tt]ax [Cc]ode\)[:\s]*([\d\-\x{AD}\s]+)",
        r"(?i)MST/CCCD[^:]*[:\s]*([\d\-\x{AD}\s]+)",
        r"(?i)(?:MST|Mã số thuế)[:\s]*([\d\-\x{AD}\s]+)",
    ])
});
static NORMALIZED_TAX_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ma\s+s[eoc]\s+thue|ma\s+so\s+thue|ma\s+s.\s+thue|mst|tax code)[^0-9]*([0-9]{10,14})")
        .unwrap()
});

/// Footer lines of the e-invoice provider; their tax codes are not the seller's.
const PROVIDER_CONTEXT: &[&str] = &[
    "giải pháp", "phần mềm", "cung cấp bởi", "phát hành bởi", "created by", "signature", "ký bởi",
    "bkav", "ehoadon",
];

fn contains_ignored(code: &str, ignored: &[String]) -> bool {
    ignored.iter().any(|i| code.contains(i.as_str()))
}

fn overlaps_ignored(code: &str, ignored: &[String]) -> bool {
    ignored
        .iter()
        .any(|i| code.contains(i.as_str()) || i.contains(code))
}

/// Seller tax code (MST), skipping e-invoice provider codes.
pub fn extract_tax_code(text: &str, ignored: &[String]) -> String {
    if let Some(caps) = SPACED_TAX_CODE.captures(text) {
        let code = caps[1].replace(' ', "").trim().to_string();
        if !contains_ignored(&code, ignored) {
            debug!("Tax code {} from spaced digits", code);
            return code;
        }
        debug!("Spaced tax code {} ignored", code);
    }

    if let Some(caps) = VAT_CODE.captures(text) {
        let code = caps[1].trim().to_string();
        if !contains_ignored(&code, ignored) {
            return code;
        }
    }

    if let Some(caps) = SELLER_BLOCK_TAX_CODE.captures(text) {
        let code = caps[2].replace(' ', "").trim().to_string();
        if code.len() >= 10 && !contains_ignored(&code, ignored) {
            return code;
        }
    }

    let candidates: Vec<String> = ANY_TAX_CODE
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps[1].replace(' ', "");
            let code = TAX_CODE_PREFIX.find(raw.trim())?.as_str().to_string();
            ((9..=14).contains(&code.len()) && !overlaps_ignored(&code, ignored)).then_some(code)
        })
        .collect();
    let provider_line = |code: &str| {
        text.split('\n').any(|line| {
            line.replace(' ', "").contains(code) && {
                let lower = line.to_lowercase();
                PROVIDER_CONTEXT.iter().any(|kw| lower.contains(kw))
            }
        })
    };
    if let Some(code) = candidates.into_iter().find(|c| !provider_line(c.as_str())) {
        debug!("Tax code {} from labelled candidates", code);
        return code;
    }

    let labelled = LABELLED_TAX_CODES.iter().flat_map(|re| {
        re.captures_iter(text)
            .map(|caps| caps[1].replace(['\u{ad}', ' '], "").trim().to_string())
            .filter(|code| code.len() >= 10 && code.chars().any(|c| c.is_ascii_digit()))
            .collect::<Vec<_>>()
    });
    if let Some(code) = labelled
        .into_iter()
        .find(|code| !overlaps_ignored(code, ignored))
    {
        return code;
    }

    let normalized = strip_common_accents(&text.to_lowercase());
    NORMALIZED_TAX_CODE
        .captures(&normalized)
        .map(|caps| caps[1].to_string())
        .filter(|code| !contains_ignored(code, ignored))
        .unwrap_or_default()
}

fn strip_common_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'à' | 'ã' | 'ạ' | 'ả' => 'a',
            'é' | 'è' | 'ẽ' | 'ẹ' | 'ẻ' | 'ê' | 'ế' | 'ề' | 'ễ' | 'ệ' | 'ể' => 'e',
            'ô' | 'ố' | 'ồ' | 'ỗ' | 'ộ' | 'ổ' => 'o',
            other => other,
        })
        .collect()
}

static NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(\d{8})\nSố HĐ\s*/\s*Invoice No\.",
        r"(?i)(\d{4,8})\n\s*Số\s*\(?No\.?\)?[:\s]*",
        r"(?is)Số HĐ\s*/\s*Invoice No\.?[:\s]*[\n\s]*(\d{5,})",
        r"(?i)\(\s*VAT\s*INVOICE\s*\)[:\s]*(\d+)",
        r"(?is)Invoice No\.?[:\s]*[\n\s]*(\d{5,})",
        r"(?i)[Ss][ốo]\s*[(/]?\s*No\.?\s*[)/]?[:\s]*(\d{5,})",
        r"(?i)[Ss][ốo][/\s]*[(]?\s*Invoice No\.?\s*[)]?[:\s]*(\d+)",
        r"(?i)\(RESTAURANT BILL\)\s*(\d+)",
        r"(?i)Số:\s*(\d+)",
        r"(?i)Số hóa đơn[:\s]*(\d+)",
        r"(?i)[Ss][ốo]\s*[(/]?\s*No\.?\s*[)/]?[:\s]*(\d+)",
        r"(?i)s[éèẹẽe][: ]+\s*(\d+)",
        r"(?i)S[óố][: ]+\s*(\d+)",
    ])
});

const ADDRESS_WORDS: &[&str] = &[
    "đường", "phố", "phường", "quận", "thành phố", "district", "ward", "street", "thửa đất",
    "tờ bản đồ", "ấp ", "xã ", "tỉnh",
];

static FILE_NAME_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\-\s]").unwrap());

/// Invoice number. House numbers in address lines are skipped; the file
/// name is the last resort.
pub fn extract_invoice_number(text: &str, file_name: &str) -> String {
    for re in NUMBER_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let line = line_at(text, whole.start(), whole.end());
            if ADDRESS_WORDS.iter().any(|kw| line.contains(kw)) {
                debug!("Skipped address-like invoice number '{}'", whole.as_str());
                continue;
            }
            if number.as_str().len() < 3 {
                continue;
            }
            return number.as_str().to_string();
        }
    }
    number_from_file_name(file_name)
}

fn number_from_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    FILE_NAME_SEPARATORS
        .split(stem)
        .filter(|part| part.len() > 2 && part.chars().all(|c| c.is_ascii_digit()))
        .last()
        .unwrap_or_default()
        .to_string()
}

static SELLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"Đơn vị bán hàng\s*\([Ss]eller\)[:\s]*(.+)",
        r"Đơn vị bán\s*\([Ss]eller\)[:\s]*(.+)",
        r"Đơn vị bán\s*\(Seller\)[:\s]*(.+)",
        r"Tên người bán\s*\([Ss]eller\)[:\s]*(.+)",
        r"Đơn vị bán hàng\s*\([Cc]ompany\)[:\s]*(.+)",
        r"Đơn vị bán hàng[:\s]*(.+)",
        r"Tên đơn vị bán hàng[:\s]*(.+)",
        r"HỘ KINH DOANH[:\s]*(.+)",
        r"QUÁN[:\s]*(.+)",
    ])
});
static SELLER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*[(\[]?\s*(?:Seller|Company|Người bán|Doanh nghiệp|Tên đơn vị|Đơn vị bán)\s*[)\]]?\s*[:.\-]?\s*")
        .unwrap()
});
static ISSUED_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\(?Issued\)?\s*[:.\-]\s*").unwrap());
static LEADING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[:.\-]+\s*").unwrap());
static TRAILING_TAX_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*Mã số thuế.*$").unwrap());
static TRAILING_MST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*MST.*$").unwrap());
static TRAILING_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*Địa chỉ.*$").unwrap());
static PAGE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(Trang|Page)\s+\d").unwrap());
static PAREN_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\([A-Za-z\s]+\)\s*$").unwrap());
static SIGNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:Ký bởi|Được ký bởi)[:\s]*([A-ZĐ][A-ZĐÀÁẢÃẠ\s]+(?:\n[A-ZĐÀÁẢÃẠ\s]+)?)").unwrap()
});

const SELLER_NOISE: &[&str] = &["mã nhận hóa đơn", "code for checking", "tra cứu tại", "địa chỉ", "address"];
const SELLER_PLACEHOLDERS: &[&str] = &[
    "(seller)", "seller", "người bán", "tên đơn vị", "(buyer)", "buyer", "người mua",
];
const COMPANY_WORDS: &[&str] = &[
    "CÔNG TY", "TẬP ĐOÀN", "CHI NHÁNH", "NHÀ HÀNG", "DNTN", "HỘ KINH DOANH", "QUÁN",
];
const HEADER_WORDS: &[&str] = &[
    "CỘNG HÒA", "ĐỘC LẬP", "TÊN NGƯỜI MUA", "TÊN ĐƠN VỊ:", "PHÂN PHỐI TỔNG HỢP DẦU KHÍ",
    "ĐÃ ĐƯỢC KÝ ĐIỆN TỬ",
];
const FOOTER_COMPANY_WORDS: &[&str] = &[
    "CÔNG TY", "TẬP ĐOÀN", "CHI NHÁNH", "DNTN", "HỘ KINH DOANH", "HOTEL", "KHÁCH SẠN", "QUÁN",
];
const FOOTER_NOISE: &[&str] = &[
    "HÓA ĐƠN", "TRANG", "PAGE", "KÝ BỞI", "GIẢI PHÁP", "CUNG CẤP", "ĐỊA CHỈ", "MST:", "VAT CODE",
];

/// Removes "(Seller):", "(Issued) :" and similar labels left in front of a name.
pub fn strip_seller_labels(seller: &str) -> String {
    let s = ISSUED_LABEL.replace(seller, "");
    let s = SELLER_LABEL.replace(s.trim(), "");
    s.into_owned()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Seller name from labelled lines, then the header block, the signature
/// and finally the last lines of the document.
pub fn extract_seller(text: &str) -> String {
    labelled_seller(text)
        .or_else(|| header_seller(text))
        .or_else(|| signer_seller(text))
        .or_else(|| footer_seller(text))
        .unwrap_or_default()
}

fn labelled_seller(text: &str) -> Option<String> {
    for re in SELLER_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let (Some(whole), Some(value)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let mut seller = value.as_str().trim().to_string();

        // "CHI NHÁNH ... (LOẠI HÌNH DOANH NGHIỆP:" continues on the next line
        let tail: String = {
            let chars: Vec<char> = seller.chars().collect();
            chars[chars.len().saturating_sub(15)..].iter().collect()
        };
        if seller.ends_with(':') || seller.ends_with('(') || tail.contains("DOANH NGHIỆP") {
            if let Some(next) = text[whole.end()..]
                .strip_prefix('\n')
                .and_then(|rest| rest.split('\n').next())
                .filter(|line| !line.is_empty())
            {
                seller = format!("{} {}", seller, next.trim());
            }
        }

        let seller = seller.replace('\n', " ");
        let seller = SELLER_LABEL.replace(&seller, "");
        let seller = ISSUED_LABEL.replace(&seller, "");
        let seller = LEADING_PUNCT.replace(&seller, "");
        let seller = TRAILING_TAX_LABEL.replace(&seller, "");
        let seller = TRAILING_MST.replace(&seller, "");
        let seller = TRAILING_ADDRESS.replace(&seller, "").into_owned();

        let lower = seller.to_lowercase();
        if SELLER_NOISE.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        if SELLER_PLACEHOLDERS.contains(&lower.replace(':', "").trim()) {
            continue;
        }
        if PAGE_LABEL.is_match(seller.trim()) || PAREN_LABEL.is_match(seller.trim()) {
            continue;
        }
        let len = char_len(&seller);
        if len > 5 || (len > 3 && seller.to_uppercase().contains("QUÁN")) {
            return Some(seller);
        }
    }
    None
}

/// MISA style invoices print the seller as the first company line above the first tax code.
fn header_seller(text: &str) -> Option<String> {
    let mst_pos = text.find("Mã số thuế").or_else(|| text.find("MST"))?;
    if mst_pos == 0 {
        return None;
    }
    let lines: Vec<&str> = text[..mst_pos]
        .trim()
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for (idx, original) in lines.iter().take(6).enumerate() {
        let upper = original.to_uppercase();
        if char_len(original) <= 10 || !COMPANY_WORDS.iter().any(|kw| upper.contains(kw)) {
            continue;
        }
        if HEADER_WORDS.iter().any(|kw| upper.contains(kw)) {
            continue;
        }
        let mut line = original.to_string();
        // Company name fused with the "HÓA ĐƠN" title
        if let Some(pos) = upper.find("HÓA ĐƠN") {
            let keep = upper[..pos].chars().count();
            line = original.chars().take(keep).collect::<String>().trim().to_string();
            if char_len(&line) <= 5 {
                continue;
            }
        }
        if let Some(next) = lines.get(idx + 1) {
            let mergeable = !next.contains("Mã số") && !next.contains("Địa chỉ");
            let looks_like_name = is_upper_text(next) || (char_len(next) < 40 && !next.contains(':'));
            if mergeable && looks_like_name && !next.to_uppercase().contains("PHÂN PHỐI") {
                line = format!("{} {}", line, next);
            }
        }
        return Some(line);
    }
    None
}

fn signer_seller(text: &str) -> Option<String> {
    let caps = SIGNER.captures(text)?;
    let signer = caps[1].replace('\n', " ").trim().to_string();
    let upper = signer.to_uppercase();
    let lower = signer.to_lowercase();
    let company = COMPANY_WORDS[..5].iter().any(|kw| upper.contains(kw));
    let noise = ["địa chỉ", "address", "mã số", "đã được ký"]
        .iter()
        .any(|kw| lower.contains(kw));
    (char_len(&signer) > 5 && company && !noise).then_some(signer)
}

fn footer_seller(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(20);
    lines[start..]
        .iter()
        .find(|line| {
            let upper = line.to_uppercase();
            char_len(line) > 5
                && FOOTER_COMPANY_WORDS.iter().any(|kw| upper.contains(kw))
                && (is_upper_text(line) || upper.contains("CÔNG TY") || upper.contains("QUÁN"))
                && !FOOTER_NOISE.iter().any(|kw| upper.contains(kw))
        })
        .map(|line| line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignored() -> Vec<String> {
        ["0106869738", "0101360697"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dates() {
        assert_eq!(extract_date("Ngày 7 tháng 1 năm 2026"), "07/01/2026");
        assert_eq!(extract_date("Ngày (Date) 19 tháng (month) 12 năm (year) 2025"), "19/12/2025");
        assert_eq!(extract_date("Ngày 07 tháng 01\n năm 2026"), "07/01/2026");
        assert_eq!(extract_date("Printed 3/4/2025"), "03/04/2025");
        assert_eq!(extract_date("no date here"), "");
    }

    #[test]
    fn test_spaced_tax_code_wins() {
        let text = "Mã số thuế: 0 3 0 1 4 3 3 9 8 4\nMST: 0312345678";
        assert_eq!(extract_tax_code(text, &ignored()), "0301433984");
    }

    #[test]
    fn test_provider_tax_code_skipped() {
        let text = "Đơn vị bán: CÔNG TY ABC\nĐịa chỉ: 1 Lê Lợi\n\
            Khách hàng: X\nMã số thuế: 0106869738\n\
            Đơn vị cung cấp giải pháp: MST 0311111111\n\
            Mã số thuế (Tax code): 0302222222";
        assert_eq!(extract_tax_code(text, &ignored()), "0302222222");
    }

    #[test]
    fn test_vat_code() {
        assert_eq!(extract_tax_code("VAT Code: 0300659964", &ignored()), "0300659964");
    }

    #[test]
    fn test_invoice_number_rules() {
        assert_eq!(
            extract_invoice_number("Số HĐ / Invoice No.:\n00001348", "a.pdf"),
            "00001348"
        );
        assert_eq!(
            extract_invoice_number("Ký hiệu: 1C25TAA\nSố (No.): 00007155", "a.pdf"),
            "00007155"
        );
        // house number on an address line is not an invoice number
        assert_eq!(
            extract_invoice_number("Địa chỉ: Số: 123 đường Lê Lợi", "HD_1C25TAA_00000456.pdf"),
            "00000456"
        );
    }

    #[test]
    fn test_seller_labelled() {
        let text = "Đơn vị bán hàng (Seller): CÔNG TY TNHH NHÀ HÀNG NGON\nMã số thuế: 0301234567";
        assert_eq!(extract_seller(text), "CÔNG TY TNHH NHÀ HÀNG NGON");
    }

    #[test]
    fn test_seller_rejects_placeholders() {
        let text = "Đơn vị bán (Seller): (Buyer)\nCÔNG TY CỔ PHẦN DỊCH VỤ XYZ\nMã số thuế: 0301234567";
        assert_eq!(extract_seller(text), "CÔNG TY CỔ PHẦN DỊCH VỤ XYZ");
    }

    #[test]
    fn test_seller_fused_with_title() {
        let text = "CÔNG TY TNHH ABC HÓA ĐƠN GIÁ TRỊ GIA TĂNG\nMã số thuế: 0301234567";
        assert_eq!(extract_seller(text), "CÔNG TY TNHH ABC");
    }

    #[test]
    fn test_seller_from_footer() {
        let text = "Hóa đơn\nTổng cộng: 100.000\nPARK HYATT SAIGON HOTEL";
        assert_eq!(extract_seller(text), "PARK HYATT SAIGON HOTEL");
    }

    #[test]
    fn test_strip_seller_labels() {
        assert_eq!(strip_seller_labels("(Issued) : CÔNG TY A"), "CÔNG TY A");
        assert_eq!(strip_seller_labels("Seller: CÔNG TY B"), "CÔNG TY B");
    }
}
