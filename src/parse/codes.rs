//! Reference codes printed on e-invoices: serial (Ký hiệu), lookup code
//! (Mã tra cứu), tax authority code (Mã CQT) and the lookup link.

use crate::parse::compile;
use crate::parse::text::tail_chars;
use once_cell::sync::Lazy;
use regex::Regex;

static AUTHORITY_SHORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Mã|Ma)\s*(?:của)?\s*(?:CQ|cơ\s*quan)\s*thuế[:\s]*([A-Z0-9\-]+)").unwrap()
});
static AUTHORITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Mã\s*(?:của\s*)?[Cc]ơ quan thuế[:\s]*([A-Za-z0-9\-\x{AD}]+)",
        r"(?i)Mã\s*(?:của\s*)?[Cc]ơ quan thuế\s*\([Tt]ax authority code\)[:\s]*([A-Za-z0-9\-\x{AD}]+)",
        r"(?i)Mã\s*CQT\s*\([Cc]ode\)[:\s]*([A-Za-z0-9\-\x{AD}]+)",
        r"(?i)Mã\s*CQT[:\s]*([A-Za-z0-9\-\x{AD}]+)",
        r"(?i)MCQT\s*[:\s]+([A-Za-z0-9\-\x{AD}]+)",
        r"(?i)Tax authority code[:\s]*([A-Za-z0-9\-\x{AD}]+)",
    ])
});

static SERIAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Ký hiệu\s*/\s*Serial[:\s]*([A-Z0-9]+)",
        r"(?i)Ký hiệu\s*/\s*\(Serial(?:\s*No\.?)?\)[:\s]*([A-Z0-9]+)",
        r"(?i)Ký hiệu\s*\(Serial\)[:\s]*([A-Z0-9]+)",
        r"(?i)Ký hiệu\s*\(Serial(?:\s*No\.?)?\)[:\s]*([A-Z0-9]+)",
        r"(?i)Ký hiệu\s*\(Series\)[:\s]*([A-Z0-9]+)",
        r"(?i)Ký hiệu[:\s]*([A-Z0-9]+)",
        r"(?i)Mẫu số\s*-\s*Ký hiệu[^:]*[:\s]*([A-Z0-9]+)",
    ])
});

static LOOKUP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Mã tra cứu hoá đơn[:\s]*([A-Za-z0-9]+)",
        r"(?i)Mã nhận hóa đơn\s*\(Code for checking\)[:\s]*([A-Z0-9]+)",
        r"(?i)Mã nhận hóa đơn[:\s]*([A-Za-z0-9]+)",
        r"(?i)Mã tra cứu\s*\(Lookup\s*code\)[:\s]*([A-Za-z0-9_]+)",
        r"(?i)Mã tra cứu hóa đơn\s*\(Invoice code\)[:\s]*([A-Za-z0-9_]+)",
        r"(?i)Mã tra cứu(?:\s*HĐĐT)?(?:\s*này)?[:\s]*([A-Za-z0-9_]+)",
        r"(?i)Mã tra cứu\(Invoice code\)[:\s]*([A-Za-z0-9_]+)",
        r"(?i)Mã số bí mật[:\s]*([A-Za-z0-9_]+)",
        r"(?i)Security Code\)[:\s]*([A-Z0-9]+)",
        r"(?i)Mã tra cứu[:\s]*([A-Za-z0-9]+)",
        r"(?i)Lookup\s*code[):\s]*([A-Za-z0-9]+)",
        r"(?i)Ma tra cuu[:\s]*([A-Za-z0-9]+)",
        r"(?i)Mã tra cứu\s*\(Code\)[:\s]*([A-Za-z0-9]+)",
        r"(?i)với mã[:\s]*([A-Za-z0-9]+)",
        r"(?i)nhập mã\s+([A-Za-z0-9]+)",
        r"(?i)provided code[^:]*[:\s]*([A-Za-z0-9]+)",
    ])
});

/// Words that show a "code" capture is really part of a sentence or URL.
const LOOKUP_NOISE: &[&str] = &[
    "http", "tracuu", "website", "invoice", "check", ".com", ".vn", "please", "vui lòng",
    "quý khách", "access",
];

static FOOTER_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-F0-9]{8,}\b").unwrap());
const SIGNATURE_CONTEXT: &[&str] =
    &["serial number", "serial no", "ký điện tử", "ký điện tư", "chữ ký số"];

static LONG_HEX_AFTER_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:nhập mã|provided code).*?([a-f0-9]{30,})").unwrap());
static DASHED_LOOKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Mã tra cứu[:\s]*([A-Z0-9-]+)").unwrap());

static LINK_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Tra cứu hóa đơn tại\s*\([^)]+\)[:\s]*(https?://\S+)",
        r"(?i)Tra cứu hóa đơn tại[:\s]*(https?://\S+)",
        r"(?i)(?:Tra cứu[^:]*tại|Trang tra cứu|website)[:\s]*(https?://\S+)",
        r"(?i)(https?://\S*(?:tracuu|tra-cuu|invoice|vnpt-invoice|minvoice|hddt)\S*)",
        r"(?i)(?:tải|lấy|xem|download)\s+(?:về\s+)?hóa đơn[^\n]*(https?://\S+)",
        r"(?i)(https?://\S+)[^\n]*(?:hóa đơn|tải về|lấy hóa đơn)",
        r"(?i)(?:Tra cứu[^:]*tại|Trang tra cứu|website)[:\s]*([a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(?:/\S*)?)",
    ])
});

static CODE_AFTER_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:https?://\S+)\s+([A-Za-z0-9]{6,50})\b").unwrap());
static CODE_BEFORE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([A-Za-z0-9]{6,50})\s+(?:https?://\S+)").unwrap());
const LINK_NOISE: &[&str] = &[
    "website", "http", "https", "link", "tại", "vnbox", "vnpt", "invoice",
];

/// Codes found on the document. `authority_code` may be filled from an
/// overlong lookup code before the dedicated authority patterns run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codes {
    pub serial: String,
    pub lookup_code: String,
    pub authority_code: String,
    pub lookup_link: String,
}

/// Serial, lookup code and authority code. The link and the code printed
/// next to it are handled by [`extract_link`] and [`code_near_link`].
pub fn extract_codes(text: &str) -> Codes {
    let mut codes = Codes::default();

    if let Some(caps) = AUTHORITY_SHORT.captures(text) {
        codes.authority_code = caps[1].to_string();
    }

    if let Some(caps) = SERIAL_PATTERNS.iter().find_map(|re| re.captures(text)) {
        codes.serial = caps[1].to_string();
    }

    for re in LOOKUP_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let code = &caps[1];
        let lower = code.to_lowercase();
        if LOOKUP_NOISE.iter().any(|kw| lower.contains(kw)) {
            continue;
        }
        // VNPT lookup codes run to 32 characters; anything longer is the authority code.
        if (5..=35).contains(&code.len()) {
            codes.lookup_code = code.to_string();
            break;
        } else if code.len() > 35 && codes.authority_code.is_empty() {
            codes.authority_code = code.to_string();
        }
    }

    if codes.lookup_code.is_empty() {
        codes.lookup_code = footer_code(text).unwrap_or_default();
    }

    if let Some(caps) = AUTHORITY_PATTERNS.iter().find_map(|re| re.captures(text)) {
        codes.authority_code = caps[1].trim().replace('\u{ad}', "-");
    }

    codes.lookup_link = extract_link(text);
    codes
}

/// Unlabelled hex lookup code near the end of the document.
fn footer_code(text: &str) -> Option<String> {
    let footer = tail_chars(text, 500);
    FOOTER_HEX
        .find_iter(footer)
        .map(|m| m.as_str())
        .filter(|code| code.len() >= 10 && !code.chars().all(|c| c.is_ascii_digit()))
        .filter(|code| !code.contains("0100") && !code.contains("030"))
        .find(|code| {
            let on_signature_line = footer
                .split('\n')
                .find(|line| line.contains(code))
                .map(|line| {
                    let lower = line.to_lowercase();
                    SIGNATURE_CONTEXT.iter().any(|kw| lower.contains(kw))
                })
                .unwrap_or(false);
            !on_signature_line
        })
        .map(str::to_string)
}

/// Lookup link; a scheme is added when the document prints a bare host.
pub fn extract_link(text: &str) -> String {
    for re in LINK_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let mut link = caps[1].trim_end_matches('.').trim_end_matches(',').to_string();
        let lower = link.to_lowercase();
        if !lower.starts_with("http") {
            link = format!("http://{}", link);
        }
        if link.contains('.') && link.chars().count() > 5 {
            return link;
        }
    }
    String::new()
}

/// Code printed right after or before a URL, for invoices that never label it.
pub fn code_near_link(text: &str, seller_tax_code: &str) -> Option<String> {
    for re in [&*CODE_AFTER_LINK, &*CODE_BEFORE_LINK] {
        for caps in re.captures_iter(text) {
            let candidate = &caps[1];
            let lower = candidate.to_lowercase();
            if LINK_NOISE.contains(&lower.as_str()) || lower.contains("tracuu") {
                continue;
            }
            if !seller_tax_code.is_empty() && candidate == seller_tax_code {
                continue;
            }
            if (6..=50).contains(&candidate.len()) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Late lookup code rules that apply once everything else has run.
pub fn late_lookup_code(text: &str) -> Option<String> {
    let mut code = LONG_HEX_AFTER_PROMPT
        .captures(text)
        .map(|caps| caps[1].to_string());
    if let Some(caps) = DASHED_LOOKUP.captures(text) {
        code = Some(caps[1].to_string());
    }
    code
}
