//! Text normalisation shared by the field and line item parsers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Some generators leak serialized dict fragments into the text layer, with the
/// grand total wrapped as `0'}2,950,000'}'}`.
static HIDDEN_TOTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"0'\}([\d.,]+)'\}'\}").unwrap());
static SPACED_CAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z]\s+)+[A-Z]$").unwrap());
static NUMERIC_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s()=x+]+$").unwrap());

const JUNK_TEXT_KEYWORDS: &[&str] = &[
    "stt", "tên hàng", "đơn vị tính", "số lượng", "thành tiền", "người mua", "ký bởi", "trang",
    "thuế suất", "cộng tiền", "tổng cộng", "bằng chữ", "tiền thuế", "serial", "ký hiệu", "mẫu số",
    "vnd", "chuyển khoản", "vat invoice", "đơn vị bán", "mã tra cứu", "vat) rate)", "vat rate",
    "gtgt", "rate)", "amount)", "rate%)", "tên h", "đơ n v", "s ố l", "vị tính", "sau thuế",
    "chiết khấu", "a b c",
];

/// Output of [`clean_invoice_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedText {
    pub text: String,
    /// Total recovered from a garbage wrapper, if any.
    pub hidden_total: Option<String>,
}

/// Normalises newlines and strips generator garbage line by line.
pub fn clean_invoice_text(raw: &str) -> CleanedText {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut hidden_total = None;
    let mut lines = Vec::new();

    for original in normalized.split('\n') {
        let trimmed = original.trim();
        let mut line = original.to_string();

        if let Some(caps) = HIDDEN_TOTAL.captures(original) {
            let value = caps[1].to_string();
            tracing::debug!("Recovered hidden total {} from garbage", value);
            if hidden_total.is_none() {
                hidden_total = Some(value.clone());
            }
            line = line.replace(&caps[0], &format!(" {} ", value));
        }

        for _ in 0..3 {
            line = line
                .replace("0'}", "")
                .replace("'}'}", "")
                .replace("'}", "")
                .replace("{'", "");
        }

        let quoted = trimmed.len() > 1 && trimmed.starts_with('\'') && trimmed.ends_with('\'');
        if trimmed.starts_with('{') || quoted {
            continue;
        }

        lines.push(line.replace(['\u{ad}', '\0'], ""));
    }

    CleanedText {
        text: lines.join("\n"),
        hidden_total,
    }
}

/// Trims, drops control characters and collapses internal whitespace.
pub fn clean_string_value(value: &str) -> String {
    value
        .replace(['\r', '\u{ad}'], "")
        .replace('\t', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Header, footer and summary lines that never name a purchased item.
pub fn is_junk_text(text: &str) -> bool {
    if text.chars().count() < 2 {
        return true;
    }
    if SPACED_CAPS.is_match(text) || NUMERIC_HEADER.is_match(text) {
        return true;
    }
    let lower = text.to_lowercase();
    if JUNK_TEXT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }
    lower.chars().count() > 50 && lower.chars().filter(|c| matches!(c, '(' | ')')).count() > 4
}

/// Byte range of the line around `start..end`.
pub fn line_bounds(text: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = text[end..].find('\n').map(|i| end + i).unwrap_or(text.len());
    (line_start, line_end)
}

/// The line containing the byte range `start..end`, lowercased.
pub fn line_at(text: &str, start: usize, end: usize) -> String {
    let (line_start, line_end) = line_bounds(text, start, end);
    text[line_start..line_end].to_lowercase()
}

/// Last `n` characters of `text`.
pub fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    let skip = count - n;
    let offset = text.char_indices().nth(skip).map(|(i, _)| i).unwrap_or(0);
    &text[offset..]
}

/// True when the text has at least one cased letter and no lowercase ones.
pub fn is_upper_text(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_hidden_total() {
        let cleaned = clean_invoice_text("Tổng 0'}2,950,000'}'}\r\nKý hiệu: 1C25TAA");
        assert_eq!(cleaned.hidden_total.as_deref(), Some("2,950,000"));
        assert!(cleaned.text.contains("2,950,000"));
        assert!(!cleaned.text.contains("'}"));
        assert!(cleaned.text.contains("\nKý hiệu"));
    }

    #[test]
    fn test_drops_code_lines_and_soft_hyphens() {
        let cleaned = clean_invoice_text("{'name': 'x'}\n'quoted'\nMST: 0301\u{ad}234567\0");
        assert_eq!(cleaned.text, "MST: 0301234567");
    }

    #[test]
    fn test_clean_string_value() {
        assert_eq!(clean_string_value("  CÔNG TY\t ABC \r\n  XYZ "), "CÔNG TY ABC XYZ");
        assert_eq!(clean_string_value("a\u{ad}b"), "ab");
    }

    #[test]
    fn test_is_junk_text() {
        assert!(is_junk_text("x"));
        assert!(is_junk_text("A B C"));
        assert!(is_junk_text("1 2 3 = 4 x 5"));
        assert!(is_junk_text("Tổng cộng tiền thanh toán"));
        assert!(is_junk_text("Người mua hàng (Buyer)"));
        assert!(!is_junk_text("Lẩu gà lá é"));
    }

    #[test]
    fn test_line_helpers() {
        let text = "first\nSố: 123 Đường Lê Lợi\nlast";
        let start = text.find("123").unwrap();
        assert_eq!(line_at(text, start, start + 3), "số: 123 đường lê lợi");
        assert_eq!(tail_chars("xin chào", 4), "chào");
        assert_eq!(tail_chars("ab", 4), "ab");
    }

    #[test]
    fn test_is_upper_text() {
        assert!(is_upper_text("CÔNG TY TNHH ABC 123"));
        assert!(!is_upper_text("Công ty"));
        assert!(!is_upper_text("123"));
    }
}
