//! Money strings as they appear on Vietnamese invoices.
//!
//! Invoices mix `1.234.567`, `1,234,567`, `1.234.567,00` and `1,234,567.00`,
//! so the decimal separator is decided from position rather than locale.

use once_cell::sync::Lazy;
use regex::Regex;

static TWO_DIGIT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.]\d{2}$").unwrap());
static THREE_DIGIT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,.]\d{3}$").unwrap());
static VN_DECIMAL_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r",\d{2}$").unwrap());
static EN_DECIMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+\.\d{2}$").unwrap());

/// Drops the decimal part and every separator, leaving the whole-number digits.
fn strip_decimal(value: &str) -> String {
    let s = value.trim();
    let head = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) => &s[..dot.max(comma)],
        _ if TWO_DIGIT_SUFFIX.is_match(s) && !THREE_DIGIT_SUFFIX.is_match(s) => &s[..s.len() - 3],
        _ => s,
    };
    head.replace(['.', ','], "")
}

/// Parses a money string to whole đồng. `None` when it is not a number.
pub fn parse_money(value: &str) -> Option<i64> {
    if value.trim().is_empty() {
        return None;
    }
    strip_decimal(value).parse::<i64>().ok()
}

/// Rounds half to even, so `2.5` → `2` and `3.5` → `4`.
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

fn group_thousands(value: i64, separator: char) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// `1234567` → `1.234.567`
pub fn format_money(value: i64) -> String {
    group_thousands(value, '.')
}

/// Re-renders a line item number as `1,234,567`; unparseable input is returned unchanged.
pub fn format_price_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return value.to_string();
    }
    match strip_decimal(trimmed).parse::<i64>() {
        Ok(n) => group_thousands(n, ','),
        Err(_) => value.to_string(),
    }
}

/// `.` thousands and `,` decimal, e.g. `1.234,5` → `1234.5`. Zero when invalid.
pub fn parse_vietnamese_number(value: &str) -> f64 {
    if value.trim().is_empty() {
        return 0.0;
    }
    value
        .trim()
        .replace('.', "")
        .replace(',', ".")
        .parse::<f64>()
        .unwrap_or(0.0)
}

/// Number conversion applied to report money columns: a trailing `,dd` is a
/// Vietnamese decimal, `1,234,567.89` an English one, otherwise both separators
/// are thousands. Fractions are rounded half to even.
pub fn report_number(value: &str) -> Option<i64> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    let normalized = if VN_DECIMAL_SUFFIX.is_match(s) {
        s.replace('.', "").replace(',', ".")
    } else if EN_DECIMAL.is_match(s) {
        s.replace(',', "")
    } else {
        s.replace(['.', ','], "")
    };
    normalized.parse::<f64>().ok().map(round_half_even)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_money_separators() {
        assert_eq!(parse_money("1.820.000"), Some(1_820_000));
        assert_eq!(parse_money("1,820,000"), Some(1_820_000));
        assert_eq!(parse_money("1.820.000,00"), Some(1_820_000));
        assert_eq!(parse_money("1,820,000.50"), Some(1_820_000));
        assert_eq!(parse_money("50,05"), Some(50));
        assert_eq!(parse_money("481.787"), Some(481_787));
    }

    #[test]
    fn test_parse_money_invalid() {
        assert_eq!(parse_money(""), None);
        assert_eq!(parse_money("   "), None);
        assert_eq!(parse_money("abc"), None);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0), "0");
        assert_eq!(format_money(999), "999");
        assert_eq!(format_money(1000), "1.000");
        assert_eq!(format_money(1_234_567), "1.234.567");
        assert_eq!(format_money(-45_000), "-45.000");
    }

    #[test]
    fn test_format_price_value() {
        assert_eq!(format_price_value("1.260.000"), "1,260,000");
        assert_eq!(format_price_value("46.800,00"), "46,800");
        assert_eq!(format_price_value("2"), "2");
        assert_eq!(format_price_value("x2"), "x2");
        assert_eq!(format_price_value(""), "");
    }

    #[test]
    fn test_parse_vietnamese_number() {
        assert_eq!(parse_vietnamese_number("1.234,5"), 1234.5);
        assert_eq!(parse_vietnamese_number("185.185"), 185185.0);
        assert_eq!(parse_vietnamese_number(""), 0.0);
    }

    #[test]
    fn test_report_number() {
        assert_eq!(report_number("17.592,59"), Some(17_593));
        assert_eq!(report_number("79,600"), Some(79_600));
        assert_eq!(report_number("1.234.567"), Some(1_234_567));
        assert_eq!(report_number(""), None);
        assert_eq!(report_number("không nhận diện được"), None);
    }

    #[test]
    fn test_report_number_rounds_half_to_even() {
        assert_eq!(report_number("50,50"), Some(50));
        assert_eq!(report_number("51,50"), Some(52));
        assert_eq!(report_number("1,820,000.50"), Some(1_820_000));
        assert_eq!(report_number("1,820,001.50"), Some(1_820_002));
        assert_eq!(round_half_even(12_502.5), 12_502);
        assert_eq!(round_half_even(-0.4), 0);
    }
}
