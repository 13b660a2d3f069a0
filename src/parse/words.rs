//! Amounts written out in Vietnamese words ("bằng chữ").

use once_cell::sync::Lazy;
use regex::Regex;

static FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(đồng|dong|chẵn|chan|chấn|lẻ|le|và|va)\b").unwrap());

fn digit(token: &str) -> Option<i64> {
    let value = match token {
        "không" => 0,
        "một" | "mot" | "mốt" => 1,
        "hai" => 2,
        "ba" => 3,
        "bốn" | "bon" | "tư" => 4,
        "năm" | "nam" | "lăm" => 5,
        "sáu" | "sau" => 6,
        "bảy" | "bay" => 7,
        "tám" | "tam" => 8,
        "chín" | "chin" => 9,
        "linh" => 0,
        _ => return None,
    };
    Some(value)
}

fn scale(token: &str) -> Option<i64> {
    match token {
        "nghìn" | "nghin" | "ngàn" | "ngan" => Some(1_000),
        "triệu" | "trieu" => Some(1_000_000),
        "tỷ" | "ty" | "tỉ" => Some(1_000_000_000),
        _ => None,
    }
}

/// Parses a spelled-out amount, e.g. `bảy trăm nghìn` → `700000`.
///
/// Each group is `[d] trăm [d] mươi [d]` closed by a scale word. A scale word
/// with nothing before it counts as one ("triệu" = 1 000 000). Unknown words
/// are skipped.
pub fn words_to_number(text: &str) -> i64 {
    let lowered = text.trim().to_lowercase();
    let cleaned = FILLER.replace_all(&lowered, "");

    let mut result: i64 = 0;
    let mut hundreds: i64 = 0;
    let mut pending: i64 = 0;

    for token in cleaned.split_whitespace() {
        if let Some(d) = digit(token) {
            pending = d;
        } else if matches!(token, "mười" | "muoi" | "mươi") {
            if pending == 0 {
                hundreds += 10;
            } else {
                hundreds += pending * 10;
                pending = 0;
            }
        } else if matches!(token, "trăm" | "tram") {
            hundreds += pending * 100;
            pending = 0;
        } else if let Some(multiplier) = scale(token) {
            if hundreds == 0 && pending == 0 {
                pending = 1;
            }
            result += (hundreds + pending) * multiplier;
            hundreds = 0;
            pending = 0;
        }
    }

    result + hundreds + pending
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_amounts() {
        assert_eq!(words_to_number("bảy trăm nghìn đồng"), 700_000);
        assert_eq!(words_to_number("Một triệu hai trăm nghìn đồng chẵn"), 1_200_000);
        assert_eq!(words_to_number("năm mươi nghìn"), 50_000);
    }

    #[test]
    fn test_tens_and_linh() {
        assert_eq!(words_to_number("mười lăm nghìn"), 15_000);
        assert_eq!(words_to_number("hai trăm linh năm nghìn"), 205_000);
        assert_eq!(words_to_number("ba mươi mốt nghìn"), 31_000);
    }

    #[test]
    fn test_bare_scale_word() {
        assert_eq!(words_to_number("triệu"), 1_000_000);
        assert_eq!(words_to_number("tỷ hai trăm triệu"), 1_200_000_000);
    }

    #[test]
    fn test_unaccented() {
        assert_eq!(words_to_number("bay tram nghin dong"), 700_000);
        assert_eq!(words_to_number("mot trieu"), 1_000_000);
    }

    #[test]
    fn test_empty() {
        assert_eq!(words_to_number(""), 0);
        assert_eq!(words_to_number("đồng chẵn"), 0);
    }
}
