//! Line items from the goods table of a digital invoice.
//!
//! Rows start with a 1-3 digit ordinal (STT). The last unit word followed by
//! numbers separates the item name from the quantity/price/amount columns.
//! Names that wrap onto neighbouring lines are merged back.

use crate::domain::{LineItem, TaxRate};
use crate::parse::money::{format_price_value, parse_vietnamese_number};
use crate::parse::text::is_junk_text;
use once_cell::sync::Lazy;
use regex::Regex;

const COMMON_UNITS: &[&str] = &[
    "CÁI", "CHIẾC", "BỘ", "GÓI", "HỘP", "THÙNG", "BAO", "CHAI", "LON", "LÍT", "LIT", "KG", "GRAM",
    "GM", "MÉT", "M", "M2", "M3", "CUỘN", "TẤM", "THANH", "VIÊN", "VỈ", "TỜ", "QUYỂN", "CUỐN", "RAM",
    "CẶP", "ĐÔI", "DĨA", "ĐĨA", "PHẦN", "THỐ", "TÔ", "CHÉN", "LY", "CỐC", "SUẤT", "KIM", "CHẬU",
    "CÂY", "GIỜ", "NGÀY", "THÁNG", "NĂM", "LẦN", "CHUYẾN", "LƯỢT", "PHÚT", "KW", "KWH", "SỐ", "MÓN",
    "KỆ", "BỊCH", "NỒI", "CON", "PCS", "NGƯỜI",
];

const SURCHARGE_KEYWORDS: &[&str] =
    &["phụ thu", "phí dịch vụ", "phí phục vụ", "service charge", "surcharge"];

const STOP_PHRASES: &[&str] = &["cộng tiền", "tổng cộng", "thuế", "thành tiền"];

const JUNK_PREFIXES: &[&str] = &[
    "GTGT", "VAT) rate)", "VAT rate", "Rate)", "A B C", "khấu", "KHẤU", "Phần）", "Phần)", "PHẦN）",
    "PHẦN)", "ĐVT:", "ĐVT",
];

const PRICE_WORDS: &[&str] = &["giá", "gia", "mệnh", "số", "phòng", "room", "no", "no."];

static COLUMN_NUMBERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s.,|()x=+]+$").unwrap());
static COLUMN_LETTERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z\s]+[\d\s=x]+$").unwrap());
static ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3})[._\-\s|]+").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());
static RATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(0|5|8|10)\s*%").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").unwrap());
static DATE_SPACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}\s*[/-]\s*\d{1,2}\s*[/-]\s*\d{2,4}").unwrap());
static PRICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}(?:[.,]\d{3})+(?:[.,]\d{2})?").unwrap());
static LONG_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4,}\b").unwrap());
static ASCII_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]").unwrap());
static DATE_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(ngày|từ|đến|tháng|năm)").unwrap());
static VIETNAMESE_LETTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ]")
        .unwrap()
});
static LEADING_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+").unwrap());
static COLUMN_LETTER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-C]\s)+[\d\s=x]+").unwrap());
static LEADING_NUMBERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s=x+]+(\s|$)").unwrap());
static TRAILING_FORMULA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+[\-+]\s*[\d\s=x+\-]+$").unwrap());
static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S+)\s+(\d+[\s.,\d]*)$").unwrap());
static ONLY_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s]+$").unwrap());
static ONLY_SYMBOLS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\s=x+\-.,()\[\]]+$").unwrap());

fn is_unit(token: &str) -> bool {
    let upper = token.to_uppercase();
    COMMON_UNITS.contains(&upper.as_str())
}

fn is_surcharge(text: &str) -> bool {
    let lower = text.to_lowercase();
    SURCHARGE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn has_stop_phrase(text: &str) -> bool {
    let lower = text.to_lowercase();
    STOP_PHRASES.iter().any(|kw| lower.contains(kw))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn first_char(s: &str) -> Option<char> {
    s.chars().next()
}

/// Parses every item row of `full_text`.
pub fn extract_line_items(full_text: &str) -> Vec<LineItem> {
    let lines: Vec<&str> = full_text.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| parse_row(&lines, idx, line.trim()))
        .collect()
}

fn parse_row(lines: &[&str], idx: usize, line: &str) -> Option<LineItem> {
    let first_token = line.split_whitespace().next()?;
    if !first_token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if COLUMN_NUMBERS.is_match(line) || COLUMN_LETTERS.is_match(line) {
        return None;
    }
    let ordinal = ORDINAL.captures(line)?;
    let stt_end = ordinal.get(0)?.end();
    let stt_value = ordinal.get(1)?.as_str();

    let all_numbers: Vec<regex::Match> = NUMBER.find_iter(line).collect();
    if all_numbers.len() < 3 && !(is_surcharge(line) && all_numbers.len() == 2) {
        return None;
    }

    let tax_rate = RATE
        .captures(line)
        .and_then(|c| c[1].parse::<i64>().ok())
        .and_then(TaxRate::from_percent);

    let (mut name, mut numbers) = split_name_and_numbers(line, stt_end, &all_numbers)?;

    if numbers.len() < 2 {
        if is_surcharge(&name) && numbers.len() == 1 {
            // "19 Phụ thu 171.500": the single value is both price and amount.
            let amount = numbers[0].clone();
            numbers = vec!["1".to_string(), amount.clone(), amount];
        } else {
            return None;
        }
    }

    name = trim_unit_tokens(&name);
    if let Some(rest) = name.strip_prefix(stt_value) {
        name = rest.trim().to_string();
    }

    if needs_previous_lines(&name) {
        let prefix = collect_previous_lines(lines, idx);
        if !prefix.is_empty() {
            name = format!("{} {}", prefix.join(" "), name);
        }
    }

    let unclosed = name.matches('(').count() > name.matches(')').count()
        || name.matches('（').count() > name.matches('）').count();
    if needs_next_lines(lines, idx, &name, unclosed) {
        let suffix = collect_next_lines(lines, idx, unclosed);
        if !suffix.is_empty() {
            name = format!("{} {}", name, suffix.join(" "));
        }
    }

    let name = strip_junk(name.trim());
    if char_len(&name) < 3
        || is_junk_text(&name)
        || ONLY_DIGITS.is_match(&name)
        || ONLY_SYMBOLS.is_match(&name)
    {
        return None;
    }

    let (quantity, unit_price, amount) = pick_columns(&numbers)?;
    let (quantity, amount) = fix_small_amount(quantity, &unit_price, amount);

    Some(LineItem {
        name,
        quantity: format_price_value(&quantity),
        unit_price: format_price_value(&unit_price),
        amount: format_price_value(&amount),
        tax_rate,
    })
}

/// Splits a row into the raw item name and its numeric columns.
fn split_name_and_numbers(
    line: &str,
    stt_end: usize,
    all_numbers: &[regex::Match],
) -> Option<(String, Vec<String>)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    // Unit words can also occur inside descriptions ("từ ngày 15/12"), so take
    // the last one that still has numbers after it.
    let unit_idx = (0..tokens.len()).rev().find(|&i| {
        is_unit(tokens[i])
            && tokens[i].to_uppercase() != "THANH"
            && NUMBER.is_match(&tokens[i + 1..].join(" "))
    });

    match unit_idx {
        Some(i) => {
            let remaining = tokens[i + 1..].join(" ");
            let numbers: Vec<String> = NUMBER
                .find_iter(&remaining)
                .map(|m| m.as_str().to_string())
                .collect();
            let name = tokens[..i].join(" ");
            if numbers.len() < 2 && !(is_surcharge(&name) && numbers.len() == 1) {
                return None;
            }
            Some((name, numbers))
        }
        None => {
            // Without a unit, the name ends at the first price-like number.
            let after_stt: Vec<&regex::Match> =
                all_numbers.iter().filter(|m| m.start() > stt_end).collect();
            let name_end = after_stt
                .iter()
                .find(|m| {
                    let s = m.as_str();
                    s.contains(['.', ',']) || s.replace(['.', ','], "").len() >= 4
                })
                .map(|m| m.start())
                .unwrap_or(line.len());
            if name_end <= stt_end {
                return None;
            }
            let name = line[stt_end..name_end].trim().to_string();
            let numbers = after_stt.iter().map(|m| m.as_str().to_string()).collect();
            Some((name, numbers))
        }
    }
}

/// Drops unit words at either end and stray brackets left by the column split.
fn trim_unit_tokens(name: &str) -> String {
    let mut tokens: Vec<String> = name.split_whitespace().map(str::to_string).collect();
    while tokens.last().is_some_and(|t| is_unit(t)) {
        tokens.pop();
    }
    // "THANH" also starts names like "Thanh long"
    while tokens
        .first()
        .is_some_and(|t| is_unit(t) && t.to_uppercase() != "THANH")
    {
        tokens.remove(0);
    }

    if let Some(first) = tokens.first_mut() {
        if first.starts_with('）') || first.starts_with(')') {
            *first = first.chars().skip(1).collect::<String>().trim().to_string();
        }
    }
    if let Some(last) = tokens.last_mut() {
        let upper = last.to_uppercase();
        let last_len = char_len(last);
        if let Some(unit) = COMMON_UNITS
            .iter()
            .find(|u| char_len(u) >= 3 && upper.ends_with(*u) && last_len > char_len(u))
        {
            let keep = last_len - char_len(unit);
            *last = last
                .chars()
                .take(keep)
                .collect::<String>()
                .trim_end_matches(['（', '('])
                .to_string();
        }
    }

    tokens.join(" ")
}

fn needs_previous_lines(name: &str) -> bool {
    let check = LEADING_ORDINAL.replace(name, "");
    let check = check.trim();
    let first = first_char(check);
    let head: String = check.chars().take(10).collect();
    char_len(check) < 5
        || first.is_some_and(char::is_lowercase)
        || matches!(first, Some('(') | Some(')'))
        || head.contains(')')
}

fn collect_previous_lines(lines: &[&str], idx: usize) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for offset in 1..3 {
        let Some(prev_idx) = idx.checked_sub(offset) else {
            break;
        };
        let mut prev = lines[prev_idx].trim().to_string();
        if char_len(&prev) < 2 {
            break;
        }
        if let Some(m) = ORDINAL.find(&prev) {
            // A bare "STT + text" line is the head of this item; with numbers it is a separate row.
            let rest = prev[m.end()..].trim().to_string();
            if rest.chars().any(|c| c.is_ascii_digit()) {
                break;
            }
            prev = rest;
        }
        if is_junk_text(&prev) {
            break;
        }

        let without_dates = DATE.replace_all(&prev, "");
        if PRICE_NUMBER.is_match(&without_dates) || LONG_NUMBER.find_iter(&without_dates).count() > 1
        {
            break;
        }
        if has_stop_phrase(&prev) {
            break;
        }

        // Tail of the previous item's name, e.g. "Sichuan tofu)".
        if (prev.ends_with(')') || prev.ends_with('）'))
            && ASCII_LETTER.is_match(&prev)
            && !prev.contains('(')
            && !prev.contains('（')
        {
            break;
        }

        // An English gloss line sitting above a Vietnamese line belongs to the item above.
        if let Some(collected) = parts.first() {
            let vietnamese_line = first_char(collected).is_some_and(char::is_uppercase)
                && !collected.starts_with('(');
            let english_gloss = prev.starts_with('(') && ASCII_LETTER.is_match(&prev);
            if vietnamese_line && english_gloss {
                break;
            }
        }

        parts.insert(0, prev);
    }
    parts
}

fn needs_next_lines(lines: &[&str], idx: usize, name: &str, unclosed: bool) -> bool {
    let next_is_suffix = lines.get(idx + 1).is_some_and(|peek| {
        let peek = peek.trim();
        peek.starts_with('(') && (ASCII_LETTER.is_match(peek) || DATE_WORDS.is_match(peek))
    });
    let trimmed = name.trim_end();
    name.ends_with(['(', '-', '（'])
        || trimmed.ends_with('(')
        || trimmed.ends_with('（')
        || unclosed
        || next_is_suffix
}

fn collect_next_lines(lines: &[&str], idx: usize, unclosed: bool) -> Vec<String> {
    let mut parts = Vec::new();
    for offset in 1..4 {
        let Some(next) = lines.get(idx + offset) else {
            break;
        };
        let next = next.trim();
        if char_len(next) < 2 || ORDINAL.is_match(next) || is_junk_text(next) {
            break;
        }
        let without_dates = DATE_SPACED.replace_all(next, "");
        if NUMBER.find_iter(&without_dates).count() > 1 || has_stop_phrase(next) {
            break;
        }

        // A capitalised Vietnamese line starts a new item unless it closes our bracket.
        if let Some(c) = first_char(next) {
            if c.is_uppercase() && c != '(' {
                let closes = unclosed && (next.contains('）') || next.contains(')'));
                if !closes && VIETNAMESE_LETTER.is_match(next) {
                    break;
                }
            }
        }

        parts.push(next.to_string());
    }
    parts
}

/// Removes header fragments glued to the name and trailing column data.
fn strip_junk(name: &str) -> String {
    let mut name = name.to_string();
    for prefix in JUNK_PREFIXES {
        if let Some(rest) = name.strip_prefix(&format!("{} ", prefix)) {
            name = rest.trim().to_string();
        }
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim().to_string();
        }
    }
    name = COLUMN_LETTER_PREFIX.replace(&name, "").into_owned();
    name = LEADING_NUMBERS.replace(&name, "").into_owned();
    name = TRAILING_FORMULA.replace(&name, "").into_owned();

    if let Some(caps) = TRAILING_NUMBER.captures(&name) {
        let word_before = caps[1].to_lowercase();
        let number_part = caps[2].split_whitespace().next().unwrap_or("");
        let is_year = number_part.len() == 4 && number_part.chars().all(|c| c.is_ascii_digit());
        let keep = is_year || PRICE_WORDS.contains(&word_before.as_str());
        if !keep {
            let cut = caps.get(2).map(|m| m.start()).unwrap_or(name.len());
            name = name[..cut].trim().to_string();
        }
    }

    trim_unit_tokens_plain(name.trim())
}

/// Final unit cleanup after merges, without the bracket handling.
fn trim_unit_tokens_plain(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    while tokens.last().is_some_and(|t| is_unit(t)) {
        tokens.pop();
    }
    while tokens
        .first()
        .is_some_and(|t| is_unit(t) && t.to_uppercase() != "THANH")
    {
        tokens.remove(0);
    }
    tokens.join(" ")
}

/// Chooses quantity, unit price and amount from the numeric columns.
///
/// With five or more columns there may be a discount or service column
/// between price and amount; the candidate closest to qty × price wins.
fn pick_columns(numbers: &[String]) -> Option<(String, String, String)> {
    match numbers.len() {
        0 | 1 => None,
        2 => Some((numbers[0].clone(), numbers[1].clone(), numbers[1].clone())),
        3 | 4 => Some((numbers[0].clone(), numbers[1].clone(), numbers[2].clone())),
        _ => {
            let quantity = &numbers[0];
            let unit_price = &numbers[1];
            let cand2 = &numbers[2];
            let cand3 = &numbers[3];

            let discount = cand2.replace(['.', ','], "");
            let discount = discount.trim_matches('0');
            let has_discount_column = discount.is_empty() || discount == "0";

            let amount = match expected_amount(quantity, unit_price) {
                Some(expected) => {
                    let v2 = parse_vietnamese_number(cand2);
                    let v3 = parse_vietnamese_number(cand3);
                    let diff2 = (v2 - expected).abs();
                    let diff3 = (v3 - expected).abs();
                    if (diff3 < diff2 && v2 < 0.5 * expected) || has_discount_column {
                        cand3
                    } else {
                        cand2
                    }
                }
                None if has_discount_column => cand3,
                None => cand2,
            };
            Some((quantity.clone(), unit_price.clone(), amount.clone()))
        }
    }
}

fn expected_amount(quantity: &str, unit_price: &str) -> Option<f64> {
    let q: f64 = if quantity.contains(',') {
        quantity.replace([',', '.'], "").parse().ok()?
    } else {
        quantity.parse().ok()?
    };
    let mut p: f64 = unit_price.replace('.', "").replace(',', ".").parse().ok()?;
    if p < 100.0 && unit_price.contains('.') {
        p = unit_price.replace(['.', ','], "").parse().ok()?;
    }
    let expected = q * p;
    Some(if expected == 0.0 && q == 0.0 { p } else { expected })
}

/// A fee row can put the tax rate where the amount belongs ("Phí dịch vụ ... 46.800 8").
fn fix_small_amount(quantity: String, unit_price: &str, amount: String) -> (String, String) {
    let a = amount.replace(['.', ','], "");
    let p = unit_price.replace(['.', ','], "");
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if numeric(&a) && numeric(&p) {
        let amount_value: f64 = a.parse().unwrap_or(0.0);
        let price_value: f64 = p.parse().unwrap_or(0.0);
        if amount_value <= 100.0 && price_value > 1000.0 {
            let quantity = if quantity.is_empty() || quantity == "0" {
                "1".to_string()
            } else {
                quantity
            };
            return (quantity, unit_price.to_string());
        }
    }
    (quantity, amount)
}
