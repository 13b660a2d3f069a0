//! Money fields of a digital invoice.
//!
//! The rules run in a fixed order and later rules overwrite or complete what
//! earlier ones found: labelled totals first, then per-rate buckets, then the
//! multi-column summary rows, then arithmetic fallbacks and sanity checks.

use crate::domain::{Category, LineItem, TaxRate};
use crate::parse::compile;
use crate::parse::draft::FieldDraft;
use crate::parse::money::{parse_money, round_half_even};
use crate::parse::text::clean_string_value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const NUM: &str = r"(\d[\d.,]*)";

static BEFORE_TAX: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Cộng tiền hàng\s*/\s*Total charges[:\s]*([\d.,]+)",
        r"(?i)Cộng tiền hàng[^:]*[:\s]*([\d.,]+)",
        r"(?i)Cộng ti[êề]n hàng[^:]*[:\s]*([\d.,]+)",
        r"(?i)Tổng tiền chưa thuế[^:]*[:\s]*([\d.,]+)",
        r"(?i)Thành ti[êềẫ]n trước thuế[^:]*[:\s]*([\d.,]+)",
        r"(?i)Amount before VAT[^:]*[:\s]*([\d.,]+)",
        r"(?i)Sub total[^:]*[:\s]*([\d.,]+)",
    ])
});

static GOODS_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Tiền hàng[:\s]+([\d\s.,]+)").unwrap());
static PAYMENT_ROW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Tiền thanh toán[:\s]+([\d\s.,]+)").unwrap());
static ROW_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").unwrap());

static VAT_TOTAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Tiền thuế GTGT\s*/\s*VAT[:\s]*([\d.,]+)",
        r"(?i)Tổng tiền thuế GTGT \d+%[:\s]*([\d.,]+)",
        r"(?i)\|?Tiền thu[êế] GTGT\s*\(\s*\d+\s*%\s*\)\s*([\d.,]+)",
        r"(?i)\|?Tiền thu[êế] GTGT[^:]*[:\s]+(\d[\d.,]+)",
        r"(?i)Tiền thuế\s*\(VAT\s*Amount\)[^:]*[:\s]*([\d.,]+)",
        r"(?i)Tổng tiền thuế[^:]*[:\s]*([\d.,]+)",
        r"(?i)Tiền thu[êế] GTGT[^:]*[:\s]+(\d[\d.,]+)",
        r"(?i)VAT amount[^:]*[:\s]*([\d.,]+)",
        r"(?i)Cộng tiền thuế GTGT[^:]*[:\s]*([\d.,]+)",
    ])
});

/// A per-rate pattern: the regex, the bucket it fills and the capture group holding the tax.
struct RatePattern {
    regex: Regex,
    rate: TaxRate,
    group: usize,
}

fn rate_patterns(template: &str, rates: &[TaxRate], group: usize) -> Vec<RatePattern> {
    rates
        .iter()
        .map(|rate| RatePattern {
            regex: Regex::new(&format!("(?i){}", template.replace("{R}", &rate.percent().to_string())))
                .unwrap(),
            rate: *rate,
            group,
        })
        .collect()
}

static MULTI_COLUMN_RATES: Lazy<Vec<RatePattern>> = Lazy::new(|| {
    use TaxRate::*;
    let five_numbers = [NUM; 5].join(r"\s+");
    let three_numbers = [NUM; 3].join(r"\s+");
    let mut patterns = Vec::new();
    patterns.extend(rate_patterns(
        &format!(r"Thuế suất\s*{{R}}\s*%[^:\n]*[:\s]+{}", three_numbers),
        &[Zero, Five, Eight, Ten],
        2,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Thuế suất\s*khác[^0-9\n]*{{R}}\s*%\s+{}", five_numbers),
        &[Eight, Ten, Five],
        4,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Tổng tiền chịu thuế suất[^:\n]*:\s*{{R}}\s*%\s+{}", three_numbers),
        &[Zero, Five, Eight, Ten],
        2,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Thuế suất(?:\s*GTGT)?[:\s]*{{R}}\s*%\s*Tiền thuế GTGT[:\s]*{}", NUM),
        &[Eight, Ten, Five],
        1,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Tiền thuế GTGT[:\s]*[(\[]?\s*{{R}}\s*%\s*[)\]]?\s*{}", NUM),
        &[Eight, Ten, Five],
        1,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Tiền thuế[:\s]*[(\[]?\s*{{R}}\s*%\s*[)\]]?[:\s]*{}", NUM),
        &[Ten, Eight, Five],
        1,
    ));
    patterns.extend(rate_patterns(
        &format!(r"Tiền thuế[^%\d]*{{R}}\s*%.*?{}", NUM),
        &[Ten, Eight, Five],
        1,
    ));
    patterns
});

static SINGLE_VALUE_RATES: Lazy<Vec<RatePattern>> = Lazy::new(|| {
    let mut patterns = Vec::new();
    for template in [
        format!(r"Tổng tiền thuế GTGT\s*{{R}}\s*%\s*[:\s]*{}", NUM),
        format!(r"(?:thuế gtgt|VAT)\s*[(\[]?\s*{{R}}\s*%\s*[)\]]?\s*[:\s]*{}", NUM),
        format!(r"Tiền thu[êế] GTGT\s*\(\s*{{R}}\s*%\s*\)\s*{}", NUM),
    ] {
        patterns.extend(rate_patterns(&template, &TaxRate::ALL, 1));
    }
    patterns
});

static LOOSE_TAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Tiền thuế|Thuế GTGT|VAT)\s*[(\d%]*\)?[:\s]*([0-9]+[.,][0-9]+)").unwrap()
});
static SERVICE_FEE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Phí\s*PV[^:]*[:\s]*([\d.,]+)").unwrap());
static SALES_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Total amount|dịch vụ\s*\(Total amount\))[:\s]*([\d.,]+)").unwrap()
});

static AFTER_TAX: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)Tổng cộng\s*/\s*Total Amount[:\s]*([\d.,]+)",
        r"(?i)Tổng cộng tiền thanh toán\s*\(Total amount\)\s*([\d.,\s]+)",
        r"(?i)Tổng cộng\s*\(Total amount\)\s*[:]\s*[\d.,]+\s+([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổng tiền chịu thuế suất\s*\(Total amount\)\s*[:]\s*\d+%\s+[\d.,]+\s+([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổng cộng\s*\(Total amount\)\s*[:]\s*([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổng\s*cộng\s*\([Tt]otal\)?[:\s]*([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổngcộng[:\s]*([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổng cộng\s*[:]\s*([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)Tổng tiền chịu thuế suất.*[:\s]*[\d.,]*%\s+([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
        r"(?i)[Tt]ổng\s*tiền\s*thanh\s*toán\s*\([^)]+\)[:\s]*([\d.,]+)",
        r"(?i)[IT].{1,3}ng\s*số\s*ti[êề]n\s*thanh\s*toán[:\s]*([\d.,]+)",
        r"(?i)Cộng tiền hàng hóa, dịch vụ[:\s]*[\d.,]+\s+[\d.,]+\s+([\d.,]+)",
        r"(?i)[Tt]ổng\s*cộng\s*tiền\s*thanh\s*toán[^:]*[:\s]*([\d.,]+)",
        r"(?i)[Tt]otal\s*payment[^:]*[:\s]*([\d.,]+)",
        r"(?i)TỔNG CỘNG TIỀN THANH TOÁN[^:]*[:\s]*([\d.,]+)",
        r"(?i)Tổng cộng[:\s]+([\d.,]+)\s+[\d.,]+\s+([\d.,]+)",
        r"(?i)thuế suất:\s*\d+%\s+([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)",
    ])
});

static DIRECT_SALES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Cộng tiền bán hàng hóa, dịch vụ[:\s]*([\d.,]+)").unwrap());
static GOODS_AND_VAT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Cộng tiền hàng hóa, dịch vụ[:\s]*([\d.,]+)\s+([\d.,]+)").unwrap()
});
static SALES_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Cộng tiền bán hàng[^:]*[:\s]*([\d.,]+)").unwrap());

static SUMMARY_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Hàng hóa|Cộng HHDV|Thuế suất|Total amount).*?(10%|8%|5%|0%).*?([\d.,]+)\s+([\d.,]+)(?:\s+([\d.,]+))?").unwrap()
});
static GRAND_TOTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:Tổng cộng tiền|Grand total).*?([\d.,]+)\s+([\d.,]+)\s+([\d.,]+)").unwrap()
});

static TRAVEL_SELLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)HỘ KINH DOANH DỊCH VỤ DU LỊCH [^\n]+").unwrap());

const RATE_VALUES: [&str; 4] = ["10", "8", "5", "0"];

fn last_capture(re: &Regex, text: &str, group: usize) -> Option<String> {
    re.captures_iter(text)
        .last()
        .and_then(|caps| caps.get(group).map(|m| m.as_str().to_string()))
}

/// First pattern with a match wins; its last match is used (grand totals sit on the last page).
fn first_pattern_last_match(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| last_capture(re, text, 1))
}

/// Last non-zero number of a multi-column row such as `Tiền hàng: 0 0 185.185 0 185.185`.
fn last_nonzero_in_row(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let row = caps[1].trim().to_string();
    let numbers: Vec<&str> = ROW_NUMBER.find_iter(&row).map(|m| m.as_str()).collect();
    numbers
        .into_iter()
        .rev()
        .find(|n| parse_money(n).unwrap_or(0) > 0)
        .map(str::to_string)
}

fn any_rate_bucket(draft: &FieldDraft) -> bool {
    TaxRate::ALL.iter().any(|rate| !draft.rate(*rate).is_empty())
}

fn rate_for_ratio(tax: i64, base: i64) -> Option<TaxRate> {
    if tax <= 0 || base <= 0 {
        return None;
    }
    let percent = round_half_even(tax as f64 / base as f64 * 100.0);
    TaxRate::from_percent(percent)
}

fn is_number_list(parts: &[&str]) -> bool {
    parts
        .iter()
        .all(|p| p.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ','))
}

/// Fills every money field of `draft` and may set the travel category.
pub fn extract_amounts(
    draft: &mut FieldDraft,
    text: &str,
    hidden_total: Option<&str>,
    items: &[LineItem],
) {
    labelled_totals(draft, text);
    rate_buckets(draft, text);

    if let Some(caps) = SERVICE_FEE.captures(text) {
        draft.service_fee = caps[1].to_string();
    }

    if !draft.tax_total.is_empty() && !any_rate_bucket(draft) {
        let tax = FieldDraft::money(&draft.tax_total);
        let before = FieldDraft::money(&draft.before_tax);
        if tax != 0 && before > 0 {
            match rate_for_ratio(tax, before) {
                Some(rate) => *draft.rate_mut(rate) = draft.tax_total.clone(),
                None => draft.tax_other = draft.tax_total.clone(),
            }
        }
    }

    sales_invoice(draft, text);
    travel(draft, text);
    after_tax(draft, text);
    arithmetic_fallbacks(draft, hidden_total, items);
    summary_rows(draft, text);
    rate_from_other_column(draft);

    if !items.is_empty() {
        aggregate_item_tax(draft, items);
        discard_oversized_tax(draft);
    }

    if draft.tax_total.is_empty() {
        let sum = draft.bucket_sum();
        if sum > 0 {
            FieldDraft::set_money(&mut draft.tax_total, sum);
            tracing::debug!("Inferred tax total {} from rate buckets", sum);
        }
    }

    if !draft.tax_total.is_empty() && !draft.before_tax.is_empty() && !any_rate_bucket(draft) {
        let tax = FieldDraft::money(&draft.tax_total);
        let before = FieldDraft::money(&draft.before_tax);
        if let Some(rate) = rate_for_ratio(tax, before) {
            *draft.rate_mut(rate) = draft.tax_total.clone();
        }
    }

    clean_other_column(draft);
}

fn labelled_totals(draft: &mut FieldDraft, text: &str) {
    if let Some(value) = first_pattern_last_match(&BEFORE_TAX, text) {
        draft.before_tax = value;
    }
    if draft.before_tax.is_empty() {
        if let Some(value) = last_nonzero_in_row(&GOODS_ROW, text) {
            draft.before_tax = value;
        }
    }
    if let Some(value) = first_pattern_last_match(&VAT_TOTAL, text) {
        draft.tax_total = value;
    }
}

fn rate_buckets(draft: &mut FieldDraft, text: &str) {
    for pattern in MULTI_COLUMN_RATES.iter() {
        if let Some(value) = last_capture(&pattern.regex, text, pattern.group) {
            *draft.rate_mut(pattern.rate) = value;
        }
    }

    if !any_rate_bucket(draft) && draft.tax_other.is_empty() {
        for pattern in SINGLE_VALUE_RATES.iter() {
            if let Some(value) = last_capture(&pattern.regex, text, pattern.group) {
                *draft.rate_mut(pattern.rate) = value;
            }
        }
    }

    if draft.tax_total.is_empty() {
        if let Some(caps) = LOOSE_TAX.captures(text) {
            draft.tax_total = caps[1].to_string();
        }
    }
}

/// Sales invoices (no VAT) print only the payable total.
fn sales_invoice(draft: &mut FieldDraft, text: &str) {
    let upper = text.to_uppercase();
    if !upper.contains("HÓA ĐƠN BÁN HÀNG") && !upper.contains("(SALES INVOICE)") {
        return;
    }
    if draft.after_tax.is_empty() {
        if let Some(caps) = SALES_TOTAL.captures(text) {
            draft.after_tax = caps[1].trim().to_string();
        }
    }
    if !draft.after_tax.is_empty() && draft.before_tax.is_empty() {
        draft.before_tax = draft.after_tax.clone();
    }
}

fn travel(draft: &mut FieldDraft, text: &str) {
    let seller_upper = draft.seller.to_uppercase();
    let text_upper = text.to_uppercase();
    if seller_upper.contains("DU LỊCH")
        || seller_upper.contains("TRAVEL")
        || text_upper.contains("DỊCH VỤ DU LỊCH")
    {
        draft.category = Some(Category::Travel);
    }
    if draft.seller.is_empty() {
        if let Some(m) = TRAVEL_SELLER.find(text) {
            draft.seller = m.as_str().trim().to_string();
        }
    }
}

fn apply_after_tax_match(draft: &mut FieldDraft, caps: &Captures<'_>) {
    let groups: Vec<&str> = caps
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .collect();

    match groups.as_slice() {
        [before, tax, .., after] => {
            draft.after_tax = after.to_string();
            draft.tax_total = tax.to_string();
            draft.before_tax = before.to_string();
        }
        [before, after] => {
            draft.after_tax = after.to_string();
            if draft.before_tax.is_empty() {
                draft.before_tax = before.to_string();
            }
        }
        [value] => {
            let parts: Vec<&str> = value.split_whitespace().collect();
            if parts.len() >= 3 && is_number_list(&parts) {
                // before [discount after_discount] tax total
                draft.after_tax = parts[parts.len() - 1].to_string();
                draft.tax_total = parts[parts.len() - 2].to_string();
                draft.before_tax = parts[0].to_string();
            } else {
                draft.after_tax = value.to_string();
            }
        }
        _ => {}
    }
}

fn after_tax(draft: &mut FieldDraft, text: &str) {
    for re in AFTER_TAX.iter() {
        if let Some(caps) = re.captures_iter(text).last() {
            apply_after_tax_match(draft, &caps);
            break;
        }
    }

    if draft.after_tax.is_empty() {
        if let Some(value) = last_nonzero_in_row(&PAYMENT_ROW, text) {
            draft.after_tax = value;
        }
    }

    if draft.after_tax.is_empty() || draft.before_tax.is_empty() {
        if let Some(caps) = DIRECT_SALES.captures(text) {
            let amount = caps[1].to_string();
            if draft.after_tax.is_empty() {
                draft.after_tax = amount.clone();
            }
            if draft.before_tax.is_empty() {
                draft.before_tax = amount;
            }
        }
    }

    if let Some(caps) = GOODS_AND_VAT_LINE.captures(text) {
        draft.before_tax = caps[1].to_string();
        draft.tax_total = caps[2].to_string();
    }

    if draft.after_tax.is_empty() && !draft.before_tax.is_empty() {
        if text.contains("SALES INVOICE") || text.contains("HÓA ĐƠN BÁN HÀNG") {
            draft.after_tax = draft.before_tax.clone();
        } else if let Some(caps) = SALES_AMOUNT.captures(text) {
            draft.after_tax = caps[1].to_string();
        }
    }
}

fn arithmetic_fallbacks(draft: &mut FieldDraft, hidden_total: Option<&str>, items: &[LineItem]) {
    for field in [&mut draft.before_tax, &mut draft.tax_total, &mut draft.after_tax] {
        if matches!(parse_money(field), Some(value) if value < 1000) {
            field.clear();
        }
    }

    if draft.after_tax.is_empty() {
        let before = parse_money(&draft.before_tax);
        let vat = parse_money(&draft.tax_total);
        match (before, vat) {
            (Some(before), Some(vat)) => FieldDraft::set_money(&mut draft.after_tax, before + vat),
            (Some(_), None) => {
                if draft.tax_other.is_empty() {
                    draft.after_tax = draft.before_tax.clone();
                } else if let Some(other) = parse_money(&draft.tax_other).filter(|v| *v != 0) {
                    if Some(other) == parse_money(&draft.after_tax)
                        || Some(other) == parse_money(&draft.tax_total)
                    {
                        draft.tax_other.clear();
                    }
                }
            }
            _ => {}
        }
    }

    if !draft.after_tax.is_empty() && draft.before_tax.is_empty() {
        if let Some(after) = parse_money(&draft.after_tax) {
            match parse_money(&draft.tax_total) {
                None | Some(0) => draft.before_tax = draft.after_tax.clone(),
                Some(vat) => FieldDraft::set_money(&mut draft.before_tax, after - vat),
            }
        }
    }

    if draft.after_tax.is_empty() {
        if let Some(total) = hidden_total {
            draft.after_tax = total.to_string();
            if draft.before_tax.is_empty() {
                draft.before_tax = total.to_string();
            }
        }
    }

    if (draft.before_tax.is_empty() || draft.after_tax.is_empty()) && !items.is_empty() {
        let items_total: i64 = items
            .iter()
            .filter_map(|item| parse_money(&item.amount))
            .sum();
        if items_total > 0 && draft.before_tax.is_empty() {
            tracing::debug!("Before-tax amount taken from line items: {}", items_total);
            FieldDraft::set_money(&mut draft.before_tax, items_total);
        }
    }

    if !draft.tax_total.is_empty() && draft.after_tax.is_empty() && !draft.before_tax.is_empty() {
        let before = FieldDraft::money(&draft.before_tax);
        let tax = FieldDraft::money(&draft.tax_total);
        if before != 0 && tax != 0 {
            FieldDraft::set_money(&mut draft.after_tax, before + tax);
        }
    }
}

/// Per-rate summary rows and the grand total row, trusted over labelled values.
fn summary_rows(draft: &mut FieldDraft, text: &str) {
    let mut tax_sum = 0;
    for caps in SUMMARY_LINE.captures_iter(text) {
        let values: Option<Vec<i64>> = (2..=4)
            .filter_map(|i| caps.get(i))
            .map(|m| parse_money(m.as_str()))
            .collect();
        let Some(mut values) = values else {
            continue;
        };
        if values.len() < 2 {
            continue;
        }
        values.sort_unstable();
        let tax = values[0];
        let Some(rate) = caps[1]
            .trim_end_matches('%')
            .parse::<i64>()
            .ok()
            .and_then(TaxRate::from_percent)
        else {
            continue;
        };
        FieldDraft::set_money(draft.rate_mut(rate), tax);
        tax_sum += tax;
    }
    if tax_sum > 0
        && (draft.tax_total.is_empty() || parse_money(&draft.tax_total) != Some(tax_sum))
    {
        FieldDraft::set_money(&mut draft.tax_total, tax_sum);
    }

    if let Some(caps) = GRAND_TOTAL.captures(text) {
        let values: Option<Vec<i64>> = (1..=3).map(|i| parse_money(&caps[i])).collect();
        if let Some(mut values) = values {
            values.sort_unstable();
            FieldDraft::set_money(&mut draft.tax_total, values[0]);
            FieldDraft::set_money(&mut draft.before_tax, values[1]);
            FieldDraft::set_money(&mut draft.after_tax, values[2]);
            tracing::debug!("Grand total row: total={}, tax={}", values[2], values[0]);
        }
    }
}

/// "Thuế khác" holding a bare rate such as `10` moves into its bucket.
fn rate_from_other_column(draft: &mut FieldDraft) {
    if !RATE_VALUES.contains(&draft.tax_other.as_str()) {
        return;
    }
    let Some(rate) = draft
        .tax_other
        .parse::<i64>()
        .ok()
        .and_then(TaxRate::from_percent)
    else {
        return;
    };
    if !draft.rate(rate).is_empty() {
        return;
    }

    if !draft.tax_total.is_empty() {
        *draft.rate_mut(rate) = draft.tax_total.clone();
        draft.tax_other.clear();
    } else if !draft.before_tax.is_empty() {
        let pre = FieldDraft::money(&draft.before_tax);
        if pre == 0 {
            return;
        }
        let tax = round_half_even(pre as f64 * rate.percent() as f64 / 100.0);
        FieldDraft::set_money(draft.rate_mut(rate), tax);
        if draft.tax_total.is_empty() {
            FieldDraft::set_money(&mut draft.tax_total, tax);
        }
        let total = FieldDraft::money(&draft.after_tax);
        if draft.after_tax.is_empty() || (total != 0 && (total - pre).abs() < 100) {
            FieldDraft::set_money(&mut draft.after_tax, pre + tax);
        }
        draft.tax_other.clear();
    }
}

/// Tax estimated from line items carrying an explicit rate.
fn aggregate_item_tax(draft: &mut FieldDraft, items: &[LineItem]) {
    let mut per_rate = [0i64; 4];
    let mut found = false;
    for item in items {
        let (Some(rate), Some(amount)) = (item.tax_rate, parse_money(&item.amount)) else {
            continue;
        };
        let idx = TaxRate::ALL.iter().position(|r| *r == rate).unwrap_or(0);
        per_rate[idx] += round_half_even(amount as f64 * rate.percent() as f64 / 100.0);
        found = true;
    }
    if !found {
        return;
    }

    for (rate, estimate) in TaxRate::ALL.iter().zip(per_rate) {
        if estimate <= 0 {
            continue;
        }
        let current = FieldDraft::money(draft.rate(*rate));
        if current == 0 || (current - estimate).abs() as f64 > estimate as f64 * 0.5 {
            FieldDraft::set_money(draft.rate_mut(*rate), estimate);
        }
    }

    let item_total: i64 = per_rate.iter().sum();
    let current = FieldDraft::money(&draft.tax_total);
    if current == 0 || (item_total > current && item_total > 1000) {
        FieldDraft::set_money(&mut draft.tax_total, item_total);
        tracing::debug!("Tax total aggregated from line items: {}", item_total);
    }
}

/// A tax amount at least as large as the amount it is levied on is a misread.
fn discard_oversized_tax(draft: &mut FieldDraft) {
    if draft.tax_total.is_empty() || (draft.before_tax.is_empty() && draft.after_tax.is_empty()) {
        return;
    }
    let tax = FieldDraft::money(&draft.tax_total);
    let mut base = FieldDraft::money(&draft.before_tax);
    if base == 0 {
        base = FieldDraft::money(&draft.after_tax);
    }
    if tax != 0 && base > 10_000 && tax >= base {
        tracing::warn!("⚠️ Discarding tax amount {} larger than {}", draft.tax_total, base);
        draft.tax_total.clear();
        for rate in TaxRate::ALL {
            if FieldDraft::money(draft.rate(rate)) == tax {
                draft.rate_mut(rate).clear();
            }
        }
        if FieldDraft::money(&draft.tax_other) == tax {
            draft.tax_other.clear();
        }
    }
}

fn clean_other_column(draft: &mut FieldDraft) {
    draft.tax_other = clean_string_value(&draft.tax_other);
    if draft.tax_other.is_empty() {
        return;
    }
    if RATE_VALUES.contains(&draft.tax_other.as_str()) {
        let filled = draft
            .tax_other
            .parse::<i64>()
            .ok()
            .and_then(TaxRate::from_percent)
            .is_some_and(|rate| !draft.rate(rate).is_empty());
        if filled {
            draft.tax_other.clear();
            return;
        }
    }
    let other = FieldDraft::money(&draft.tax_other);
    if other != 0
        && (other == FieldDraft::money(&draft.after_tax) || other == FieldDraft::money(&draft.tax_total))
    {
        draft.tax_other.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> FieldDraft {
        let mut draft = FieldDraft::default();
        extract_amounts(&mut draft, text, None, &[]);
        draft
    }

    #[test]
    fn test_labelled_totals() {
        let draft = run(
            "Cộng tiền hàng / Total charges: 6.615.000\nTiền thuế GTGT / VAT: 529.200\nTổng cộng / Total Amount: 7.144.200",
        );
        assert_eq!(draft.before_tax, "6.615.000");
        assert_eq!(draft.tax_total, "529.200");
        assert_eq!(draft.after_tax, "7.144.200");
        assert_eq!(draft.tax_8, "529.200");
    }

    #[test]
    fn test_three_column_total_row() {
        let draft = run("Tổng cộng(Total): 375.000 30.000 405.000");
        assert_eq!(draft.before_tax, "375.000");
        assert_eq!(draft.tax_total, "30.000");
        assert_eq!(draft.after_tax, "405.000");
        assert_eq!(draft.tax_8, "30.000");
    }

    #[test]
    fn test_multi_column_rate_row() {
        let draft = run("Thuế suất 8%(VAT rate 8%): 995,000 79,600 1,074,600");
        assert_eq!(draft.tax_8, "79.600");
        assert_eq!(draft.tax_total, "79.600");
    }

    #[test]
    fn test_payment_row_takes_last_nonzero() {
        let draft = run("Tiền thanh toán: 0 0 0 0 200.000 0 200.000");
        assert_eq!(draft.after_tax, "200.000");
        assert_eq!(draft.before_tax, "200.000");
    }

    #[test]
    fn test_sales_invoice_without_vat() {
        let draft = run("HÓA ĐƠN BÁN HÀNG\nCộng tiền bán hàng hóa, dịch vụ: 2.289.962");
        assert_eq!(draft.after_tax, "2.289.962");
        assert_eq!(draft.before_tax, "2.289.962");
        assert!(draft.tax_total.is_empty());
    }

    #[test]
    fn test_small_values_cleared() {
        let draft = run("Tổng tiền chưa thuế: 500");
        assert!(draft.before_tax.is_empty());
        assert!(draft.after_tax.is_empty());
    }

    #[test]
    fn test_hidden_total_used_last() {
        let mut draft = FieldDraft::default();
        extract_amounts(&mut draft, "không có tổng", Some("2,950,000"), &[]);
        assert_eq!(draft.after_tax, "2,950,000");
        assert_eq!(draft.before_tax, "2,950,000");
    }

    #[test]
    fn test_rate_in_other_column_rounds_half_to_even() {
        let mut draft = FieldDraft {
            before_tax: "250.050".into(),
            tax_other: "5".into(),
            ..FieldDraft::default()
        };
        rate_from_other_column(&mut draft);
        assert_eq!(draft.tax_5, "12.502");
        assert_eq!(draft.tax_total, "12.502");
        assert_eq!(draft.after_tax, "262.552");
        assert!(draft.tax_other.is_empty());
    }

    #[test]
    fn test_item_tax_aggregation() {
        let items = vec![
            LineItem {
                name: "Phở bò".into(),
                quantity: "2".into(),
                unit_price: "50,000".into(),
                amount: "100,000".into(),
                tax_rate: Some(TaxRate::Eight),
            },
            LineItem {
                name: "Bia".into(),
                quantity: "1".into(),
                unit_price: "200,000".into(),
                amount: "200,000".into(),
                tax_rate: Some(TaxRate::Ten),
            },
        ];
        let mut draft = FieldDraft::default();
        extract_amounts(&mut draft, "Cộng tiền hàng: 300.000", None, &items);
        assert_eq!(draft.tax_8, "8.000");
        assert_eq!(draft.tax_10, "20.000");
        assert_eq!(draft.tax_total, "28.000");
        assert_eq!(draft.before_tax, "300.000");
    }

    #[test]
    fn test_travel_category() {
        let mut draft = FieldDraft {
            seller: "CÔNG TY TNHH DU LỊCH SAO VIỆT".into(),
            ..FieldDraft::default()
        };
        extract_amounts(&mut draft, "Tổng cộng tiền thanh toán: 1.000.000", None, &[]);
        assert_eq!(draft.category, Some(Category::Travel));
        assert_eq!(draft.after_tax, "1.000.000");
    }
}
