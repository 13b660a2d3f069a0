use crate::domain::{Invoice, Issue};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static STANDARD_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap());
static TAX_CODE_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\d\-]{10,14}$").unwrap());

/// `1234567` → `1,234,567`, the grouping used in issue messages.
fn with_commas(value: i64) -> String {
    crate::parse::money::format_price_value(&value.to_string())
}

/// `dd/mm/yyyy` that names a real calendar day.
fn is_standard_date(date: &str) -> bool {
    if !STANDARD_DATE.is_match(date) {
        return false;
    }
    let mut parts = date.split('/').map(|p| p.parse::<u32>().ok());
    match (parts.next().flatten(), parts.next().flatten(), parts.next().flatten()) {
        (Some(day), Some(month), Some(year)) => {
            NaiveDate::from_ymd_opt(year as i32, month, day).is_some()
        }
        _ => false,
    }
}

/// Missing critical fields are errors; suspicious values are warnings.
pub fn validate_invoice(invoice: &Invoice) -> Vec<Issue> {
    let mut issues = Vec::new();

    let seller = invoice.seller.trim();
    if seller.chars().count() < 5 {
        issues.push(Issue::error("Đơn vị bán", "Thiếu hoặc quá ngắn"));
    }

    if invoice.number.trim().is_empty() {
        issues.push(Issue::error("Số hóa đơn", "Thiếu số hóa đơn"));
    }

    let date = invoice.date.trim();
    if date.is_empty() {
        issues.push(Issue::error("Ngày hóa đơn", "Thiếu ngày hóa đơn"));
    } else if !is_standard_date(date) {
        issues.push(Issue::warning(
            "Ngày hóa đơn",
            format!("Định dạng ngày không chuẩn: {}", date),
        ));
    }

    let before_tax = invoice.amounts.before_tax.unwrap_or(0);
    if before_tax == 0 {
        issues.push(Issue::error("Số tiền trước Thuế", "Số tiền trước thuế = 0 hoặc trống"));
    }
    let after_tax = invoice.amounts.after_tax.unwrap_or(0);
    if after_tax == 0 {
        issues.push(Issue::error("Số tiền sau", "Số tiền sau thuế = 0 hoặc trống"));
    }

    let tax_code = invoice.seller_tax_code.trim();
    if tax_code.is_empty() {
        issues.push(Issue::warning("Mã số thuế", "Thiếu mã số thuế"));
    } else if !TAX_CODE_SHAPE.is_match(tax_code) {
        issues.push(Issue::warning(
            "Mã số thuế",
            format!("MST không hợp lệ ({} ký tự)", tax_code.chars().count()),
        ));
    }

    let link = invoice.lookup_link.trim();
    if link.is_empty() {
        issues.push(Issue::warning("Link lấy hóa đơn", "Thiếu link tra cứu"));
    } else if Url::parse(link).map(|url| url.host().is_none()).unwrap_or(true) {
        issues.push(Issue::warning(
            "Link lấy hóa đơn",
            format!("Link tra cứu không hợp lệ: {}", link),
        ));
    }
    if invoice.lookup_code.trim().is_empty() {
        issues.push(Issue::warning("Mã tra cứu", "Thiếu mã tra cứu"));
    }
    if invoice.serial.trim().is_empty() {
        issues.push(Issue::warning("Ký hiệu", "Thiếu ký hiệu"));
    }

    if before_tax > 0 && after_tax > 0 && after_tax < before_tax {
        issues.push(Issue::warning(
            "Số tiền sau",
            format!(
                "Số tiền sau ({}) < trước thuế ({})",
                with_commas(after_tax),
                with_commas(before_tax)
            ),
        ));
    }

    issues
}
