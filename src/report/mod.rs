//! Report layouts and the writers that turn them into files.
//!
//! The summary layout is one row per invoice. The business layout prefixes it
//! with the team and employee. The accounting layout is long: one row per tax
//! rate present on the invoice.

pub mod csv_export;
pub mod json_export;
pub mod summary;
pub mod xlsx;

use crate::domain::{Cell, ExtractedInvoice, Invoice, Report, ReportKind, TaxRate};

pub const SUMMARY_HEADERS: [&str; 18] = [
    "Tên file",
    "Ngày hóa đơn",
    "Số hóa đơn",
    "Đơn vị bán",
    "Phân loại",
    "Số tiền trước Thuế",
    "Thuế 0%",
    "Thuế 5%",
    "Thuế 8%",
    "Thuế 10%",
    "Thuế khác",
    "Tiền thuế",
    "Số tiền sau",
    "Link lấy hóa đơn",
    "Mã tra cứu",
    "Mã số thuế",
    "Mã CQT",
    "Ký hiệu",
];

pub const ACCOUNTING_HEADERS: [&str; 14] = [
    "Team",
    "Số hóa đơn",
    "Ngày hóa đơn",
    "Mã số thuế bên bán",
    "Số ký hiệu",
    "Mã tra cứu",
    "Link tra cứu",
    "Phân loại",
    "Số tiền trước VAT",
    "VAT",
    "Thuế suất",
    "Tổng tiền sau thuế",
    "Tên nhân viên",
    "Tên file",
];

/// Who the rows are filed under in the accounting and business layouts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submitter {
    pub team: String,
    pub employee: String,
}

impl Submitter {
    pub fn new(team: &str, employee: &str) -> Self {
        Self {
            team: team.trim().to_string(),
            employee: employee.trim().to_string(),
        }
    }
}

pub fn headers(kind: ReportKind) -> Vec<&'static str> {
    match kind {
        ReportKind::Summary => SUMMARY_HEADERS.to_vec(),
        ReportKind::Business => {
            let mut headers = vec!["Team", "Tên nhân viên"];
            headers.extend(SUMMARY_HEADERS);
            headers
        }
        ReportKind::Accounting => ACCOUNTING_HEADERS.to_vec(),
    }
}

pub fn build_report(kind: ReportKind, invoices: &[ExtractedInvoice], submitter: &Submitter) -> Report {
    let rows = match kind {
        ReportKind::Summary => invoices
            .iter()
            .map(|extracted| summary_row(&extracted.invoice, false))
            .collect(),
        ReportKind::Business => invoices
            .iter()
            .map(|extracted| {
                let mut row = vec![Cell::text(&submitter.team), Cell::text(&submitter.employee)];
                row.extend(summary_row(&extracted.invoice, true));
                row
            })
            .collect(),
        ReportKind::Accounting => invoices
            .iter()
            .flat_map(|extracted| accounting_rows(&extracted.invoice, submitter))
            .collect(),
    };

    Report {
        kind,
        headers: headers(kind),
        rows,
    }
}

/// The lookup link, or the lookup code when the invoice has no link.
fn link_or_code(invoice: &Invoice) -> &str {
    if invoice.lookup_link.is_empty() {
        &invoice.lookup_code
    } else {
        &invoice.lookup_link
    }
}

fn summary_row(invoice: &Invoice, link_fallback: bool) -> Vec<Cell> {
    let amounts = &invoice.amounts;
    let link = if link_fallback {
        link_or_code(invoice)
    } else {
        &invoice.lookup_link
    };

    let mut row = vec![
        Cell::text(&invoice.file_name),
        Cell::text(&invoice.date),
        Cell::text(&invoice.number),
        Cell::text(&invoice.seller),
        Cell::text(invoice.category_label()),
        Cell::money(amounts.before_tax),
    ];
    row.extend(TaxRate::ALL.into_iter().map(|rate| Cell::money(amounts.by_rate(rate))));
    row.extend([
        Cell::money(amounts.tax_other),
        Cell::money(amounts.tax_total),
        Cell::money(amounts.after_tax),
        Cell::text(link),
        Cell::text(&invoice.lookup_code),
        Cell::text(&invoice.seller_tax_code),
        Cell::text(&invoice.authority_code),
        Cell::text(&invoice.serial),
    ]);
    row
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateColumn {
    Rate(TaxRate),
    Other,
    Unknown,
}

/// `vat / rate`, rounded half to even.
pub fn before_tax_from_vat(vat: i64, rate: TaxRate) -> Option<i64> {
    let percent = rate.percent() as i64;
    if vat == 0 || percent == 0 {
        return None;
    }
    let numerator = vat * 100;
    let (quotient, remainder) = (numerator / percent, numerator % percent);
    let rounded = match (2 * remainder).cmp(&percent) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient % 2,
        std::cmp::Ordering::Less => quotient,
    };
    Some(rounded)
}

struct AccountingRow<'a> {
    invoice: &'a Invoice,
    submitter: &'a Submitter,
    before_tax: Option<i64>,
    vat: Option<i64>,
    rate_label: String,
    after_tax: Option<i64>,
}

impl AccountingRow<'_> {
    fn into_cells(self) -> Vec<Cell> {
        let invoice = self.invoice;
        vec![
            Cell::text(&self.submitter.team),
            Cell::text(&invoice.number),
            Cell::text(&invoice.date),
            Cell::text(&invoice.seller_tax_code),
            Cell::text(&invoice.serial),
            Cell::text(&invoice.lookup_code),
            Cell::text(link_or_code(invoice)),
            Cell::text(invoice.category_label()),
            Cell::money(self.before_tax),
            Cell::money(self.vat),
            Cell::text(&self.rate_label),
            Cell::money(self.after_tax),
            Cell::text(&self.submitter.employee),
            Cell::text(&invoice.file_name),
        ]
    }
}

fn accounting_rows(invoice: &Invoice, submitter: &Submitter) -> Vec<Vec<Cell>> {
    let amounts = &invoice.amounts;
    let mut columns: Vec<RateColumn> = amounts
        .rates_present()
        .into_iter()
        .map(RateColumn::Rate)
        .collect();
    if amounts.tax_other.is_some() {
        columns.push(RateColumn::Other);
    }
    if columns.is_empty() {
        columns.push(RateColumn::Unknown);
    }

    let base = |vat: Option<i64>, rate_label: String| AccountingRow {
        invoice,
        submitter,
        before_tax: amounts.before_tax,
        vat,
        rate_label,
        after_tax: amounts.after_tax,
    };

    if let [column] = columns.as_slice() {
        let row = match *column {
            RateColumn::Unknown => base(amounts.tax_total, String::new()),
            RateColumn::Other => base(amounts.tax_total, "Khác".to_string()),
            RateColumn::Rate(rate) => {
                let vat = amounts.by_rate(rate).or(amounts.tax_total);
                let mut row = base(vat, rate.to_string());
                // Extracted amounts are kept; only a missing base is derived from the VAT.
                if row.before_tax.is_none() {
                    if let Some(before) = vat.and_then(|vat| before_tax_from_vat(vat, rate)) {
                        row.before_tax = Some(before);
                        row.after_tax = vat.map(|vat| before + vat);
                    }
                }
                row
            }
        };
        return vec![row.into_cells()];
    }

    columns
        .into_iter()
        .map(|column| match column {
            RateColumn::Other => base(amounts.tax_other, "Khác".to_string()),
            RateColumn::Rate(rate) => {
                let vat = amounts.by_rate(rate);
                let mut row = base(vat, rate.to_string());
                if let Some(before) = vat.and_then(|vat| before_tax_from_vat(vat, rate)) {
                    row.before_tax = Some(before);
                    row.after_tax = vat.map(|vat| before + vat);
                }
                row
            }
            RateColumn::Unknown => base(amounts.tax_total, String::new()),
        })
        .map(AccountingRow::into_cells)
        .collect()
}
