use crate::domain::{Cell, ExtractedInvoice, Report, TextSource};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use tracing::info;

/// Columns whose fill rate is reported after a run.
pub const KEY_COLUMNS: [&str; 5] = [
    "Ngày hóa đơn",
    "Số hóa đơn",
    "Đơn vị bán",
    "Phân loại",
    "Số tiền sau",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FillRate {
    pub column: String,
    pub filled: usize,
    pub percent: f64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generated_at: DateTime<Local>,
    pub rows: usize,
    pub invoices: usize,
    pub fill_rates: Vec<FillRate>,
    pub errors: usize,
    pub warnings: usize,
    pub unrecognized: usize,
}

impl RunSummary {
    pub fn from_report(report: &Report, invoices: &[ExtractedInvoice]) -> Self {
        let rows = report.rows.len();
        let files: HashSet<&str> = invoices
            .iter()
            .map(|e| e.invoice.file_name.as_str())
            .collect();

        let fill_rates = KEY_COLUMNS
            .iter()
            .filter_map(|column| {
                let index = report.column_index(column)?;
                let filled = report
                    .rows
                    .iter()
                    .filter(|row| row.get(index).is_some_and(|cell| !is_blank(cell)))
                    .count();
                let percent = if rows == 0 {
                    0.0
                } else {
                    filled as f64 * 100.0 / rows as f64
                };
                Some(FillRate {
                    column: column.to_string(),
                    filled,
                    percent,
                })
            })
            .collect();

        Self {
            generated_at: Local::now(),
            rows,
            invoices: files.len(),
            fill_rates,
            errors: invoices.iter().map(ExtractedInvoice::error_count).sum(),
            warnings: invoices.iter().map(ExtractedInvoice::warning_count).sum(),
            unrecognized: invoices
                .iter()
                .filter(|e| e.source == TextSource::None)
                .count(),
        }
    }

    pub fn log(&self) {
        info!("📊 Run summary ({})", self.generated_at.format("%d/%m/%Y %H:%M:%S"));
        info!("   Total rows: {} (from {} invoices)", self.rows, self.invoices);
        for rate in &self.fill_rates {
            info!(
                "   {}: {:.0}% filled ({}/{})",
                rate.column, rate.percent, rate.filled, self.rows
            );
        }
        if self.unrecognized > 0 {
            info!("   ❓ Unrecognized files: {}", self.unrecognized);
        }
        info!("   Issues: {} error(s), {} warning(s)", self.errors, self.warnings);
    }
}

/// Empty cells and cells holding the unrecognized marker do not count as filled.
fn is_blank(cell: &Cell) -> bool {
    match cell {
        Cell::Text(text) => text.trim().is_empty() || text == crate::domain::UNRECOGNIZED,
        other => other.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amounts, Invoice, Issue, ReportKind};
    use crate::report::{build_report, Submitter};

    fn extracted(number: &str, after_tax: Option<i64>, source: TextSource) -> ExtractedInvoice {
        ExtractedInvoice {
            invoice: Invoice {
                file_name: format!("{}.pdf", number),
                number: number.to_string(),
                date: "01/02/2026".into(),
                amounts: Amounts {
                    after_tax,
                    ..Amounts::default()
                },
                ..Invoice::default()
            },
            items: Vec::new(),
            issues: vec![
                Issue::error("Đơn vị bán", "Thiếu hoặc quá ngắn"),
                Issue::warning("Ký hiệu", "Thiếu ký hiệu"),
            ],
            source,
        }
    }

    #[test]
    fn test_fill_rates_and_counts() {
        let invoices = vec![
            extracted("0001", Some(100_000), TextSource::Embedded),
            extracted("0002", None, TextSource::None),
        ];
        let report = build_report(ReportKind::Summary, &invoices, &Submitter::default());
        let summary = RunSummary::from_report(&report, &invoices);

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.invoices, 2);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.warnings, 2);
        assert_eq!(summary.unrecognized, 1);

        let after = summary
            .fill_rates
            .iter()
            .find(|r| r.column == "Số tiền sau")
            .unwrap();
        assert_eq!(after.filled, 1);
        assert!((after.percent - 50.0).abs() < f64::EPSILON);
        let seller = summary
            .fill_rates
            .iter()
            .find(|r| r.column == "Đơn vị bán")
            .unwrap();
        assert_eq!(seller.filled, 0);
    }

    #[test]
    fn test_accounting_layout_skips_missing_columns() {
        let invoices = vec![extracted("0001", Some(100_000), TextSource::Embedded)];
        let report = build_report(ReportKind::Accounting, &invoices, &Submitter::new("T", "E"));
        let summary = RunSummary::from_report(&report, &invoices);
        let columns: Vec<&str> = summary.fill_rates.iter().map(|r| r.column.as_str()).collect();
        assert_eq!(columns, vec!["Ngày hóa đơn", "Số hóa đơn", "Phân loại"]);
    }
}
