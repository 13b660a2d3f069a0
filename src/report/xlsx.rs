//! Styled workbook output with umya-spreadsheet.

use crate::domain::{Cell, Report, ReportKind};
use crate::utils::error::{EtlError, Result};
use std::io::Cursor;
use std::path::Path;
use umya_spreadsheet::structs::{
    Border, HorizontalAlignmentValues, PatternValues, Style, VerticalAlignmentValues,
};
use umya_spreadsheet::Spreadsheet;

pub const SHEET_NAME: &str = "Hóa đơn";

const HEADER_FILL: &str = "FF4F81BD";
const HEADER_FONT_COLOR: &str = "FFFFFFFF";
const BORDER_COLOR: &str = "FF000000";
const MONEY_FORMAT: &str = "#,##0";

const SUMMARY_WIDTHS: [f64; 18] = [
    30.0, 12.0, 15.0, 40.0, 18.0, 18.0, 12.0, 12.0, 12.0, 12.0, 12.0, 12.0, 15.0, 18.0, 15.0,
    20.0, 15.0, 15.0,
];
const BUSINESS_WIDTHS: [f64; 20] = [
    15.0, 20.0, 30.0, 12.0, 10.0, 25.0, 15.0, 15.0, 12.0, 12.0, 12.0, 12.0, 10.0, 15.0, 15.0,
    30.0, 15.0, 15.0, 20.0, 10.0,
];
const ACCOUNTING_WIDTHS: [f64; 14] = [
    15.0, 15.0, 12.0, 15.0, 15.0, 20.0, 30.0, 18.0, 15.0, 12.0, 10.0, 15.0, 18.0, 35.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnStyle {
    Money,
    Center,
    Wrap,
}

fn column_widths(kind: ReportKind) -> &'static [f64] {
    match kind {
        ReportKind::Summary => &SUMMARY_WIDTHS,
        ReportKind::Business => &BUSINESS_WIDTHS,
        ReportKind::Accounting => &ACCOUNTING_WIDTHS,
    }
}

/// Body style of a zero-based column.
fn column_style(kind: ReportKind, headers: &[&str], index: usize) -> ColumnStyle {
    match kind {
        ReportKind::Summary => match index {
            5..=12 => ColumnStyle::Money,
            1 | 2 | 4 | 15 | 17 => ColumnStyle::Center,
            _ => ColumnStyle::Wrap,
        },
        ReportKind::Business => {
            let header = headers.get(index).copied().unwrap_or_default();
            let is_money = header.starts_with("Thuế ")
                || matches!(header, "Số tiền trước Thuế" | "Tiền thuế" | "Số tiền sau");
            if is_money {
                ColumnStyle::Money
            } else {
                ColumnStyle::Wrap
            }
        }
        ReportKind::Accounting => match index {
            8 | 9 | 11 => ColumnStyle::Money,
            0..=4 | 10 => ColumnStyle::Center,
            _ => ColumnStyle::Wrap,
        },
    }
}

/// `1` → `A`, `27` → `AA`.
pub fn column_letter(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = ((index - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Sheet rows (1-based, header on row 1) spanned by runs of equal Team values.
/// Only runs longer than one row are returned.
pub fn team_merge_ranges(report: &Report) -> Vec<(u32, u32)> {
    let Some(team_col) = report.column_index("Team") else {
        return Vec::new();
    };
    let mut ranges = Vec::new();
    let mut start = 0usize;
    for i in 1..=report.rows.len() {
        let team = |row: usize| report.rows[row].get(team_col);
        let same = i < report.rows.len() && team(i) == team(start);
        if !same {
            if i - 1 > start {
                ranges.push((start as u32 + 2, i as u32 + 1));
            }
            start = i;
        }
    }
    ranges
}

fn thin(border: &mut Border) {
    border.set_border_style(Border::BORDER_THIN);
    border.get_color_mut().set_argb(BORDER_COLOR);
}

fn apply_borders(style: &mut Style) {
    let borders = style.get_borders_mut();
    thin(borders.get_left_border_mut());
    thin(borders.get_right_border_mut());
    thin(borders.get_top_border_mut());
    thin(borders.get_bottom_border_mut());
}

fn style_header(style: &mut Style) {
    let font = style.get_font_mut();
    font.set_name("Arial");
    font.set_size(11.0);
    font.set_bold(true);
    font.get_color_mut().set_argb(HEADER_FONT_COLOR);

    let fill = style.get_fill_mut().get_pattern_fill_mut();
    fill.set_pattern_type(PatternValues::Solid);
    fill.get_foreground_color_mut().set_argb(HEADER_FILL);

    let alignment = style.get_alignment_mut();
    alignment.set_horizontal(HorizontalAlignmentValues::Center);
    alignment.set_vertical(VerticalAlignmentValues::Center);
    alignment.set_wrap_text(true);
    apply_borders(style);
}

fn style_body(style: &mut Style, column: ColumnStyle) {
    let font = style.get_font_mut();
    font.set_name("Arial");
    font.set_size(10.0);
    apply_borders(style);

    let alignment = style.get_alignment_mut();
    alignment.set_vertical(VerticalAlignmentValues::Center);
    match column {
        ColumnStyle::Money => {
            alignment.set_horizontal(HorizontalAlignmentValues::Right);
            style.get_number_format_mut().set_format_code(MONEY_FORMAT);
        }
        ColumnStyle::Center => alignment.set_horizontal(HorizontalAlignmentValues::Center),
        ColumnStyle::Wrap => alignment.set_wrap_text(true),
    }
}

/// Builds the workbook: one sheet with styled header, body, widths and an auto filter.
pub fn build_workbook(report: &Report) -> Result<Spreadsheet> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .ok_or_else(|| EtlError::SpreadsheetError {
            message: "new workbook has no default sheet".to_string(),
        })?;
    sheet.set_name(SHEET_NAME);

    for (col, header) in report.headers.iter().enumerate() {
        let coordinate = (col as u32 + 1, 1u32);
        sheet.get_cell_mut(coordinate).set_value(*header);
        style_header(sheet.get_style_mut(coordinate));
    }

    for (row_index, row) in report.rows.iter().enumerate() {
        let excel_row = row_index as u32 + 2;
        for (col, cell) in row.iter().enumerate() {
            let coordinate = (col as u32 + 1, excel_row);
            match cell {
                Cell::Text(text) => {
                    sheet.get_cell_mut(coordinate).set_value(text.as_str());
                }
                Cell::Money(amount) => {
                    sheet.get_cell_mut(coordinate).set_value_number(*amount as f64);
                }
                Cell::Empty => {}
            }
            style_body(
                sheet.get_style_mut(coordinate),
                column_style(report.kind, &report.headers, col),
            );
        }
    }

    for (col, width) in column_widths(report.kind)
        .iter()
        .take(report.headers.len())
        .enumerate()
    {
        sheet
            .get_column_dimension_mut(&column_letter(col as u32 + 1))
            .set_width(*width);
    }

    if report.kind == ReportKind::Accounting {
        for (start, end) in team_merge_ranges(report) {
            sheet.add_merge_cells(format!("A{}:A{}", start, end));
            let alignment = sheet.get_style_mut((1u32, start)).get_alignment_mut();
            alignment.set_horizontal(HorizontalAlignmentValues::Center);
            alignment.set_vertical(VerticalAlignmentValues::Center);
            alignment.set_wrap_text(true);
        }
    }

    if !report.headers.is_empty() {
        let last_col = column_letter(report.headers.len() as u32);
        let last_row = report.rows.len() + 1;
        sheet.set_auto_filter(format!("A1:{}{}", last_col, last_row));
    }

    Ok(book)
}

/// Serialized `.xlsx` bytes of the report.
pub fn to_bytes(report: &Report) -> Result<Vec<u8>> {
    let book = build_workbook(report)?;
    let mut cursor = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// `out/hoadon_tonghop.xlsx` → `out/hoadon_tonghop_new.xlsx`, used when the target is locked.
pub fn fallback_path(path: &str) -> String {
    let original = Path::new(path);
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("hoadon_tonghop");
    original
        .with_file_name(format!("{}_new.xlsx", stem))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Amounts, ExtractedInvoice, Invoice, TextSource};
    use crate::report::{build_report, Submitter};
    use tempfile::TempDir;

    fn extracted(file_name: &str) -> ExtractedInvoice {
        ExtractedInvoice {
            invoice: Invoice {
                file_name: file_name.to_string(),
                number: "0000123".into(),
                seller: "CÔNG TY TNHH ABC".into(),
                amounts: Amounts {
                    before_tax: Some(1_000_000),
                    tax_5: Some(20_000),
                    tax_10: Some(60_000),
                    tax_total: Some(80_000),
                    after_tax: Some(1_080_000),
                    ..Amounts::default()
                },
                ..Invoice::default()
            },
            items: Vec::new(),
            issues: Vec::new(),
            source: TextSource::Embedded,
        }
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(18), "R");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn test_team_merge_ranges() {
        let invoices = vec![extracted("a.pdf"), extracted("b.pdf")];
        let report = build_report(ReportKind::Accounting, &invoices, &Submitter::new("Team A", "E"));
        // Two invoices with two rates each: rows 2..=5 share the team.
        assert_eq!(team_merge_ranges(&report), vec![(2, 5)]);

        let single = build_report(ReportKind::Summary, &invoices, &Submitter::default());
        assert!(team_merge_ranges(&single).is_empty());
    }

    #[test]
    fn test_column_styles() {
        let headers = crate::report::headers(ReportKind::Business);
        assert_eq!(column_style(ReportKind::Business, &headers, 7), ColumnStyle::Money);
        assert_eq!(column_style(ReportKind::Business, &headers, 15), ColumnStyle::Wrap);
        assert_eq!(column_style(ReportKind::Summary, &[], 17), ColumnStyle::Center);
        assert_eq!(column_style(ReportKind::Accounting, &[], 9), ColumnStyle::Money);
    }

    #[test]
    fn test_fallback_path() {
        assert_eq!(
            fallback_path("out/hoadon_tonghop.xlsx"),
            Path::new("out").join("hoadon_tonghop_new.xlsx").to_string_lossy()
        );
    }

    #[test]
    fn test_workbook_round_trip() {
        let invoices = vec![extracted("a.pdf"), extracted("b.pdf")];
        let report = build_report(ReportKind::Accounting, &invoices, &Submitter::new("Team A", "E"));
        let bytes = to_bytes(&report).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hoadon_tonghop.xlsx");
        std::fs::write(&path, bytes).unwrap();

        let book = umya_spreadsheet::reader::xlsx::read(&path).unwrap();
        let sheet = book.get_sheet_by_name(SHEET_NAME).unwrap();
        assert_eq!(sheet.get_value("A1"), "Team");
        assert_eq!(sheet.get_value("K2"), "5%");
        assert_eq!(sheet.get_value("J3"), "60000");
        assert_eq!(sheet.get_value("N5"), "b.pdf");
        assert_eq!(sheet.get_merge_cells().len(), 1);
    }
}
