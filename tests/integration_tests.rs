#![cfg(feature = "cli")]

use clap::Parser;
use invoice_etl::extract::tools::ToolPaths;
use invoice_etl::{
    CliConfig, EtlEngine, EtlError, ExtractorSettings, InvoicePipeline, LocalStorage,
    PdfTextExtractor, TomlConfig,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const INVOICE_TEXT: &str = "\
HÓA ĐƠN GIÁ TRỊ GIA TĂNG
Ký hiệu (Serial): 1C26TKM
Số (No.): 00001234
Ngày 05 tháng 01 năm 2026
Đơn vị bán hàng (Seller): CÔNG TY TNHH NHÀ HÀNG HOA SEN
Mã số thuế (Tax code): 0312345678
Địa chỉ: 12 Lê Lợi, Quận 1
STT Tên hàng hóa, dịch vụ Đơn vị tính Số lượng Đơn giá Thành tiền
1 Lẩu gà lá é Phần 2 250.000 500.000
2 Cơm chiên hải sản Đĩa 1 150.000 150.000
Cộng tiền hàng (Total amount): 650.000
Tiền thuế GTGT (VAT amount): 52.000
Tổng cộng tiền thanh toán: 702.000
Tra cứu hóa đơn tại: https://tracuu.example.vn
Mã tra cứu: HS26ABC789
";

/// Poppler is never available here, so every PDF falls through to its text sidecar.
fn sidecar_only_extractor() -> PdfTextExtractor {
    let tools = ToolPaths {
        pdftotext: PathBuf::from("/nonexistent/pdftotext"),
        pdftoppm: PathBuf::from("/nonexistent/pdftoppm"),
        pdfinfo: PathBuf::from("/nonexistent/pdfinfo"),
        tesseract: None,
    };
    let settings = ExtractorSettings {
        ocr_enabled: false,
        ..ExtractorSettings::default()
    };
    PdfTextExtractor::new(tools, settings)
}

fn write_invoices(root: &Path) {
    let input = root.join("invoices_input");
    std::fs::create_dir_all(&input).unwrap();

    std::fs::write(input.join("hd_001.pdf"), b"%PDF-1.4").unwrap();
    std::fs::write(input.join("hd_001.txt"), INVOICE_TEXT).unwrap();

    std::fs::write(input.join("hd_002.pdf"), b"%PDF-1.4").unwrap();
    std::fs::write(
        input.join("hd_002.txt"),
        INVOICE_TEXT.replace("00001234", "00005678"),
    )
    .unwrap();

    // Scan with no sidecar: ends up as an unrecognized row.
    std::fs::write(input.join("scan.pdf"), b"%PDF-1.4").unwrap();
}

fn cli(args: &[&str]) -> CliConfig {
    let mut argv = vec!["invoice-etl", "--input-dir", "invoices_input", "--output-path", "out"];
    argv.extend_from_slice(args);
    CliConfig::parse_from(argv)
}

#[tokio::test]
async fn test_end_to_end_summary_workbook() {
    let temp_dir = TempDir::new().unwrap();
    write_invoices(temp_dir.path());

    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().into_owned());
    let pipeline = InvoicePipeline::new(storage, cli(&["--no-ocr"]), sidecar_only_extractor());
    let engine = EtlEngine::new_with_monitoring(pipeline, false);

    let output = engine.run().await.unwrap();
    assert!(output.ends_with("hoadon_tonghop.xlsx"));

    let workbook = temp_dir.path().join("out").join("hoadon_tonghop.xlsx");
    assert!(workbook.exists());

    let book = umya_spreadsheet::reader::xlsx::read(&workbook).unwrap();
    let sheet = book.get_sheet_by_name("Hóa đơn").unwrap();
    assert_eq!(sheet.get_value("A1"), "Tên file");
    assert_eq!(sheet.get_value("A2"), "hd_001.pdf");
    assert_eq!(sheet.get_value("C2"), "00001234");
    assert_eq!(sheet.get_value("C3"), "00005678");
    assert_eq!(sheet.get_value("P2"), "0312345678");
    assert_eq!(sheet.get_value("A4"), "scan.pdf");
    assert_eq!(sheet.get_value("A5"), "");
}

#[tokio::test]
async fn test_end_to_end_accounting_with_all_formats() {
    let temp_dir = TempDir::new().unwrap();
    write_invoices(temp_dir.path());

    let config = cli(&[
        "--report",
        "accounting",
        "--team",
        "Team A",
        "--employee",
        "Nguyễn Văn A",
        "--formats",
        "csv,xlsx,json",
    ]);
    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().into_owned());
    let pipeline = InvoicePipeline::new(storage, config, sidecar_only_extractor());
    let engine = EtlEngine::new(pipeline);

    let output = engine.run().await.unwrap();
    assert!(output.ends_with("hoadon_tonghop.csv"));

    let out_dir = temp_dir.path().join("out");
    let csv = std::fs::read_to_string(out_dir.join("hoadon_tonghop.csv")).unwrap();
    let mut lines = csv.lines();
    assert!(lines.next().unwrap().starts_with("Team,Số hóa đơn,Ngày hóa đơn"));
    assert!(csv.contains("Team A,00001234"));
    assert!(csv.contains("Nguyễn Văn A,hd_002.pdf"));

    let json = std::fs::read(out_dir.join("hoadon_tonghop.json")).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&json).unwrap();
    assert_eq!(json["report"], "accounting");
    assert_eq!(json["invoices"].as_array().unwrap().len(), 3);

    assert!(out_dir.join("hoadon_tonghop.xlsx").exists());
}

#[tokio::test]
async fn test_empty_input_folder_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("invoices_input")).unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().into_owned());
    let pipeline = InvoicePipeline::new(storage, cli(&[]), sidecar_only_extractor());
    let engine = EtlEngine::new(pipeline);

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, EtlError::NoInputError { .. }));
    assert_eq!(err.severity().exit_code(), 0);
    assert!(!temp_dir.path().join("out").exists());
}

#[tokio::test]
async fn test_toml_config_drives_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    write_invoices(temp_dir.path());

    let config = TomlConfig::from_toml_str(
        r#"
[pipeline]
name = "integration"

[input]
dir = "invoices_input"

[ocr]
enabled = false

[extraction]
category = "Dịch vụ ăn uống"

[report]
kind = "business"
team = "Team B"
employee = "Trần Thị B"

[load]
output_path = "reports"
output_file = "thang1.xlsx"
formats = ["xlsx"]
"#,
    )
    .unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_string_lossy().into_owned());
    let pipeline = InvoicePipeline::new(storage, config, sidecar_only_extractor());
    let engine = EtlEngine::new(pipeline);
    engine.run().await.unwrap();

    let workbook = temp_dir.path().join("reports").join("thang1.xlsx");
    let book = umya_spreadsheet::reader::xlsx::read(&workbook).unwrap();
    let sheet = book.get_sheet_by_name("Hóa đơn").unwrap();
    assert_eq!(sheet.get_value("A1"), "Team");
    assert_eq!(sheet.get_value("A2"), "Team B");
    assert_eq!(sheet.get_value("B3"), "Trần Thị B");
    assert_eq!(sheet.get_value("G2"), "Dịch vụ ăn uống");
}
