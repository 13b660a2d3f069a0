use crate::core::{ConfigProvider, Pipeline, Storage, TextExtractor, TransformResult};
use crate::domain::{ExtractedInvoice, OutputFormat, SourceDocument};
use crate::parse::{parse_document, ParseOptions};
use crate::report::summary::RunSummary;
use crate::report::{build_report, csv_export, json_export, xlsx, Submitter};
use crate::utils::error::{EtlError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct InvoicePipeline<S: Storage, C: ConfigProvider, X: TextExtractor> {
    storage: S,
    config: C,
    extractor: Arc<X>,
}

impl<S: Storage, C: ConfigProvider, X: TextExtractor + 'static> InvoicePipeline<S, C, X> {
    pub fn new(storage: S, config: C, extractor: X) -> Self {
        Self {
            storage,
            config,
            extractor: Arc::new(extractor),
        }
    }

    fn parse_options(&self) -> ParseOptions {
        let mut options = ParseOptions::default().with_extra_tax_codes(self.config.ignored_tax_codes());
        options.category_mode = self.config.category_mode();
        options
    }

    fn output_file_path(&self, format: OutputFormat) -> String {
        let file = Path::new(self.config.output_file()).with_extension(format.extension());
        Path::new(self.config.output_path())
            .join(file)
            .to_string_lossy()
            .into_owned()
    }

    /// Writes the workbook, switching to `<stem>_new.xlsx` when the target cannot be replaced.
    async fn write_workbook(&self, path: &str, data: &[u8]) -> Result<String> {
        match self.storage.write_file(path, data).await {
            Ok(()) => Ok(path.to_string()),
            Err(err) => {
                let fallback = xlsx::fallback_path(path);
                warn!(
                    "⚠️ Could not write {} ({}), the file may be open in Excel. Saving as {}",
                    path, err, fallback
                );
                self.storage.write_file(&fallback, data).await?;
                Ok(fallback)
            }
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl<S, C, X> Pipeline for InvoicePipeline<S, C, X>
where
    S: Storage,
    C: ConfigProvider,
    X: TextExtractor + 'static,
{
    async fn extract(&self) -> Result<Vec<SourceDocument>> {
        let input_dir = self.config.input_dir();
        let files = self.storage.list_files(input_dir, "pdf").await?;
        if files.is_empty() {
            return Err(EtlError::NoInputError {
                path: input_dir.to_string(),
            });
        }
        info!("📂 Found {} PDF file(s) in {}", files.len(), input_dir);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency().max(1)));
        let mut tasks = JoinSet::new();
        for (index, path) in files.iter().cloned().enumerate() {
            let extractor = Arc::clone(&self.extractor);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let document = match extractor.extract(&path).await {
                    Ok(document) => document,
                    Err(err) => {
                        warn!("⚠️ Failed to read {}: {}", path.display(), err);
                        SourceDocument::new(file_name_of(&path), path.clone())
                    }
                };
                (index, document)
            });
        }

        let mut documents: Vec<Option<SourceDocument>> = vec![None; files.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, document) = joined.map_err(|e| EtlError::ProcessingError {
                message: format!("Extraction task failed: {}", e),
            })?;
            debug!("[{}/{}] {} ({})", index + 1, files.len(), document.file_name, document.source);
            documents[index] = Some(document);
        }

        Ok(documents.into_iter().flatten().collect())
    }

    async fn transform(&self, documents: Vec<SourceDocument>) -> Result<TransformResult> {
        let options = self.parse_options();
        let invoices: Vec<ExtractedInvoice> = documents
            .iter()
            .map(|document| {
                let extracted = parse_document(document, &options);
                info!(
                    "🧾 {}: {} | {} | {}",
                    document.file_name,
                    extracted.invoice.number,
                    extracted.invoice.seller,
                    extracted.invoice.category_label()
                );
                extracted
            })
            .collect();

        let submitter = Submitter::new(self.config.team(), self.config.employee());
        let report = build_report(self.config.report_kind(), &invoices, &submitter);
        let summary = RunSummary::from_report(&report, &invoices);

        Ok(TransformResult {
            invoices,
            report,
            summary,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let mut formats = self.config.output_formats();
        if formats.is_empty() {
            formats.push(OutputFormat::Xlsx);
        }

        let mut written: Vec<String> = Vec::new();
        for format in formats {
            let path = self.output_file_path(format);
            let path = match format {
                OutputFormat::Xlsx => {
                    let data = xlsx::to_bytes(&result.report)?;
                    self.write_workbook(&path, &data).await?
                }
                OutputFormat::Csv => {
                    let data = csv_export::to_csv(&result.report)?;
                    self.storage.write_file(&path, &data).await?;
                    path
                }
                OutputFormat::Json => {
                    let data = json_export::to_json(result.report.kind, &result.invoices)?;
                    self.storage.write_file(&path, &data).await?;
                    path
                }
            };
            debug!("Wrote {}", path);
            written.push(path);
        }

        // The first requested format is the one reported back.
        Ok(written.into_iter().next().unwrap_or_default())
    }
}

/// PDF paths in the order they will be processed; used by dry runs.
pub async fn pending_files<S: Storage>(storage: &S, input_dir: &str) -> Result<Vec<PathBuf>> {
    storage.list_files(input_dir, "pdf").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CategoryMode, ReportKind, TextSource};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        pdfs: Vec<PathBuf>,
        locked: Vec<String>,
    }

    impl MockStorage {
        fn with_pdfs(names: &[&str]) -> Self {
            Self {
                pdfs: names.iter().map(|n| Path::new("in").join(n)).collect(),
                ..Self::default()
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            if self.locked.iter().any(|p| p == path) {
                return Err(EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "file is locked",
                )));
            }
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn list_files(&self, _dir: &str, _extension: &str) -> Result<Vec<PathBuf>> {
            Ok(self.pdfs.clone())
        }
    }

    struct MockConfig {
        report: ReportKind,
        formats: Vec<OutputFormat>,
        category: CategoryMode,
        extra_codes: Vec<String>,
    }

    impl Default for MockConfig {
        fn default() -> Self {
            Self {
                report: ReportKind::Summary,
                formats: vec![OutputFormat::Xlsx],
                category: CategoryMode::Auto,
                extra_codes: Vec::new(),
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn input_dir(&self) -> &str {
            "in"
        }

        fn output_path(&self) -> &str {
            "out"
        }

        fn output_file(&self) -> &str {
            "hoadon_tonghop.xlsx"
        }

        fn report_kind(&self) -> ReportKind {
            self.report
        }

        fn team(&self) -> &str {
            "Team A"
        }

        fn employee(&self) -> &str {
            "Nguyễn Văn A"
        }

        fn category_mode(&self) -> CategoryMode {
            self.category.clone()
        }

        fn output_formats(&self) -> Vec<OutputFormat> {
            self.formats.clone()
        }

        fn concurrency(&self) -> usize {
            2
        }

        fn ignored_tax_codes(&self) -> &[String] {
            &self.extra_codes
        }
    }

    /// Serves canned text per file name; names containing "broken" fail.
    struct MockExtractor {
        texts: HashMap<String, String>,
    }

    #[async_trait]
    impl TextExtractor for MockExtractor {
        async fn extract(&self, path: &Path) -> Result<SourceDocument> {
            let name = file_name_of(path);
            if name.contains("broken") {
                return Err(EtlError::ToolError {
                    tool: "pdftotext".to_string(),
                    message: "syntax error".to_string(),
                });
            }
            // Later files finish first so ordering is exercised.
            if name.starts_with('a') {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
            let doc = SourceDocument::new(name.clone(), path);
            Ok(match self.texts.get(&name) {
                Some(text) => doc.with_text(text.clone(), TextSource::Embedded),
                None => doc,
            })
        }
    }

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

    fn extractor() -> MockExtractor {
        let mut texts = HashMap::new();
        texts.insert("a.pdf".to_string(), INVOICE_TEXT.to_string());
        texts.insert("b.pdf".to_string(), INVOICE_TEXT.replace("00001234", "00005678"));
        MockExtractor { texts }
    }

    #[tokio::test]
    async fn test_extract_preserves_file_order() {
        let storage = MockStorage::with_pdfs(&["a.pdf", "b.pdf", "c.pdf"]);
        let pipeline = InvoicePipeline::new(storage, MockConfig::default(), extractor());

        let documents = pipeline.extract().await.unwrap();
        let names: Vec<&str> = documents.iter().map(|d| d.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(documents[2].source, TextSource::None);
    }

    #[tokio::test]
    async fn test_extract_failure_does_not_abort() {
        let storage = MockStorage::with_pdfs(&["broken.pdf", "b.pdf"]);
        let pipeline = InvoicePipeline::new(storage, MockConfig::default(), extractor());

        let documents = pipeline.extract().await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].file_name, "broken.pdf");
        assert!(!documents[0].has_text());
        assert!(documents[1].has_text());
    }

    #[tokio::test]
    async fn test_extract_empty_folder() {
        let pipeline = InvoicePipeline::new(MockStorage::default(), MockConfig::default(), extractor());
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::NoInputError { ref path } if path == "in"));
    }

    #[tokio::test]
    async fn test_transform_builds_report() {
        let storage = MockStorage::with_pdfs(&["a.pdf", "c.pdf"]);
        let config = MockConfig {
            report: ReportKind::Business,
            ..MockConfig::default()
        };
        let pipeline = InvoicePipeline::new(storage, config, extractor());

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();

        assert_eq!(result.invoices.len(), 2);
        assert_eq!(result.invoices[0].invoice.number, "00001234");
        assert_eq!(result.invoices[1].invoice.seller, crate::domain::UNRECOGNIZED);
        assert_eq!(result.report.rows.len(), 2);
        assert_eq!(result.report.headers[0], "Team");
        assert_eq!(result.summary.unrecognized, 1);
    }

    #[tokio::test]
    async fn test_transform_fixed_category() {
        let storage = MockStorage::with_pdfs(&["a.pdf"]);
        let config = MockConfig {
            category: CategoryMode::parse("Quà tặng"),
            ..MockConfig::default()
        };
        let pipeline = InvoicePipeline::new(storage, config, extractor());

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();
        assert_eq!(result.invoices[0].invoice.category_label(), "Quà tặng");
    }

    #[tokio::test]
    async fn test_load_writes_requested_formats() {
        let storage = MockStorage::with_pdfs(&["a.pdf"]);
        let config = MockConfig {
            formats: vec![OutputFormat::Xlsx, OutputFormat::Csv, OutputFormat::Json],
            ..MockConfig::default()
        };
        let pipeline = InvoicePipeline::new(storage.clone(), config, extractor());

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        let xlsx_path = Path::new("out").join("hoadon_tonghop.xlsx");
        assert_eq!(output, xlsx_path.to_string_lossy());

        let workbook = storage.get_file(&output).await.unwrap();
        assert_eq!(&workbook[..2], b"PK");

        let csv_path = Path::new("out").join("hoadon_tonghop.csv");
        let csv = storage.get_file(&csv_path.to_string_lossy()).await.unwrap();
        let csv = String::from_utf8(csv).unwrap();
        assert!(csv.starts_with("Tên file,Ngày hóa đơn,Số hóa đơn"));
        assert!(csv.contains("a.pdf"));

        let json_path = Path::new("out").join("hoadon_tonghop.json");
        assert!(storage.get_file(&json_path.to_string_lossy()).await.is_some());
    }

    #[tokio::test]
    async fn test_load_falls_back_when_workbook_is_locked() {
        let target = Path::new("out").join("hoadon_tonghop.xlsx");
        let storage = MockStorage {
            locked: vec![target.to_string_lossy().into_owned()],
            ..MockStorage::with_pdfs(&["a.pdf"])
        };
        let pipeline = InvoicePipeline::new(storage.clone(), MockConfig::default(), extractor());

        let documents = pipeline.extract().await.unwrap();
        let result = pipeline.transform(documents).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        let fallback = Path::new("out").join("hoadon_tonghop_new.xlsx");
        assert_eq!(output, fallback.to_string_lossy());
        assert!(storage.get_file(&output).await.is_some());
    }
}
