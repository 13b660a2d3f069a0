use crate::domain::model::{Category, ExtractedInvoice, Report, ReportKind, SourceDocument};
use crate::report::summary::RunSummary;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Files directly under `dir` with the given extension (case-insensitive), sorted by name.
    fn list_files(
        &self,
        dir: &str,
        extension: &str,
    ) -> impl std::future::Future<Output = Result<Vec<PathBuf>>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unsupported output format '{}'", other)),
        }
    }
}

/// How the category column is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryMode {
    Auto,
    Fixed(Category),
}

impl CategoryMode {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            CategoryMode::Auto
        } else {
            CategoryMode::Fixed(Category::from_label(value))
        }
    }
}

pub trait ConfigProvider: Send + Sync {
    fn input_dir(&self) -> &str;
    fn output_path(&self) -> &str;
    fn output_file(&self) -> &str;
    fn report_kind(&self) -> ReportKind;
    fn team(&self) -> &str;
    fn employee(&self) -> &str;
    fn category_mode(&self) -> CategoryMode;
    fn output_formats(&self) -> Vec<OutputFormat>;
    fn concurrency(&self) -> usize;
    fn ignored_tax_codes(&self) -> &[String];
}

/// Turns one PDF into text. Implementations shell out to external tools.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<SourceDocument>;
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub invoices: Vec<ExtractedInvoice>,
    pub report: Report,
    pub summary: RunSummary,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<SourceDocument>>;
    async fn transform(&self, documents: Vec<SourceDocument>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
