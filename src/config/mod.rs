#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::{OutputFormat, ReportKind};
use crate::utils::error::{EtlError, Result};

#[cfg(feature = "cli")]
use crate::core::ConfigProvider;
#[cfg(feature = "cli")]
use crate::domain::CategoryMode;
#[cfg(feature = "cli")]
use crate::extract::{tools::ToolLocator, ExtractorSettings};
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "cli")]
use std::path::PathBuf;

pub const DEFAULT_INPUT_DIR: &str = "./invoices_input";
pub const DEFAULT_OUTPUT_FILE: &str = "hoadon_tonghop.xlsx";

/// Output formats from their names, deduplicated. Unknown names are left to validation.
pub fn parse_formats(names: &[String]) -> Vec<OutputFormat> {
    let mut formats = Vec::new();
    for format in names.iter().filter_map(|name| name.parse::<OutputFormat>().ok()) {
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// Creates the input folder when it is missing. Returns `false` when it had to be created,
/// in which case there is nothing to process yet.
pub fn prepare_input_dir(dir: &str) -> Result<bool> {
    let path = std::path::Path::new(dir);
    if path.is_dir() {
        return Ok(true);
    }
    std::fs::create_dir_all(path)?;
    Ok(false)
}

/// Team and employee are mandatory for the accounting and business layouts.
pub fn validate_submitter(kind: ReportKind, team: &str, employee: &str) -> Result<()> {
    if !kind.needs_team() {
        return Ok(());
    }
    for (field, value) in [("team", team), ("employee", employee)] {
        if value.trim().is_empty() {
            return Err(EtlError::MissingConfigError {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "invoice-etl")]
#[command(about = "Extracts Vietnamese VAT invoice PDFs into an Excel summary")]
pub struct CliConfig {
    /// Folder scanned for PDF invoices
    #[arg(long, default_value = DEFAULT_INPUT_DIR)]
    pub input_dir: String,

    /// Folder the workbook is written to
    #[arg(long, default_value = ".")]
    pub output_path: String,

    #[arg(long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output_file: String,

    /// Report layout: summary, accounting or business
    #[arg(long, default_value = "summary")]
    pub report: ReportKind,

    #[arg(long)]
    pub team: Option<String>,

    #[arg(long)]
    pub employee: Option<String>,

    /// `auto`, one of the known category labels, or any custom label
    #[arg(long, default_value = "auto")]
    pub category: String,

    /// Comma separated: xlsx, csv, json
    #[arg(long, value_delimiter = ',', default_value = "xlsx")]
    pub formats: Vec<String>,

    /// Documents processed in parallel
    #[arg(long, default_value = "4")]
    pub concurrency: usize,

    /// Seller tax codes to ignore in addition to the built-in provider list
    #[arg(long, value_delimiter = ',')]
    pub ignore_tax_codes: Vec<String>,

    #[arg(long)]
    pub tesseract: Option<String>,

    #[arg(long)]
    pub poppler_dir: Option<String>,

    #[arg(long, default_value = "vie+eng")]
    pub ocr_lang: String,

    #[arg(long, default_value = "300")]
    pub dpi: u32,

    /// Skip OCR for scanned PDFs
    #[arg(long)]
    pub no_ocr: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            ocr_enabled: !self.no_ocr,
            lang: self.ocr_lang.clone(),
            dpi: self.dpi,
            ignored_tax_codes: crate::parse::ParseOptions::default()
                .with_extra_tax_codes(&self.ignore_tax_codes)
                .ignored_tax_codes,
            ..ExtractorSettings::default()
        }
    }

    pub fn tool_locator(&self) -> ToolLocator {
        ToolLocator::from_env()
            .with_tesseract(self.tesseract.as_ref().map(PathBuf::from))
            .with_poppler_dir(self.poppler_dir.as_ref().map(PathBuf::from))
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn input_dir(&self) -> &str {
        &self.input_dir
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_file(&self) -> &str {
        &self.output_file
    }

    fn report_kind(&self) -> ReportKind {
        self.report
    }

    fn team(&self) -> &str {
        self.team.as_deref().unwrap_or("")
    }

    fn employee(&self) -> &str {
        self.employee.as_deref().unwrap_or("")
    }

    fn category_mode(&self) -> CategoryMode {
        CategoryMode::parse(&self.category)
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        parse_formats(&self.formats)
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn ignored_tax_codes(&self) -> &[String] {
        &self.ignore_tax_codes
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input_dir", &self.input_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_output_file("output_file", &self.output_file)?;
        validation::validate_output_formats("formats", &self.formats)?;
        validation::validate_positive_number("concurrency", self.concurrency, 1)?;
        validation::validate_range("dpi", self.dpi, 72, 1200)?;
        validation::validate_ocr_lang("ocr_lang", &self.ocr_lang)?;
        validation::validate_executable("tesseract", self.tesseract.as_deref())?;
        validation::validate_directory("poppler_dir", self.poppler_dir.as_deref())?;
        validate_submitter(self.report, self.team(), self.employee())
    }
}
