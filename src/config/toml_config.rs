use crate::config::{parse_formats, validate_submitter, DEFAULT_INPUT_DIR, DEFAULT_OUTPUT_FILE};
use crate::core::ConfigProvider;
use crate::domain::{CategoryMode, OutputFormat, ReportKind};
use crate::extract::tools::ToolLocator;
use crate::extract::ExtractorSettings;
use crate::parse::ParseOptions;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
    pub performance: Option<PerformanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub dir: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: DEFAULT_INPUT_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,
    pub tesseract: Option<String>,
    pub poppler_dir: Option<String>,
    pub lang: String,
    pub dpi: u32,
    pub hd_dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let defaults = ExtractorSettings::default();
        Self {
            enabled: defaults.ocr_enabled,
            tesseract: None,
            poppler_dir: None,
            lang: defaults.lang,
            dpi: defaults.dpi,
            hd_dpi: defaults.hd_dpi,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub ignored_tax_codes: Vec<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub kind: ReportKind,
    pub team: Option<String>,
    pub employee: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            kind: ReportKind::Summary,
            team: None,
            employee: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_file: String,
    pub formats: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: ".".to_string(),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            formats: vec!["xlsx".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub concurrency: Option<usize>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay verbatim.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            ocr_enabled: self.ocr.enabled,
            lang: self.ocr.lang.clone(),
            dpi: self.ocr.dpi,
            hd_dpi: self.ocr.hd_dpi,
            ignored_tax_codes: ParseOptions::default()
                .with_extra_tax_codes(&self.extraction.ignored_tax_codes)
                .ignored_tax_codes,
        }
    }

    pub fn tool_locator(&self) -> ToolLocator {
        ToolLocator::from_env()
            .with_tesseract(self.ocr.tesseract.as_ref().map(PathBuf::from))
            .with_poppler_dir(self.ocr.poppler_dir.as_ref().map(PathBuf::from))
    }
}

impl ConfigProvider for TomlConfig {
    fn input_dir(&self) -> &str {
        &self.input.dir
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_file(&self) -> &str {
        &self.load.output_file
    }

    fn report_kind(&self) -> ReportKind {
        self.report.kind
    }

    fn team(&self) -> &str {
        self.report.team.as_deref().unwrap_or("")
    }

    fn employee(&self) -> &str {
        self.report.employee.as_deref().unwrap_or("")
    }

    fn category_mode(&self) -> CategoryMode {
        self.extraction
            .category
            .as_deref()
            .map(CategoryMode::parse)
            .unwrap_or(CategoryMode::Auto)
    }

    fn output_formats(&self) -> Vec<OutputFormat> {
        parse_formats(&self.load.formats)
    }

    fn concurrency(&self) -> usize {
        self.performance
            .as_ref()
            .and_then(|p| p.concurrency)
            .unwrap_or(4)
    }

    fn ignored_tax_codes(&self) -> &[String] {
        &self.extraction.ignored_tax_codes
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("input.dir", &self.input.dir)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;
        validation::validate_output_file("load.output_file", &self.load.output_file)?;
        validation::validate_output_formats("load.formats", &self.load.formats)?;
        validation::validate_positive_number("performance.concurrency", self.concurrency(), 1)?;
        validation::validate_range("ocr.dpi", self.ocr.dpi, 72, 1200)?;
        validation::validate_range("ocr.hd_dpi", self.ocr.hd_dpi, 72, 1200)?;
        validation::validate_ocr_lang("ocr.lang", &self.ocr.lang)?;
        validation::validate_executable("ocr.tesseract", self.ocr.tesseract.as_deref())?;
        validation::validate_directory("ocr.poppler_dir", self.ocr.poppler_dir.as_deref())?;
        validate_submitter(self.report.kind, self.team(), self.employee())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[pipeline]
name = "hoadon-thang-1"
description = "Hóa đơn tháng 1"
version = "1.0.0"

[input]
dir = "./invoices_input"

[ocr]
enabled = false
lang = "vie"
dpi = 200
hd_dpi = 600

[extraction]
ignored_tax_codes = ["0311111111"]
category = "Hoa tươi"

[report]
kind = "accounting"
team = "Team A"
employee = "Nguyễn Văn A"

[load]
output_path = "./out"
output_file = "hoadon_tonghop.xlsx"
formats = ["xlsx", "json"]

[performance]
concurrency = 2
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.pipeline.name, "hoadon-thang-1");
        assert_eq!(config.report_kind(), ReportKind::Accounting);
        assert_eq!(config.team(), "Team A");
        assert_eq!(config.concurrency(), 2);
        assert_eq!(
            config.output_formats(),
            vec![OutputFormat::Xlsx, OutputFormat::Json]
        );
        assert_eq!(
            config.category_mode(),
            CategoryMode::Fixed(crate::domain::Category::Flowers)
        );
        let settings = config.extractor_settings();
        assert!(!settings.ocr_enabled);
        assert_eq!(settings.dpi, 200);
        assert!(settings.ignored_tax_codes.contains(&"0311111111".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TomlConfig::from_toml_str("[pipeline]\nname = \"minimal\"\n").unwrap();
        assert_eq!(config.input_dir(), "./invoices_input");
        assert_eq!(config.output_file(), "hoadon_tonghop.xlsx");
        assert_eq!(config.report_kind(), ReportKind::Summary);
        assert_eq!(config.category_mode(), CategoryMode::Auto);
        assert_eq!(config.concurrency(), 4);
        assert!(config.ocr.enabled);
        assert!(!config.monitoring_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("INVOICE_ETL_TEST_TEAM", "Team B");

        let toml_content = r#"
[pipeline]
name = "env"

[report]
kind = "business"
team = "${INVOICE_ETL_TEST_TEAM}"
employee = "${INVOICE_ETL_TEST_UNSET}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.team(), "Team B");
        assert_eq!(config.employee(), "${INVOICE_ETL_TEST_UNSET}");

        std::env::remove_var("INVOICE_ETL_TEST_TEAM");
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[pipeline]
name = "bad"

[report]
kind = "business"

[load]
output_path = "./out"
output_file = "hoadon.xlsx"
formats = ["xlsx", "pdf"]
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_missing_team_is_reported() {
        let config =
            TomlConfig::from_toml_str("[pipeline]\nname = \"x\"\n[report]\nkind = \"accounting\"\n")
                .unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::MissingConfigError { ref field }) if field == "team"
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[pipeline]\nname = \"file-test\"\n[monitoring]\nenabled = true\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "file-test");
        assert!(config.monitoring_enabled());
    }
}
