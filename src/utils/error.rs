use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Spreadsheet error: {message}")]
    SpreadsheetError { message: String },

    #[error("External tool '{tool}' failed: {message}")]
    ToolError { tool: String, message: String },

    #[error("External tool '{tool}' not found")]
    ToolNotFoundError { tool: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("No PDF invoices found in {path}")]
    NoInputError { path: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    ExternalTool,
    Processing,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code; low severity still counts as success.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::NoInputError { .. } => ErrorCategory::Input,
            EtlError::ToolError { .. } | EtlError::ToolNotFoundError { .. } => {
                ErrorCategory::ExternalTool
            }
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                ErrorCategory::Processing
            }
            EtlError::CsvError(_)
            | EtlError::IoError(_)
            | EtlError::SerializationError(_)
            | EtlError::SpreadsheetError { .. } => ErrorCategory::Output,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::NoInputError { .. } => ErrorSeverity::Low,
            EtlError::ToolError { .. } | EtlError::ToolNotFoundError { .. } => {
                ErrorSeverity::Medium
            }
            EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::SpreadsheetError { .. } => ErrorSeverity::High,
            EtlError::IoError(_)
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::NoInputError { path } => {
                format!("Copy the PDF invoices into '{}' and run again", path)
            }
            EtlError::ToolNotFoundError { tool } if tool.starts_with("tesseract") => {
                "Install Tesseract OCR (C:\\Program Files\\Tesseract-OCR) or pass --tesseract"
                    .to_string()
            }
            EtlError::ToolNotFoundError { tool } => format!(
                "Keep the bundled poppler folder next to the executable or pass --poppler-dir ({} missing)",
                tool
            ),
            EtlError::ToolError { tool, .. } => {
                format!("Check that '{}' runs from a terminal and the PDF is not damaged", tool)
            }
            EtlError::IoError(_) | EtlError::SpreadsheetError { .. } => {
                "Close the output workbook if it is open in Excel and check folder permissions"
                    .to_string()
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the command line flags or the TOML configuration file".to_string()
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Retry without the csv/json formats to isolate the failing export".to_string()
            }
            EtlError::ProcessingError { .. } | EtlError::ValidationError { .. } => {
                "Run with --verbose to see which invoice failed".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Input => self.to_string(),
            ErrorCategory::ExternalTool => format!("PDF/OCR tooling problem: {}", self),
            ErrorCategory::Processing => format!("Could not process invoices: {}", self),
            ErrorCategory::Output => format!("Could not write the report: {}", self),
        }
    }
}

impl From<umya_spreadsheet::XlsxError> for EtlError {
    fn from(err: umya_spreadsheet::XlsxError) -> Self {
        EtlError::SpreadsheetError {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_critical() {
        let err = EtlError::MissingConfigError {
            field: "team".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("Invalid configuration"));
        assert_eq!(err.severity().exit_code(), 3);
    }

    #[test]
    fn test_empty_input_exits_cleanly() {
        let err = EtlError::NoInputError {
            path: "./invoices_input".to_string(),
        };
        assert_eq!(err.severity().exit_code(), 0);
        assert!(err.recovery_suggestion().contains("./invoices_input"));
    }

    #[test]
    fn test_missing_input_is_low_severity() {
        let err = EtlError::NoInputError {
            path: "invoices_input".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(err.recovery_suggestion().contains("invoices_input"));
    }

    #[test]
    fn test_tool_suggestions() {
        let tess = EtlError::ToolNotFoundError {
            tool: "tesseract".to_string(),
        };
        assert!(tess.recovery_suggestion().contains("Tesseract"));

        let poppler = EtlError::ToolNotFoundError {
            tool: "pdftotext".to_string(),
        };
        assert!(poppler.recovery_suggestion().contains("poppler"));
    }
}
