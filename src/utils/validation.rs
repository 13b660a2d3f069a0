use crate::utils::error::{EtlError, Result};
use std::path::Path;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> EtlError {
    EtlError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }

    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }

    Ok(())
}

/// An explicit tool override must point at an existing file.
pub fn validate_executable(field_name: &str, path: Option<&str>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    validate_path(field_name, path)?;
    if !Path::new(path).is_file() {
        return Err(invalid(field_name, path, "File does not exist"));
    }
    Ok(())
}

pub fn validate_directory(field_name: &str, path: Option<&str>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    validate_path(field_name, path)?;
    if !Path::new(path).is_dir() {
        return Err(invalid(field_name, path, "Directory does not exist"));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        let reason = format!("Value must be at least {}", min_value);
        return Err(invalid(field_name, value, reason));
    }
    Ok(())
}

/// The workbook name must end in `.xlsx`; other formats reuse its stem.
pub fn validate_output_file(field_name: &str, file_name: &str) -> Result<()> {
    validate_path(field_name, file_name)?;
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") => Ok(()),
        Some(other) => Err(invalid(
            field_name,
            file_name,
            format!("Unsupported file extension: {}. Allowed extensions: xlsx", other),
        )),
        None => Err(invalid(
            field_name,
            file_name,
            "File has no extension or invalid filename",
        )),
    }
}

pub fn validate_output_formats(field_name: &str, formats: &[String]) -> Result<()> {
    const ALLOWED: [&str; 3] = ["xlsx", "csv", "json"];

    if formats.is_empty() {
        return Err(invalid(field_name, "", "At least one output format is required"));
    }

    for format in formats {
        let normalized = format.trim().to_lowercase();
        if !ALLOWED.contains(&normalized.as_str()) {
            let reason = format!("Unsupported output format. Allowed formats: {}", ALLOWED.join(", "));
            return Err(invalid(field_name, format, reason));
        }
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        let reason = format!("Value must be between {} and {}", min, max);
        return Err(invalid(field_name, value, reason));
    }
    Ok(())
}

/// Tesseract language specs look like `vie+eng`.
pub fn validate_ocr_lang(field_name: &str, lang: &str) -> Result<()> {
    validate_non_empty_string(field_name, lang)?;
    let valid = lang
        .split('+')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        return Err(invalid(field_name, lang, "Expected tesseract language codes joined by '+'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("concurrency", 4, 1).is_ok());
        assert!(validate_positive_number("concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("input_dir", "./invoices_input").is_ok());
        assert!(validate_path("input_dir", "").is_err());
        assert!(validate_path("input_dir", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_output_file() {
        assert!(validate_output_file("output_file", "hoadon_tonghop.xlsx").is_ok());
        assert!(validate_output_file("output_file", "HOADON.XLSX").is_ok());
        assert!(validate_output_file("output_file", "hoadon.xls").is_err());
        assert!(validate_output_file("output_file", "hoadon").is_err());
    }

    #[test]
    fn test_validate_output_formats() {
        let ok = vec!["xlsx".to_string(), "CSV".to_string()];
        assert!(validate_output_formats("formats", &ok).is_ok());

        let bad = vec!["pdf".to_string()];
        assert!(validate_output_formats("formats", &bad).is_err());
        assert!(validate_output_formats("formats", &[]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("dpi", 300u32, 72, 1200).is_ok());
        assert!(validate_range("dpi", 50u32, 72, 1200).is_err());
        assert!(validate_range("dpi", 2400u32, 72, 1200).is_err());
    }

    #[test]
    fn test_validate_ocr_lang() {
        assert!(validate_ocr_lang("ocr_lang", "vie+eng").is_ok());
        assert!(validate_ocr_lang("ocr_lang", "vie").is_ok());
        assert!(validate_ocr_lang("ocr_lang", "vie++eng").is_err());
        assert!(validate_ocr_lang("ocr_lang", " ").is_err());
    }

    #[test]
    fn test_validate_executable_missing_file() {
        assert!(validate_executable("tesseract", None).is_ok());
        assert!(validate_executable("tesseract", Some("/definitely/not/here/tesseract")).is_err());
    }
}
