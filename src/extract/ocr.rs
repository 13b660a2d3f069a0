use crate::utils::error::{EtlError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Tesseract invoked as `tesseract <image> stdout -l <lang> [--psm N]`.
#[derive(Debug, Clone)]
pub struct Tesseract {
    path: PathBuf,
    lang: String,
}

/// Languages tried in order: the configured one, then Vietnamese alone, then English.
pub fn language_fallbacks(lang: &str) -> Vec<String> {
    let mut langs = vec![lang.to_string()];
    for fallback in ["vie+eng", "vie", "eng"] {
        if !langs.iter().any(|l| l == fallback) {
            langs.push(fallback.to_string());
        }
    }
    langs
}

impl Tesseract {
    pub fn new(path: PathBuf, lang: impl Into<String>) -> Self {
        Self {
            path,
            lang: lang.into(),
        }
    }

    async fn run_once(&self, image: &Path, lang: &str, psm: Option<u8>) -> Result<String> {
        let mut command = Command::new(&self.path);
        command.arg(image).arg("stdout").arg("-l").arg(lang);
        if let Some(psm) = psm {
            command.arg("--psm").arg(psm.to_string());
        }

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::ToolNotFoundError {
                    tool: "tesseract".to_string(),
                }
            } else {
                EtlError::ToolError {
                    tool: "tesseract".to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        if !output.status.success() {
            return Err(EtlError::ToolError {
                tool: "tesseract".to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Recognizes one image, falling back to other language packs when one is missing.
    pub async fn recognize(&self, image: &Path, psm: Option<u8>) -> Result<String> {
        let mut last_error = None;
        for lang in language_fallbacks(&self.lang) {
            match self.run_once(image, &lang, psm).await {
                Ok(text) => return Ok(text),
                Err(err @ EtlError::ToolNotFoundError { .. }) => return Err(err),
                Err(err) => {
                    debug!("tesseract -l {} failed: {}", lang, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| EtlError::ToolError {
            tool: "tesseract".to_string(),
            message: "no language pack available".to_string(),
        }))
    }

    /// OCR text of several page images; pages that fail are skipped.
    pub async fn recognize_pages(&self, images: &[PathBuf]) -> String {
        let mut text = String::new();
        for image in images {
            match self.recognize(image, None).await {
                Ok(page) => {
                    text.push_str(&page);
                    text.push('\n');
                }
                Err(err) => warn!("⚠️ OCR failed for {}: {}", image.display(), err),
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_fallbacks() {
        assert_eq!(language_fallbacks("vie+eng"), vec!["vie+eng", "vie", "eng"]);
        assert_eq!(
            language_fallbacks("eng+fra"),
            vec!["eng+fra", "vie+eng", "vie", "eng"]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_stops_fallbacks() {
        let tesseract = Tesseract::new(PathBuf::from("/nonexistent/tesseract"), "vie+eng");
        let err = tesseract
            .recognize(Path::new("page-1.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::ToolNotFoundError { .. }));
    }
}
