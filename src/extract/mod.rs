//! Text extraction from invoice PDFs.
//!
//! Embedded text comes from `pdftotext`. Scans are rendered with `pdftoppm`
//! and read by Tesseract, with a high resolution crop pass over the first
//! page when the invoice number or seller tax code is still missing. A `.txt`
//! sidecar is the last resort.

pub mod ocr;
pub mod poppler;
pub mod sidecar;
pub mod tools;

use crate::domain::{CropRegion, CropText, SourceDocument, TextExtractor, TextSource};
use crate::parse::ocr_fields::extract_ocr_fields;
use crate::utils::error::Result;
use async_trait::async_trait;
use ocr::Tesseract;
use std::path::Path;
use tools::ToolPaths;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub ocr_enabled: bool,
    pub lang: String,
    pub dpi: u32,
    pub hd_dpi: u32,
    pub ignored_tax_codes: Vec<String>,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            lang: "vie+eng".to_string(),
            dpi: 300,
            hd_dpi: 600,
            ignored_tax_codes: Vec::new(),
        }
    }
}

pub struct PdfTextExtractor {
    tools: ToolPaths,
    tesseract: Option<Tesseract>,
    settings: ExtractorSettings,
}

impl PdfTextExtractor {
    pub fn new(tools: ToolPaths, settings: ExtractorSettings) -> Self {
        let tesseract = if settings.ocr_enabled {
            tools
                .tesseract
                .clone()
                .map(|path| Tesseract::new(path, settings.lang.clone()))
        } else {
            None
        };
        Self {
            tools,
            tesseract,
            settings,
        }
    }

    async fn embedded_text(&self, path: &Path) -> Option<String> {
        match poppler::pdf_to_text(&self.tools.pdftotext, path).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                warn!("⚠️ pdftotext failed for {}: {}", path.display(), err);
                None
            }
        }
    }

    async fn ocr_text(&self, tesseract: &Tesseract, path: &Path) -> Result<String> {
        let work_dir = tempfile::TempDir::new()?;
        let pages =
            poppler::render_pages(&self.tools.pdftoppm, path, self.settings.dpi, work_dir.path())
                .await?;
        debug!("Rendered {} page(s) of {}", pages.len(), path.display());
        Ok(tesseract.recognize_pages(&pages).await)
    }

    /// Re-reads the header of the first page at high resolution for the regions still missing.
    async fn crop_pass(
        &self,
        tesseract: &Tesseract,
        path: &Path,
        regions: &[CropRegion],
    ) -> Result<Vec<CropText>> {
        let page = poppler::page_size(&self.tools.pdfinfo, path).await?;
        let work_dir = tempfile::TempDir::new()?;
        let mut crops = Vec::new();
        for region in regions {
            let (name, psm) = match region {
                CropRegion::InvoiceNumber => ("number", 11),
                CropRegion::SellerTaxCode => ("tax_code", 6),
            };
            let rect = poppler::crop_rect(*region, page, self.settings.hd_dpi);
            let image = poppler::render_crop(
                &self.tools.pdftoppm,
                path,
                self.settings.hd_dpi,
                rect,
                work_dir.path(),
                name,
            )
            .await?;
            let text = tesseract.recognize(&image, Some(psm)).await?;
            crops.push(CropText {
                region: *region,
                text,
            });
        }
        Ok(crops)
    }

    async fn scanned_document(
        &self,
        tesseract: &Tesseract,
        path: &Path,
        doc: SourceDocument,
    ) -> Option<SourceDocument> {
        let text = match self.ocr_text(tesseract, path).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return None,
            Err(err) => {
                warn!("⚠️ OCR failed for {}: {}", path.display(), err);
                return None;
            }
        };

        let draft = extract_ocr_fields(&text, &doc.file_name, &self.settings.ignored_tax_codes);
        let mut missing = Vec::new();
        if draft.number.is_empty() {
            missing.push(CropRegion::InvoiceNumber);
        }
        if draft.seller_tax_code.is_empty() {
            missing.push(CropRegion::SellerTaxCode);
        }

        let mut doc = doc.with_text(text, TextSource::Ocr);
        if !missing.is_empty() {
            match self.crop_pass(tesseract, path, &missing).await {
                Ok(crops) => doc.crops = crops,
                Err(err) => warn!("⚠️ HD crop pass failed for {}: {}", doc.file_name, err),
            }
        }
        Some(doc)
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<SourceDocument> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let doc = SourceDocument::new(file_name, path);

        if let Some(text) = self.embedded_text(path).await {
            return Ok(doc.with_text(text, TextSource::Embedded));
        }

        if let Some(tesseract) = &self.tesseract {
            info!("🔎 {}: no embedded text, running OCR", doc.file_name);
            if let Some(scanned) = self.scanned_document(tesseract, path, doc.clone()).await {
                return Ok(scanned);
            }
        }

        if let Some(sidecar) = sidecar::find_sidecar(path) {
            match sidecar::read_sidecar(&sidecar).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!("📝 {}: using text file {}", doc.file_name, sidecar.display());
                    return Ok(doc.with_text(text, TextSource::Sidecar));
                }
                Ok(_) => {}
                Err(err) => warn!("⚠️ Could not read {}: {}", sidecar.display(), err),
            }
        }

        warn!("❓ {}: could not extract any text", doc.file_name);
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn missing_tools() -> ToolPaths {
        ToolPaths {
            pdftotext: PathBuf::from("/nonexistent/pdftotext"),
            pdftoppm: PathBuf::from("/nonexistent/pdftoppm"),
            pdfinfo: PathBuf::from("/nonexistent/pdfinfo"),
            tesseract: None,
        }
    }

    #[tokio::test]
    async fn test_tool_failure_falls_back_to_sidecar() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("HD_00012345.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("HD_00012345.txt"), "Số: 00012345").unwrap();

        let extractor = PdfTextExtractor::new(missing_tools(), ExtractorSettings::default());
        let doc = extractor.extract(&pdf).await.unwrap();
        assert_eq!(doc.source, TextSource::Sidecar);
        assert_eq!(doc.file_name, "HD_00012345.pdf");
        assert!(doc.text.contains("00012345"));
    }

    #[tokio::test]
    async fn test_no_text_anywhere() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let extractor = PdfTextExtractor::new(missing_tools(), ExtractorSettings::default());
        let doc = extractor.extract(&pdf).await.unwrap();
        assert_eq!(doc.source, TextSource::None);
        assert!(!doc.has_text());
    }
}
