//! Thin async wrappers around the Poppler command line tools.

use crate::domain::CropRegion;
use crate::utils::error::{EtlError, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

fn tool_name(tool: &Path) -> String {
    tool.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("poppler")
        .to_string()
}

async fn run(tool: &Path, command: &mut Command) -> Result<Vec<u8>> {
    let output = command.output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EtlError::ToolNotFoundError {
                tool: tool_name(tool),
            }
        } else {
            EtlError::ToolError {
                tool: tool_name(tool),
                message: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        return Err(EtlError::ToolError {
            tool: tool_name(tool),
            message: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(output.stdout)
}

/// Embedded text of every page, pages joined by newlines.
pub async fn pdf_to_text(pdftotext: &Path, pdf: &Path) -> Result<String> {
    let stdout = run(
        pdftotext,
        Command::new(pdftotext)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(pdf)
            .arg("-"),
    )
    .await?;
    Ok(String::from_utf8_lossy(&stdout).replace('\x0c', "\n"))
}

/// Renders every page to `<out_dir>/page-N.png` and returns the images in page order.
pub async fn render_pages(pdftoppm: &Path, pdf: &Path, dpi: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let prefix = out_dir.join("page");
    run(
        pdftoppm,
        Command::new(pdftoppm)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(&prefix),
    )
    .await?;

    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let page = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("page-"))
            .and_then(|n| n.parse::<u32>().ok());
        if let Some(page) = page {
            pages.push((page, path));
        }
    }
    pages.sort_by_key(|(page, _)| *page);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

/// First page size in points, from `pdfinfo`.
pub async fn page_size(pdfinfo: &Path, pdf: &Path) -> Result<(f64, f64)> {
    let stdout = run(pdfinfo, Command::new(pdfinfo).arg("-f").arg("1").arg("-l").arg("1").arg(pdf)).await?;
    parse_page_size(&String::from_utf8_lossy(&stdout)).ok_or_else(|| EtlError::ToolError {
        tool: tool_name(pdfinfo),
        message: format!("no page size reported for {}", pdf.display()),
    })
}

/// Reads `Page size: 595.276 x 841.89 pts (A4)` or the per-page `Page    1 size:` form.
pub fn parse_page_size(info: &str) -> Option<(f64, f64)> {
    info.lines()
        .filter(|line| line.starts_with("Page") && line.contains("size:"))
        .find_map(|line| {
            let (_, dims) = line.split_once("size:")?;
            let mut parts = dims.split_whitespace();
            let width = parts.next()?.parse::<f64>().ok()?;
            let _x = parts.next()?;
            let height = parts.next()?.parse::<f64>().ok()?;
            Some((width, height))
        })
}

/// Pixel rectangle `(x, y, w, h)` of a crop region on a page rendered at `dpi`.
pub fn crop_rect(region: CropRegion, page_points: (f64, f64), dpi: u32) -> (u32, u32, u32, u32) {
    let scale = dpi as f64 / 72.0;
    let width = (page_points.0 * scale).round();
    let height = (page_points.1 * scale).round();
    let (x, y, w, h) = match region {
        CropRegion::InvoiceNumber => (width * 0.7, 0.0, width * 0.3, height * 0.15),
        CropRegion::SellerTaxCode => (0.0, 0.0, width, height * 0.25),
    };
    (x as u32, y as u32, w as u32, h as u32)
}

/// Renders one region of the first page to `<out_dir>/<name>.png`.
pub async fn render_crop(
    pdftoppm: &Path,
    pdf: &Path,
    dpi: u32,
    rect: (u32, u32, u32, u32),
    out_dir: &Path,
    name: &str,
) -> Result<PathBuf> {
    let prefix = out_dir.join(name);
    let (x, y, w, h) = rect;
    run(
        pdftoppm,
        Command::new(pdftoppm)
            .args(["-f", "1", "-l", "1", "-singlefile", "-png"])
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-x")
            .arg(x.to_string())
            .arg("-y")
            .arg(y.to_string())
            .arg("-W")
            .arg(w.to_string())
            .arg("-H")
            .arg(h.to_string())
            .arg(pdf)
            .arg(&prefix),
    )
    .await?;
    Ok(prefix.with_extension("png"))
}
