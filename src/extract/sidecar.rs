use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// A `.txt` next to the PDF whose name starts with the PDF stem, e.g.
/// `invoice (1)_00001.txt` for `invoice (1).pdf`. `debug_` dumps are ignored.
pub fn find_sidecar(pdf: &Path) -> Option<PathBuf> {
    let stem = pdf.file_stem()?.to_str()?;
    let folder = match pdf.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(folder)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            name.starts_with(stem)
                && name.to_lowercase().ends_with(".txt")
                && !name.starts_with("debug_")
                && path.is_file()
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Sidecar contents; bytes that are not UTF-8 are replaced rather than rejected.
pub async fn read_sidecar(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_sidecar() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("hoadon (1).pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        std::fs::write(dir.path().join("debug_hoadon (1).txt"), b"x").unwrap();
        std::fs::write(dir.path().join("other.txt"), b"x").unwrap();
        assert_eq!(find_sidecar(&pdf), None);

        std::fs::write(dir.path().join("hoadon (1)_00001.TXT"), b"x").unwrap();
        assert_eq!(
            find_sidecar(&pdf),
            Some(dir.path().join("hoadon (1)_00001.TXT"))
        );
    }

    #[tokio::test]
    async fn test_read_sidecar_lossy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, [b'S', 0xF4, b'\n']).unwrap();
        let text = read_sidecar(&path).await.unwrap();
        assert!(text.starts_with('S'));
        assert!(text.contains('\u{FFFD}'));
    }
}
