use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resolved locations of the external programs used for text extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub pdftotext: PathBuf,
    pub pdftoppm: PathBuf,
    pub pdfinfo: PathBuf,
    /// `None` when no Tesseract install was found; OCR is skipped then.
    pub tesseract: Option<PathBuf>,
}

/// Finds Poppler and Tesseract: explicit overrides first, then installs bundled
/// next to the executable, then the usual Windows locations, then `PATH`.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    tesseract_override: Option<PathBuf>,
    poppler_override: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
    path_dirs: Vec<PathBuf>,
    windows_dirs: Vec<PathBuf>,
}

pub fn exe_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

fn windows_tesseract_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from(r"C:\Program Files\Tesseract-OCR"),
        PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR"),
    ];
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        dirs.push(PathBuf::from(local).join("Tesseract-OCR"));
    }
    dirs
}

impl ToolLocator {
    /// Locator for the running process: bundle directory and `PATH` come from the environment.
    pub fn from_env() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let path_dirs = std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        Self {
            exe_dir,
            path_dirs,
            windows_dirs: if cfg!(windows) { windows_tesseract_dirs() } else { Vec::new() },
            ..Self::default()
        }
    }

    pub fn with_tesseract(mut self, path: Option<PathBuf>) -> Self {
        self.tesseract_override = path;
        self
    }

    pub fn with_poppler_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.poppler_override = dir;
        self
    }

    pub fn with_exe_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.exe_dir = dir;
        self
    }

    pub fn with_path_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.path_dirs = dirs;
        self
    }

    pub fn locate(&self) -> ToolPaths {
        let poppler_dir = self.poppler_dir();
        let poppler_tool = |name: &str| {
            poppler_dir
                .as_ref()
                .map(|dir| dir.join(exe_name(name)))
                .filter(|path| path.is_file())
                .or_else(|| self.on_path(name))
                .unwrap_or_else(|| PathBuf::from(exe_name(name)))
        };

        let tools = ToolPaths {
            pdftotext: poppler_tool("pdftotext"),
            pdftoppm: poppler_tool("pdftoppm"),
            pdfinfo: poppler_tool("pdfinfo"),
            tesseract: self.tesseract(),
        };

        match &poppler_dir {
            Some(dir) => info!("📄 Poppler: {}", dir.display()),
            None => debug!("Poppler not bundled, relying on PATH"),
        }
        match &tools.tesseract {
            Some(path) => info!("🔎 Tesseract: {}", path.display()),
            None => warn!("⚠️ Tesseract not found, scanned PDFs will not be recognized"),
        }
        tools
    }

    fn poppler_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.poppler_override {
            // Accept both the Poppler root and its bin folder.
            let nested = dir.join("Library").join("bin");
            return Some(if nested.is_dir() { nested } else { dir.clone() });
        }
        let exe_dir = self.exe_dir.as_ref()?;
        let mut bundled: Vec<PathBuf> = std::fs::read_dir(exe_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("poppler-"))
            })
            .map(|path| path.join("Library").join("bin"))
            .filter(|bin| bin.is_dir())
            .collect();
        bundled.sort();
        bundled.pop()
    }

    fn tesseract(&self) -> Option<PathBuf> {
        let name = exe_name("tesseract");
        if let Some(path) = &self.tesseract_override {
            return Some(path.clone());
        }
        let bundled = self
            .exe_dir
            .iter()
            .map(|dir| dir.join("tesseract").join(&name));
        let installed = self.windows_dirs.iter().map(|dir| dir.join(&name));
        bundled
            .chain(installed)
            .find(|path| path.is_file())
            .or_else(|| self.on_path("tesseract"))
    }

    fn on_path(&self, name: &str) -> Option<PathBuf> {
        let name = exe_name(name);
        self.path_dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_bundled_tools_next_to_exe() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("poppler-24.08.0").join("Library").join("bin");
        touch(&bin.join(exe_name("pdftotext")));
        touch(&dir.path().join("tesseract").join(exe_name("tesseract")));

        let tools = ToolLocator::default()
            .with_exe_dir(Some(dir.path().to_path_buf()))
            .locate();
        assert_eq!(tools.pdftotext, bin.join(exe_name("pdftotext")));
        // Not bundled and not on PATH: bare program name.
        assert_eq!(tools.pdfinfo, PathBuf::from(exe_name("pdfinfo")));
        assert_eq!(
            tools.tesseract,
            Some(dir.path().join("tesseract").join(exe_name("tesseract")))
        );
    }

    #[test]
    fn test_override_wins() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(exe_name("pdftoppm")));
        let tools = ToolLocator::default()
            .with_poppler_dir(Some(dir.path().to_path_buf()))
            .with_tesseract(Some(PathBuf::from("/opt/tess/tesseract")))
            .locate();
        assert_eq!(tools.pdftoppm, dir.path().join(exe_name("pdftoppm")));
        assert_eq!(tools.tesseract, Some(PathBuf::from("/opt/tess/tesseract")));
    }

    #[test]
    fn test_path_lookup() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(exe_name("tesseract")));
        let tools = ToolLocator::default()
            .with_path_dirs(vec![dir.path().to_path_buf()])
            .locate();
        assert_eq!(tools.tesseract, Some(dir.path().join(exe_name("tesseract"))));
    }
}
