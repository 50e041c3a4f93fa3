use crate::error::{Error, Result};
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories holding build output rather than sources.
const BUILD_DIRS: &[&str] = &["target", "build", "out"];

/// File scanner for traversing source roots.
///
/// The `FileScanner` recursively walks a source root to find every file whose
/// extension is one of the configured source extensions (`java` by default).
/// Hidden directories (those starting with `.`) and build output directories
/// such as `target` and `build` are skipped.
///
/// # Example
///
/// ```no_run
/// use service_apidoc::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./src/main/java"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.source_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    extensions: Vec<String>,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// Paths of all matching source files, in walk order
    pub source_files: Vec<PathBuf>,
    /// Warning messages for entries that could not be accessed
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    ///
    /// # Arguments
    ///
    /// * `root_path` - The source root to scan
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            extensions: vec!["java".to_string()],
        }
    }

    /// Replaces the accepted extensions.
    ///
    /// # Arguments
    ///
    /// * `extensions` - File extensions to collect, with or without the leading dot
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Scans the directory tree and collects matching files.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning
    /// continues past them.
    ///
    /// # Returns
    ///
    /// Returns a `ScanResult` with the matching files in file name order and
    /// any warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root_path.display()),
            )));
        }

        let mut source_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path || !e.file_type().is_dir() {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && !BUILD_DIRS.contains(&file_name.as_ref())
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let matches = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .map_or(false, |ext| self.extensions.iter().any(|e| e == ext));
                    if path.is_file() && matches {
                        source_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            source_files,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_names(result: &ScanResult) -> Vec<String> {
        result
            .source_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_normal_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("UserController.java"), "class UserController {}").unwrap();
        fs::write(root.join("User.java"), "class User {}").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(file_names(&result), vec!["User.java", "UserController.java"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = FileScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();
        assert!(result.source_files.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_nested_packages() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("com/acme/web")).unwrap();
        fs::create_dir_all(root.join("com/acme/model")).unwrap();
        fs::write(root.join("com/acme/web/UserController.java"), "").unwrap();
        fs::write(root.join("com/acme/model/User.java"), "").unwrap();
        fs::write(root.join("com/acme/model/Order.java"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();
        assert_eq!(result.source_files.len(), 3);
    }

    #[test]
    fn test_scan_skips_build_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        for dir in ["target", "build", ".git"] {
            fs::create_dir(root.join(dir)).unwrap();
            fs::write(root.join(dir).join("Generated.java"), "").unwrap();
        }
        fs::write(root.join("Api.java"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();
        assert_eq!(file_names(&result), vec!["Api.java"]);
    }

    #[test]
    fn test_scan_with_custom_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("Api.java"), "").unwrap();
        fs::write(root.join("Api.kt"), "").unwrap();
        fs::write(root.join("script.sh"), "").unwrap();

        let result = FileScanner::new(root.to_path_buf())
            .with_extensions(&[".kt".to_string()])
            .scan()
            .unwrap();
        assert_eq!(file_names(&result), vec!["Api.kt"]);
    }

    #[test]
    fn test_scan_missing_root_is_an_error() {
        let result = FileScanner::new(PathBuf::from("/definitely/not/here")).scan();
        assert!(result.is_err());
    }
}
