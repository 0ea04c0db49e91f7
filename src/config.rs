use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Name of the catch-all directory created inside the target directory.
pub const CATCH_ALL_DIR: &str = "Uncategorized";

/// Which [`MetadataSource`](crate::metadata::MetadataSource) implementation reads subject tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataBackend {
    /// Read the XMP packet directly from the JPEG (no external tools).
    #[default]
    Native,
    /// Drive a long-lived `exiftool -stay_open` process.
    ExifTool,
}

impl MetadataBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native XMP reader",
            Self::ExifTool => "exiftool",
        }
    }
}

/// Runtime configuration for a categorization run.
///
/// There is no configuration file; every value comes from the command line.
///
/// # Example
///
/// ```rust
/// use exif_tree::config::Config;
///
/// let mut config = Config::new("./photos");
/// config.dry_run = true;
/// assert!(config.catch_all_dir().ends_with("Uncategorized"));
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory whose JPEG files are categorized (not traversed recursively).
    pub target_dir: PathBuf,
    /// If `true`, report every decision without creating directories or moving files.
    pub dry_run: bool,
    /// Metadata backend used to read subject tags.
    pub backend: MetadataBackend,
}

impl Config {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            dry_run: false,
            backend: MetadataBackend::default(),
        }
    }

    /// Full path of the catch-all directory.
    pub fn catch_all_dir(&self) -> PathBuf {
        self.target_dir.join(CATCH_ALL_DIR)
    }

    /// Full path of a category directory inside the target directory.
    pub fn category_dir(&self, name: &str) -> PathBuf {
        self.target_dir.join(name)
    }

    /// Check that the target directory exists and is a directory.
    pub fn validate(&self) -> Result<()> {
        check_target_dir(&self.target_dir)
    }
}

fn check_target_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Target directory '{}' not found.", path.display());
    }
    if !path.is_dir() {
        bail!("Target '{}' is not a directory.", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::new("/photos");
        assert!(!config.dry_run);
        assert_eq!(config.backend, MetadataBackend::Native);
        assert_eq!(config.catch_all_dir(), PathBuf::from("/photos/Uncategorized"));
        assert_eq!(config.category_dir("Animals"), PathBuf::from("/photos/Animals"));
    }

    #[test]
    fn validate_existing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(Config::new(dir.path()).validate().is_ok());
    }

    #[test]
    fn validate_missing_dir() {
        let err = Config::new("/nonexistent/exif-tree/target").validate().unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn validate_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"fake").unwrap();

        let err = Config::new(&file).validate().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
