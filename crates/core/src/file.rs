use crate::error::ValidationError;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

/// A user-chosen file, described but not yet read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    /// The file name sent with the upload.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
        }
    }

    /// Describes a file on disk. Fails if it is missing or not a regular file.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, path, metadata.len()))
    }

    /// The lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// Client-side limits checked before an upload starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    /// Lowercase, without leading dots. Empty accepts any extension.
    pub allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new<I, S>(max_bytes: u64, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self {
            max_bytes,
            allowed_extensions,
        }
    }

    /// Returns the file if it may be submitted.
    pub fn validate(&self, file: Option<SelectedFile>) -> Result<SelectedFile, ValidationError> {
        let file = file.ok_or(ValidationError::NoFileSelected)?;

        if !self.allowed_extensions.is_empty() {
            let accepted = file
                .extension()
                .is_some_and(|ext| self.allowed_extensions.contains(&ext));
            if !accepted {
                return Err(ValidationError::UnsupportedFileType {
                    name: file.name,
                    allowed: self.allowed_extensions.join(", "),
                });
            }
        }
        if file.size == 0 {
            return Err(ValidationError::EmptyFile(file.name));
        }
        if file.size > self.max_bytes {
            return Err(ValidationError::FileTooLarge {
                name: file.name,
                size: file.size,
                limit: self.max_bytes,
            });
        }
        Ok(file)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(100 * 1024 * 1024, ["csv", "xlsx", "xls"])
    }
}
