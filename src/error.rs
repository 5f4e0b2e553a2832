// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Foldersmith

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for Foldersmith operations
pub type Result<T> = std::result::Result<T, FoldersmithError>;

/// Foldersmith error types
#[derive(Error, Debug)]
pub enum FoldersmithError {
    /// Malformed input, rejected before any filesystem mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Source vanished between planning and execution
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied on {}: {message}", path.display())]
    Permission { path: PathBuf, message: String },

    /// Post-transfer checksum mismatch. The transferred data is left in place.
    #[error(
        "Data integrity error: {} -> {} (expected {expected}, got {actual})",
        source_path.display(),
        destination.display()
    )]
    DataIntegrity {
        source_path: PathBuf,
        destination: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O error moving {} to {}: {message}", source_path.display(), destination.display())]
    Io {
        source_path: PathBuf,
        destination: PathBuf,
        message: String,
    },

    #[error("File system error: {0}")]
    FileSystem(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),
}

impl FoldersmithError {
    /// Classify an OS error raised while transferring `source` to `destination`.
    pub fn from_transfer(err: io::Error, source: &Path, destination: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound if !source.exists() => Self::NotFound(source.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::Permission {
                path: source.to_path_buf(),
                message: format!("{} (destination {})", err, destination.display()),
            },
            _ => Self::Io {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                message: err.to_string(),
            },
        }
    }

    /// Whether this error belongs to a single file of a batch rather than the whole run
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::Permission { .. }
                | Self::DataIntegrity { .. }
                | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_includes_both_paths() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        std::fs::write(&source, b"x").unwrap();
        let dest = dir.path().join("b.txt");

        let err = FoldersmithError::from_transfer(
            io::Error::new(io::ErrorKind::Other, "disk full"),
            &source,
            &dest,
        );
        let message = err.to_string();
        assert!(message.contains("a.txt"));
        assert!(message.contains("b.txt"));
        assert!(message.contains("disk full"));
        assert!(err.is_per_file());
    }

    #[test]
    fn test_missing_source_maps_to_not_found() {
        let source = PathBuf::from("/definitely/not/here.txt");
        let err = FoldersmithError::from_transfer(
            io::Error::from(io::ErrorKind::NotFound),
            &source,
            Path::new("/tmp/x.txt"),
        );
        assert!(matches!(err, FoldersmithError::NotFound(p) if p == source));
    }

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(!FoldersmithError::Config("bad".into()).is_per_file());
    }
}
