// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Directory discovery: walks a root and produces one `FileRecord` per organizable file

use chrono::{DateTime, Local};
use glob::Pattern;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::ScannerConfig;
use crate::model::{EntryKind, FileCategory, FileRecord};
use crate::{FoldersmithError, Result};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic", "heif", "avif", "arw", "cr2",
    "cr3", "nef", "dng", "orf", "rw2",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "webm", "m4v", "flv"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "opus", "wma"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "txt", "md", "doc", "docx", "odt", "rtf", "pdf", "csv", "xls", "xlsx", "ods", "ppt", "pptx",
    "html", "css",
];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar", "tar", "gz", "tgz", "7z", "bz2", "xz"];
const CODE_EXTENSIONS: &[&str] = &[
    "py", "pyw", "ipynb", "js", "mjs", "cjs", "jsx", "ts", "tsx", "java", "rs", "go", "c", "cpp",
    "h", "hpp", "rb", "sh", "bash", "ps1",
];

/// Walks a directory tree in a stable order, honouring ignore rules
pub struct FileScanner {
    root: PathBuf,
    config: ScannerConfig,
    ignore_patterns: Vec<Pattern>,
    excluded: Vec<PathBuf>,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>, config: ScannerConfig) -> Self {
        let ignore_patterns = config
            .ignore_files
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            root: root.into(),
            config,
            ignore_patterns,
            excluded: Vec::new(),
        }
    }

    /// Never descend into `path` (e.g. an output root placed inside the scanned tree)
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Collect records for every organizable file under the root
    pub fn scan(&self) -> Result<Vec<FileRecord>> {
        if !self.root.exists() {
            return Err(FoldersmithError::NotFound(self.root.clone()));
        }

        let mut project_cache: HashMap<PathBuf, bool> = HashMap::new();
        let mut records = Vec::new();

        // Compared canonically so "out", "./out" and an absolute spelling all match
        let excluded: Vec<PathBuf> = self
            .excluded
            .iter()
            .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
            .collect();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_ignored_dir(e, &excluded));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error accessing {:?}: {}", e.path().unwrap_or(&self.root), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.is_ignored_file(path) {
                debug!("Ignored by pattern: {:?}", path);
                continue;
            }
            if self.config.skip_projects && self.in_project(path, &mut project_cache) {
                debug!("Inside a project directory: {:?}", path);
                continue;
            }

            match self.record(&entry) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Error accessing {:?}: {}", path, e),
            }
        }

        info!("Found {} files to organize under {:?}", records.len(), self.root);
        Ok(records)
    }

    fn is_ignored_dir(&self, entry: &DirEntry, excluded: &[PathBuf]) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        if !excluded.is_empty() {
            let path = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
            if excluded.contains(&path) {
                return true;
            }
        }
        let name = entry.file_name().to_string_lossy();
        self.config.ignore_dirs.iter().any(|d| *d == name)
    }

    fn is_ignored_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return true;
        };
        self.ignore_patterns.iter().any(|p| p.matches(name))
    }

    /// Whether any directory between the file and the root carries a project indicator
    fn in_project(&self, path: &Path, cache: &mut HashMap<PathBuf, bool>) -> bool {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            let is_project = *cache.entry(dir.to_path_buf()).or_insert_with(|| {
                self.config
                    .project_indicators
                    .iter()
                    .any(|indicator| dir.join(indicator).exists())
            });
            if is_project {
                return true;
            }
            current = dir.parent();
        }
        false
    }

    fn record(&self, entry: &DirEntry) -> Result<FileRecord> {
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| {
            FoldersmithError::FileSystem(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata unavailable")),
            )
        })?;

        let name = entry.file_name().to_string_lossy().into_owned();
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string());

        let modified = meta
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|_| Local::now().format("%Y-%m-%d %H:%M:%S").to_string());

        Ok(FileRecord {
            path: path.to_path_buf(),
            category: categorize(&name, &suffix, mime_type.as_deref()),
            name,
            suffix,
            kind: EntryKind::File,
            size: meta.len(),
            modified,
            mime_type,
            content_hash: None,
            ai_insights: None,
        })
    }
}

/// Coarse category from the file name, its suffix and a guessed MIME type
pub fn categorize(name: &str, suffix: &str, mime: Option<&str>) -> FileCategory {
    if name.starts_with('.') {
        return FileCategory::Hidden;
    }

    let ext = suffix.trim_start_matches('.');
    if CODE_EXTENSIONS.contains(&ext) {
        return FileCategory::Code;
    }

    if let Some(mime) = mime {
        if mime.starts_with("image/") {
            return FileCategory::Image;
        }
        if mime.starts_with("video/") {
            return FileCategory::Video;
        }
        if mime.starts_with("audio/") {
            return FileCategory::Audio;
        }
        if mime == "application/pdf"
            || mime == "application/msword"
            || mime == "application/rtf"
            || mime.starts_with("text/")
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
            || mime.starts_with("application/vnd.oasis.opendocument")
            || mime.starts_with("application/vnd.ms-")
        {
            return FileCategory::Document;
        }
        if mime.starts_with("application/zip")
            || mime.contains("archive")
            || mime.contains("compressed")
            || mime == "application/x-tar"
            || mime == "application/gzip"
        {
            return FileCategory::Archive;
        }
    }

    if IMAGE_EXTENSIONS.contains(&ext) {
        FileCategory::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        FileCategory::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        FileCategory::Audio
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        FileCategory::Document
    } else if ARCHIVE_EXTENSIONS.contains(&ext) {
        FileCategory::Archive
    } else {
        FileCategory::Other
    }
}
