// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Records exchanged between the scanner, analyzers, suggesters and the core

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Filesystem entry kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    File,
    Directory,
}

impl EntryKind {
    /// Kind of an existing path, or `File` when it cannot be read
    pub fn of(path: &Path) -> Self {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => Self::Directory,
            _ => Self::File,
        }
    }
}

/// Coarse content category assigned by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Code,
    Hidden,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Hidden => "hidden",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the analyzers learned about a file's content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    /// Label for documents, e.g. "invoice", "resume", "sales-data"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Most prominent detected object in an image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_object: Option<String>,
    /// Scene label for images, e.g. "screenshot"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    /// OCR output, truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Name of the analyzer that produced these insights
    #[serde(default)]
    pub analyzer: String,
}

impl AiInsights {
    pub fn is_empty(&self) -> bool {
        self.content_type.is_none()
            && self.primary_object.is_none()
            && self.scene.is_none()
            && self.detected_text.is_none()
            && self.title.is_none()
    }

    /// Best single label for naming the file
    pub fn label(&self) -> Option<&str> {
        self.primary_object
            .as_deref()
            .or(self.content_type.as_deref())
            .filter(|l| !l.is_empty() && *l != "other" && *l != "unknown")
    }
}

/// A filesystem entry under consideration.
///
/// The JSON form is strict: unknown fields are rejected and `mime_type` must be present
/// (`null` when unknown). `kind` defaults to `file`; `content_hash` and `ai_insights` are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    /// Lower-case extension including the dot, empty when absent
    pub suffix: String,
    pub category: FileCategory,
    #[serde(default)]
    pub kind: EntryKind,
    pub size: u64,
    /// Local time, "YYYY-MM-DD HH:MM:SS"
    pub modified: String,
    #[serde(deserialize_with = "required_nullable")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<AiInsights>,
}

/// Present-but-nullable field: `deserialize_with` disables serde's implicit `None` for missing keys
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

impl FileRecord {
    /// Year of the last modification, if the timestamp is well-formed
    pub fn modified_year(&self) -> Option<i32> {
        chrono::NaiveDateTime::parse_from_str(&self.modified, "%Y-%m-%d %H:%M:%S")
            .ok()
            .map(|dt| chrono::Datelike::year(&dt.date()))
    }

    /// File stem without the suffix
    pub fn stem(&self) -> &str {
        self.name
            .len()
            .checked_sub(self.suffix.len())
            .and_then(|end| self.name.get(..end))
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Mapping from absolute source path to category-relative destination.
///
/// Sources without a usable suggestion are absent rather than mapped to an empty string.
pub type SuggestionMap = HashMap<PathBuf, String>;

/// One raw (source, category-relative destination) pair fed to the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub source: PathBuf,
    pub kind: EntryKind,
    pub destination: String,
}

impl Suggestion {
    pub fn new(source: impl Into<PathBuf>, kind: EntryKind, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            kind,
            destination: destination.into(),
        }
    }

    /// Pair scanned records with their suggestions, keeping scan order
    pub fn from_records(records: &[FileRecord], map: &SuggestionMap) -> Vec<Self> {
        records
            .iter()
            .filter_map(|r| {
                map.get(&r.path)
                    .map(|dest| Self::new(r.path.clone(), r.kind, dest.clone()))
            })
            .collect()
    }
}

/// Lifecycle of a planned relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Planned,
    Executed,
    Skipped,
    Failed,
}

/// A single proposed relocation, owned by the planner until execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    pub source: PathBuf,
    pub kind: EntryKind,
    /// Category-relative suggestion as received
    pub suggested: String,
    /// Absolute, conflict-free destination
    pub resolved: Option<PathBuf>,
    pub status: PlanStatus,
    pub reason: Option<String>,
}

impl MovePlan {
    pub fn planned(suggestion: &Suggestion, resolved: PathBuf) -> Self {
        Self {
            source: suggestion.source.clone(),
            kind: suggestion.kind,
            suggested: suggestion.destination.clone(),
            resolved: Some(resolved),
            status: PlanStatus::Planned,
            reason: None,
        }
    }

    pub fn skipped(suggestion: &Suggestion, reason: impl Into<String>) -> Self {
        Self {
            source: suggestion.source.clone(),
            kind: suggestion.kind,
            suggested: suggestion.destination.clone(),
            resolved: None,
            status: PlanStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}
