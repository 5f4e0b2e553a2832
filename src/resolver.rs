// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Deterministic destination conflict resolution
//!
//! A taken destination `{parent}/{stem}{suffix}` is renamed to `{parent}/{stem}{N}{suffix}`
//! with the smallest `N >= 2` that is neither on disk nor reserved by the current batch.
//! The bare stem counts as sequence number 1. The resolver only reads the filesystem.

use std::collections::{BTreeSet, HashSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::EntryKind;
use crate::{FoldersmithError, Result};

/// Resolves candidate destinations against disk state and a reserved set
#[derive(Debug, Clone, Default)]
pub struct PathConflictResolver;

/// `{stem}{suffix}` split of a destination name
struct NameParts<'a> {
    stem: &'a str,
    suffix: String,
}

impl PathConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Return `candidate` if free, otherwise the next free numbered sibling.
    pub fn resolve(
        &self,
        candidate: &Path,
        kind: EntryKind,
        reserved: &HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        let (parent, file_name) = well_formed(candidate)?;

        if !is_taken(candidate, reserved) {
            return Ok(candidate.to_path_buf());
        }

        let parts = split_name(file_name, kind);
        let mut used = BTreeSet::new();

        // Entries already on disk
        if let Ok(entries) = std::fs::read_dir(parent) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if let Some(n) = name.to_str().and_then(|n| sequence_number(n, &parts)) {
                    used.insert(n);
                }
            }
        }

        // Destinations reserved earlier in this batch
        for path in reserved.iter().filter(|p| p.parent() == Some(parent)) {
            if let Some(n) = path
                .file_name()
                .and_then(OsStr::to_str)
                .and_then(|n| sequence_number(n, &parts))
            {
                used.insert(n);
            }
        }

        let mut n = 2u64;
        loop {
            if !used.contains(&n) {
                let resolved = parent.join(format!("{}{}{}", parts.stem, n, parts.suffix));
                // Guards against names that differ only by case on case-insensitive volumes
                if !is_taken(&resolved, reserved) {
                    debug!("Resolved conflict: {:?} -> {:?}", candidate, resolved);
                    return Ok(resolved);
                }
            }
            n += 1;
        }
    }
}

fn well_formed(candidate: &Path) -> Result<(&Path, &str)> {
    if candidate.as_os_str().is_empty() {
        return Err(FoldersmithError::Validation("empty destination path".to_string()));
    }
    let parent = candidate
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            FoldersmithError::Validation(format!("destination {:?} has no parent directory", candidate))
        })?;
    let file_name = candidate
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| {
            FoldersmithError::Validation(format!("destination {:?} has no valid file name", candidate))
        })?;
    Ok((parent, file_name))
}

fn is_taken(path: &Path, reserved: &HashSet<PathBuf>) -> bool {
    reserved.contains(path) || std::fs::symlink_metadata(path).is_ok()
}

fn split_name(file_name: &str, kind: EntryKind) -> NameParts<'_> {
    if kind == EntryKind::File {
        let path = Path::new(file_name);
        if let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(OsStr::to_str),
            path.extension().and_then(OsStr::to_str),
        ) {
            return NameParts {
                stem,
                suffix: format!(".{}", ext),
            };
        }
    }
    NameParts {
        stem: file_name,
        suffix: String::new(),
    }
}

/// Sequence number used by `name`, if it is the bare stem (1) or `{stem}{digits}{suffix}`
fn sequence_number(name: &str, parts: &NameParts<'_>) -> Option<u64> {
    let middle = name
        .strip_prefix(parts.stem)?
        .strip_suffix(parts.suffix.as_str())?;
    if middle.is_empty() {
        return Some(1);
    }
    if middle.bytes().all(|b| b.is_ascii_digit()) {
        return middle.parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let parent = dir.path().join("a");
        fs::create_dir_all(&parent).unwrap();
        (dir, parent)
    }

    #[test]
    fn test_free_candidate_returned_unchanged() {
        let (_dir, parent) = setup();
        let candidate = parent.join("doc.pdf");
        let resolved = PathConflictResolver::new()
            .resolve(&candidate, EntryKind::File, &HashSet::new())
            .unwrap();
        assert_eq!(resolved, candidate);
    }

    #[test]
    fn test_existing_file_gets_suffix_two() {
        let (_dir, parent) = setup();
        fs::write(parent.join("doc.pdf"), b"old").unwrap();

        let resolved = PathConflictResolver::new()
            .resolve(&parent.join("doc.pdf"), EntryKind::File, &HashSet::new())
            .unwrap();
        assert_eq!(resolved, parent.join("doc2.pdf"));
    }

    #[test]
    fn test_reserved_batch_entries_count_as_used() {
        let (_dir, parent) = setup();
        let mut reserved = HashSet::new();
        reserved.insert(parent.join("doc.pdf"));
        reserved.insert(parent.join("doc2.pdf"));

        let resolved = PathConflictResolver::new()
            .resolve(&parent.join("doc.pdf"), EntryKind::File, &reserved)
            .unwrap();
        assert_eq!(resolved, parent.join("doc3.pdf"));
    }

    #[test]
    fn test_smallest_gap_is_chosen() {
        let (_dir, parent) = setup();
        fs::write(parent.join("doc.pdf"), b"1").unwrap();
        fs::write(parent.join("doc3.pdf"), b"3").unwrap();
        fs::write(parent.join("doc-draft.pdf"), b"x").unwrap();

        let resolved = PathConflictResolver::new()
            .resolve(&parent.join("doc.pdf"), EntryKind::File, &HashSet::new())
            .unwrap();
        assert_eq!(resolved, parent.join("doc2.pdf"));
    }

    #[test]
    fn test_directory_candidates_have_no_suffix() {
        let (_dir, parent) = setup();
        fs::create_dir(parent.join("holiday.2020")).unwrap();
        fs::create_dir(parent.join("holiday.20202")).unwrap();

        let resolved = PathConflictResolver::new()
            .resolve(&parent.join("holiday.2020"), EntryKind::Directory, &HashSet::new())
            .unwrap();
        assert_eq!(resolved, parent.join("holiday.20203"));
    }

    #[test]
    fn test_missing_parent_is_not_an_error() {
        let (_dir, parent) = setup();
        let candidate = parent.join("nested/deeper/doc.pdf");
        let mut reserved = HashSet::new();
        reserved.insert(candidate.clone());

        let resolved = PathConflictResolver::new()
            .resolve(&candidate, EntryKind::File, &reserved)
            .unwrap();
        assert_eq!(resolved, parent.join("nested/deeper/doc2.pdf"));
    }

    #[test]
    fn test_malformed_candidates_rejected() {
        let resolver = PathConflictResolver::new();
        assert!(resolver.resolve(Path::new(""), EntryKind::File, &HashSet::new()).is_err());
        assert!(resolver.resolve(Path::new("doc.pdf"), EntryKind::File, &HashSet::new()).is_err());
    }

    #[test]
    fn test_sequence_number_parsing() {
        let parts = split_name("doc.pdf", EntryKind::File);
        assert_eq!(sequence_number("doc.pdf", &parts), Some(1));
        assert_eq!(sequence_number("doc12.pdf", &parts), Some(12));
        assert_eq!(sequence_number("doc_a.pdf", &parts), None);
        assert_eq!(sequence_number("doc2.txt", &parts), None);
    }
}
