// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Performs one relocation: directory creation, conflict resolution, transfer,
//! checksum verification and audit logging.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::integrity::IntegrityVerifier;
use crate::model::EntryKind;
use crate::resolver::PathConflictResolver;
use crate::{FoldersmithError, Result};

/// Copy keeps the source; move removes it on success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

impl TransferMode {
    pub fn from_copy_flag(copy: bool) -> Self {
        if copy { Self::Copy } else { Self::Move }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Copy => "Copied",
            Self::Move => "Moved",
        }
    }
}

/// Executes relocations one at a time and records each in the audit log
pub struct MoveExecutor {
    mode: TransferMode,
    resolver: PathConflictResolver,
    verifier: IntegrityVerifier,
    audit: AuditLog,
}

impl MoveExecutor {
    pub fn new(mode: TransferMode, verifier: IntegrityVerifier, audit: AuditLog) -> Self {
        Self {
            mode,
            resolver: PathConflictResolver::new(),
            verifier,
            audit,
        }
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn audit_mut(&mut self) -> &mut AuditLog {
        &mut self.audit
    }

    /// Relocate `source` to `destination` (or a numbered sibling) and return the realized path.
    ///
    /// A checksum mismatch is reported as `DataIntegrity`; the transferred data stays in place.
    pub fn execute(&mut self, source: &Path, destination: &Path) -> Result<PathBuf> {
        let kind = self.check_source(source)?;
        let parent = destination.parent().ok_or_else(|| {
            FoldersmithError::Validation(format!("destination {:?} has no parent directory", destination))
        })?;
        check_writable_ancestor(parent)?;

        fs::create_dir_all(parent).map_err(|e| FoldersmithError::from_transfer(e, source, destination))?;

        let final_destination = self.resolver.resolve(destination, kind, &HashSet::new())?;

        let digest = self
            .verifier
            .capture(source)
            .map_err(|e| reclassify(e, source, &final_destination))?;
        let size = tree_size(source);

        match self.mode {
            TransferMode::Copy => copy_entry(source, &final_destination).map_err(|e| {
                discard(&final_destination);
                e
            }),
            TransferMode::Move => relocate(source, &final_destination),
        }
        .map_err(|e| FoldersmithError::from_transfer(e, source, &final_destination))?;

        if let Some(ref expected) = digest {
            self.verifier.verify(source, expected, &final_destination)?;
            debug!("Checksum verified for {:?}", final_destination);
        }

        let entry = AuditEntry::new(source.to_path_buf(), final_destination.clone(), digest, size);
        if let Err(e) = self.audit.append(entry) {
            warn!("Could not save audit log {:?}: {}", self.audit.path(), e);
        }

        info!("{}: {:?} -> {:?}", self.mode.verb(), source, final_destination);
        Ok(final_destination)
    }

    fn check_source(&self, source: &Path) -> Result<EntryKind> {
        let meta = match fs::symlink_metadata(source) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FoldersmithError::NotFound(source.to_path_buf()))
            }
            Err(e) => {
                return Err(FoldersmithError::Permission {
                    path: source.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };

        if meta.is_file() {
            fs::File::open(source).map_err(|e| FoldersmithError::Permission {
                path: source.to_path_buf(),
                message: format!("cannot read source: {}", e),
            })?;
        }

        if self.mode == TransferMode::Move {
            if let Some(parent) = source.parent().filter(|p| !p.as_os_str().is_empty()) {
                if is_readonly(parent) {
                    return Err(FoldersmithError::Permission {
                        path: parent.to_path_buf(),
                        message: "source directory is not writable".to_string(),
                    });
                }
            }
        }

        Ok(if meta.is_dir() { EntryKind::Directory } else { EntryKind::File })
    }
}

fn is_readonly(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| m.permissions().readonly())
        .unwrap_or(false)
}

/// The nearest existing ancestor of `dir` must be writable
fn check_writable_ancestor(dir: &Path) -> Result<()> {
    let existing = dir.ancestors().find(|a| a.exists());
    match existing {
        Some(ancestor) if is_readonly(ancestor) => Err(FoldersmithError::Permission {
            path: ancestor.to_path_buf(),
            message: "destination directory is not writable".to_string(),
        }),
        _ => Ok(()),
    }
}

fn reclassify(err: FoldersmithError, source: &Path, destination: &Path) -> FoldersmithError {
    match err {
        FoldersmithError::FileSystem(e) => FoldersmithError::from_transfer(e, source, destination),
        other => other,
    }
}

/// Bytes under `path`: file length or recursive sum for directories
fn tree_size(path: &Path) -> Option<u64> {
    let meta = fs::symlink_metadata(path).ok()?;
    if !meta.is_dir() {
        return Some(meta.len());
    }
    let mut total = 0;
    for entry in fs::read_dir(path).ok()?.flatten() {
        total += tree_size(&entry.path()).unwrap_or(0);
    }
    Some(total)
}

fn copy_entry(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::symlink_metadata(source)?.is_dir() {
        copy_tree(source, destination)
    } else {
        fs::copy(source, destination).map(|_| ())
    }
}

/// Recursive directory copy; the destination must not exist
fn copy_tree(source: &Path, destination: &Path) -> io::Result<()> {
    fs::create_dir(destination)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = destination.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Rename, falling back to copy-then-delete when a rename is impossible (e.g. across volumes)
pub(crate) fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied) => Err(e),
        Err(e) => {
            debug!("rename failed ({}), copying {:?} instead", e, source);
            copy_then_remove(source, destination)
        }
    }
}

/// Copy, then delete the source. Any failure leaves the source as the only copy,
/// unless a directory source was already partly deleted.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let is_dir = fs::symlink_metadata(source)?.is_dir();
    let before = tree_size(source);

    if let Err(e) = copy_entry(source, destination) {
        discard(destination);
        return Err(e);
    }

    let removed = if is_dir {
        fs::remove_dir_all(source)
    } else {
        fs::remove_file(source)
    };
    if let Err(e) = removed {
        if tree_size(source) == before {
            discard(destination);
        } else {
            warn!("{:?} was partly removed; keeping the full copy at {:?}", source, destination);
        }
        return Err(e);
    }
    Ok(())
}

/// Best-effort removal of a transfer target this process just created
fn discard(path: &Path) {
    let removed = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(_) => return,
    };
    if let Err(e) = removed {
        warn!("Could not remove incomplete copy {:?}: {}", path, e);
    }
}
