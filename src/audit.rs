// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Append-only audit log of realized moves and copies, with single-step undo
//!
//! The on-disk form is one JSON envelope `{"version": "1.0", "moves": [...]}` rewritten in
//! full after every change. Reads are lenient: a corrupt file loads as an empty log.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::Result;

pub const LOG_VERSION: &str = "1.0";

/// One completed relocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Local time, ISO-8601 without offset
    pub timestamp: NaiveDateTime,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// SHA-256 of the content; absent for directories and files above the checksum ceiling
    pub file_hash: Option<String>,
    pub size: Option<u64>,
}

impl AuditEntry {
    pub fn new(source: PathBuf, destination: PathBuf, file_hash: Option<String>, size: Option<u64>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            source,
            destination,
            file_hash,
            size,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: String,
    moves: Vec<AuditEntry>,
}

/// Result of an undo attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    /// The destination was moved back to the source and the entry removed
    Reverted(AuditEntry),
    /// Nothing recorded
    Empty,
    /// The recorded destination no longer exists
    DestinationMissing(PathBuf),
    /// Something already occupies the original source path (always true after a copy)
    SourceOccupied(PathBuf),
    /// The reverse move itself failed
    Failed(String),
}

impl UndoOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reverted(_))
    }
}

/// Audit log backed by a single JSON file
pub struct AuditLog {
    path: PathBuf,
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    /// Open the log, creating its directory. Only a directory that cannot be created is fatal.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let entries = Self::load(&path);
        debug!("Loaded {} audit entries from {:?}", entries.len(), path);
        Ok(Self { path, entries })
    }

    fn load(path: &Path) -> Vec<AuditEntry> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str::<Envelope>(&content) {
            Ok(envelope) => {
                if envelope.version != LOG_VERSION {
                    warn!("Audit log {:?} has version {}, reading anyway", path, envelope.version);
                }
                envelope.moves
            }
            Err(e) => {
                warn!("Audit log {:?} is unreadable ({}), starting empty", path, e);
                Vec::new()
            }
        }
    }

    /// Record an entry. The in-memory state is kept even if persisting fails.
    pub fn append(&mut self, entry: AuditEntry) -> Result<()> {
        self.entries.push(entry);
        self.persist()
    }

    /// Rewrite the whole envelope through a synced temporary sibling and rename
    fn persist(&self) -> Result<()> {
        let envelope = Envelope {
            version: LOG_VERSION.to_string(),
            moves: self.entries.clone(),
        };

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written = write_synced(&tmp, &envelope)
            .and_then(|()| fs::rename(&tmp, &self.path).map_err(Into::into));
        if written.is_err() && fs::remove_file(&tmp).is_ok() {
            debug!("Removed partial audit log {:?}", tmp);
        }
        written
    }

    /// Last `count` entries, most recent last
    pub fn recent(&self, count: usize) -> &[AuditEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reverse the most recent entry if its destination exists and its source does not.
    ///
    /// Only the newest entry is ever eligible; there is no multi-step transaction.
    pub fn undo_last(&mut self) -> UndoOutcome {
        let Some(last) = self.entries.last().cloned() else {
            return UndoOutcome::Empty;
        };

        if fs::symlink_metadata(&last.destination).is_err() {
            return UndoOutcome::DestinationMissing(last.destination);
        }
        if fs::symlink_metadata(&last.source).is_ok() {
            return UndoOutcome::SourceOccupied(last.source);
        }

        if let Some(parent) = last.source.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return UndoOutcome::Failed(format!("cannot recreate {:?}: {}", parent, e));
            }
        }
        if let Err(e) = crate::executor::relocate(&last.destination, &last.source) {
            return UndoOutcome::Failed(e.to_string());
        }

        self.entries.pop();
        if let Err(e) = self.persist() {
            warn!("Could not save audit log after undo: {}", e);
        }
        info!("Undone: {:?} -> {:?}", last.destination, last.source);
        UndoOutcome::Reverted(last)
    }

    /// Forget every entry
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Serialize into `path` and flush it to disk before returning
fn write_synced(path: &Path, envelope: &Envelope) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, envelope)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
