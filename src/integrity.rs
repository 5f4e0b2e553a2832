// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! SHA-256 integrity checks around copies and moves

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::{FoldersmithError, Result};

/// Read buffer size for streaming hashes (64 KiB)
const BUFFER_SIZE: usize = 64 * 1024;

/// Default size ceiling above which verification is skipped (100 MiB)
pub const DEFAULT_CEILING: u64 = 100 * 1024 * 1024;

/// Computes and compares content digests.
///
/// Files at or above the ceiling are never hashed; their audit entries carry no digest.
#[derive(Debug, Clone, Copy)]
pub struct IntegrityVerifier {
    ceiling: u64,
}

impl Default for IntegrityVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING)
    }
}

impl IntegrityVerifier {
    pub fn new(ceiling: u64) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Whether `path` is a plain file under the ceiling
    pub fn applies_to(&self, path: &Path) -> Result<bool> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(meta.is_file() && meta.len() < self.ceiling)
    }

    /// Hex SHA-256 of a file, streamed in fixed-size chunks
    pub fn checksum(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let read = reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Digest of `path` if it is eligible for verification
    pub fn capture(&self, path: &Path) -> Result<Option<String>> {
        if self.applies_to(path)? {
            self.checksum(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Recompute the digest of `destination` and compare it with the one captured from `source`.
    pub fn verify(&self, source: &Path, source_digest: &str, destination: &Path) -> Result<()> {
        let actual = self.checksum(destination)?;
        if actual != source_digest {
            return Err(FoldersmithError::DataIntegrity {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                expected: source_digest.to_string(),
                actual,
            });
        }
        Ok(())
    }
}
