// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Foldersmith: local AI-assisted file organizer
//!
//! Scans a directory, asks local models (or deterministic rules) where each file belongs
//! in a fixed two-level taxonomy, then relocates files with collision-free names,
//! SHA-256 verification and an undoable audit log.

pub mod analyzers;
pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod integrity;
pub mod model;
pub mod ollama;
pub mod organizer;
pub mod planner;
pub mod resolver;
pub mod scanner;
pub mod suggester;
pub mod taxonomy;

pub use config::AppConfig;
pub use error::{FoldersmithError, Result};
