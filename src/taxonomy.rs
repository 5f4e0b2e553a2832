// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Two-level category vocabulary that every organized destination must follow

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::{FoldersmithError, Result};

/// Fixed mapping from category name to its allowed subcategories.
///
/// A category with an empty subcategory set takes its second component freely
/// (typically a year folder or the file name itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: BTreeMap<String, Vec<String>>,
}

impl Taxonomy {
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    pub fn subcategories(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(|v| v.as_slice())
    }

    /// Validate a category-relative destination such as `finance/invoices/2024/x.pdf`.
    pub fn validate(&self, destination: &str) -> Result<()> {
        let parts = relative_components(destination)?;

        if parts.len() < 2 {
            return Err(FoldersmithError::Validation(format!(
                "destination {:?} must contain a category folder and a file name",
                destination
            )));
        }

        let category = parts[0];
        let subcategories = self.categories.get(category).ok_or_else(|| {
            FoldersmithError::Validation(format!(
                "unknown category {:?} in {:?}",
                category, destination
            ))
        })?;

        // Second component is a subcategory only when something follows it
        if parts.len() > 2 && !subcategories.is_empty() {
            let sub = parts[1];
            if !subcategories.iter().any(|s| s == sub) {
                return Err(FoldersmithError::Validation(format!(
                    "invalid subcategory {:?} for category {:?} (allowed: {})",
                    sub,
                    category,
                    subcategories.join(", ")
                )));
            }
        }

        Ok(())
    }

    /// Prompt-friendly description of the directory structure
    pub fn describe(&self) -> String {
        let mut lines = vec!["DIRECTORY STRUCTURE:".to_string()];
        for (category, subs) in &self.categories {
            if subs.is_empty() {
                lines.push(format!("- {}/ -> direct year folders", category));
            } else {
                lines.push(format!("- {}/ -> {}", category, subs.join(", ")));
            }
        }
        lines.join("\n")
    }
}

/// Split a destination into normal components, rejecting absolute paths and traversal
fn relative_components(destination: &str) -> Result<Vec<&str>> {
    if destination.trim().is_empty() {
        return Err(FoldersmithError::Validation("empty destination".to_string()));
    }

    let mut parts = Vec::new();
    for component in Path::new(destination).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(s) => parts.push(s),
                None => {
                    return Err(FoldersmithError::Validation(format!(
                        "destination {:?} is not valid UTF-8",
                        destination
                    )))
                }
            },
            Component::CurDir => {}
            _ => {
                return Err(FoldersmithError::Validation(format!(
                    "destination {:?} must be a relative path without '..'",
                    destination
                )))
            }
        }
    }
    Ok(parts)
}

/// Extensions implied by subcategories named after a file format
fn format_family(subcategory: &str) -> Option<&'static [&'static str]> {
    let family: &'static [&'static str] = match subcategory {
        "pdf" => &["pdf"],
        "word" => &["doc", "docx", "odt", "rtf"],
        "excel" => &["xls", "xlsx", "xlsm", "ods", "csv"],
        "zip" => &["zip"],
        "rar" => &["rar"],
        "python" => &["py", "pyw", "ipynb"],
        "javascript" => &["js", "mjs", "cjs", "jsx", "ts", "tsx"],
        "java" => &["java", "jar", "class"],
        _ => return None,
    };
    Some(family)
}

/// Reject suggestions whose extension differs from the source's (compared case-insensitively)
/// or does not fit a format-named subcategory such as `documents/pdf`.
pub fn check_extension(source: &Path, destination: &str) -> Result<()> {
    let lower = |p: &Path| {
        p.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };
    let from = lower(source);
    let to = lower(Path::new(destination));

    if from != to {
        return Err(FoldersmithError::Validation(format!(
            "extension mismatch: {} has {:?} but suggestion {:?} has {:?}",
            source.display(),
            from,
            destination,
            to
        )));
    }

    let parts = relative_components(destination)?;
    if parts.len() > 2 {
        if let Some(family) = format_family(parts[1]) {
            if !family.contains(&to.as_str()) {
                return Err(FoldersmithError::Validation(format!(
                    "extension mismatch: {:?} files do not belong in {}/{}",
                    to, parts[0], parts[1]
                )));
            }
        }
    }
    Ok(())
}
