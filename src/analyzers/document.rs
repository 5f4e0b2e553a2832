// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Document analyzer for text, CSV, scripts and PDFs

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{strip_think, truncate_chars, ContentAnalyzer};
use crate::config::PromptConfig;
use crate::model::{AiInsights, FileRecord};
use crate::ollama::OllamaClient;
use crate::{FoldersmithError, Result};

/// Larger files are never sent for text analysis (1 MiB)
pub const MAX_ANALYZED_SIZE: u64 = 1024 * 1024;

/// Characters of extracted text placed in the prompt
const MAX_EXCERPT: usize = 5000;

/// Labels the prompts ask for, longest first so contained matches prefer the specific one
const KNOWN_LABELS: &[&str] = &[
    "financial-transactions",
    "deployment-script",
    "network-monitoring",
    "backup-automation",
    "customer-contacts",
    "website-analytics",
    "inventory-catalog",
    "survey-responses",
    "data-processing",
    "file-management",
    "employee-data",
    "user-activity",
    "log-analysis",
    "system-admin",
    "sensor-data",
    "certificate",
    "web-scraper",
    "sales-data",
    "insurance",
    "article",
    "invoice",
    "receipt",
    "manual",
    "report",
    "resume",
    "config",
    "script",
    "email",
    "notes",
    "other",
];

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "ps1", "bat", "py", "js", "rb", "pl"];

/// Which prompt a document is classified with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavour {
    Document,
    Csv,
    Script,
}

impl Flavour {
    fn of(record: &FileRecord) -> Self {
        let ext = record.suffix.trim_start_matches('.');
        if ext == "csv" {
            Self::Csv
        } else if SCRIPT_EXTENSIONS.contains(&ext) {
            Self::Script
        } else {
            Self::Document
        }
    }
}

/// Analyzer for document files
pub struct DocumentAnalyzer {
    client: Arc<OllamaClient>,
    model: String,
    prompts: PromptConfig,
}

impl DocumentAnalyzer {
    pub fn new(client: Arc<OllamaClient>, model: &str, prompts: &PromptConfig) -> Self {
        Self {
            client,
            model: model.to_string(),
            prompts: prompts.clone(),
        }
    }

    fn prompt(&self, flavour: Flavour) -> &str {
        match flavour {
            Flavour::Document => &self.prompts.document,
            Flavour::Csv => &self.prompts.csv,
            Flavour::Script => &self.prompts.script,
        }
    }
}

/// Text of a PDF
fn extract_pdf_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    pdf_extract::extract_text_from_mem(&bytes)
        .map_err(|e| FoldersmithError::Pdf(format!("Text extraction failed: {}", e)))
}

/// Title from the PDF's info dictionary, if set
fn extract_pdf_title(path: &Path) -> Option<String> {
    let doc = lopdf::Document::load(path).ok()?;
    let info_ref = doc.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_dictionary(info_ref).ok()?;
    let title = info.get(b"Title").ok()?.as_str().ok()?;
    let title = String::from_utf8_lossy(title).trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Leading text of a plain file, lossily decoded
fn extract_plain_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(truncate_chars(&String::from_utf8_lossy(&bytes), MAX_EXCERPT))
}

/// Map a free-form model answer onto the known label vocabulary
pub fn extract_answer(response: &str) -> String {
    let response = strip_think(response).trim().to_lowercase();
    let response = response.trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c.is_whitespace());

    if KNOWN_LABELS.contains(&response) {
        return response.to_string();
    }

    if let Some(label) = KNOWN_LABELS.iter().find(|l| response.contains(*l)) {
        return label.to_string();
    }

    let words: Vec<&str> = response
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .take(3)
        .collect();
    if words.is_empty() {
        "unknown".to_string()
    } else {
        words.join("-")
    }
}

#[async_trait]
impl ContentAnalyzer for DocumentAnalyzer {
    fn name(&self) -> &'static str {
        "document"
    }

    fn supported_extensions(&self) -> &[&str] {
        &[
            "txt", "md", "markdown", "rst", "adoc", "csv", "json", "yaml", "yml", "toml", "xml",
            "html", "log", "pdf", "sh", "bash", "zsh", "ps1", "bat", "py", "js", "rb", "pl",
        ]
    }

    fn priority(&self) -> u8 {
        50
    }

    async fn analyze(&self, record: &FileRecord) -> Result<AiInsights> {
        if record.size > MAX_ANALYZED_SIZE {
            debug!("Skipping text analysis of {} ({} bytes)", record.name, record.size);
            return Ok(AiInsights::default());
        }

        info!("Analyzing document: {:?}", record.path);

        let (text, title) = if record.suffix == ".pdf" {
            let text = extract_pdf_text(&record.path)?;
            (truncate_chars(&text, MAX_EXCERPT), extract_pdf_title(&record.path))
        } else {
            (extract_plain_text(&record.path)?, None)
        };

        let mut insights = AiInsights {
            title,
            analyzer: self.name().to_string(),
            ..Default::default()
        };

        if text.trim().is_empty() {
            return Ok(insights);
        }

        let flavour = Flavour::of(record);
        let prompt = format!("{}\n\nContent:\n{}", self.prompt(flavour), text);
        let response = self.client.generate(&self.model, &prompt).await?;
        insights.content_type = Some(extract_answer(&response));

        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::{EntryKind, FileCategory};
    use std::path::PathBuf;

    fn record(path: PathBuf, suffix: &str, size: u64) -> FileRecord {
        FileRecord {
            name: path.file_name().unwrap().to_string_lossy().into_owned(),
            path,
            suffix: suffix.to_string(),
            category: FileCategory::Document,
            kind: EntryKind::File,
            size,
            modified: "2024-01-01 00:00:00".to_string(),
            mime_type: None,
            content_hash: None,
            ai_insights: None,
        }
    }

    #[test]
    fn test_extract_answer_exact_and_contained() {
        assert_eq!(extract_answer("Invoice"), "invoice");
        assert_eq!(extract_answer("<think>looks financial</think>\nsales-data"), "sales-data");
        assert_eq!(extract_answer("This looks like a resume to me."), "resume");
        assert_eq!(
            extract_answer("it is financial-transactions data"),
            "financial-transactions"
        );
    }

    #[test]
    fn test_extract_answer_falls_back_to_first_words() {
        assert_eq!(extract_answer("Quarterly Planning Memo Draft"), "quarterly-planning-memo");
        assert_eq!(extract_answer("   "), "unknown");
    }

    #[test]
    fn test_flavour_by_suffix() {
        assert_eq!(Flavour::of(&record(PathBuf::from("/a.csv"), ".csv", 1)), Flavour::Csv);
        assert_eq!(Flavour::of(&record(PathBuf::from("/a.sh"), ".sh", 1)), Flavour::Script);
        assert_eq!(Flavour::of(&record(PathBuf::from("/a.md"), ".md", 1)), Flavour::Document);
    }

    #[tokio::test]
    async fn test_large_files_are_not_sent() {
        let client = Arc::new(OllamaClient::new(&EngineConfig::default()).unwrap());
        let analyzer = DocumentAnalyzer::new(client, "mistral", &PromptConfig::default());
        let big = record(PathBuf::from("/nowhere/huge.txt"), ".txt", MAX_ANALYZED_SIZE + 1);

        let insights = analyzer.analyze(&big).await.unwrap();
        assert!(insights.is_empty());
    }

    #[test]
    fn test_plain_text_excerpt_is_bounded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("long.txt");
        std::fs::write(&path, "é".repeat(MAX_EXCERPT * 2)).unwrap();
        assert_eq!(extract_plain_text(&path).unwrap().chars().count(), MAX_EXCERPT);
    }
}
