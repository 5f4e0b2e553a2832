// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Content analyzers that enrich scanned records with AI insights

pub mod document;
pub mod image;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::{AiInsights, FileRecord};
use crate::ollama::OllamaClient;
use crate::{AppConfig, Result};

/// Trait for content analyzers
#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    /// Name of this analyzer
    fn name(&self) -> &'static str;

    /// File extensions this analyzer handles, without the dot
    fn supported_extensions(&self) -> &[&str];

    /// Check if this analyzer can handle a record
    fn can_handle(&self, record: &FileRecord) -> bool {
        let ext = record.suffix.trim_start_matches('.');
        !ext.is_empty() && self.supported_extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Priority (higher = preferred when multiple analyzers match)
    fn priority(&self) -> u8 {
        50
    }

    async fn analyze(&self, record: &FileRecord) -> Result<AiInsights>;
}

/// Registry of content analyzers, kept sorted by priority
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn ContentAnalyzer>>,
}

impl AnalyzerRegistry {
    /// Empty registry; every record analyzes to nothing
    pub fn new() -> Self {
        Self { analyzers: Vec::new() }
    }

    /// Image and document analyzers sharing one engine client
    pub fn with_defaults(config: &AppConfig, client: Arc<OllamaClient>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(image::ImageAnalyzer::new(
            client.clone(),
            &config.ai_engine.models.vision,
            &config.prompts,
        )));
        registry.register(Box::new(document::DocumentAnalyzer::new(
            client,
            &config.ai_engine.models.text,
            &config.prompts,
        )));
        registry
    }

    /// Register a new analyzer
    pub fn register(&mut self, analyzer: Box<dyn ContentAnalyzer>) {
        self.analyzers.push(analyzer);
        self.analyzers.sort_by_key(|a| std::cmp::Reverse(a.priority()));
    }

    /// Find the best analyzer for a record
    pub fn find_analyzer(&self, record: &FileRecord) -> Option<&dyn ContentAnalyzer> {
        self.analyzers
            .iter()
            .find(|a| a.can_handle(record))
            .map(|a| a.as_ref())
    }

    /// Insights for a record, or `None` when no analyzer applies or analysis failed
    pub async fn analyze(&self, record: &FileRecord) -> Option<AiInsights> {
        let analyzer = self.find_analyzer(record)?;
        debug!("Analyzing {} with {}", record.name, analyzer.name());

        match analyzer.analyze(record).await {
            Ok(insights) if !insights.is_empty() => Some(insights),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not analyze {}: {}", record.name, e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    pub fn analyzer_names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce free-form model output to a lower-case, hyphen-separated label
pub fn clean_label(raw: &str) -> String {
    let mut clean = raw.trim().replace(['\n', '\r'], " ");

    // Remove common chat prefixes
    if let Some(idx) = clean.find(':') {
        if idx < 30 {
            clean = clean[idx + 1..].trim().to_string();
        }
    }

    clean = clean
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect::<String>();

    clean
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Strip reasoning blocks some models emit before the answer
pub fn strip_think(response: &str) -> &str {
    match response.rfind("</think>") {
        Some(idx) if response.contains("<think>") => &response[idx + "</think>".len()..],
        _ => response,
    }
}

/// Truncate on a character boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryKind, FileCategory};
    use std::path::PathBuf;

    struct Fixed(&'static str, u8, Option<&'static str>);

    #[async_trait]
    impl ContentAnalyzer for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn supported_extensions(&self) -> &[&str] {
            &["txt"]
        }
        fn priority(&self) -> u8 {
            self.1
        }
        async fn analyze(&self, _record: &FileRecord) -> Result<AiInsights> {
            match self.2 {
                Some(label) => Ok(AiInsights {
                    content_type: Some(label.to_string()),
                    analyzer: self.0.to_string(),
                    ..Default::default()
                }),
                None => Err(crate::FoldersmithError::Analysis("boom".into())),
            }
        }
    }

    fn record(name: &str, suffix: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(format!("/src/{name}")),
            name: name.to_string(),
            suffix: suffix.to_string(),
            category: FileCategory::Document,
            kind: EntryKind::File,
            size: 10,
            modified: "2024-01-01 00:00:00".to_string(),
            mime_type: None,
            content_hash: None,
            ai_insights: None,
        }
    }

    #[tokio::test]
    async fn test_highest_priority_wins() {
        let mut registry = AnalyzerRegistry::new();
        registry.register(Box::new(Fixed("low", 10, Some("notes"))));
        registry.register(Box::new(Fixed("high", 90, Some("report"))));

        assert_eq!(registry.analyzer_names(), vec!["high", "low"]);
        let insights = registry.analyze(&record("a.txt", ".txt")).await.unwrap();
        assert_eq!(insights.content_type.as_deref(), Some("report"));
        assert!(registry.analyze(&record("a.bin", ".bin")).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_none() {
        let mut registry = AnalyzerRegistry::new();
        registry.register(Box::new(Fixed("broken", 50, None)));
        assert!(registry.analyze(&record("a.txt", ".txt")).await.is_none());
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("Category: Sales Data\n"), "sales-data");
        assert_eq!(clean_label("\"invoice\"."), "invoice");
        assert_eq!(clean_label("golden retriever"), "golden-retriever");
    }

    #[test]
    fn test_strip_think() {
        assert_eq!(strip_think("<think>hmm</think> resume").trim(), "resume");
        assert_eq!(strip_think("resume"), "resume");
    }
}
