// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Destination suggestions: deterministic rules, or a local LLM with rules as fallback

use async_trait::async_trait;
use chrono::{Datelike, Local};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyzers::clean_label;
use crate::model::{AiInsights, FileCategory, FileRecord, SuggestionMap};
use crate::ollama::OllamaClient;
use crate::taxonomy::Taxonomy;
use crate::{FoldersmithError, Result};

/// Produces category-relative destinations for scanned records
#[async_trait]
pub trait PathSuggester: Send + Sync {
    fn name(&self) -> &'static str;

    /// Suggestions keyed by absolute source path; records without one are left out
    async fn suggest(&self, records: &[FileRecord]) -> Result<SuggestionMap>;
}

const CAMERA_EXTENSIONS: &[&str] = &["arw", "cr2", "cr3", "nef", "dng", "orf", "rw2"];
const INSTALLER_EXTENSIONS: &[&str] = &["exe", "msi", "dmg", "pkg", "deb", "rpm", "appimage"];
const CONFIG_EXTENSIONS: &[&str] = &["ini", "conf", "cfg", "yaml", "yml", "toml", "json", "plist"];
const SCREENSHOT_HINTS: &[&str] = &["screenshot", "screen shot", "screen-shot", "capture"];

/// Offline, deterministic suggester: `main/sub/YYYY/name.ext`
#[derive(Debug, Clone)]
pub struct RuleSuggester {
    taxonomy: Taxonomy,
    large_threshold: u64,
}

impl RuleSuggester {
    pub fn new(taxonomy: Taxonomy, large_threshold: u64) -> Self {
        Self {
            taxonomy,
            large_threshold,
        }
    }

    /// Destination for one record, or `None` when nothing in the taxonomy fits
    pub fn suggest_one(&self, record: &FileRecord) -> Option<String> {
        let year = record.modified_year().unwrap_or_else(|| Local::now().year());
        let file_name = format!("{}{}", base_name(record), record.suffix);
        let (main, sub) = self.placement(record);

        let candidate = match sub {
            Some(sub) => format!("{}/{}/{}/{}", main, sub, year, file_name),
            None => format!("{}/{}/{}", main, year, file_name),
        };
        if self.taxonomy.validate(&candidate).is_ok() {
            return Some(candidate);
        }

        let fallback = format!("misc/{}/{}", year, file_name);
        match self.taxonomy.validate(&fallback) {
            Ok(()) => Some(fallback),
            Err(e) => {
                debug!("No rule placement for {}: {}", record.name, e);
                None
            }
        }
    }

    fn placement(&self, record: &FileRecord) -> (&'static str, Option<&'static str>) {
        let ext = record.suffix.trim_start_matches('.');
        let name = record.name.to_lowercase();
        let insights = record.ai_insights.as_ref();
        let content = insights.and_then(|i| i.content_type.as_deref()).unwrap_or_default();

        if record.category == FileCategory::Hidden {
            return ("hidden", None);
        }
        if record.size > self.large_threshold {
            return ("large", None);
        }

        match record.category {
            FileCategory::Image => {
                let scene = insights.and_then(|i| i.scene.as_deref());
                if scene == Some("screenshot") || SCREENSHOT_HINTS.iter().any(|h| name.contains(h)) {
                    ("photos", Some("screenshots"))
                } else if CAMERA_EXTENSIONS.contains(&ext) || name.starts_with("dsc") {
                    ("photos", Some("camera"))
                } else {
                    ("photos", Some("phone"))
                }
            }
            FileCategory::Code => match ext {
                "py" | "pyw" | "ipynb" => ("dev", Some("python")),
                "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => ("dev", Some("javascript")),
                "java" => ("dev", Some("java")),
                _ => ("dev", Some("other")),
            },
            FileCategory::Archive => match ext {
                "zip" => ("archives", Some("zip")),
                "rar" => ("archives", Some("rar")),
                _ => ("misc", None),
            },
            FileCategory::Document => document_placement(ext, &name, content),
            _ if INSTALLER_EXTENSIONS.contains(&ext) => ("software", Some("installers")),
            _ if CONFIG_EXTENSIONS.contains(&ext) => ("software", Some("configs")),
            _ => ("misc", None),
        }
    }
}

fn document_placement(ext: &str, name: &str, content: &str) -> (&'static str, Option<&'static str>) {
    if content == "invoice" || name.contains("invoice") {
        return ("finance", Some("invoices"));
    }
    if content == "receipt" || name.contains("receipt") {
        return ("finance", Some("receipts"));
    }
    if content == "insurance" {
        return ("health", Some("insurance"));
    }

    match ext {
        "pdf" => ("documents", Some("pdf")),
        "doc" | "docx" | "odt" | "rtf" => ("documents", Some("word")),
        "xls" | "xlsx" | "xlsm" | "ods" | "csv" => ("documents", Some("excel")),
        _ if content == "notes" => ("studies", Some("notes")),
        _ => ("misc", None),
    }
}

/// Descriptive base name: an insight label when one exists, otherwise the cleaned stem
fn base_name(record: &FileRecord) -> String {
    let from_label = record
        .ai_insights
        .as_ref()
        .and_then(AiInsights::label)
        .map(clean_label)
        .filter(|l| !l.is_empty());

    from_label.unwrap_or_else(|| {
        let stem = sanitize(record.stem());
        if stem.is_empty() {
            "file".to_string()
        } else {
            stem
        }
    })
}

/// Lower-case, keep word characters, dots and hyphens, collapse runs of hyphens
fn sanitize(name: &str) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    replaced
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl PathSuggester for RuleSuggester {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn suggest(&self, records: &[FileRecord]) -> Result<SuggestionMap> {
        Ok(records
            .iter()
            .filter_map(|r| self.suggest_one(r).map(|dest| (r.path.clone(), dest)))
            .collect())
    }
}

/// Per-file view sent to the model
#[derive(Serialize)]
struct PromptFile<'a> {
    original_path: &'a PathBuf,
    name: &'a str,
    suffix: &'a str,
    size: u64,
    modified: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_insights: Option<&'a AiInsights>,
}

/// Asks the text model for one category batch at a time
pub struct LlmSuggester {
    client: Arc<OllamaClient>,
    model: String,
    taxonomy: Taxonomy,
    fallback: RuleSuggester,
}

impl LlmSuggester {
    pub fn new(client: Arc<OllamaClient>, model: &str, fallback: RuleSuggester) -> Self {
        Self {
            client,
            model: model.to_string(),
            taxonomy: fallback.taxonomy.clone(),
            fallback,
        }
    }

    fn build_prompt(&self, category: FileCategory, files: &[&FileRecord]) -> Result<String> {
        let listing: Vec<PromptFile<'_>> = files
            .iter()
            .map(|f| PromptFile {
                original_path: &f.path,
                name: &f.name,
                suffix: &f.suffix,
                size: f.size,
                modified: &f.modified,
                mime_type: f.mime_type.as_deref(),
                ai_insights: f.ai_insights.as_ref(),
            })
            .collect();
        let listing = serde_json::to_string_pretty(&listing)?;
        let categories: Vec<&str> = self.taxonomy.categories().map(|(c, _)| c).collect();

        Ok(format!(
            "You are a file system architect organizing {category} files.\n\
             Suggest a destination path for every file below.\n\n\
             {structure}\n\n\
             {rule}\n\n\
             RULES:\n\
             - Use the structure main_category/sub_category/YYYY/filename.ext\n\
             - Valid categories: {categories}\n\
             - Use the year of the 'modified' date as the year folder\n\
             - Give each file a short descriptive name from its AI insights and keep its extension\n\
             - Relative paths only\n\
             - Reply with a JSON object only: {{\"original_path\": \"new_path\"}}\n\n\
             Files:\n{listing}",
            category = category,
            structure = self.taxonomy.describe(),
            rule = category_rule(category),
            categories = categories.join(", "),
            listing = listing,
        ))
    }

    async fn suggest_batch(&self, category: FileCategory, files: &[&FileRecord]) -> Result<SuggestionMap> {
        let prompt = self.build_prompt(category, files)?;
        let response = self.client.generate(&self.model, &prompt).await?;
        let raw = parse_response(&response)?;

        let known: HashMap<&PathBuf, &FileRecord> = files.iter().map(|f| (&f.path, *f)).collect();
        let mut map = SuggestionMap::new();
        for (source, destination) in raw {
            let source = PathBuf::from(source);
            if !known.contains_key(&source) {
                debug!("Model suggested a path for an unknown file: {:?}", source);
                continue;
            }
            let destination = destination.trim().trim_start_matches("./").to_string();
            if !destination.is_empty() {
                map.insert(source, destination);
            }
        }
        Ok(map)
    }
}

fn category_rule(category: FileCategory) -> &'static str {
    match category {
        FileCategory::Image => "photos/[camera|phone|screenshots]/YYYY/ -> person.jpg, building.jpg, food.jpg",
        FileCategory::Document => {
            "documents/[pdf|word|excel]/YYYY/ or finance/[invoices|receipts]/YYYY/ -> report.pdf, invoice.pdf"
        }
        FileCategory::Video | FileCategory::Audio => "work/projects/YYYY/ or misc/YYYY/ -> presentation.mp4, recording.mp3",
        FileCategory::Archive => "archives/[zip|rar]/YYYY/ -> backup.zip, project.rar",
        FileCategory::Code => "dev/[python|javascript|java|other]/YYYY/ -> script.py, app.js",
        FileCategory::Hidden => "hidden/YYYY/ -> keep the original name",
        FileCategory::Other => "misc/YYYY/ -> descriptive-name.ext",
    }
}

/// Parse a JSON object out of a model reply, tolerating Markdown code fences and prose
pub fn parse_response(raw: &str) -> Result<HashMap<String, String>> {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("```json").or_else(|| content.strip_prefix("```")) {
        content = rest.trim_end().trim_end_matches("```").trim();
    }

    let json = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => {
            return Err(FoldersmithError::Analysis(
                "model reply contains no JSON object".to_string(),
            ))
        }
    };

    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value
        .as_object()
        .ok_or_else(|| FoldersmithError::Analysis("model reply is not a JSON object".to_string()))?;

    Ok(object
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect())
}

#[async_trait]
impl PathSuggester for LlmSuggester {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn suggest(&self, records: &[FileRecord]) -> Result<SuggestionMap> {
        let mut batches: BTreeMap<FileCategory, Vec<&FileRecord>> = BTreeMap::new();
        for record in records {
            batches.entry(record.category).or_default().push(record);
        }

        let mut suggestions = SuggestionMap::new();
        for (category, files) in batches {
            info!("Requesting suggestions for {} {} files", files.len(), category);
            match self.suggest_batch(category, &files).await {
                Ok(map) => suggestions.extend(map),
                Err(e) => {
                    warn!("Suggestion batch for {} failed ({}), using rules", category, e);
                    for record in files {
                        if let Some(dest) = self.fallback.suggest_one(record) {
                            suggestions.insert(record.path.clone(), dest);
                        }
                    }
                }
            }
        }
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, EngineConfig};
    use crate::model::EntryKind;

    fn rules() -> RuleSuggester {
        RuleSuggester::new(Taxonomy::new(AppConfig::default().taxonomy), 100 * 1024 * 1024)
    }

    fn record(name: &str, category: FileCategory) -> FileRecord {
        let suffix = std::path::Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        FileRecord {
            path: PathBuf::from(format!("/inbox/{name}")),
            name: name.to_string(),
            suffix,
            category,
            kind: EntryKind::File,
            size: 2048,
            modified: "2023-06-15 09:30:00".to_string(),
            mime_type: None,
            content_hash: None,
            ai_insights: None,
        }
    }

    fn with_insights(mut record: FileRecord, insights: AiInsights) -> FileRecord {
        record.ai_insights = Some(insights);
        record
    }

    #[test]
    fn test_screenshot_goes_to_photos() {
        let r = record("Screenshot 2023-06-15 at 09.30.png", FileCategory::Image);
        assert_eq!(
            rules().suggest_one(&r).unwrap(),
            "photos/screenshots/2023/screenshot-2023-06-15-at-09.30.png"
        );
    }

    #[test]
    fn test_insight_label_names_the_file() {
        let r = with_insights(
            record("IMG_0042.JPG", FileCategory::Image),
            AiInsights {
                primary_object: Some("golden retriever".into()),
                scene: Some("nature".into()),
                ..Default::default()
            },
        );
        assert_eq!(rules().suggest_one(&r).unwrap(), "photos/phone/2023/golden-retriever.jpg");
    }

    #[test]
    fn test_invoice_documents_go_to_finance() {
        let r = with_insights(
            record("scan_001.pdf", FileCategory::Document),
            AiInsights {
                content_type: Some("invoice".into()),
                ..Default::default()
            },
        );
        assert_eq!(rules().suggest_one(&r).unwrap(), "finance/invoices/2023/invoice.pdf");
    }

    #[test]
    fn test_code_and_formats() {
        assert_eq!(rules().suggest_one(&record("etl.py", FileCategory::Code)).unwrap(), "dev/python/2023/etl.py");
        assert_eq!(
            rules().suggest_one(&record("Budget 2023.xlsx", FileCategory::Document)).unwrap(),
            "documents/excel/2023/budget-2023.xlsx"
        );
        assert_eq!(rules().suggest_one(&record("notes.txt", FileCategory::Document)).unwrap(), "misc/2023/notes.txt");
    }

    #[test]
    fn test_large_and_hidden() {
        let mut big = record("movie.mkv", FileCategory::Video);
        big.size = 200 * 1024 * 1024;
        assert_eq!(rules().suggest_one(&big).unwrap(), "large/2023/movie.mkv");
        assert_eq!(rules().suggest_one(&record(".env", FileCategory::Hidden)).unwrap(), "hidden/2023/.env");
    }

    #[test]
    fn test_every_rule_suggestion_passes_validation() {
        let taxonomy = Taxonomy::new(AppConfig::default().taxonomy);
        let samples = [
            record("a.tar.gz", FileCategory::Archive),
            record("b.zip", FileCategory::Archive),
            record("c.exe", FileCategory::Other),
            record("d.yaml", FileCategory::Other),
            record("e.mp3", FileCategory::Audio),
            record("f.docx", FileCategory::Document),
            record("g.rs", FileCategory::Code),
            record("h.cr2", FileCategory::Image),
        ];
        for r in &samples {
            let dest = rules().suggest_one(r).unwrap();
            taxonomy.validate(&dest).unwrap();
            crate::taxonomy::check_extension(&r.path, &dest).unwrap();
        }
    }

    #[test]
    fn test_custom_taxonomy_without_misc_omits() {
        let mut map = BTreeMap::new();
        map.insert("photos".to_string(), vec!["phone".to_string()]);
        let suggester = RuleSuggester::new(Taxonomy::new(map), u64::MAX);
        assert!(suggester.suggest_one(&record("x.pdf", FileCategory::Document)).is_none());
    }

    #[test]
    fn test_rule_suggester_maps_by_path() {
        let records = vec![
            record("etl.py", FileCategory::Code),
            record(".bashrc", FileCategory::Hidden),
        ];
        let map = tokio_test::block_on(rules().suggest(&records)).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&PathBuf::from("/inbox/.bashrc")], "hidden/2023/.bashrc");
    }

    #[test]
    fn test_parse_response_strips_fences() {
        let map = parse_response("```json\n{\"/inbox/a.pdf\": \"documents/pdf/2023/report.pdf\"}\n```").unwrap();
        assert_eq!(map["/inbox/a.pdf"], "documents/pdf/2023/report.pdf");

        let map = parse_response("Here you go: {\"/x\": \"misc/2023/x\", \"/y\": 3}").unwrap();
        assert_eq!(map.len(), 1);

        assert!(parse_response("no idea").is_err());
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_to_rules() {
        let config = EngineConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            retries: 0,
            ..EngineConfig::default()
        };
        let client = Arc::new(OllamaClient::new(&config).unwrap());
        let suggester = LlmSuggester::new(client, "mistral", rules());

        let records = vec![record("etl.py", FileCategory::Code)];
        let map = suggester.suggest(&records).await.unwrap();
        assert_eq!(map[&PathBuf::from("/inbox/etl.py")], "dev/python/2023/etl.py");
    }

    #[test]
    fn test_prompt_lists_taxonomy_and_files() {
        let client = Arc::new(OllamaClient::new(&EngineConfig::default()).unwrap());
        let suggester = LlmSuggester::new(client, "mistral", rules());
        let r = record("etl.py", FileCategory::Code);

        let prompt = suggester.build_prompt(FileCategory::Code, &[&r]).unwrap();
        assert!(prompt.contains("dev/ -> python, javascript, java, other"));
        assert!(prompt.contains("/inbox/etl.py"));
        assert!(prompt.contains("main_category/sub_category/YYYY/filename.ext"));
    }
}
