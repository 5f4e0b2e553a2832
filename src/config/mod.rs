// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Foldersmith

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Move, copy and audit settings
    #[serde(default)]
    pub organizer: OrganizerConfig,

    /// AI engine configuration
    #[serde(default)]
    pub ai_engine: EngineConfig,

    /// Category name -> allowed subcategory names
    #[serde(default = "default_taxonomy")]
    pub taxonomy: BTreeMap<String, Vec<String>>,

    /// Directory walk settings
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Prompt templates
    #[serde(default)]
    pub prompts: PromptConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OrganizerConfig {
    /// Output root, relative to the organized directory unless absolute
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Copy instead of move (sources are preserved)
    #[serde(default = "default_true")]
    pub copy_mode: bool,
    #[serde(default = "default_ceiling")]
    pub checksum_ceiling_bytes: u64,
    #[serde(default = "default_ceiling")]
    pub large_file_threshold_bytes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default)]
    pub models: ModelConfig,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_vision_model")]
    pub vision: String,
    #[serde(default = "default_text_model")]
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
    /// Glob patterns matched against file names
    #[serde(default = "default_ignore_files")]
    pub ignore_files: Vec<String>,
    #[serde(default = "default_project_indicators")]
    pub project_indicators: Vec<String>,
    #[serde(default = "default_true")]
    pub skip_projects: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_image_prompt")]
    pub image: String,
    #[serde(default = "default_ocr_prompt")]
    pub ocr: String,
    #[serde(default = "default_document_prompt")]
    pub document: String,
    #[serde(default = "default_csv_prompt")]
    pub csv: String,
    #[serde(default = "default_script_prompt")]
    pub script: String,
}

// Default value functions
fn default_true() -> bool { true }
fn default_output_dir() -> PathBuf { PathBuf::from("organized_files") }
fn default_log_path() -> PathBuf { PathBuf::from("logs/file_organizer.json") }
fn default_ceiling() -> u64 { 100 * 1024 * 1024 }
fn default_engine_url() -> String { "http://localhost:11434".to_string() }
fn default_timeout() -> u64 { 120 }
fn default_retries() -> u32 { 2 }
fn default_vision_model() -> String { "moondream".to_string() }
fn default_text_model() -> String { "mistral:latest".to_string() }

fn default_taxonomy() -> BTreeMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 12] = [
        ("documents", &["pdf", "word", "excel"]),
        ("finance", &["invoices", "receipts"]),
        ("work", &["projects", "other"]),
        ("studies", &["notes", "assignments"]),
        ("health", &["training", "insurance"]),
        ("photos", &["camera", "phone", "screenshots"]),
        ("software", &["installers", "configs"]),
        ("archives", &["zip", "rar"]),
        ("hidden", &[]),
        ("large", &[]),
        ("misc", &[]),
        ("dev", &["python", "javascript", "java", "other"]),
    ];
    entries
        .into_iter()
        .map(|(cat, subs)| (cat.to_string(), subs.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn default_ignore_dirs() -> Vec<String> {
    vec![
        ".git", ".svn", ".hg",
        "__pycache__", ".venv", "venv", "env", ".pytest_cache",
        "node_modules", ".npm",
        "build", "dist", "target", "out", "bin",
        ".vscode", ".idea", ".vs", ".eclipse",
        ".cache", "tmp", "temp", ".tmp",
        "organized_files", "logs",
    ].into_iter().map(String::from).collect()
}

fn default_ignore_files() -> Vec<String> {
    vec![".DS_Store", "Thumbs.db", "desktop.ini", "*.tmp", "*.cache", "*.log", "*.part", "*.crdownload"]
        .into_iter().map(String::from).collect()
}

fn default_project_indicators() -> Vec<String> {
    vec![
        "requirements.txt", "package.json", "setup.py", ".gitignore", ".git", ".venv", "venv",
        "Cargo.toml", "pom.xml", "build.gradle", "Makefile",
    ].into_iter().map(String::from).collect()
}

fn default_image_prompt() -> String {
    "Identify the single most prominent object in this image and describe the scene. \
     Reply with JSON only: {\"primary_object\": \"<one word>\", \"scene\": \"<one of: personal, \
     work, screenshot, meme, document, nature, product, other>\", \"has_text\": <true|false>}"
        .to_string()
}

fn default_ocr_prompt() -> String {
    "Transcribe all readable text in this image. Return ONLY the text, no commentary.".to_string()
}

fn default_document_prompt() -> String {
    "You are an expert document classifier. Classify the document below. Categories: resume, \
     insurance, certificate, report, invoice, receipt, manual, notes, email, article, other. \
     Answer with ONLY the category."
        .to_string()
}

fn default_csv_prompt() -> String {
    "You are a librarian labelling data files. What kind of data is this CSV? Common labels: \
     financial-transactions, customer-contacts, inventory-catalog, employee-data, \
     website-analytics, sales-data, sensor-data, survey-responses, user-activity. \
     Answer with ONLY the label."
        .to_string()
}

fn default_script_prompt() -> String {
    "You are a librarian labelling script files. Judge the main purpose from the commands used. \
     Labels: network-monitoring, backup-automation, log-analysis, web-scraper, data-processing, \
     system-admin, deployment-script, file-management. Answer with ONLY the label."
        .to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            organizer: OrganizerConfig::default(),
            ai_engine: EngineConfig::default(),
            taxonomy: default_taxonomy(),
            scanner: ScannerConfig::default(),
            prompts: PromptConfig::default(),
        }
    }
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            log_path: default_log_path(),
            copy_mode: true,
            checksum_ceiling_bytes: default_ceiling(),
            large_file_threshold_bytes: default_ceiling(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_engine_url(),
            models: ModelConfig::default(),
            timeout_secs: default_timeout(),
            retries: default_retries(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision: default_vision_model(),
            text: default_text_model(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: default_ignore_dirs(),
            ignore_files: default_ignore_files(),
            project_indicators: default_project_indicators(),
            skip_projects: true,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            image: default_image_prompt(),
            ocr: default_ocr_prompt(),
            document: default_document_prompt(),
            csv: default_csv_prompt(),
            script: default_script_prompt(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| crate::FoldersmithError::Config(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.taxonomy.is_empty() {
            return Err(crate::FoldersmithError::Config("taxonomy must declare at least one category".to_string()));
        }
        if let Some(bad) = self.taxonomy.keys().find(|k| k.is_empty() || k.contains(['/', '\\'])) {
            return Err(crate::FoldersmithError::Config(format!("invalid category name {:?}", bad)));
        }
        if self.organizer.checksum_ceiling_bytes == 0 {
            return Err(crate::FoldersmithError::Config("checksum_ceiling_bytes must be positive".to_string()));
        }
        for pattern in &self.scanner.ignore_files {
            glob::Pattern::new(pattern).map_err(|e| {
                crate::FoldersmithError::Config(format!("invalid ignore pattern {:?}: {}", pattern, e))
            })?;
        }
        Ok(())
    }

    /// Output root for a given organized directory
    pub fn output_root(&self, root: &Path) -> PathBuf {
        if self.organizer.output_dir.is_absolute() {
            self.organizer.output_dir.clone()
        } else {
            root.join(&self.organizer.output_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.taxonomy.len(), 12);
        assert_eq!(config.taxonomy["finance"], vec!["invoices", "receipts"]);
        assert_eq!(config.organizer.log_path, PathBuf::from("logs/file_organizer.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foldersmith.json");
        std::fs::write(&path, r#"{"organizer": {"copy_mode": false}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert!(!config.organizer.copy_mode);
        assert_eq!(config.organizer.checksum_ceiling_bytes, 100 * 1024 * 1024);
        assert!(config.taxonomy.contains_key("documents"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foldersmith.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::FoldersmithError::Config(_))));
    }

    #[test]
    fn test_empty_taxonomy_rejected() {
        let mut config = AppConfig::default();
        config.taxonomy.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        AppConfig::default().save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.taxonomy, AppConfig::default().taxonomy);
    }

    #[test]
    fn test_output_root_relative_and_absolute() {
        let mut config = AppConfig::default();
        assert_eq!(config.output_root(Path::new("/data")), PathBuf::from("/data/organized_files"));
        config.organizer.output_dir = PathBuf::from("/elsewhere");
        assert_eq!(config.output_root(Path::new("/data")), PathBuf::from("/elsewhere"));
    }
}
