// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! End-to-end workflow: scan, analyze, suggest, plan, confirm, execute

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyzers::AnalyzerRegistry;
use crate::audit::AuditLog;
use crate::executor::{MoveExecutor, TransferMode};
use crate::integrity::IntegrityVerifier;
use crate::model::{MovePlan, PlanStatus, Suggestion};
use crate::ollama::OllamaClient;
use crate::planner::{OrganizationPlanner, Plan, Summary};
use crate::scanner::FileScanner;
use crate::suggester::{LlmSuggester, PathSuggester, RuleSuggester};
use crate::taxonomy::Taxonomy;
use crate::{AppConfig, Result};

pub const NO_SUGGESTION_REASON: &str = "no destination suggested";

/// Outcome of one organize run
#[derive(Debug, Clone, Serialize)]
pub struct OrganizeReport {
    pub dry_run: bool,
    pub summary: Summary,
    pub plan: Plan,
}

impl OrganizeReport {
    /// (file name, reason) for every skipped or failed file
    pub fn problems(&self) -> Vec<(String, String)> {
        self.plan.problems()
    }
}

/// Drives a whole run over one directory
pub struct Organizer {
    config: AppConfig,
    output_root: PathBuf,
    mode: TransferMode,
    registry: AnalyzerRegistry,
    suggester: Box<dyn PathSuggester>,
}

impl Organizer {
    /// AI-assisted organizer when the engine is enabled, rule-based otherwise
    pub fn new(config: AppConfig, output_root: impl Into<PathBuf>, mode: TransferMode) -> Result<Self> {
        if !config.ai_engine.enabled {
            return Ok(Self::offline(config, output_root, mode));
        }

        let client = Arc::new(OllamaClient::new(&config.ai_engine)?);
        let registry = AnalyzerRegistry::with_defaults(&config, client.clone());
        let suggester = LlmSuggester::new(client, &config.ai_engine.models.text, rule_suggester(&config));

        Ok(Self {
            output_root: output_root.into(),
            mode,
            registry,
            suggester: Box::new(suggester),
            config,
        })
    }

    /// No analyzers and deterministic rule suggestions; never touches the network
    pub fn offline(config: AppConfig, output_root: impl Into<PathBuf>, mode: TransferMode) -> Self {
        Self {
            output_root: output_root.into(),
            mode,
            registry: AnalyzerRegistry::new(),
            suggester: Box::new(rule_suggester(&config)),
            config,
        }
    }

    pub fn with_suggester(mut self, suggester: Box<dyn PathSuggester>) -> Self {
        self.suggester = suggester;
        self
    }

    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Run the workflow. `confirm` sees the plan and is only consulted for real runs
    /// with at least one planned entry; answering `false` cancels everything.
    pub async fn organize<F>(&self, root: &Path, dry_run: bool, confirm: F) -> Result<OrganizeReport>
    where
        F: FnOnce(&Plan) -> bool,
    {
        let mut records = FileScanner::new(root, self.config.scanner.clone())
            .exclude(&self.output_root)
            .scan()?;

        if !self.registry.is_empty() {
            info!("Analyzing {} files", records.len());
            for record in records.iter_mut() {
                record.ai_insights = self.registry.analyze(record).await;
            }
        }

        info!("Suggesting destinations with {} suggester", self.suggester.name());
        let map = self.suggester.suggest(&records).await?;

        let planner = OrganizationPlanner::new(&self.output_root, Taxonomy::new(self.config.taxonomy.clone()));
        let mut plan = planner.plan(&Suggestion::from_records(&records, &map));
        for record in records.iter().filter(|r| !map.contains_key(&r.path)) {
            let suggestion = Suggestion::new(record.path.clone(), record.kind, "");
            plan.moves.push(MovePlan::skipped(&suggestion, NO_SUGGESTION_REASON));
        }

        if dry_run {
            info!("Dry run: {} of {} files would be organized", plan.planned_count(), plan.moves.len());
            return Ok(OrganizeReport {
                dry_run,
                summary: plan.summary(),
                plan,
            });
        }

        if plan.planned_count() > 0 {
            if confirm(&plan) {
                let audit = AuditLog::open(&self.config.organizer.log_path)?;
                let verifier = IntegrityVerifier::new(self.config.organizer.checksum_ceiling_bytes);
                let mut executor = MoveExecutor::new(self.mode, verifier, audit);
                plan.execute(&mut executor);
            } else {
                warn!("Organization cancelled");
                plan.cancel();
            }
        }

        Ok(OrganizeReport {
            dry_run,
            summary: plan.summary(),
            plan,
        })
    }
}

fn rule_suggester(config: &AppConfig) -> RuleSuggester {
    RuleSuggester::new(
        Taxonomy::new(config.taxonomy.clone()),
        config.organizer.large_file_threshold_bytes,
    )
}

/// Human-readable plan listing, relative to the output root where possible
pub fn render_plan(plan: &Plan, output_root: &Path) -> String {
    let mut lines = Vec::with_capacity(plan.moves.len());
    for m in &plan.moves {
        let line = match (m.status, &m.resolved) {
            (PlanStatus::Planned | PlanStatus::Executed, Some(dest)) => {
                let shown = dest.strip_prefix(output_root).unwrap_or(dest);
                format!("  {} -> {}", m.file_name(), shown.display())
            }
            _ => format!(
                "  {} (skipped: {})",
                m.file_name(),
                m.reason.as_deref().unwrap_or("no reason given")
            ),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AppConfig) {
        let dir = TempDir::new().unwrap();
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        fs::write(inbox.join("etl.py"), b"print('hi')").unwrap();
        fs::write(inbox.join("Budget.xlsx"), b"fake sheet").unwrap();

        let mut config = AppConfig::default();
        config.organizer.log_path = dir.path().join("logs/file_organizer.json");
        (dir, config)
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let (dir, config) = setup();
        let out = dir.path().join("out");
        let organizer = Organizer::offline(config, &out, TransferMode::Move);

        let report = organizer
            .organize(&dir.path().join("inbox"), true, |_| panic!("dry run must not ask"))
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.summary.pending, 2);
        assert!(!out.exists());
        assert!(dir.path().join("inbox/etl.py").exists());
        assert!(!dir.path().join("logs/file_organizer.json").exists());
    }

    #[tokio::test]
    async fn test_declined_confirmation_cancels() {
        let (dir, config) = setup();
        let organizer = Organizer::offline(config, dir.path().join("out"), TransferMode::Move);

        let report = organizer.organize(&dir.path().join("inbox"), false, |_| false).await.unwrap();

        assert_eq!(report.summary.skipped, 2);
        assert_eq!(report.summary.organized, 0);
        assert!(report.problems().iter().all(|(_, reason)| reason == "cancelled by user"));
        assert!(dir.path().join("inbox/etl.py").exists());
    }

    #[tokio::test]
    async fn test_confirmed_run_moves_with_rules() {
        let (dir, config) = setup();
        let out = dir.path().join("out");
        let organizer = Organizer::offline(config, &out, TransferMode::Move);

        let report = organizer.organize(&dir.path().join("inbox"), false, |_| true).await.unwrap();

        assert_eq!(report.summary.organized, 2);
        assert!(!dir.path().join("inbox/etl.py").exists());
        let rendered = render_plan(&report.plan, &out);
        assert!(rendered.contains("etl.py -> dev/python/"));
        assert!(rendered.contains("Budget.xlsx -> documents/excel/"));
        assert_eq!(AuditLog::open(dir.path().join("logs/file_organizer.json")).unwrap().len(), 2);
    }
}
