// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Batch planning: validates suggestions and pre-resolves every destination
//! before anything on disk changes.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::executor::MoveExecutor;
use crate::model::{MovePlan, PlanStatus, Suggestion};
use crate::resolver::PathConflictResolver;
use crate::taxonomy::{check_extension, Taxonomy};
use crate::Result;

pub const CANCELLED_REASON: &str = "cancelled by user";

/// Turns raw suggestions into a conflict-free plan
pub struct OrganizationPlanner {
    output_root: PathBuf,
    taxonomy: Taxonomy,
    resolver: PathConflictResolver,
}

impl OrganizationPlanner {
    pub fn new(output_root: impl Into<PathBuf>, taxonomy: Taxonomy) -> Self {
        Self {
            output_root: output_root.into(),
            taxonomy,
            resolver: PathConflictResolver::new(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Plan suggestions in input order; earlier suggestions keep the plain name on collision.
    ///
    /// Invalid suggestions become skipped entries carrying the reason.
    pub fn plan(&self, suggestions: &[Suggestion]) -> Plan {
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        let mut moves = Vec::with_capacity(suggestions.len());

        for suggestion in suggestions {
            match self.plan_one(suggestion, &reserved) {
                Ok(resolved) => {
                    debug!("Planned {:?} -> {:?}", suggestion.source, resolved);
                    reserved.insert(resolved.clone());
                    moves.push(MovePlan::planned(suggestion, resolved));
                }
                Err(e) => {
                    warn!("Skipping {:?}: {}", suggestion.source, e);
                    moves.push(MovePlan::skipped(suggestion, e.to_string()));
                }
            }
        }

        Plan { moves }
    }

    fn plan_one(&self, suggestion: &Suggestion, reserved: &HashSet<PathBuf>) -> Result<PathBuf> {
        let destination = suggestion.destination.trim();
        self.taxonomy.validate(destination)?;
        check_extension(&suggestion.source, destination)?;

        let candidate = self.output_root.join(destination);
        self.resolver.resolve(&candidate, suggestion.kind, reserved)
    }
}

/// A planned batch awaiting confirmation
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub moves: Vec<MovePlan>,
}

impl Plan {
    /// Entries still eligible for execution
    pub fn planned(&self) -> impl Iterator<Item = &MovePlan> {
        self.moves.iter().filter(|m| m.status == PlanStatus::Planned)
    }

    pub fn planned_count(&self) -> usize {
        self.planned().count()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Negative confirmation: every pending entry becomes skipped
    pub fn cancel(&mut self) {
        for m in self.moves.iter_mut().filter(|m| m.status == PlanStatus::Planned) {
            m.status = PlanStatus::Skipped;
            m.reason = Some(CANCELLED_REASON.to_string());
        }
    }

    /// Execute every planned entry in order. One failing file never stops the batch.
    pub fn execute(&mut self, executor: &mut MoveExecutor) -> Summary {
        for m in self.moves.iter_mut().filter(|m| m.status == PlanStatus::Planned) {
            let Some(destination) = m.resolved.clone() else {
                m.status = PlanStatus::Skipped;
                m.reason = Some("no resolved destination".to_string());
                continue;
            };

            match executor.execute(&m.source, &destination) {
                Ok(realized) => {
                    m.resolved = Some(realized);
                    m.status = PlanStatus::Executed;
                }
                Err(e) => {
                    error!("Error organizing {}: {}", m.file_name(), e);
                    m.status = PlanStatus::Failed;
                    m.reason = Some(e.to_string());
                }
            }
        }

        let summary = self.summary();
        info!(
            "Organized {}/{} files ({} skipped, {} failed)",
            summary.organized, summary.total, summary.skipped, summary.failed
        );
        summary
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.moves.len(),
            ..Default::default()
        };
        for m in &self.moves {
            match m.status {
                PlanStatus::Executed => summary.organized += 1,
                PlanStatus::Skipped => summary.skipped += 1,
                PlanStatus::Failed => summary.failed += 1,
                PlanStatus::Planned => summary.pending += 1,
            }
        }
        summary
    }

    /// (file name, reason) for every skipped or failed entry
    pub fn problems(&self) -> Vec<(String, String)> {
        self.moves
            .iter()
            .filter(|m| matches!(m.status, PlanStatus::Skipped | PlanStatus::Failed))
            .map(|m| (m.file_name(), m.reason.clone().unwrap_or_default()))
            .collect()
    }
}

/// Final counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub organized: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::executor::TransferMode;
    use crate::integrity::IntegrityVerifier;
    use crate::model::EntryKind;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    fn taxonomy() -> Taxonomy {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![]);
        map.insert(
            "documents".to_string(),
            vec!["pdf".to_string(), "word".to_string(), "excel".to_string()],
        );
        Taxonomy::new(map)
    }

    fn file(source: &str, dest: &str) -> Suggestion {
        Suggestion::new(source, EntryKind::File, dest)
    }

    #[test]
    fn test_colliding_suggestions_get_ordered_suffixes() {
        let dir = TempDir::new().unwrap();
        let planner = OrganizationPlanner::new(dir.path(), taxonomy());

        let plan = planner.plan(&[file("/src/x.pdf", "a/doc.pdf"), file("/src/y.pdf", "a/doc.pdf")]);

        let resolved: Vec<_> = plan.moves.iter().map(|m| m.resolved.clone().unwrap()).collect();
        assert_eq!(resolved, vec![dir.path().join("a/doc.pdf"), dir.path().join("a/doc2.pdf")]);
    }

    #[test]
    fn test_existing_file_pushes_suggestion_to_two() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/doc.pdf"), b"existing").unwrap();
        let planner = OrganizationPlanner::new(dir.path(), taxonomy());

        let plan = planner.plan(&[file("/src/x.pdf", "a/doc.pdf")]);
        assert_eq!(plan.moves[0].resolved, Some(dir.path().join("a/doc2.pdf")));
    }

    #[test]
    fn test_invalid_suggestions_are_skipped_not_coerced() {
        let dir = TempDir::new().unwrap();
        let planner = OrganizationPlanner::new(dir.path(), taxonomy());

        let plan = planner.plan(&[
            file("/src/x.pdf", "documents/taxes/2024/x.pdf"),
            file("/src/y.pdf", "documents/pdf/2024/y.docx"),
            file("/src/z.pdf", "documents/pdf/2024/z.pdf"),
        ]);

        assert_eq!(plan.moves[0].status, PlanStatus::Skipped);
        assert!(plan.moves[0].reason.as_ref().unwrap().contains("taxes"));
        assert_eq!(plan.moves[1].status, PlanStatus::Skipped);
        assert!(plan.moves[1].reason.as_ref().unwrap().contains("extension"));
        assert_eq!(plan.moves[2].status, PlanStatus::Planned);
        assert_eq!(plan.planned_count(), 1);
    }

    #[test]
    fn test_skipped_entries_do_not_reserve_names() {
        let dir = TempDir::new().unwrap();
        let planner = OrganizationPlanner::new(dir.path(), taxonomy());

        let plan = planner.plan(&[
            file("/src/c.txt", "a/report.pdf"),
            file("/src/a.pdf", "a/report.pdf"),
        ]);
        assert_eq!(plan.moves[1].resolved, Some(dir.path().join("a/report.pdf")));
    }

    #[test]
    fn test_cancel_marks_everything_skipped() {
        let dir = TempDir::new().unwrap();
        let planner = OrganizationPlanner::new(dir.path(), taxonomy());
        let mut plan = planner.plan(&[file("/src/x.pdf", "a/x.pdf"), file("/src/y.pdf", "a/y.pdf")]);

        plan.cancel();

        assert!(plan
            .moves
            .iter()
            .all(|m| m.status == PlanStatus::Skipped && m.reason.as_deref() == Some(CANCELLED_REASON)));
        assert_eq!(plan.summary().skipped, 2);
    }

    #[test]
    fn test_failed_file_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.pdf"), b"b").unwrap();
        let out = dir.path().join("out");

        let planner = OrganizationPlanner::new(&out, taxonomy());
        let mut plan = planner.plan(&[
            file(src.join("missing.pdf").to_str().unwrap(), "a/m.pdf"),
            file(src.join("b.pdf").to_str().unwrap(), "a/b.pdf"),
        ]);

        let log = AuditLog::open(dir.path().join("log.json")).unwrap();
        let mut exec = MoveExecutor::new(TransferMode::Move, IntegrityVerifier::default(), log);
        let summary = plan.execute(&mut exec);

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.organized, 1);
        assert_eq!(plan.moves[0].status, PlanStatus::Failed);
        assert!(out.join("a/b.pdf").exists());
        assert_eq!(plan.problems().len(), 1);
    }
}
