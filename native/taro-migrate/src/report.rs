use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::deps::{DependencyAction, UpgradeDependencyPlan};
use crate::error::{MigrateError, Result, Severity};
use crate::marker::DependencyMarkerSet;
use crate::project::Project;

/// A file (or run-level step) left alone because of a recoverable error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    /// Pass or step that gave up on it.
    pub pass: String,
    pub reason: String,
    pub severity: Severity,
}

impl SkippedFile {
    pub fn new(path: impl Into<PathBuf>, pass: &str, error: &MigrateError) -> Self {
        SkippedFile {
            path: path.into(),
            pass: pass.to_string(),
            reason: error.to_string(),
            severity: error.severity(),
        }
    }
}

/// Something a pass saw and deliberately did not rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub path: PathBuf,
    pub pass: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub project: Project,
    pub dry_run: bool,
    /// Sorted; includes the control files.
    pub changed_files: Vec<PathBuf>,
    pub artifacts: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
    pub notices: Vec<Notice>,
    pub markers: DependencyMarkerSet,
    pub should_enable_legacy_decorator_support: bool,
    /// `None` when the manifest could not be read.
    pub dependency_plan: Option<UpgradeDependencyPlan>,
}

impl MigrationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Plain-text rendering for a terminal.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let verb = if self.dry_run { "would change" } else { "changed" };
        let _ = writeln!(out, "{} file(s) {verb}", self.changed_files.len());
        for path in &self.changed_files {
            let _ = writeln!(out, "  M {}", path.display());
        }
        for path in &self.artifacts {
            let _ = writeln!(out, "  A {}", path.display());
        }
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "{} skipped:", self.skipped.len());
            for skip in &self.skipped {
                let _ = writeln!(out, "  [{}] {}", skip.pass, skip.reason);
            }
        }
        for notice in &self.notices {
            let _ = writeln!(
                out,
                "  note [{}] {}: {}",
                notice.pass,
                notice.path.display(),
                notice.message
            );
        }
        for (feature, count) in self.markers.iter() {
            let _ = writeln!(out, "{}: {count} file(s)", feature.as_str());
        }
        let _ = writeln!(
            out,
            "legacy decorator support: {}",
            self.should_enable_legacy_decorator_support
        );
        if let Some(plan) = &self.dependency_plan {
            for (action, label) in [
                (DependencyAction::Install, "install"),
                (DependencyAction::Upgrade, "upgrade"),
                (DependencyAction::Uninstall, "uninstall"),
            ] {
                let names: Vec<&str> = plan.with_action(action).map(|c| c.name.as_str()).collect();
                if !names.is_empty() {
                    let _ = writeln!(out, "{label}: {}", names.join(" "));
                }
            }
        }
        out
    }
}
