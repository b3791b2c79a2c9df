//! # Taro 2 → Taro 3 Source Migration
//!
//! ## Pipeline
//!
//! 1. **Project Model**: `config/index.{js,ts}` yields `sourceRoot`; the entry
//!    module `<sourceRoot>/app.*` yields the page list. Both files are
//!    rewritten in place. Every fatal condition is detected here, before any
//!    file is written.
//!
//! 2. **Passes**, strictly in this order:
//!    - `router`: `this.$router` → `this.$instance.router`
//!    - `taro-imports`: UI symbols move from `@tarojs/taro` to `react`
//!    - `page-config`: inline page `config` → sibling `<page>.config.<ext>`
//!
//!    A later pass reads what an earlier pass committed.
//!
//! 3. **Dependency Marker**: every processed file is scanned once for
//!    structural features; the merged counts decide whether the build needs
//!    legacy decorator support.
//!
//! 4. **Dependency plan** from `package.json` against a fixed registry.
//!
//! ## Guarantees
//!
//! - Code outside a rewritten span is printed byte-for-byte.
//! - Every pass is idempotent: a second run changes nothing.
//! - A file that fails to parse or rewrite is skipped and reported; it never
//!   stops the run.
//! - Writes are atomic per file, not per project.

mod commit;
pub mod deps;
pub mod error;
mod imports;
pub mod marker;
pub mod options;
pub mod orchestrator;
pub mod passes;
mod predicates;
pub mod project;
pub mod report;
pub mod syntax;

#[cfg(feature = "napi")]
mod native;


pub use deps::{DependencyAction, DependencyChange, UpgradeDependencyPlan};
pub use error::{MigrateError, ParseError, Result, Severity};
pub use marker::{DependencyMarkerSet, Feature};
pub use options::{DefineConstant, MigrateOptions};
pub use orchestrator::{Orchestrator, PassState};
pub use passes::{default_passes, TransformPass};
pub use project::Project;
pub use report::{MigrationReport, Notice, SkippedFile};

#[cfg(feature = "napi")]
pub use native::migrate_project_native;

/// Run the whole migration over `options.root_dir`.
///
/// Returns `Err` only for fatal errors, all of which are raised before the
/// first write. Everything recoverable ends up in the report.
pub fn migrate_project(options: &MigrateOptions) -> Result<MigrationReport> {
    let plan = Project::load(options)?;
    let mut orchestrator = Orchestrator::new(default_passes(), options)?;

    orchestrator.commit_project(&plan);
    orchestrator.run(&plan.project);

    let dependency_plan = match UpgradeDependencyPlan::load(&plan.project.root_dir) {
        Ok(deps) => Some(deps),
        Err(err) => {
            tracing::warn!(error = %err, "dependency plan skipped");
            let path = plan.project.root_dir.join("package.json");
            orchestrator.record_skip(SkippedFile::new(path, "dependencies", &err));
            None
        }
    };

    let markers = orchestrator.markers().clone();
    Ok(MigrationReport {
        should_enable_legacy_decorator_support: markers.should_enable_legacy_decorator_support(),
        markers,
        dry_run: options.dry_run,
        changed_files: orchestrator.changed_files(),
        artifacts: orchestrator.artifacts().to_vec(),
        skipped: orchestrator.skipped().to_vec(),
        notices: orchestrator.notices().to_vec(),
        dependency_plan,
        project: plan.project,
    })
}
