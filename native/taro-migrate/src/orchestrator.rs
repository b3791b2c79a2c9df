//! Transform Orchestrator
//!
//! Runs the passes one after another. Inside a pass the file set is split
//! into disjoint chunks, one per worker, and each worker parses, matches,
//! rewrites, scans and commits its own files. Workers share nothing mutable:
//! each returns a [`WorkerReport`] and the orchestrator merges those
//! sequentially once the whole pass is done.

use oxc_allocator::Allocator;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::commit::{check_targets, commit, PendingWrite};
use crate::error::{MigrateError, Result};
use crate::marker::{observe, DependencyMarkerSet};
use crate::options::MigrateOptions;
use crate::passes::{PassContext, PassScope, TransformPass};
use crate::project::{Project, ProjectPlan};
use crate::report::{Notice, SkippedFile};
use crate::syntax::parse;

const SCRIPT_EXTENSIONS: [&str; 4] = ["js", "jsx", "ts", "tsx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Pending,
    Running,
    Merged,
}

/// One file as a worker sees it. Owned by exactly one worker.
#[derive(Debug)]
pub struct FileTask {
    pub path: PathBuf,
    pub original_text: String,
}

#[derive(Debug)]
enum Outcome {
    Unchanged,
    Changed {
        contents: String,
        artifacts: Vec<PathBuf>,
    },
    Failed(MigrateError),
}

#[derive(Debug)]
struct FileResult {
    path: PathBuf,
    outcome: Outcome,
    notices: Vec<String>,
}

/// Everything one worker produced for its chunk.
#[derive(Debug, Default)]
pub struct WorkerReport {
    /// Features of files this worker scanned for the first time.
    pub markers: DependencyMarkerSet,
    pub observed: Vec<PathBuf>,
    results: Vec<FileResult>,
}

/// Read-only view a worker gets of the orchestrator.
struct WorkerEnv<'e> {
    pass: &'e dyn TransformPass,
    ctx: &'e PassContext<'e>,
    observed: &'e HashSet<PathBuf>,
    overrides: &'e HashMap<PathBuf, String>,
    dry_run: bool,
}

pub struct Orchestrator {
    passes: Vec<Box<dyn TransformPass>>,
    states: Vec<PassState>,
    pool: ThreadPool,
    workers: usize,
    dry_run: bool,
    markers: DependencyMarkerSet,
    observed: HashSet<PathBuf>,
    /// Post-rewrite contents not on disk (dry run), read in place of the file.
    overrides: HashMap<PathBuf, String>,
    changed: BTreeSet<PathBuf>,
    artifacts: Vec<PathBuf>,
    skipped: Vec<SkippedFile>,
    notices: Vec<Notice>,
}

impl Orchestrator {
    pub fn new(passes: Vec<Box<dyn TransformPass>>, options: &MigrateOptions) -> Result<Self> {
        let workers = options.worker_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("taro-migrate-{i}"))
            .build()?;
        let states = vec![PassState::Pending; passes.len()];
        Ok(Orchestrator {
            passes,
            states,
            pool,
            workers,
            dry_run: options.dry_run,
            markers: DependencyMarkerSet::new(),
            observed: HashSet::new(),
            overrides: HashMap::new(),
            changed: BTreeSet::new(),
            artifacts: Vec::new(),
            skipped: Vec::new(),
            notices: Vec::new(),
        })
    }

    pub fn states(&self) -> Vec<(&'static str, PassState)> {
        self.passes
            .iter()
            .map(|p| p.name())
            .zip(self.states.iter().copied())
            .collect()
    }

    pub fn markers(&self) -> &DependencyMarkerSet {
        &self.markers
    }

    pub fn changed_files(&self) -> Vec<PathBuf> {
        self.changed.iter().cloned().collect()
    }

    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn record_skip(&mut self, skip: SkippedFile) {
        self.skipped.push(skip);
    }

    /// Commit the build config and entry rewrites planned by the project
    /// model. Each owner commits on its own; a failure skips only that file.
    pub fn commit_project(&mut self, plan: &ProjectPlan) {
        for (owner, writes) in &plan.writes {
            let committed = if self.dry_run {
                check_targets(owner, writes)
            } else {
                commit(owner, writes)
            };
            match committed {
                Ok(()) => self.record_writes(writes),
                Err(err) => {
                    tracing::warn!(path = %owner.display(), error = %err, "project file skipped");
                    self.skipped.push(SkippedFile::new(owner, "project", &err));
                }
            }
        }
    }

    fn record_writes(&mut self, writes: &[PendingWrite]) {
        for write in writes {
            if write.create_only {
                self.artifacts.push(write.path.clone());
            } else {
                self.changed.insert(write.path.clone());
            }
            if self.dry_run {
                self.overrides
                    .insert(write.path.clone(), write.contents.clone());
            }
        }
    }

    /// Run every pass in declared order over its scope of `project`.
    pub fn run(&mut self, project: &Project) {
        let source_dir = project.source_dir();
        let tree_files = source_files(&source_dir);
        let page_files = project.page_files();
        let ctx = PassContext {
            source_root: &source_dir,
            entry_file: &project.entry_file_path,
        };
        for index in 0..self.passes.len() {
            let files = match self.passes[index].scope() {
                PassScope::SourceTree => &tree_files,
                PassScope::Pages => &page_files,
            };
            self.run_pass(index, &ctx, files);
        }
    }

    fn run_pass(&mut self, index: usize, ctx: &PassContext, files: &[PathBuf]) {
        let pass = self.passes[index].as_ref();
        let name = pass.name();
        self.states[index] = PassState::Running;
        tracing::info!(pass = name, files = files.len(), workers = self.workers, "pass started");

        let chunk_size = files.len().div_ceil(self.workers).max(1);
        let env = WorkerEnv {
            pass,
            ctx,
            observed: &self.observed,
            overrides: &self.overrides,
            dry_run: self.dry_run,
        };
        let reports: Vec<WorkerReport> = self.pool.install(|| {
            files
                .par_chunks(chunk_size)
                .map(|chunk| run_worker(&env, chunk))
                .collect()
        });

        let mut changed = 0;
        let mut failed = 0;
        for report in reports {
            self.markers.merge(&report.markers);
            self.observed.extend(report.observed);
            for result in report.results {
                self.notices
                    .extend(result.notices.into_iter().map(|message| Notice {
                        path: result.path.clone(),
                        pass: name.to_string(),
                        message,
                    }));
                match result.outcome {
                    Outcome::Unchanged => {}
                    Outcome::Changed {
                        contents,
                        artifacts,
                    } => {
                        changed += 1;
                        self.artifacts.extend(artifacts);
                        if self.dry_run {
                            self.overrides.insert(result.path.clone(), contents);
                        }
                        self.changed.insert(result.path);
                    }
                    Outcome::Failed(err) => {
                        failed += 1;
                        self.skipped.push(SkippedFile::new(&result.path, name, &err));
                    }
                }
            }
        }

        self.states[index] = PassState::Merged;
        tracing::info!(pass = name, changed, skipped = failed, "pass merged");
    }
}

/// Scripts under `source_dir`, sorted. Dependencies, declaration files and
/// `*.config.*` modules are not sources.
pub fn source_files(source_dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(source_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            let scripted = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext));
            scripted && !name.ends_with(".d.ts") && !name.contains(".config.")
        })
        .collect();
    files.sort();
    files
}

fn run_worker(env: &WorkerEnv, chunk: &[PathBuf]) -> WorkerReport {
    let mut report = WorkerReport::default();
    for path in chunk {
        let task = match load_task(env, path) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cannot read file");
                report.results.push(FileResult {
                    path: path.clone(),
                    outcome: Outcome::Failed(err),
                    notices: Vec::new(),
                });
                continue;
            }
        };
        let result = process_file(env, &task, &mut report);
        if let Outcome::Failed(err) = &result.outcome {
            tracing::warn!(
                path = %task.path.display(),
                pass = env.pass.name(),
                error = %err,
                "file skipped"
            );
        }
        report.results.push(result);
    }
    report
}

fn load_task(env: &WorkerEnv, path: &Path) -> Result<FileTask> {
    let original_text = match env.overrides.get(path) {
        Some(text) => text.clone(),
        None => std::fs::read_to_string(path).map_err(|err| MigrateError::io(path, err))?,
    };
    Ok(FileTask {
        path: path.to_path_buf(),
        original_text,
    })
}

/// parse → match → rewrite → marker scan → commit, for one file.
fn process_file(env: &WorkerEnv, task: &FileTask, report: &mut WorkerReport) -> FileResult {
    let allocator = Allocator::default();
    let mut result = FileResult {
        path: task.path.clone(),
        outcome: Outcome::Unchanged,
        notices: Vec::new(),
    };
    let mut tree = match parse(&allocator, &task.original_text, &task.path) {
        Ok(tree) => tree,
        Err(err) => {
            result.outcome = Outcome::Failed(err.into());
            return result;
        }
    };

    let rewrite = if env.pass.matches(&tree) {
        match env.pass.rewrite(&tree, env.ctx) {
            Ok(rewrite) => Some(rewrite),
            Err(err) => {
                result.outcome = Outcome::Failed(err);
                None
            }
        }
    } else {
        None
    };

    if !env.observed.contains(&task.path) {
        report.markers.merge(&observe(tree.program()));
        report.observed.push(task.path.clone());
    }

    let Some(rewrite) = rewrite else {
        return result;
    };
    result.notices = rewrite.notices;
    if rewrite.edits.is_empty() && rewrite.artifacts.is_empty() {
        return result;
    }

    tree.apply(rewrite.edits);
    let contents = tree.print();
    let mut writes: Vec<PendingWrite> = rewrite
        .artifacts
        .into_iter()
        .map(|artifact| PendingWrite::create(artifact.path, artifact.contents))
        .collect();
    let artifacts: Vec<PathBuf> = writes.iter().map(|w| w.path.clone()).collect();
    if contents != task.original_text {
        writes.push(PendingWrite::overwrite(&task.path, contents.clone()));
    }
    if writes.is_empty() {
        return result;
    }

    let committed = if env.dry_run {
        check_targets(&task.path, &writes)
    } else {
        commit(&task.path, &writes)
    };
    result.outcome = match committed {
        Ok(()) => Outcome::Changed {
            contents,
            artifacts,
        },
        Err(err) => Outcome::Failed(err),
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::default_passes;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "config/index.js", "const config = { sourceRoot: 'src' }\n");
        write(
            dir.path(),
            "src/app.jsx",
            "class App {\n  config = { pages: ['pages/index/index'] }\n}\nexport default App\n",
        );
        write(
            dir.path(),
            "src/pages/index/index.jsx",
            "export default class Index {\n  config = { a: 1 }\n  f() { return this.$router.params }\n}\n",
        );
        dir
    }

    #[test]
    fn test_every_pass_is_merged_after_run() {
        let dir = project_dir();
        let options = MigrateOptions {
            dry_run: true,
            ..MigrateOptions::new(dir.path())
        };
        let plan = Project::load(&options).unwrap();
        let mut orchestrator = Orchestrator::new(default_passes(), &options).unwrap();
        assert!(orchestrator
            .states()
            .iter()
            .all(|(_, state)| *state == PassState::Pending));

        orchestrator.run(&plan.project);
        assert_eq!(
            orchestrator.states(),
            vec![
                ("router", PassState::Merged),
                ("taro-imports", PassState::Merged),
                ("page-config", PassState::Merged),
            ]
        );
        assert_eq!(orchestrator.changed_files().len(), 1);
    }

    #[test]
    fn test_source_files_skip_dependencies_and_declarations() {
        let dir = TempDir::new().unwrap();
        for file in [
            "a.js",
            "b.tsx",
            "types.d.ts",
            "pages/index/index.config.js",
            "node_modules/dep/index.js",
            "styles.css",
        ] {
            write(dir.path(), file, "");
        }
        let found: Vec<PathBuf> = source_files(dir.path())
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(found, vec![PathBuf::from("a.js"), PathBuf::from("b.tsx")]);
    }
}
