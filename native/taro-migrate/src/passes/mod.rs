//! Pattern Rewriters
//!
//! Each pass is a stateless matcher/rewriter over one syntax tree. A rewrite
//! never touches the disk: it returns the edits for the file itself plus any
//! sibling artifacts, and the orchestrator commits both.

mod page_config;
mod router;
mod taro_imports;

pub use page_config::{config_artifact_path, config_module, PageConfigPass};
pub use router::RouterPass;
pub use taro_imports::{TaroImportsPass, UI_SYMBOLS};

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::MigrateError;
use crate::syntax::{SourceEdit, SyntaxTree};

/// A new file produced next to the one being rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub path: PathBuf,
    #[serde(skip)]
    pub contents: String,
}

#[derive(Debug, Default)]
pub struct Rewrite {
    pub edits: Vec<SourceEdit>,
    pub artifacts: Vec<Artifact>,
    /// Shapes the pass saw but deliberately leaves for manual follow-up.
    pub notices: Vec<String>,
}

impl Rewrite {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.artifacts.is_empty()
    }
}

/// Which files a pass is run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassScope {
    /// Every script under `sourceRoot`.
    SourceTree,
    /// The modules named by the page list, entry excluded.
    Pages,
}

pub struct PassContext<'p> {
    pub source_root: &'p Path,
    pub entry_file: &'p Path,
}

pub trait TransformPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn scope(&self) -> PassScope {
        PassScope::SourceTree
    }

    /// Cheap structural check; a `false` leaves the file untouched.
    fn matches(&self, tree: &SyntaxTree) -> bool;

    fn rewrite(&self, tree: &SyntaxTree, ctx: &PassContext) -> Result<Rewrite, MigrateError>;
}

/// The passes in the order they must run.
pub fn default_passes() -> Vec<Box<dyn TransformPass>> {
    vec![
        Box::new(RouterPass),
        Box::new(TaroImportsPass),
        Box::new(PageConfigPass),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_order_is_fixed() {
        let names: Vec<&str> = default_passes().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["router", "taro-imports", "page-config"]);
    }
}
