//! Dependency Marker
//!
//! Counts structural language features seen across the project. Downstream
//! tooling reads the merged counts, e.g. to decide whether the generated babel
//! configuration needs legacy decorator support.

use oxc_ast::ast::{Decorator, Program, TSEnumDeclaration};
use oxc_ast_visit::Visit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed vocabulary of observable features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    LegacyDecorators,
    ConstEnum,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::LegacyDecorators => "legacy-decorators",
            Feature::ConstEnum => "const-enum",
        }
    }
}

/// Feature → number of files exhibiting it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyMarkerSet {
    counts: BTreeMap<Feature, usize>,
}

impl DependencyMarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, feature: Feature) {
        *self.counts.entry(feature).or_insert(0) += 1;
    }

    pub fn count(&self, feature: Feature) -> usize {
        self.counts.get(&feature).copied().unwrap_or(0)
    }

    /// Sum `other` into `self`, key by key.
    pub fn merge(&mut self, other: &DependencyMarkerSet) {
        for (feature, count) in &other.counts {
            *self.counts.entry(*feature).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.values().all(|count| *count == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, usize)> + '_ {
        self.counts.iter().map(|(feature, count)| (*feature, *count))
    }

    /// The one template parameter the babel configuration needs.
    pub fn should_enable_legacy_decorator_support(&self) -> bool {
        self.count(Feature::LegacyDecorators) > 0
    }
}

#[derive(Default)]
struct FeatureScan {
    decorators: bool,
    const_enum: bool,
}

impl<'a> Visit<'a> for FeatureScan {
    fn visit_decorator(&mut self, it: &Decorator<'a>) {
        self.decorators = true;
        oxc_ast_visit::walk::walk_decorator(self, it);
    }

    fn visit_ts_enum_declaration(&mut self, it: &TSEnumDeclaration<'a>) {
        if it.r#const {
            self.const_enum = true;
        }
        oxc_ast_visit::walk::walk_ts_enum_declaration(self, it);
    }
}

/// Read-only scan of one file. Each feature counts at most once per file.
pub fn observe(program: &Program) -> DependencyMarkerSet {
    let mut scan = FeatureScan::default();
    scan.visit_program(program);

    let mut markers = DependencyMarkerSet::new();
    if scan.decorators {
        markers.record(Feature::LegacyDecorators);
    }
    if scan.const_enum {
        markers.record(Feature::ConstEnum);
    }
    markers
}
