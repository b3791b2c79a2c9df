//! Upgrade Dependency Plan
//!
//! Compares the project's `package.json` against a fixed registry of known
//! package names and decides, per name, whether it has to be installed,
//! upgraded, uninstalled or left alone. The plan is data only; running the
//! package manager is someone else's job.

use lazy_static::lazy_static;
use regex::Regex;
use semver::{BuildMetadata, Op, Version, VersionReq};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{MigrateError, Result};

const SUCCESSOR_VERSION: &str = "3.0.0";
const REACT_VERSION: &str = "16.10.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Required by the successor; added when absent.
    Install(&'static str),
    /// Kept, but must be at least this version.
    Upgrade(&'static str),
    /// No successor; removed when present.
    Uninstall,
}

lazy_static! {
    static ref REGISTRY: Vec<(&'static str, Rule)> = vec![
        ("react", Rule::Install(REACT_VERSION)),
        ("react-dom", Rule::Install(REACT_VERSION)),
        ("@tarojs/react", Rule::Install(SUCCESSOR_VERSION)),
        ("@tarojs/runtime", Rule::Install(SUCCESSOR_VERSION)),
        ("babel-preset-taro", Rule::Install(SUCCESSOR_VERSION)),
        ("@tarojs/taro", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/components", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/cli", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/router", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/webpack-runner", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/mini-runner", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/plugin-sass", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/plugin-less", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/plugin-stylus", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/plugin-terser", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("@tarojs/plugin-uglify", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("eslint-config-taro", Rule::Upgrade(SUCCESSOR_VERSION)),
        ("nervjs", Rule::Uninstall),
        ("nerv-devtools", Rule::Uninstall),
        ("@tarojs/async-await", Rule::Uninstall),
        ("@tarojs/redux", Rule::Uninstall),
        ("@tarojs/redux-h5", Rule::Uninstall),
        ("@tarojs/mobx", Rule::Uninstall),
        ("@tarojs/mobx-h5", Rule::Uninstall),
        ("@tarojs/mobx-common", Rule::Uninstall),
        ("@tarojs/taro-weapp", Rule::Uninstall),
        ("@tarojs/taro-alipay", Rule::Uninstall),
        ("@tarojs/taro-swan", Rule::Uninstall),
        ("@tarojs/taro-tt", Rule::Uninstall),
        ("@tarojs/taro-qq", Rule::Uninstall),
        ("@tarojs/taro-jd", Rule::Uninstall),
        ("@tarojs/taro-h5", Rule::Uninstall),
        ("@tarojs/taro-rn", Rule::Uninstall),
        ("@tarojs/taro-quickapp", Rule::Uninstall),
        ("babel-plugin-transform-jsx-stylesheet", Rule::Uninstall),
    ];
    static ref OPERATOR_SPACE: Regex = Regex::new(r"(>=|<=|>|<|=|~|\^)\s+").unwrap();
    static ref HYPHEN_RANGE: Regex = Regex::new(r"^(\S+)\s+-\s+(\S+)$").unwrap();
    static ref V_PREFIX: Regex = Regex::new(r"(^|[\s<>=~^])v(\d)").unwrap();
}

/// Packages with no successor. Side-effect imports of these are dead code
/// after the migration.
pub fn is_deprecated(name: &str) -> bool {
    REGISTRY
        .iter()
        .any(|(known, rule)| *known == name && *rule == Rule::Uninstall)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyAction {
    Install,
    Upgrade,
    Uninstall,
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyChange {
    pub name: String,
    pub current_range: Option<String>,
    pub action: DependencyAction,
    pub target_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One entry per registry name found in the manifest, plus every required
/// package the manifest lacks. Registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UpgradeDependencyPlan {
    pub changes: Vec<DependencyChange>,
}

impl UpgradeDependencyPlan {
    /// Read `<root>/package.json` and compute the plan.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join("package.json");
        if !path.is_file() {
            return Err(MigrateError::ManifestMissing { path });
        }
        let raw = std::fs::read_to_string(&path).map_err(|err| MigrateError::io(&path, err))?;
        let manifest: Value = serde_json::from_str(&raw)
            .map_err(|source| MigrateError::ManifestInvalid { path, source })?;
        Ok(Self::from_manifest(&manifest))
    }

    pub fn from_manifest(manifest: &Value) -> Self {
        let declared = |name: &str| -> Option<String> {
            ["dependencies", "devDependencies"].iter().find_map(|table| {
                manifest
                    .get(table)?
                    .get(name)?
                    .as_str()
                    .map(str::to_string)
            })
        };

        let mut changes = Vec::new();
        for (name, rule) in REGISTRY.iter() {
            let current = declared(name);
            let change = match (*rule, current) {
                (Rule::Install(target), None) => DependencyChange {
                    name: name.to_string(),
                    current_range: None,
                    action: DependencyAction::Install,
                    target_version: Some(target.to_string()),
                    note: None,
                },
                (Rule::Install(target) | Rule::Upgrade(target), Some(range)) => {
                    compare(name, range, target)
                }
                (Rule::Uninstall, Some(range)) => DependencyChange {
                    name: name.to_string(),
                    current_range: Some(range),
                    action: DependencyAction::Uninstall,
                    target_version: None,
                    note: None,
                },
                (Rule::Upgrade(_) | Rule::Uninstall, None) => continue,
            };
            changes.push(change);
        }
        UpgradeDependencyPlan { changes }
    }

    pub fn get(&self, name: &str) -> Option<&DependencyChange> {
        self.changes.iter().find(|c| c.name == name)
    }

    pub fn with_action(&self, action: DependencyAction) -> impl Iterator<Item = &DependencyChange> {
        self.changes.iter().filter(move |c| c.action == action)
    }
}

fn compare(name: &str, range: String, target: &str) -> DependencyChange {
    let parsed = normalize_range(&range).and_then(|norm| VersionReq::parse(&norm).ok());
    let mut change = DependencyChange {
        name: name.to_string(),
        current_range: Some(range),
        action: DependencyAction::NoOp,
        target_version: Some(target.to_string()),
        note: None,
    };
    let (Some(req), Ok(minimum)) = (parsed, Version::parse(target)) else {
        let raw = change.current_range.clone().unwrap_or_default();
        tracing::warn!(package = name, range = %raw, "unrecognised version range, leaving as is");
        change.note = Some(format!("unrecognised version range `{raw}`"));
        return change;
    };
    if !meets_minimum(&req, &minimum) {
        change.action = DependencyAction::Upgrade;
    }
    change
}

/// Rewrite an npm range into the comma-separated form `semver` accepts.
/// `None` for things that are not ranges at all (tags, urls, paths).
pub fn normalize_range(raw: &str) -> Option<String> {
    let first = raw.split("||").next().unwrap_or_default().trim();
    if first.is_empty() || matches!(first, "*" | "x" | "X" | "latest") {
        return Some("*".to_string());
    }
    if first.contains(':') || first.contains('/') {
        return None;
    }
    if let Some(caps) = HYPHEN_RANGE.captures(first) {
        return Some(format!(">={}, <={}", &caps[1], &caps[2]));
    }
    let collapsed = OPERATOR_SPACE.replace_all(first, "$1");
    let unprefixed = V_PREFIX.replace_all(&collapsed, "$1$2");
    Some(unprefixed.split_whitespace().collect::<Vec<_>>().join(", "))
}

/// Whether every version `req` admits is at least `minimum`.
fn meets_minimum(req: &VersionReq, minimum: &Version) -> bool {
    if req.comparators.is_empty() {
        return true;
    }
    let lower = req
        .comparators
        .iter()
        .filter_map(|c| match c.op {
            Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
                Some(Version {
                    major: c.major,
                    minor: c.minor.unwrap_or(0),
                    patch: c.patch.unwrap_or(0),
                    pre: c.pre.clone(),
                    build: BuildMetadata::EMPTY,
                })
            }
            _ => None,
        })
        .max();
    matches!(lower, Some(v) if v >= *minimum)
}
