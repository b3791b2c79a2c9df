use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::error::Result;

/// A constant the build configuration must define, e.g.
/// `'process.env.TARO_ENV': JSON.stringify(process.env.TARO_ENV)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefineConstant {
    /// Key as it appears once unquoted.
    pub key: String,
    /// Expression source inserted verbatim as the value.
    pub value: String,
}

impl Default for DefineConstant {
    fn default() -> Self {
        DefineConstant {
            key: "process.env.TARO_ENV".to_string(),
            value: "JSON.stringify(process.env.TARO_ENV)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MigrateOptions {
    pub root_dir: PathBuf,
    /// Worker pool size. `None` uses the available parallelism.
    pub workers: Option<usize>,
    /// Compute everything, write nothing.
    pub dry_run: bool,
    pub define_constant: DefineConstant,
    /// Value of the `framework` field ensured in the build configuration.
    pub framework: String,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        MigrateOptions {
            root_dir: PathBuf::from("."),
            workers: None,
            dry_run: false,
            define_constant: DefineConstant::default(),
            framework: "react".to_string(),
        }
    }
}

impl MigrateOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        MigrateOptions {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_defaults_fill_missing_fields() {
        let raw = json!({ "rootDir": "/tmp/app", "dryRun": true }).to_string();
        let options = MigrateOptions::from_json(&raw).unwrap();
        assert_eq!(options.root_dir, PathBuf::from("/tmp/app"));
        assert!(options.dry_run);
        assert_eq!(options.framework, "react");
        assert_eq!(options.define_constant, DefineConstant::default());
    }

    #[test]
    fn test_worker_count_never_zero() {
        let mut options = MigrateOptions::default();
        options.workers = Some(0);
        assert!(options.worker_count() >= 1);
        options.workers = Some(3);
        assert_eq!(options.worker_count(), 3);
    }
}
