use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// How far an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Aborts the run before any file is touched.
    Fatal,
    /// The offending file is skipped; the run continues.
    PerFile,
    /// One run-level step is skipped; the transform passes still complete.
    PerRun,
}

/// A source file that no configured dialect could parse.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{}:{line}:{column}: {message}", path.display())]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("build configuration not found under {}", root.display())]
    ConfigNotFound { root: PathBuf },

    #[error("`sourceRoot` is not declared in {}", path.display())]
    SourceRootMissing { path: PathBuf },

    #[error("sourceRoot `{source_root}` is not a directory under {}", root.display())]
    SourceRootInvalid { root: PathBuf, source_root: String },

    #[error("entry module app.(js|jsx|ts|tsx) not found in {}", dir.display())]
    EntryNotFound { dir: PathBuf },

    #[error("cannot read project file {}: {source}", path.display())]
    InvalidProjectFile {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{}: {reason}", path.display())]
    AmbiguousExport { path: PathBuf, reason: String },

    #[error("{}: refusing to overwrite existing {}", path.display(), artifact.display())]
    ArtifactExists { path: PathBuf, artifact: PathBuf },

    #[error("package manifest not found at {}", path.display())]
    ManifestMissing { path: PathBuf },

    #[error("package manifest {} is not valid JSON: {source}", path.display())]
    ManifestInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MigrateError::ConfigNotFound { .. }
            | MigrateError::SourceRootMissing { .. }
            | MigrateError::SourceRootInvalid { .. }
            | MigrateError::EntryNotFound { .. }
            | MigrateError::InvalidProjectFile { .. }
            | MigrateError::Options(_)
            | MigrateError::WorkerPool(_) => Severity::Fatal,
            MigrateError::Parse(_)
            | MigrateError::AmbiguousExport { .. }
            | MigrateError::ArtifactExists { .. }
            | MigrateError::Io { .. } => Severity::PerFile,
            MigrateError::ManifestMissing { .. } | MigrateError::ManifestInvalid { .. } => {
                Severity::PerRun
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;
