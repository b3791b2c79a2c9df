//! Atomic file commits.
//!
//! Every write goes through a temp file renamed into place, so a crash or a
//! failed sibling never leaves a half-written module behind.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// One file write the pipeline has decided on but not performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub path: PathBuf,
    pub contents: String,
    /// Refuse to replace an existing file.
    pub create_only: bool,
}

impl PendingWrite {
    pub fn overwrite(path: impl Into<PathBuf>, contents: String) -> Self {
        PendingWrite {
            path: path.into(),
            contents,
            create_only: false,
        }
    }

    pub fn create(path: impl Into<PathBuf>, contents: String) -> Self {
        PendingWrite {
            path: path.into(),
            contents,
            create_only: true,
        }
    }
}

fn write_atomic(path: &Path, contents: &str, behavior: OverwriteBehavior) -> io::Result<()> {
    AtomicFile::new(path, behavior)
        .write(|f| {
            f.write_all(contents.as_bytes())?;
            f.flush()
        })
        .map_err(|err| match err {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
        })
}

/// Commit the writes belonging to `owner`: new files first, then
/// replacements, so `owner` is only rewritten once everything it moved out
/// exists on disk.
pub fn commit(owner: &Path, writes: &[PendingWrite]) -> Result<()> {
    for write in writes.iter().filter(|w| w.create_only) {
        if write.path.exists() {
            return Err(MigrateError::ArtifactExists {
                path: owner.to_path_buf(),
                artifact: write.path.clone(),
            });
        }
        write_atomic(&write.path, &write.contents, OverwriteBehavior::DisallowOverwrite).map_err(
            |err| match err.kind() {
                io::ErrorKind::AlreadyExists => MigrateError::ArtifactExists {
                    path: owner.to_path_buf(),
                    artifact: write.path.clone(),
                },
                _ => MigrateError::io(&write.path, err),
            },
        )?;
        tracing::debug!(path = %write.path.display(), "created");
    }
    for write in writes.iter().filter(|w| !w.create_only) {
        write_atomic(&write.path, &write.contents, OverwriteBehavior::AllowOverwrite)
            .map_err(|err| MigrateError::io(&write.path, err))?;
        tracing::debug!(path = %write.path.display(), "rewritten");
    }
    Ok(())
}

/// Fail with `ArtifactExists` if any create-only target is already on disk.
pub fn check_targets(owner: &Path, writes: &[PendingWrite]) -> Result<()> {
    match writes.iter().find(|w| w.create_only && w.path.exists()) {
        Some(write) => Err(MigrateError::ArtifactExists {
            path: owner.to_path_buf(),
            artifact: write.path.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_artifacts_land_before_owner_rewrite() {
        let dir = TempDir::new().unwrap();
        let owner = dir.path().join("index.jsx");
        fs::write(&owner, "old").unwrap();
        let writes = vec![
            PendingWrite::overwrite(&owner, "new".to_string()),
            PendingWrite::create(dir.path().join("index.config.js"), "cfg".to_string()),
        ];
        commit(&owner, &writes).unwrap();
        assert_eq!(fs::read_to_string(&owner).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(dir.path().join("index.config.js")).unwrap(),
            "cfg"
        );
    }

    #[test]
    fn test_existing_artifact_leaves_owner_untouched() {
        let dir = TempDir::new().unwrap();
        let owner = dir.path().join("index.jsx");
        let artifact = dir.path().join("index.config.js");
        fs::write(&owner, "old").unwrap();
        fs::write(&artifact, "keep").unwrap();
        let writes = vec![
            PendingWrite::create(&artifact, "cfg".to_string()),
            PendingWrite::overwrite(&owner, "new".to_string()),
        ];
        assert!(check_targets(&owner, &writes).is_err());
        let err = commit(&owner, &writes).unwrap_err();
        assert!(matches!(err, MigrateError::ArtifactExists { .. }));
        assert_eq!(fs::read_to_string(&owner).unwrap(), "old");
        assert_eq!(fs::read_to_string(&artifact).unwrap(), "keep");
    }
}
