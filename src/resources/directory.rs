//! Directory resource.
use anyhow::{Context as _, Result, bail};
use std::path::PathBuf;

use super::helpers::fs::slot_kind;
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A real directory that should exist at `path`.
///
/// A link to a directory does not count: the slot must hold the directory
/// itself.
#[derive(Debug, Clone)]
pub struct DirectoryResource {
    /// Where the directory should exist.
    pub path: PathBuf,
}

impl DirectoryResource {
    /// Create a new directory resource.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Applicable for DirectoryResource {
    fn description(&self) -> String {
        format!("mkdir {}", self.path.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Missing => {
                // Parents are created on demand so queue order does not matter.
                std::fs::create_dir_all(&self.path)
                    .with_context(|| format!("create directory: {}", self.path.display()))?;
                Ok(ResourceChange::Applied)
            }
            ResourceState::Occupied { kind } => bail!("slot is occupied by a {kind}"),
            ResourceState::Incorrect { current } => {
                bail!("slot holds a link to {}", current.display())
            }
            ResourceState::Invalid { reason } => bail!(reason),
        }
    }
}

impl Resource for DirectoryResource {
    fn current_state(&self) -> Result<ResourceState> {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Ok(ResourceState::Correct),
            Ok(meta) => Ok(ResourceState::Occupied {
                kind: slot_kind(&meta),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ResourceState::Missing),
            Err(e) => Err(e).with_context(|| format!("inspect: {}", self.path.display())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directory_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b");
        let resource = DirectoryResource::new(path.clone());

        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
        assert_eq!(resource.apply().unwrap(), ResourceChange::Applied);
        assert!(path.is_dir());
    }

    #[test]
    fn existing_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let resource = DirectoryResource::new(dir.path().to_path_buf());
        assert_eq!(resource.apply().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn file_in_slot_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::write(&path, "").unwrap();

        let resource = DirectoryResource::new(path);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Occupied { kind: "file" }
        );
        let err = resource.apply().unwrap_err();
        assert!(err.to_string().contains("occupied by a file"));
    }

    #[cfg(unix)]
    #[test]
    fn link_to_directory_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        std::fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let resource = DirectoryResource::new(link);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Occupied { kind: "link" }
        );
    }
}
