//! Symlink resources: creating a link and removing a stale one.
use anyhow::{Context as _, Result, bail};
use std::path::PathBuf;

use super::helpers::fs::{
    create_symlink, ensure_parent_dir, link_points_to, remove_symlink, slot_kind,
};
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A link at `link` that should point to `target` inside the source tree.
///
/// Applying never removes what already occupies the slot: a stale link or a
/// real file must be dealt with first (see [`StaleLinkResource`] and
/// [`AdoptionResource`](super::adoption::AdoptionResource)).
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// What the link points to.
    pub target: PathBuf,
    /// Where the link lives.
    pub link: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(target: PathBuf, link: PathBuf) -> Self {
        Self { target, link }
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.link.display(), self.target.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Missing => {
                ensure_parent_dir(&self.link)?;
                create_symlink(&self.target, &self.link)?;
                Ok(ResourceChange::Applied)
            }
            ResourceState::Incorrect { current } => bail!(
                "slot holds a link to {} (expected {})",
                current.display(),
                self.target.display()
            ),
            ResourceState::Occupied { kind } => bail!("slot is occupied by a {kind}"),
            ResourceState::Invalid { reason } => bail!(reason),
        }
    }
}

impl Resource for SymlinkResource {
    fn current_state(&self) -> Result<ResourceState> {
        if self.target.symlink_metadata().is_err() {
            return Ok(ResourceState::Invalid {
                reason: format!("link target does not exist: {}", self.target.display()),
            });
        }

        let meta = match std::fs::symlink_metadata(&self.link) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResourceState::Missing);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("inspect: {}", self.link.display()));
            }
        };

        if !meta.file_type().is_symlink() {
            return Ok(ResourceState::Occupied {
                kind: slot_kind(&meta),
            });
        }

        let current = std::fs::read_link(&self.link)
            .with_context(|| format!("read link: {}", self.link.display()))?;
        if link_points_to(&self.link, &current, &self.target) {
            Ok(ResourceState::Correct)
        } else {
            Ok(ResourceState::Incorrect { current })
        }
    }
}

/// A link at `link` that currently points to `stale` and must go away.
///
/// The desired state is an empty slot.  Apply deletes the link only while it
/// still points to `stale`; anything else found at the slot fails the
/// operation and is left untouched.
#[derive(Debug, Clone)]
pub struct StaleLinkResource {
    /// Where the stale link lives.
    pub link: PathBuf,
    /// Where it pointed when the plan was built.
    pub stale: PathBuf,
}

impl StaleLinkResource {
    /// Create a new stale-link resource.
    #[must_use]
    pub const fn new(link: PathBuf, stale: PathBuf) -> Self {
        Self { link, stale }
    }
}

impl Applicable for StaleLinkResource {
    fn description(&self) -> String {
        format!("remove {} -> {}", self.link.display(), self.stale.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Incorrect { .. } => {
                remove_symlink(&self.link)?;
                Ok(ResourceChange::Applied)
            }
            ResourceState::Occupied { kind } => {
                bail!("slot now holds a {kind}, not the expected stale link")
            }
            ResourceState::Invalid { reason } => bail!(reason),
            ResourceState::Missing => Ok(ResourceChange::AlreadyCorrect),
        }
    }
}

impl Resource for StaleLinkResource {
    fn current_state(&self) -> Result<ResourceState> {
        let meta = match std::fs::symlink_metadata(&self.link) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResourceState::Correct);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("inspect: {}", self.link.display()));
            }
        };

        if !meta.file_type().is_symlink() {
            return Ok(ResourceState::Occupied {
                kind: slot_kind(&meta),
            });
        }

        let current = std::fs::read_link(&self.link)
            .with_context(|| format!("read link: {}", self.link.display()))?;
        if link_points_to(&self.link, &current, &self.stale) {
            Ok(ResourceState::Incorrect { current })
        } else {
            Ok(ResourceState::Invalid {
                reason: format!(
                    "link was retargeted to {} since the plan was built",
                    current.display()
                ),
            })
        }
    }
}
