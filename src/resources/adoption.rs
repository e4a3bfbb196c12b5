//! Adoption: moving a destination object into the source tree.
use anyhow::{Context as _, Result, bail};
use std::path::PathBuf;

use super::helpers::fs::{Staged, remove_entry, sibling_path, slot_kind, stage_path};
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// Moves the real file or directory at `slot` to `source`, replacing whatever
/// the source tree held there.
///
/// This is destructive for the previous source content.  The slot is
/// re-inspected immediately before the move: if it has become empty or now
/// holds a link, the adoption fails and nothing is touched.
///
/// The slot is first staged beside the source and only then swapped in, so a
/// failed copy or rename leaves both the source and the slot as they were.
#[derive(Debug, Clone)]
pub struct AdoptionResource {
    /// The destination object to adopt.
    pub slot: PathBuf,
    /// Where it lands inside the source tree.
    pub source: PathBuf,
}

impl AdoptionResource {
    /// Create a new adoption resource.
    #[must_use]
    pub const fn new(slot: PathBuf, source: PathBuf) -> Self {
        Self { slot, source }
    }

    fn swap_into_source(&self) -> Result<()> {
        let staged = sibling_path(&self.source, "staged");
        let backup = sibling_path(&self.source, "backup");
        if backup.symlink_metadata().is_ok() {
            bail!("backup left by an earlier run: {}", backup.display());
        }
        remove_entry(&staged)?;

        let how = stage_path(&self.slot, &staged)
            .with_context(|| format!("stage {} at {}", self.slot.display(), staged.display()))?;
        let unstage = || match how {
            Staged::Renamed => {
                let _ = std::fs::rename(&staged, &self.slot);
            }
            Staged::Copied => {
                let _ = remove_entry(&staged);
            }
        };

        let had_source = self.source.symlink_metadata().is_ok();
        if had_source && let Err(e) = std::fs::rename(&self.source, &backup) {
            unstage();
            return Err(e).with_context(|| format!("back up {}", self.source.display()));
        }
        if let Err(e) = std::fs::rename(&staged, &self.source) {
            if had_source {
                let _ = std::fs::rename(&backup, &self.source);
            }
            unstage();
            return Err(e).with_context(|| format!("replace {}", self.source.display()));
        }

        // The adopted content is committed from here on.
        if had_source {
            remove_entry(&backup)
                .with_context(|| format!("remove backup: {}", backup.display()))?;
        }
        if how == Staged::Copied {
            remove_entry(&self.slot)
                .with_context(|| format!("clear adopted slot: {}", self.slot.display()))?;
        }
        Ok(())
    }
}

impl Applicable for AdoptionResource {
    fn description(&self) -> String {
        format!("adopt {} into {}", self.slot.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Occupied { .. } => {
                self.swap_into_source().with_context(|| {
                    format!(
                        "move {} to {}",
                        self.slot.display(),
                        self.source.display()
                    )
                })?;
                Ok(ResourceChange::Applied)
            }
            ResourceState::Missing => bail!("nothing left to adopt"),
            ResourceState::Invalid { reason } => bail!(reason),
            ResourceState::Correct | ResourceState::Incorrect { .. } => {
                Ok(ResourceChange::AlreadyCorrect)
            }
        }
    }
}

impl Resource for AdoptionResource {
    /// `Occupied` means there is a real object waiting to be adopted.
    fn current_state(&self) -> Result<ResourceState> {
        let meta = match std::fs::symlink_metadata(&self.slot) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ResourceState::Missing);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("inspect: {}", self.slot.display()));
            }
        };
        if meta.file_type().is_symlink() {
            return Ok(ResourceState::Invalid {
                reason: "slot now holds a link".to_string(),
            });
        }
        // A slot reached through a linked parent can be the source itself.
        if let (Ok(a), Ok(b)) = (
            dunce::canonicalize(&self.slot),
            dunce::canonicalize(&self.source),
        ) && a == b
        {
            return Ok(ResourceState::Invalid {
                reason: "slot and source are the same object".to_string(),
            });
        }
        Ok(ResourceState::Occupied {
            kind: slot_kind(&meta),
        })
    }
}
