//! Idempotent filesystem primitives (check + apply pattern).
//!
//! Each resource re-inspects the filesystem in [`Applicable::apply`] before
//! mutating it, so an object changed externally between scan and apply fails
//! that single operation instead of being clobbered.
pub mod adoption;
pub mod directory;
pub mod symlink;

pub(crate) mod helpers {
    pub mod fs;
}

use std::path::PathBuf;

use anyhow::Result;

/// Minimal interface for resources that can be described and applied.
pub trait Applicable {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Apply the resource change.
    ///
    /// This method should:
    /// - Re-check the precondition the change depends on
    /// - Create parent directories if needed
    /// - Return [`ResourceChange::AlreadyCorrect`] when nothing had to change
    ///
    /// # Errors
    ///
    /// Returns an error if the precondition no longer holds or the change
    /// fails due to I/O failures or permission issues.
    fn apply(&self) -> Result<ResourceChange>;
}

/// State of a destination slot as seen by a resource.
///
/// # Examples
///
/// ```
/// use dotlink::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "/other/path".into() };
/// let taken = ResourceState::Occupied { kind: "file" };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert!(matches!(wrong, ResourceState::Incorrect { .. }));
/// assert!(matches!(taken, ResourceState::Occupied { kind: "file" }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing exists at the slot.
    Missing,
    /// The slot already holds the desired object.
    Correct,
    /// The slot holds a link of the right shape pointing elsewhere.
    Incorrect {
        /// Where the existing link points.
        current: PathBuf,
    },
    /// The slot is taken by an object of a different shape.
    Occupied {
        /// What occupies it (`"file"`, `"directory"`, `"link"`).
        kind: &'static str,
    },
    /// The resource cannot be applied (e.g., its source vanished).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a resource change.
///
/// # Examples
///
/// ```
/// use dotlink::resources::ResourceChange;
///
/// let applied = ResourceChange::Applied;
/// let noop = ResourceChange::AlreadyCorrect;
///
/// assert_eq!(applied, ResourceChange::Applied);
/// assert_ne!(applied, noop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
}

/// Resources that can report the state of their destination slot.
pub trait Resource: Applicable {
    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined due to I/O failures
    /// other than the slot being absent.
    fn current_state(&self) -> Result<ResourceState>;
}

