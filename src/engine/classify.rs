//! Classification of scanned entries against the destination tree.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ignore::IgnoreMatcher;
use super::path::RelativePath;
use super::scan::{EntryKind, ScanEntry};
use crate::error::TraversalError;
use crate::resources::directory::DirectoryResource;
use crate::resources::helpers::fs::link_points_to;
use crate::resources::symlink::SymlinkResource;
use crate::resources::{Resource, ResourceState};

/// A destination folder that has to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderOp {
    /// Source-relative identity.
    pub relative: RelativePath,
    /// Absolute destination path.
    pub path: PathBuf,
}

/// A link that has to be created at `link_path`, pointing to `target_path`.
///
/// This is also the unit of work handed to the elevated link batch, hence the
/// serde derives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOp {
    /// Source-relative identity.
    pub relative: RelativePath,
    /// Where the link goes (inside the destination tree).
    pub link_path: PathBuf,
    /// What it points to (inside the source tree).
    pub target_path: PathBuf,
}

/// Destination holds a link to the wrong target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConflict {
    /// Source-relative identity.
    pub relative: RelativePath,
    /// Destination slot.
    pub link_path: PathBuf,
    /// Where the existing link points.
    pub current_target: PathBuf,
    /// Where it should point.
    pub expected_target: PathBuf,
}

/// Destination holds a real file or directory where a link should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdoptConflict {
    /// Source-relative identity.
    pub relative: RelativePath,
    /// Destination slot holding the object to adopt.
    pub link_path: PathBuf,
    /// Source path the object would be moved to.
    pub source_path: PathBuf,
}

impl AdoptConflict {
    /// The link that replaces the adopted object.
    #[must_use]
    pub fn link_op(&self) -> LinkOp {
        LinkOp {
            relative: self.relative.clone(),
            link_path: self.link_path.clone(),
            target_path: self.source_path.clone(),
        }
    }
}

impl LinkConflict {
    /// The fresh link that replaces the stale one.
    #[must_use]
    pub fn link_op(&self) -> LinkOp {
        LinkOp {
            relative: self.relative.clone(),
            link_path: self.link_path.clone(),
            target_path: self.expected_target.clone(),
        }
    }
}

/// The outcome of classifying one source entry.
///
/// Every scanned entry yields exactly one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanItem {
    /// Destination folder is missing.
    FolderCreate(FolderOp),
    /// Destination slot is empty; a link will be created.
    LinkCreate(LinkOp),
    /// Destination already matches: a correct link, or an existing folder.
    Satisfied {
        /// Source-relative identity.
        relative: RelativePath,
        /// Whether the entry is a folder or a file.
        kind: EntryKind,
    },
    /// Excluded by an ignore rule or because it is the running program.
    Ignored {
        /// Source-relative identity.
        relative: RelativePath,
        /// Whether the entry is a folder or a file.
        kind: EntryKind,
    },
    /// Destination is a link to somewhere else.
    LinkConflict(LinkConflict),
    /// Destination is a real object occupying the slot.
    AdoptConflict(AdoptConflict),
}

impl PlanItem {
    /// Source-relative identity of the item.
    #[must_use]
    pub const fn relative(&self) -> &RelativePath {
        match self {
            Self::FolderCreate(op) => &op.relative,
            Self::LinkCreate(op) => &op.relative,
            Self::Satisfied { relative, .. } | Self::Ignored { relative, .. } => relative,
            Self::LinkConflict(c) => &c.relative,
            Self::AdoptConflict(c) => &c.relative,
        }
    }

    /// Short variant label used when rendering.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FolderCreate(_) => "create folder",
            Self::LinkCreate(_) => "create link",
            Self::Satisfied { .. } => "ok",
            Self::Ignored { .. } => "ignored",
            Self::LinkConflict(_) => "link conflict",
            Self::AdoptConflict(_) => "adopt conflict",
        }
    }

    /// Whether the item describes outstanding work.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        !matches!(self, Self::Satisfied { .. } | Self::Ignored { .. })
    }
}

/// Decides the [`PlanItem`] for each scanned entry.
///
/// Classification only reads the destination tree; it never mutates it.
#[derive(Debug)]
pub struct Classifier<'a> {
    source_root: &'a Path,
    destination_root: &'a Path,
    ignore: &'a IgnoreMatcher,
    self_path: Option<&'a Path>,
}

impl<'a> Classifier<'a> {
    /// Create a classifier for the given roots and ignore rules.
    #[must_use]
    pub const fn new(
        source_root: &'a Path,
        destination_root: &'a Path,
        ignore: &'a IgnoreMatcher,
    ) -> Self {
        Self {
            source_root,
            destination_root,
            ignore,
            self_path: None,
        }
    }

    /// Treat the entry at `path` (the running program) as ignored.
    #[must_use]
    pub const fn with_self_path(mut self, path: Option<&'a Path>) -> Self {
        self.self_path = path;
        self
    }

    /// Classify one scanned entry.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::Inspect`] if the destination slot cannot be
    /// inspected or resolves back into the source tree.
    pub fn classify(&self, entry: &ScanEntry) -> Result<PlanItem, TraversalError> {
        let relative = entry.relative.clone();
        if self.ignore.matches(&relative) || self.is_self(&entry.path) {
            return Ok(PlanItem::Ignored {
                relative,
                kind: entry.kind,
            });
        }

        let dest = relative.under(self.destination_root);
        let inspect = |reason: String| TraversalError::Inspect {
            path: dest.clone(),
            reason,
        };

        // Everything below an adopted directory is reached through its link.
        if reached_through_twin(&dest, &entry.path) {
            return Ok(PlanItem::Satisfied {
                relative,
                kind: entry.kind,
            });
        }

        match entry.kind {
            EntryKind::Dir => {
                let state = DirectoryResource::new(dest.clone())
                    .current_state()
                    .map_err(|e| inspect(format!("{e:#}")))?;
                Ok(match state {
                    ResourceState::Correct => PlanItem::Satisfied {
                        relative,
                        kind: EntryKind::Dir,
                    },
                    ResourceState::Occupied { .. } if links_to(&dest, &entry.path) => {
                        PlanItem::Satisfied {
                            relative,
                            kind: EntryKind::Dir,
                        }
                    }
                    // Anything occupying the slot fails at apply time.
                    _ => PlanItem::FolderCreate(FolderOp {
                        relative,
                        path: dest,
                    }),
                })
            }
            EntryKind::File => {
                if self.resolves_into_source(&dest) {
                    return Err(inspect(
                        "destination slot resolves into the source tree".to_string(),
                    ));
                }
                let state = SymlinkResource::new(entry.path.clone(), dest.clone())
                    .current_state()
                    .map_err(|e| inspect(format!("{e:#}")))?;
                match state {
                    ResourceState::Missing => Ok(PlanItem::LinkCreate(LinkOp {
                        relative,
                        link_path: dest,
                        target_path: entry.path.clone(),
                    })),
                    ResourceState::Correct => Ok(PlanItem::Satisfied {
                        relative,
                        kind: EntryKind::File,
                    }),
                    ResourceState::Incorrect { current } => {
                        Ok(PlanItem::LinkConflict(LinkConflict {
                            relative,
                            link_path: dest,
                            current_target: current,
                            expected_target: entry.path.clone(),
                        }))
                    }
                    ResourceState::Occupied { .. } => Ok(PlanItem::AdoptConflict(AdoptConflict {
                        relative,
                        link_path: dest,
                        source_path: entry.path.clone(),
                    })),
                    ResourceState::Invalid { reason } => Err(inspect(reason)),
                }
            }
        }
    }

    fn is_self(&self, path: &Path) -> bool {
        self.self_path.is_some_and(|exe| exe == path)
    }

    /// Whether the slot's parent is a link leading back into the source tree.
    fn resolves_into_source(&self, dest: &Path) -> bool {
        dest.parent()
            .and_then(|parent| dunce::canonicalize(parent).ok())
            .is_some_and(|parent| parent.starts_with(self.source_root))
    }
}

/// Whether `dest` is a link whose target is `source`.
fn links_to(dest: &Path, source: &Path) -> bool {
    std::fs::read_link(dest).is_ok_and(|stored| link_points_to(dest, &stored, source))
}

/// Whether the slot's parent resolves to the source entry's own parent, i.e.
/// an ancestor of the slot is a link to its source twin.
fn reached_through_twin(dest: &Path, source: &Path) -> bool {
    let (Some(dest_parent), Some(source_parent)) = (dest.parent(), source.parent()) else {
        return false;
    };
    match (
        dunce::canonicalize(dest_parent),
        dunce::canonicalize(source_parent),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        dest: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let source = dunce::canonicalize(dir.path()).unwrap().join("src");
            let dest = dunce::canonicalize(dir.path()).unwrap().join("dst");
            fs::create_dir(&source).unwrap();
            fs::create_dir(&dest).unwrap();
            Self {
                _dir: dir,
                source,
                dest,
            }
        }

        fn file(&self, rel: &str) -> ScanEntry {
            let path = RelativePath::new(rel).under(&self.source);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, rel).unwrap();
            ScanEntry {
                relative: RelativePath::new(rel),
                kind: EntryKind::File,
                path,
            }
        }

        fn dir(&self, rel: &str) -> ScanEntry {
            let path = RelativePath::new(rel).under(&self.source);
            fs::create_dir_all(&path).unwrap();
            ScanEntry {
                relative: RelativePath::new(rel),
                kind: EntryKind::Dir,
                path,
            }
        }

        fn classify(&self, entry: &ScanEntry, patterns: &[&str]) -> PlanItem {
            let ignore = IgnoreMatcher::compile(patterns).unwrap();
            Classifier::new(&self.source, &self.dest, &ignore)
                .classify(entry)
                .unwrap()
        }
    }

    // -----------------------------------------------------------------------
    // directories
    // -----------------------------------------------------------------------

    #[test]
    fn missing_folder_is_folder_create() {
        let fx = Fixture::new();
        let entry = fx.dir("config");
        assert!(matches!(
            fx.classify(&entry, &[]),
            PlanItem::FolderCreate(FolderOp { ref path, .. }) if *path == fx.dest.join("config")
        ));
    }

    #[test]
    fn existing_folder_is_satisfied() {
        let fx = Fixture::new();
        let entry = fx.dir("config");
        fs::create_dir(fx.dest.join("config")).unwrap();
        assert_eq!(
            fx.classify(&entry, &[]),
            PlanItem::Satisfied {
                relative: RelativePath::new("config"),
                kind: EntryKind::Dir
            }
        );
    }

    // -----------------------------------------------------------------------
    // files
    // -----------------------------------------------------------------------

    #[test]
    fn empty_slot_is_link_create() {
        let fx = Fixture::new();
        let entry = fx.file("bashrc");
        assert_eq!(
            fx.classify(&entry, &[]),
            PlanItem::LinkCreate(LinkOp {
                relative: RelativePath::new("bashrc"),
                link_path: fx.dest.join("bashrc"),
                target_path: fx.source.join("bashrc"),
            })
        );
    }

    #[test]
    fn regular_file_in_slot_is_adopt_conflict() {
        let fx = Fixture::new();
        let entry = fx.file("notes.txt");
        fs::write(fx.dest.join("notes.txt"), "local").unwrap();
        assert!(matches!(
            fx.classify(&entry, &[]),
            PlanItem::AdoptConflict(_)
        ));
    }

    #[test]
    fn directory_in_file_slot_is_adopt_conflict() {
        let fx = Fixture::new();
        let entry = fx.file("vimrc");
        fs::create_dir(fx.dest.join("vimrc")).unwrap();
        assert!(matches!(
            fx.classify(&entry, &[]),
            PlanItem::AdoptConflict(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn correct_link_is_satisfied() {
        let fx = Fixture::new();
        let entry = fx.file("bashrc");
        std::os::unix::fs::symlink(&entry.path, fx.dest.join("bashrc")).unwrap();
        assert_eq!(
            fx.classify(&entry, &[]),
            PlanItem::Satisfied {
                relative: RelativePath::new("bashrc"),
                kind: EntryKind::File
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn wrong_link_is_link_conflict() {
        let fx = Fixture::new();
        let entry = fx.file("bashrc");
        let elsewhere = fx.dest.join("old-bashrc");
        fs::write(&elsewhere, "").unwrap();
        std::os::unix::fs::symlink(&elsewhere, fx.dest.join("bashrc")).unwrap();

        let PlanItem::LinkConflict(conflict) = fx.classify(&entry, &[]) else {
            panic!("expected link conflict");
        };
        assert_eq!(conflict.current_target, elsewhere);
        assert_eq!(conflict.expected_target, entry.path);
    }

    #[cfg(unix)]
    #[test]
    fn linked_folder_pointing_at_its_twin_is_satisfied() {
        let fx = Fixture::new();
        let entry = fx.dir("vim");
        std::os::unix::fs::symlink(&entry.path, fx.dest.join("vim")).unwrap();
        assert_eq!(
            fx.classify(&entry, &[]),
            PlanItem::Satisfied {
                relative: RelativePath::new("vim"),
                kind: EntryKind::Dir
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn linked_folder_pointing_elsewhere_is_folder_create() {
        let fx = Fixture::new();
        let entry = fx.dir("vim");
        let elsewhere = fx.dest.join("old-vim");
        fs::create_dir(&elsewhere).unwrap();
        std::os::unix::fs::symlink(&elsewhere, fx.dest.join("vim")).unwrap();
        assert!(matches!(
            fx.classify(&entry, &[]),
            PlanItem::FolderCreate(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn entries_below_linked_twin_are_satisfied() {
        let fx = Fixture::new();
        let nested = fx.dir("vim/after");
        let file = fx.file("vim/after/ftplugin.vim");
        std::os::unix::fs::symlink(fx.source.join("vim"), fx.dest.join("vim")).unwrap();

        assert_eq!(
            fx.classify(&nested, &[]),
            PlanItem::Satisfied {
                relative: RelativePath::new("vim/after"),
                kind: EntryKind::Dir
            }
        );
        assert_eq!(
            fx.classify(&file, &[]),
            PlanItem::Satisfied {
                relative: RelativePath::new("vim/after/ftplugin.vim"),
                kind: EntryKind::File
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn slot_through_link_into_other_source_folder_is_refused() {
        let fx = Fixture::new();
        let entry = fx.file("app/settings");
        fs::create_dir(fx.source.join("other")).unwrap();
        std::os::unix::fs::symlink(fx.source.join("other"), fx.dest.join("app")).unwrap();

        let ignore = IgnoreMatcher::compile(Vec::<String>::new()).unwrap();
        let err = Classifier::new(&fx.source, &fx.dest, &ignore)
            .classify(&entry)
            .unwrap_err();
        assert!(matches!(err, TraversalError::Inspect { .. }));
    }

    // -----------------------------------------------------------------------
    // ignore
    // -----------------------------------------------------------------------

    #[test]
    fn ignored_regardless_of_destination_state() {
        let fx = Fixture::new();
        let entry = fx.file("secrets/key.txt");
        fs::create_dir_all(fx.dest.join("secrets")).unwrap();
        fs::write(fx.dest.join("secrets/key.txt"), "occupied").unwrap();

        assert_eq!(
            fx.classify(&entry, &["secrets/"]),
            PlanItem::Ignored {
                relative: RelativePath::new("secrets/key.txt"),
                kind: EntryKind::File
            }
        );
    }

    #[test]
    fn running_program_is_ignored() {
        let fx = Fixture::new();
        let entry = fx.file("tools/deploy-bin");
        let ignore = IgnoreMatcher::compile(Vec::<String>::new()).unwrap();
        let item = Classifier::new(&fx.source, &fx.dest, &ignore)
            .with_self_path(Some(&entry.path))
            .classify(&entry)
            .unwrap();
        assert!(matches!(item, PlanItem::Ignored { .. }));
    }
}
