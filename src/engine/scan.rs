//! Deterministic walk of the source tree.
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::path::RelativePath;
use crate::error::TraversalError;

/// Whether a scanned entry is a directory or a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A directory.
    Dir,
    /// A regular file.
    File,
}

/// One entry found under the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Path relative to the source root.
    pub relative: RelativePath,
    /// Directory or file.
    pub kind: EntryKind,
    /// Absolute path inside the source tree.
    pub path: PathBuf,
}

/// Walks a source root and yields its directories, then its files.
///
/// Each pass is sorted by file name at every level, so entries come out in
/// component-wise lexicographic order with parents before children.
/// Symbolic links inside the tree are never followed; each one is reported as
/// [`TraversalError::LinkInSource`].  Unreadable directories are reported as
/// [`TraversalError::Unreadable`] and their subtree is skipped.
///
/// The scanner holds no state besides the root: every call to
/// [`scan`](Self::scan) re-walks the filesystem.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
}

impl TreeScanner {
    /// Create a scanner for `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily enumerate all directories, then all files.
    pub fn scan(&self) -> impl Iterator<Item = Result<ScanEntry, TraversalError>> + '_ {
        self.pass(EntryKind::Dir).chain(self.pass(EntryKind::File))
    }

    /// One sorted walk yielding only entries of `kind`.
    ///
    /// Walk errors are yielded by the directory pass and links by the file
    /// pass so that each problem is reported exactly once.
    fn pass(&self, kind: EntryKind) -> impl Iterator<Item = Result<ScanEntry, TraversalError>> + '_ {
        WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |res| match res {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_symlink() {
                        return (kind == EntryKind::File).then(|| {
                            Err(TraversalError::LinkInSource {
                                path: entry.path().to_path_buf(),
                            })
                        });
                    }
                    let entry_kind = if file_type.is_dir() {
                        EntryKind::Dir
                    } else {
                        EntryKind::File
                    };
                    (entry_kind == kind).then(|| self.entry(entry.path(), kind))
                }
                Err(err) => (kind == EntryKind::Dir).then(|| Err(self.walk_error(err))),
            })
    }

    fn entry(&self, path: &Path, kind: EntryKind) -> Result<ScanEntry, TraversalError> {
        Ok(ScanEntry {
            relative: RelativePath::from_paths(&self.root, path)?,
            kind,
            path: path.to_path_buf(),
        })
    }

    fn walk_error(&self, err: walkdir::Error) -> TraversalError {
        let path = err
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        let source = err
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
        TraversalError::Unreadable { path, source }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    fn relatives(scanner: &TreeScanner) -> Vec<(String, EntryKind)> {
        scanner
            .scan()
            .map(|r| {
                let e = r.unwrap();
                (e.relative.as_str().to_string(), e.kind)
            })
            .collect()
    }

    #[test]
    fn directories_come_before_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/x.txt"), "x").unwrap();
        fs::write(dir.path().join("top.txt"), "t").unwrap();
        fs::write(dir.path().join("b/inner/y.txt"), "y").unwrap();

        let got = relatives(&TreeScanner::new(dir.path()));
        assert_eq!(
            got,
            vec![
                ("a".to_string(), EntryKind::Dir),
                ("b".to_string(), EntryKind::Dir),
                ("b/inner".to_string(), EntryKind::Dir),
                ("a/x.txt".to_string(), EntryKind::File),
                ("b/inner/y.txt".to_string(), EntryKind::File),
                ("top.txt".to_string(), EntryKind::File),
            ]
        );
    }

    #[test]
    fn scan_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("one"), "1").unwrap();
        let scanner = TreeScanner::new(dir.path());
        assert_eq!(relatives(&scanner).len(), 1);

        fs::write(dir.path().join("two"), "2").unwrap();
        assert_eq!(relatives(&scanner).len(), 2, "second scan sees new file");
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TreeScanner::new(dir.path()).scan().next().is_none());
    }

    #[test]
    fn absolute_path_is_under_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), "").unwrap();
        let entry = TreeScanner::new(dir.path()).scan().next().unwrap().unwrap();
        assert_eq!(entry.path, dir.path().join("f"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_in_source_is_reported_once_and_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/file"), "").unwrap();
        // A link back to the root would loop if followed.
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let results: Vec<_> = TreeScanner::new(dir.path()).scan().collect();
        let errors: Vec<_> = results.iter().filter(|r| r.is_err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            Err(TraversalError::LinkInSource { .. })
        ));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }
}
