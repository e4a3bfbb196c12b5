//! Source-relative paths with a single canonical separator.
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TraversalError;

/// A path relative to the source root, always `/`-separated.
///
/// This is the join key between the source and destination trees and the
/// identity of a plan item: two entries are the same dotfile iff their
/// `RelativePath` strings are equal.
///
/// # Examples
///
/// ```
/// use dotlink::engine::path::RelativePath;
///
/// let rel = RelativePath::new("config\\git/config");
/// assert_eq!(rel.as_str(), "config/git/config");
/// assert_eq!(rel.depth(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalise `raw` to the canonical form: `\` becomes `/`, empty
    /// segments and leading/trailing separators are dropped.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        let joined = raw
            .as_ref()
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// Express `path` relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`TraversalError::NotRelative`] if `path` is not under `root`,
    /// is `root` itself, or contains a non-UTF-8 component.
    pub fn from_paths(root: &Path, path: &Path) -> Result<Self, TraversalError> {
        let not_relative = || TraversalError::NotRelative {
            path: path.to_path_buf(),
        };
        let stripped = path.strip_prefix(root).map_err(|_| not_relative())?;
        let mut parts = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(not_relative)?),
                Component::CurDir => {}
                _ => return Err(not_relative()),
            }
        }
        if parts.is_empty() {
            return Err(not_relative());
        }
        Ok(Self(parts.join("/")))
    }

    /// The canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of path segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Join this path under `root` using native separators.
    #[must_use]
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
    }

    /// Case-folded key used to detect collisions on case-insensitive filesystems.
    #[must_use]
    pub fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_separators() {
        assert_eq!(RelativePath::new("a\\b\\c.txt").as_str(), "a/b/c.txt");
        assert_eq!(RelativePath::new("/a//b/").as_str(), "a/b");
    }

    #[test]
    fn from_paths_strips_root() {
        let root = PathBuf::from("/src");
        let rel = RelativePath::from_paths(&root, &root.join("a").join("b.txt")).unwrap();
        assert_eq!(rel.as_str(), "a/b.txt");
    }

    #[test]
    fn from_paths_rejects_root_itself() {
        let root = PathBuf::from("/src");
        assert!(RelativePath::from_paths(&root, &root).is_err());
    }

    #[test]
    fn from_paths_rejects_outside_root() {
        let root = PathBuf::from("/src");
        assert!(RelativePath::from_paths(&root, Path::new("/other/file")).is_err());
    }

    #[test]
    fn under_joins_each_segment() {
        let rel = RelativePath::new("config/git/config");
        assert_eq!(
            rel.under(Path::new("/home/user")),
            PathBuf::from("/home/user").join("config").join("git").join("config")
        );
    }

    #[test]
    fn ordering_follows_string_order() {
        let mut paths = vec![
            RelativePath::new("b"),
            RelativePath::new("a/z"),
            RelativePath::new("a"),
        ];
        paths.sort();
        let strs: Vec<&str> = paths.iter().map(RelativePath::as_str).collect();
        assert_eq!(strs, vec!["a", "a/z", "b"]);
    }

    #[test]
    fn folded_is_lowercase() {
        assert_eq!(RelativePath::new("Config/Foo").folded(), "config/foo");
    }
}
