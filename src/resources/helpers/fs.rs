//! File-system resource helpers.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Describe what kind of object `meta` belongs to, without following links.
#[must_use]
pub fn slot_kind(meta: &std::fs::Metadata) -> &'static str {
    if meta.file_type().is_symlink() {
        "link"
    } else if meta.is_dir() {
        "directory"
    } else {
        "file"
    }
}

/// Remove whatever exists at `path`: file, link, or whole directory tree.
///
/// Links are removed themselves, never followed.  Does nothing if `path`
/// does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_entry(path: &Path) -> Result<()> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.file_type().is_symlink() {
        remove_symlink(path)
    } else if meta.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("remove directory: {}", path.display()))
    } else {
        std::fs::remove_file(path).with_context(|| format!("remove file: {}", path.display()))
    }
}

/// How [`stage_path`] put `from` at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged {
    /// `from` was renamed and no longer exists.
    Renamed,
    /// `from` was copied across a filesystem boundary and still exists.
    Copied,
}

/// Put the contents of `from` at `to`.
///
/// Prefers a rename.  When the rename crosses a filesystem boundary the
/// object is copied instead and `from` is left for the caller to remove once
/// the copy has been committed.  A copy that fails part-way is removed again,
/// so on error `to` does not exist.
///
/// # Errors
///
/// Returns an error if neither the rename nor the copy succeeds.
pub fn stage_path(from: &Path, to: &Path) -> Result<Staged> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(Staged::Renamed);
    }
    if let Err(e) = copy_path(from, to) {
        let _ = remove_entry(to);
        return Err(e)
            .with_context(|| format!("cross-fs copy {} to {}", from.display(), to.display()));
    }
    Ok(Staged::Copied)
}

fn copy_path(from: &Path, to: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(from)
        .with_context(|| format!("reading metadata: {}", from.display()))?;
    if meta.is_dir() {
        copy_dir_recursive(from, to)
    } else {
        std::fs::copy(from, to)
            .map(drop)
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))
    }
}

/// A hidden sibling of `path` tagged with `tag`, e.g. `.bashrc.dotlink-staged`.
#[must_use]
pub fn sibling_path(path: &Path, tag: &str) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "entry".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.dotlink-{tag}"))
}

/// Recursively copy a directory tree.
///
/// Symlinks within the source tree are *followed*: their content is copied,
/// not the link itself.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Compare a link's stored target with an expected path.
///
/// Relative link targets are resolved against the link's parent directory,
/// and the `\\?\` prefix Windows prepends to extended-length paths is ignored.
#[must_use]
pub fn link_points_to(link: &Path, stored: &Path, expected: &Path) -> bool {
    let resolved = if stored.is_relative() {
        link.parent()
            .map_or_else(|| stored.to_path_buf(), |parent| parent.join(stored))
    } else {
        stored.to_path_buf()
    };
    strip_win_prefix(&resolved) == strip_win_prefix(expected)
}

fn strip_win_prefix(p: &Path) -> PathBuf {
    let s = p.to_string_lossy();
    s.strip_prefix(r"\\?\")
        .map_or_else(|| p.to_path_buf(), PathBuf::from)
}

/// Create a symlink at `link` pointing to `target` (platform-specific).
///
/// # Errors
///
/// Returns an error if the OS refuses to create the link.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })?;
    }

    #[cfg(windows)]
    {
        let result = if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        result.with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })?;
    }

    Ok(())
}

/// Remove a symlink, handling platform differences.
///
/// On Windows, directory symlinks must be removed with `remove_dir` (not
/// `remove_file`), and `symlink_metadata().is_dir()` is `false` for them, so
/// the raw `FILE_ATTRIBUTE_DIRECTORY` flag is checked instead.
///
/// # Errors
///
/// Returns an error if the link cannot be removed.
pub fn remove_symlink(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)
        .with_context(|| format!("reading metadata: {}", path.display()))?;
    if is_dir_like(&meta) {
        match std::fs::remove_dir(path) {
            Ok(()) => {}
            #[cfg(windows)]
            Err(e) if e.raw_os_error() == Some(5) => {
                remove_dir_fallback(path)?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("removing link: {}", path.display()));
            }
        }
    } else {
        std::fs::remove_file(path).with_context(|| format!("removing link: {}", path.display()))?;
    }
    Ok(())
}

fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}

/// Fallback directory-link removal on Windows using `cmd /c rmdir`, which
/// runs without any handles held by this process.
#[cfg(windows)]
fn remove_dir_fallback(path: &Path) -> Result<()> {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    use std::os::windows::process::CommandExt;
    let output = std::process::Command::new("cmd")
        .arg("/c")
        .arg("rmdir")
        .arg("/q")
        .arg(path)
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .context("failed to run rmdir")?;
    if !output.status.success() {
        anyhow::bail!(
            "remove directory link '{}': {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}
