//! The line-oriented ignore-list file (`.dotlinkignore`).
use std::path::Path;

use crate::error::ValidationError;

/// Extract patterns from ignore-list content.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
#[must_use]
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read patterns from `path`; a missing file yields no patterns.
///
/// # Errors
///
/// Returns [`ValidationError::Io`] if the file exists but cannot be read.
pub fn load(path: &Path) -> Result<Vec<String>, ValidationError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(parse(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(ValidationError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blanks_are_skipped() {
        let content = "# header\n\n*.swp\n   \n  # indented comment\nsecrets/\n";
        assert_eq!(parse(content), vec!["*.swp", "secrets/"]);
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(parse("  README.md  \r\n\t.git/\n"), vec!["README.md", ".git/"]);
    }

    #[test]
    fn negation_is_kept_verbatim() {
        assert_eq!(parse("!keep.txt\n"), vec!["!keep.txt"]);
    }

    #[test]
    fn missing_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join(".dotlinkignore")).unwrap().is_empty());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".dotlinkignore");
        std::fs::write(&path, "# c\nfoo\n").unwrap();
        assert_eq!(load(&path).unwrap(), vec!["foo"]);
    }
}
