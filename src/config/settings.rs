//! Optional `dotlink.toml` settings at the root of the source tree.
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

/// Settings read from `dotlink.toml`.
///
/// ```toml
/// destination = "~/"
/// ignore = ["README.md", "*.swp"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Destination root; `~` expands to the home directory.
    pub destination: Option<String>,
    /// Extra ignore patterns, merged with the ignore-list file.
    pub ignore: Vec<String>,
}

impl Settings {
    /// The destination with a leading `~` expanded against `home`.
    ///
    /// Returns `None` if no destination is set, or if it starts with `~` and
    /// no home directory is known.
    #[must_use]
    pub fn destination_path(&self, home: Option<&Path>) -> Option<PathBuf> {
        self.destination
            .as_deref()
            .and_then(|raw| expand_tilde(raw, home))
    }
}

/// Expand a leading `~` or `~/` in `raw`.
#[must_use]
pub fn expand_tilde(raw: &str, home: Option<&Path>) -> Option<PathBuf> {
    if raw == "~" {
        return home.map(Path::to_path_buf);
    }
    match raw.strip_prefix("~/").or_else(|| raw.strip_prefix("~\\")) {
        Some(rest) => home.map(|h| h.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

/// Load settings from `path`; a missing file yields the defaults.
///
/// # Errors
///
/// Returns [`ValidationError::Io`] if the file exists but cannot be read, or
/// [`ValidationError::Settings`] if it is not valid TOML or has unknown keys.
pub fn load(path: &Path) -> Result<Settings, ValidationError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ValidationError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&content).map_err(|e| ValidationError::Settings {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn load_str(content: &str) -> Result<Settings, ValidationError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dotlink.toml");
        std::fs::write(&path, content).unwrap();
        load(&path)
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load(&dir.path().join("dotlink.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parses_all_keys() {
        let settings = load_str(
            r#"
destination = "~/sandbox"
ignore = ["README.md", "*.swp"]
"#,
        )
        .unwrap();
        assert_eq!(settings.destination.as_deref(), Some("~/sandbox"));
        assert_eq!(settings.ignore, vec!["README.md", "*.swp"]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = load_str("destinaton = \"/tmp\"\n").unwrap_err();
        assert!(matches!(err, ValidationError::Settings { .. }));
        assert!(err.to_string().contains("destinaton"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(load_str("ignore = \"README.md\"\n").is_err());
    }

    #[test]
    fn tilde_expansion() {
        let home = Path::new("/home/me");
        assert_eq!(expand_tilde("~", Some(home)), Some(PathBuf::from("/home/me")));
        assert_eq!(
            expand_tilde("~/cfg", Some(home)),
            Some(PathBuf::from("/home/me/cfg"))
        );
        assert_eq!(expand_tilde("/abs", None), Some(PathBuf::from("/abs")));
        assert_eq!(expand_tilde("~/cfg", None), None);
        // Only a leading tilde is special.
        assert_eq!(
            expand_tilde("/a/~/b", Some(home)),
            Some(PathBuf::from("/a/~/b"))
        );
    }
}
