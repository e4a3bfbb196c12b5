//! Root validation and configuration warnings.
use std::path::{Path, PathBuf};

use crate::engine::ignore::IgnoreMatcher;
use crate::error::ValidationError;

/// A non-fatal issue detected while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The configuration source (e.g., ".dotlinkignore", "dotlink.toml").
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a warning about `item` found in `source`.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Canonicalize both roots and check they can be reconciled.
///
/// Returns the canonical `(source, destination)` pair.
///
/// # Errors
///
/// Returns a [`ValidationError`] if either root is missing or not a
/// directory, if both are the same directory, or if the destination lies
/// inside the source tree.
pub fn validate_roots(source: &Path, destination: &Path) -> Result<(PathBuf, PathBuf), ValidationError> {
    let source = canonical_dir("source", source)?;
    let destination = canonical_dir("destination", destination)?;
    if source == destination {
        return Err(ValidationError::SameRoots { path: source });
    }
    if destination.starts_with(&source) {
        return Err(ValidationError::DestinationInsideSource { path: destination });
    }
    Ok((source, destination))
}

fn canonical_dir(role: &'static str, path: &Path) -> Result<PathBuf, ValidationError> {
    let canonical = dunce::canonicalize(path).map_err(|_| ValidationError::MissingRoot {
        role,
        path: path.to_path_buf(),
    })?;
    if !canonical.is_dir() {
        return Err(ValidationError::NotADirectory {
            role,
            path: canonical,
        });
    }
    Ok(canonical)
}

/// Warnings for ignore rules whose syntax has no distinct effect.
#[must_use]
pub fn pattern_warnings(matcher: &IgnoreMatcher) -> Vec<ValidationWarning> {
    matcher
        .negated_rules()
        .map(|rule| {
            ValidationWarning::new(
                "ignore patterns",
                rule.as_str(),
                "negation is not supported; the pattern is matched as written without '!'",
            )
        })
        .collect()
}
