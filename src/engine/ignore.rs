//! Ignore rules: a deliberately restricted subset of ignore-file semantics.
//!
//! A relative path is ignored when it equals a rule, starts with a rule as a
//! literal string prefix, or matches the rule as a simple glob where `*` is
//! any run of characters (including `/`).  There is no directory anchoring
//! and a leading `!` is accepted but inert: `!foo` excludes exactly what
//! `foo` excludes.
use std::sync::LazyLock;

use regex::Regex;

use super::path::RelativePath;
use crate::error::ValidationError;

/// Name of the line-oriented ignore-list file at the source root.
pub const IGNORE_FILE_NAME: &str = ".dotlinkignore";

/// Name of the optional settings file at the source root.
pub const SETTINGS_FILE_NAME: &str = "dotlink.toml";

static PATTERN_GRAMMAR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^!?[\w\-.*/]+$").ok());

/// A single compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    raw: String,
    body: String,
    negated: bool,
    glob: Option<Regex>,
}

impl IgnoreRule {
    /// Validate and compile one pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPattern`] if the pattern is blank,
    /// contains `:`, or uses characters outside word characters, `-`, `.`,
    /// `*` and `/`.
    pub fn compile(pattern: &str) -> Result<Self, ValidationError> {
        let invalid = |reason| ValidationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };

        if pattern.trim().is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if pattern.contains(':') {
            return Err(invalid("pattern contains ':'"));
        }
        let negated = pattern.starts_with('!');
        let body = pattern.strip_prefix('!').unwrap_or(pattern);
        if body.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        let grammar_ok = PATTERN_GRAMMAR
            .as_ref()
            .is_some_and(|grammar| grammar.is_match(pattern));
        if !grammar_ok {
            return Err(invalid(
                "only word characters, '-', '.', '*' and '/' are allowed",
            ));
        }

        let glob = if body.contains('*') {
            let translated = body
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            Some(
                Regex::new(&format!("^{translated}$"))
                    .map_err(|_| invalid("pattern cannot be compiled"))?,
            )
        } else {
            None
        };

        Ok(Self {
            raw: pattern.to_string(),
            body: body.to_string(),
            negated,
            glob,
        })
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern was written with a leading `!`.
    ///
    /// Negation is parsed but has no effect on matching.
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether `relative` is excluded by this rule.
    #[must_use]
    pub fn matches(&self, relative: &str) -> bool {
        relative == self.body
            || relative.starts_with(&self.body)
            || self.glob.as_ref().is_some_and(|g| g.is_match(relative))
    }
}

/// A compiled set of ignore rules.
///
/// Rules match by literal prefix of the relative path, so a trailing-slash
/// rule such as `secrets/` excludes everything below `secrets` but not the
/// `secrets` entry itself: an empty `secrets` folder is still created in the
/// destination.  `secrets` without the slash skips the folder too, along
/// with any other path that starts with `secrets`.
///
/// # Examples
///
/// ```
/// use dotlink::engine::ignore::IgnoreMatcher;
/// use dotlink::engine::path::RelativePath;
///
/// let matcher = IgnoreMatcher::compile(["secrets/", "*.bak"]).unwrap();
/// assert!(matcher.matches(&RelativePath::new("secrets/key.txt")));
/// assert!(matcher.matches(&RelativePath::new("vim/init.vim.bak")));
/// assert!(!matcher.matches(&RelativePath::new("vim/init.vim")));
/// assert!(!matcher.matches(&RelativePath::new("secrets")));
/// ```
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Compile `patterns` together with the implicit rules for the ignore-list
    /// and settings files.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError::InvalidPattern`] encountered.
    pub fn compile<I, S>(patterns: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules = vec![
            IgnoreRule::compile(IGNORE_FILE_NAME)?,
            IgnoreRule::compile(SETTINGS_FILE_NAME)?,
        ];
        for pattern in patterns {
            rules.push(IgnoreRule::compile(pattern.as_ref())?);
        }
        Ok(Self { rules })
    }

    /// Add the deploying program's own file name as an implicit rule.
    ///
    /// Names that do not fit the pattern grammar are skipped; the classifier
    /// still recognises the program by its absolute path.
    #[must_use]
    pub fn with_program_name(mut self, name: &str) -> Self {
        if let Ok(rule) = IgnoreRule::compile(name) {
            self.rules.push(rule);
        }
        self
    }

    /// Whether `relative` is excluded by any rule.
    #[must_use]
    pub fn matches(&self, relative: &RelativePath) -> bool {
        let rel = relative.as_str();
        self.rules.iter().any(|rule| rule.matches(rel))
    }

    /// Rules written with a leading `!`.
    pub fn negated_rules(&self) -> impl Iterator<Item = &IgnoreRule> {
        self.rules.iter().filter(|r| r.is_negated())
    }

    /// Number of compiled rules, implicit ones included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always `false`: the implicit rules are always present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
