//! Root resolution, settings, and ignore patterns.
pub mod ignore_file;
pub mod settings;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::engine::ignore::{IGNORE_FILE_NAME, IgnoreMatcher, SETTINGS_FILE_NAME};
use crate::error::ValidationError;
use settings::Settings;
use validation::ValidationWarning;

/// Environment variable naming the source root.
pub const SOURCE_ENV: &str = "DOTLINK_SOURCE";
/// Environment variable naming the destination root.
pub const DEST_ENV: &str = "DOTLINK_DEST";

/// Root paths given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct RootArgs {
    /// `--source`
    pub source: Option<PathBuf>,
    /// `--dest`
    pub dest: Option<PathBuf>,
    /// `--ignore`, in the order given.
    pub ignore: Vec<String>,
}

/// The parts of the process environment that influence root resolution.
///
/// Captured once so resolution itself never reads ambient state.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Value of `DOTLINK_SOURCE`.
    pub source: Option<PathBuf>,
    /// Value of `DOTLINK_DEST`.
    pub dest: Option<PathBuf>,
    /// The user's home directory.
    pub home: Option<PathBuf>,
    /// The current working directory.
    pub cwd: Option<PathBuf>,
}

impl Environment {
    /// Read the current process environment.
    #[must_use]
    pub fn capture() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        Self {
            source: var(SOURCE_ENV),
            dest: var(DEST_ENV),
            home: var("HOME").or_else(|| var("USERPROFILE")),
            cwd: std::env::current_dir().ok(),
        }
    }
}

/// Everything needed to build a plan.
#[derive(Debug)]
pub struct Config {
    /// Canonical source root.
    pub source_root: PathBuf,
    /// Canonical destination root.
    pub destination_root: PathBuf,
    /// Settings from `dotlink.toml` (defaults if absent).
    pub settings: Settings,
    /// Ignore patterns: ignore-list file, then settings, then command line.
    pub patterns: Vec<String>,
}

impl Config {
    /// Resolve and validate both roots and collect every ignore pattern.
    ///
    /// The source root comes from `--source`, then `DOTLINK_SOURCE`, then the
    /// current directory if it holds an ignore-list or settings file.  The
    /// destination comes from `--dest`, then `DOTLINK_DEST`, then the
    /// `destination` setting, then the home directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a root cannot be determined or is
    /// invalid, or if a configuration file cannot be read or parsed.
    pub fn load(args: &RootArgs, env: &Environment) -> Result<Self, ValidationError> {
        let source = resolve_source(args, env)?;
        let settings = settings::load(&source.join(SETTINGS_FILE_NAME))?;
        let destination = resolve_destination(args, env, &settings)?;
        let (source_root, destination_root) = validation::validate_roots(&source, &destination)?;

        let mut patterns = ignore_file::load(&source_root.join(IGNORE_FILE_NAME))?;
        patterns.extend(settings.ignore.iter().cloned());
        patterns.extend(args.ignore.iter().cloned());

        Ok(Self {
            source_root,
            destination_root,
            settings,
            patterns,
        })
    }

    /// Compile the ignore patterns, adding the running program's file name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPattern`] for the first bad pattern.
    pub fn ignore_matcher(&self, program: Option<&Path>) -> Result<IgnoreMatcher, ValidationError> {
        let matcher = IgnoreMatcher::compile(&self.patterns)?;
        Ok(match program.and_then(Path::file_name).and_then(|n| n.to_str()) {
            Some(name) => matcher.with_program_name(name),
            None => matcher,
        })
    }

    /// Non-fatal issues worth showing to the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPattern`] for the first bad pattern.
    pub fn warnings(&self) -> Result<Vec<ValidationWarning>, ValidationError> {
        Ok(validation::pattern_warnings(&IgnoreMatcher::compile(
            &self.patterns,
        )?))
    }
}

fn resolve_source(args: &RootArgs, env: &Environment) -> Result<PathBuf, ValidationError> {
    if let Some(source) = args.source.as_ref().or(env.source.as_ref()) {
        return Ok(source.clone());
    }
    if let Some(cwd) = &env.cwd
        && (cwd.join(IGNORE_FILE_NAME).is_file() || cwd.join(SETTINGS_FILE_NAME).is_file())
    {
        return Ok(cwd.clone());
    }
    Err(ValidationError::UndeterminedSource)
}

fn resolve_destination(
    args: &RootArgs,
    env: &Environment,
    settings: &Settings,
) -> Result<PathBuf, ValidationError> {
    args.dest
        .clone()
        .or_else(|| env.dest.clone())
        .or_else(|| settings.destination_path(env.home.as_deref()))
        .or_else(|| env.home.clone())
        .ok_or(ValidationError::UndeterminedDestination)
}
