//! Where dotlink keeps its per-user state.
use std::ffi::OsString;
use std::path::PathBuf;

/// Subdirectory of the user cache owned by dotlink.
const APP_DIR: &str = "dotlink";

/// The per-user cache directory, created on demand.
///
/// Holds one log file per command and the pending link batch handed to the
/// elevated process.  `$XDG_CACHE_HOME` wins, then `%LOCALAPPDATA%`, then
/// `~/.cache`.  `None` when no home directory is known or the directory
/// cannot be created.
#[must_use]
pub fn cache_dir() -> Option<PathBuf> {
    let dir = cache_root(std::env::var_os)?.join(APP_DIR);
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn cache_root(var: impl Fn(&'static str) -> Option<OsString>) -> Option<PathBuf> {
    let set = |key: &'static str| var(key).filter(|v| !v.is_empty()).map(PathBuf::from);
    set("XDG_CACHE_HOME")
        .or_else(|| set("LOCALAPPDATA"))
        .or_else(|| {
            set("HOME")
                .or_else(|| set("USERPROFILE"))
                .map(|home| home.join(".cache"))
        })
}

/// `<cache>/<command>.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(format!("{command}.log")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<OsString> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| OsString::from(v))
        }
    }

    #[test]
    fn xdg_cache_home_wins() {
        let env = [("XDG_CACHE_HOME", "/xdg"), ("HOME", "/home/me")];
        assert_eq!(cache_root(vars(&env)), Some(PathBuf::from("/xdg")));
    }

    #[test]
    fn local_app_data_before_home() {
        let env = [("LOCALAPPDATA", r"C:\Users\me\AppData\Local"), ("USERPROFILE", r"C:\Users\me")];
        assert_eq!(
            cache_root(vars(&env)),
            Some(PathBuf::from(r"C:\Users\me\AppData\Local"))
        );
    }

    #[test]
    fn home_gets_dot_cache() {
        let env = [("XDG_CACHE_HOME", ""), ("HOME", "/home/me")];
        assert_eq!(
            cache_root(vars(&env)),
            Some(PathBuf::from("/home/me/.cache"))
        );
    }

    #[test]
    fn no_home_means_no_cache() {
        assert_eq!(cache_root(vars(&[])), None);
    }
}
