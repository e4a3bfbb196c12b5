//! Child processes: locating, running and rendering commands.
use std::path::PathBuf;
use std::process::Command;

/// Run a command attached to the current terminal and return its exit code.
///
/// Used when the child must talk to the operator (e.g., a password prompt).
/// A child killed by a signal reports `-1`.
///
/// # Errors
///
/// Returns the spawn error if the process cannot be started.
pub fn run_attached(program: &str, args: &[String]) -> std::io::Result<i32> {
    let status = Command::new(program).args(args).status()?;
    Ok(status.code().unwrap_or(-1))
}

/// Locate a program on `PATH`.
#[must_use]
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Render a command line the operator can paste into a shell.
///
/// Arguments containing whitespace or quotes are single-quoted.
#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', "'\\''"))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn run_attached_reports_exit_code() {
        let code = run_attached("sh", &["-c".to_string(), "exit 3".to_string()]).unwrap();
        assert_eq!(code, 3);
    }

    #[test]
    fn find_program_missing() {
        assert!(find_program("this-program-does-not-exist-12345").is_none());
    }

    #[test]
    fn command_line_plain_args() {
        let args = vec!["link-batch".to_string(), "/tmp/batch.json".to_string()];
        assert_eq!(
            command_line("sudo", &args),
            "sudo link-batch /tmp/batch.json"
        );
    }

    #[test]
    fn command_line_quotes_spaces() {
        let args = vec!["/home/me/My Files/batch.json".to_string()];
        assert_eq!(
            command_line("dotlink", &args),
            "dotlink '/home/me/My Files/batch.json'"
        );
    }

    #[test]
    fn command_line_escapes_single_quote() {
        let args = vec!["it's".to_string()];
        assert_eq!(command_line("echo", &args), r"echo 'it'\''s'");
    }
}
