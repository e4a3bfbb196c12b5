//! Operating system detection and the elevation mechanism it implies.
use std::fmt;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
    /// Any other Unix-like system.
    Unix,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::MacOs => write!(f, "macos"),
            Os::Windows => write!(f, "windows"),
            Os::Unix => write!(f, "unix"),
        }
    }
}

/// How a batch of link operations is re-run with elevated privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    /// `sudo <program> ...`
    Sudo,
    /// PowerShell `Start-Process -Verb RunAs`.
    RunAs,
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// The detected operating system.
    pub os: Os,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            os: Self::detect_os(),
        }
    }

    /// Create a platform with explicit values (for testing).
    #[cfg(test)]
    pub const fn new(os: Os) -> Self {
        Self { os }
    }

    /// Whether this is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether the default filesystem treats names differing only in case as
    /// the same entry.
    #[must_use]
    pub fn case_insensitive_paths(&self) -> bool {
        matches!(self.os, Os::Windows | Os::MacOs)
    }

    /// The elevation mechanism used for the link batch.
    #[must_use]
    pub fn elevation(&self) -> Elevation {
        if self.is_windows() {
            Elevation::RunAs
        } else {
            Elevation::Sudo
        }
    }

    fn detect_os() -> Os {
        if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "windows") {
            Os::Windows
        } else {
            Os::Unix
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_detect_matches_target() {
        let p = Platform::detect();
        assert_eq!(p.is_windows(), cfg!(windows));
    }

    #[test]
    fn linux_is_case_sensitive() {
        let p = Platform::new(Os::Linux);
        assert!(!p.case_insensitive_paths());
        assert_eq!(p.elevation(), Elevation::Sudo);
    }

    #[test]
    fn macos_is_case_insensitive() {
        let p = Platform::new(Os::MacOs);
        assert!(p.case_insensitive_paths());
        assert_eq!(p.elevation(), Elevation::Sudo);
    }

    #[test]
    fn windows_uses_runas() {
        let p = Platform::new(Os::Windows);
        assert!(p.is_windows());
        assert!(p.case_insensitive_paths());
        assert_eq!(p.elevation(), Elevation::RunAs);
    }

    #[test]
    fn os_display() {
        assert_eq!(Os::Linux.to_string(), "linux");
        assert_eq!(Os::MacOs.to_string(), "macos");
        assert_eq!(Os::Windows.to_string(), "windows");
    }
}
