//! Platform tables of OS-critical directories.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Target operating system family used to pick a protected-path table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    MacOs,
    Windows,
    Linux,
}

impl Platform {
    /// Platform the crate was compiled for (anything else falls back to Linux)
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOs => "macos",
            Platform::Windows => "windows",
            Platform::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" => Ok(Platform::MacOs),
            "windows" | "win32" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            other => Err(ParseEnumError {
                kind: "platform",
                value: other.to_string(),
            }),
        }
    }
}

const MACOS_PROTECTED: &[&str] = &[
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/var",
    "/etc",
    "/Applications",
    "/Library",
    "/boot",
];

const WINDOWS_PROTECTED: &[&str] = &[
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
    "C:\\System Volume Information",
];

const LINUX_PROTECTED: &[&str] = &[
    "/usr", "/bin", "/sbin", "/var", "/etc", "/boot", "/sys", "/proc",
];

/// Mapping from platform to the absolute prefixes that must never be touched.
///
/// Only the table of the active platform is consulted. Tests build their own
/// tables instead of relying on the host's.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedPaths {
    tables: HashMap<Platform, BTreeSet<PathBuf>>,
    active: Platform,
}

impl ProtectedPaths {
    /// Built-in tables for every platform, active on the host platform
    pub fn builtin() -> Self {
        let mut tables = HashMap::new();
        for (platform, prefixes) in [
            (Platform::MacOs, MACOS_PROTECTED),
            (Platform::Windows, WINDOWS_PROTECTED),
            (Platform::Linux, LINUX_PROTECTED),
        ] {
            tables.insert(platform, prefixes.iter().map(PathBuf::from).collect());
        }

        Self {
            tables,
            active: Platform::current(),
        }
    }

    /// A single table for `platform`, made active
    pub fn for_platform<I, P>(platform: Platform, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut tables = HashMap::new();
        tables.insert(platform, prefixes.into_iter().map(Into::into).collect());
        Self {
            tables,
            active: platform,
        }
    }

    /// No protected prefixes at all on the host platform
    pub fn none() -> Self {
        Self::for_platform(Platform::current(), Vec::<PathBuf>::new())
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.active = platform;
        self
    }

    pub fn insert(&mut self, platform: Platform, prefix: impl Into<PathBuf>) {
        self.tables.entry(platform).or_default().insert(prefix.into());
    }

    pub fn platform(&self) -> Platform {
        self.active
    }

    /// Prefixes of the active platform
    pub fn active(&self) -> impl Iterator<Item = &Path> {
        self.tables
            .get(&self.active)
            .into_iter()
            .flat_map(|set| set.iter().map(PathBuf::as_path))
    }

    /// Check if a path equals or sits under a protected prefix
    pub fn is_protected(&self, path: &Path) -> bool {
        self.active().any(|protected| path.starts_with(protected))
    }

    /// The protected prefix covering `path`, if any
    pub fn covering(&self, path: &Path) -> Option<&Path> {
        self.active().find(|protected| path.starts_with(protected))
    }
}

impl Default for ProtectedPaths {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macos_table_protects_finder() {
        let paths = ProtectedPaths::builtin().with_platform(Platform::MacOs);
        assert!(paths.is_protected(Path::new("/System/Library/CoreServices/Finder.app")));
        assert!(paths.is_protected(Path::new("/Applications")));
        assert!(!paths.is_protected(Path::new("/Users/test/Downloads/file.txt")));
    }

    #[test]
    fn test_prefix_match_is_component_wise() {
        let paths = ProtectedPaths::for_platform(Platform::Linux, ["/usr"]);
        assert!(paths.is_protected(Path::new("/usr/bin/env")));
        assert!(!paths.is_protected(Path::new("/usrlocal/file")));
    }

    #[test]
    fn test_only_active_table_applies() {
        let paths = ProtectedPaths::builtin().with_platform(Platform::Linux);
        assert!(!paths.is_protected(Path::new("/Applications/Safari.app")));
        assert!(paths.is_protected(Path::new("/proc/1/status")));
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("darwin".parse::<Platform>().unwrap(), Platform::MacOs);
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
        assert!("beos".parse::<Platform>().is_err());
    }
}
