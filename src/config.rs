//! Runtime configuration, read from `SENTINEL_*` environment variables
//! (optionally via a `.env` file).

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::security::{Platform, ProtectedPaths, DEFAULT_DELETION_WARNING_THRESHOLD};

const ENV_DATABASE_PATH: &str = "SENTINEL_DATABASE_PATH";
const ENV_QUARANTINE_DIR: &str = "SENTINEL_QUARANTINE_DIR";
const ENV_DELETE_WARNING_THRESHOLD: &str = "SENTINEL_DELETE_WARNING_THRESHOLD";
const ENV_DRY_RUN: &str = "SENTINEL_DRY_RUN";
const ENV_PLATFORM: &str = "SENTINEL_PLATFORM";

const DATA_DIR_NAME: &str = ".sentinel";

#[derive(Debug, Clone, PartialEq)]
pub struct SentinelConfig {
    /// SQLite file holding the audit log and task registry
    pub database_path: PathBuf,
    /// Where the quarantine bin keeps deleted items
    pub quarantine_dir: PathBuf,
    /// Which protected-path table is active
    pub platform: Platform,
    pub deletion_warning_threshold: usize,
    /// Log-free simulation: every unit reports success, nothing is touched
    pub dry_run: bool,
}

impl SentinelConfig {
    /// Defaults rooted at `data_dir` (normally `~/.sentinel`)
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            database_path: data_dir.join("sentinel.db"),
            quarantine_dir: data_dir.join("quarantine"),
            platform: Platform::current(),
            deletion_warning_threshold: DEFAULT_DELETION_WARNING_THRESHOLD,
            dry_run: false,
        }
    }

    /// Defaults rooted at `~/.sentinel`
    pub fn default_for_home() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(Self::with_data_dir(home.join(DATA_DIR_NAME)))
    }

    /// Load `.env` (current directory, then parent) and apply `SENTINEL_*`
    /// overrides on top of the home-directory defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_path("../.env");
        }

        let base = Self::default_for_home()?;
        base.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; unset keys keep their values
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = non_empty(lookup(ENV_DATABASE_PATH)) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty(lookup(ENV_QUARANTINE_DIR)) {
            self.quarantine_dir = PathBuf::from(path);
        }
        if let Some(value) = non_empty(lookup(ENV_DELETE_WARNING_THRESHOLD)) {
            self.deletion_warning_threshold =
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: ENV_DELETE_WARNING_THRESHOLD,
                    value: value.clone(),
                })?;
        }
        if let Some(value) = non_empty(lookup(ENV_DRY_RUN)) {
            self.dry_run = parse_bool(&value).ok_or(ConfigError::Invalid {
                key: ENV_DRY_RUN,
                value: value.clone(),
            })?;
        }
        if let Some(value) = non_empty(lookup(ENV_PLATFORM)) {
            self.platform = value.parse().map_err(|_| ConfigError::Invalid {
                key: ENV_PLATFORM,
                value: value.clone(),
            })?;
        }
        Ok(self)
    }

    /// Built-in protected tables with the configured platform active
    pub fn protected_paths(&self) -> ProtectedPaths {
        ProtectedPaths::builtin().with_platform(self.platform)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
