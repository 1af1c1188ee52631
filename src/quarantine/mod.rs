//! Quarantine Module
//!
//! A recoverable delete target that lives in a directory we control
//! (`~/.sentinel/quarantine` by default). Deleted items are moved there
//! with a JSON sidecar recording where they came from, so they can be
//! listed and restored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::execution::{move_path, path_exists, RecoverableTrash};

const METADATA_SUFFIX: &str = ".quarantine.json";

/// A quarantined file or directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantinedItem {
    /// Current path in quarantine
    pub path: PathBuf,

    /// Original file/directory name
    pub name: String,

    /// Original path before quarantine
    pub original_path: PathBuf,

    /// When the item was quarantined
    pub quarantine_date: DateTime<Utc>,

    pub is_directory: bool,
}

#[derive(Debug, Clone)]
pub struct QuarantineBin {
    base_path: PathBuf,
}

impl QuarantineBin {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_quarantine_dir(&self) -> Result<(), String> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)
                .map_err(|e| format!("Failed to create quarantine directory: {}", e))?;
        }
        Ok(())
    }

    /// Unique slot for an item: `<timestamp>_<id>_<name>`
    fn generate_quarantine_path(&self, original_path: &Path) -> PathBuf {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let id = uuid::Uuid::new_v4().simple().to_string();
        let name = original_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        self.base_path
            .join(format!("{}_{}_{}", timestamp, &id[..8], name))
    }

    fn metadata_path(quarantine_path: &Path) -> PathBuf {
        let mut name = quarantine_path.as_os_str().to_owned();
        name.push(METADATA_SUFFIX);
        PathBuf::from(name)
    }

    /// Move a file or directory into quarantine, returning its new path
    pub fn quarantine(&self, path: &Path) -> Result<PathBuf, String> {
        self.ensure_quarantine_dir()?;

        if !path_exists(path) {
            return Err(format!("Path does not exist: {}", path.display()));
        }
        let is_directory = path.is_dir();

        let quarantine_path = self.generate_quarantine_path(path);
        move_path(path, &quarantine_path)?;

        let item = QuarantinedItem {
            path: quarantine_path.clone(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            original_path: path.to_path_buf(),
            quarantine_date: Utc::now(),
            is_directory,
        };
        self.save_item_metadata(&item)?;

        tracing::info!(
            from = %path.display(),
            to = %quarantine_path.display(),
            "Moved to quarantine"
        );

        Ok(quarantine_path)
    }

    fn save_item_metadata(&self, item: &QuarantinedItem) -> Result<(), String> {
        let json = serde_json::to_string_pretty(item)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        fs::write(Self::metadata_path(&item.path), json)
            .map_err(|e| format!("Failed to write metadata: {}", e))
    }

    fn load_item_metadata(&self, quarantine_path: &Path) -> Option<QuarantinedItem> {
        fs::read_to_string(Self::metadata_path(quarantine_path))
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    /// Restore a quarantined item to `original_path`, or to where it came
    /// from when `None`. Never overwrites.
    pub fn restore(
        &self,
        quarantine_path: &Path,
        original_path: Option<PathBuf>,
    ) -> Result<PathBuf, String> {
        if !quarantine_path.starts_with(&self.base_path) {
            return Err("Path is not in quarantine directory".to_string());
        }

        let restore_path = match original_path {
            Some(path) => path,
            None => self
                .load_item_metadata(quarantine_path)
                .map(|item| item.original_path)
                .ok_or_else(|| "No original path found and none provided".to_string())?,
        };

        if path_exists(&restore_path) {
            return Err(format!(
                "Cannot restore: path already exists: {}",
                restore_path.display()
            ));
        }

        move_path(quarantine_path, &restore_path)?;
        let _ = fs::remove_file(Self::metadata_path(quarantine_path));

        tracing::info!(
            from = %quarantine_path.display(),
            to = %restore_path.display(),
            "Restored from quarantine"
        );

        Ok(restore_path)
    }

    /// All quarantined items with readable metadata, newest first
    pub fn list(&self) -> Result<Vec<QuarantinedItem>, String> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| format!("Failed to read quarantine directory: {}", e))?;

        let mut items: Vec<QuarantinedItem> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| !path.to_string_lossy().ends_with(METADATA_SUFFIX))
            .filter_map(|path| self.load_item_metadata(&path))
            .collect();

        items.sort_by(|a, b| b.quarantine_date.cmp(&a.quarantine_date));
        Ok(items)
    }

    /// Most recent quarantined item that came from `original_path`
    pub fn find_by_original_path(&self, original_path: &Path) -> Option<QuarantinedItem> {
        self.list()
            .ok()?
            .into_iter()
            .find(|item| item.original_path == original_path)
    }
}

impl RecoverableTrash for QuarantineBin {
    fn send_to_trash(&self, path: &Path) -> Result<(), String> {
        self.quarantine(path).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "quarantine"
    }
}
