//! Undo of executed tasks, driven by the audit log.
//!
//! Only `success` entries are reversed, newest first. Before touching
//! anything each entry is checked against the live filesystem, so drift
//! (a file moved again, an original path re-occupied) is reported instead
//! of clobbering data. Undo is one-shot per task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::log::AuditLog;
use super::store::TaskRegistry;
use crate::error::UndoError;
use crate::execution::{is_empty_dir, move_path, path_exists, remove_empty_dir, run_blocking};
use crate::models::{
    ActionType, ExecutionLogEntry, ExecutionResult, LogStatus, UndoOperation,
};
use crate::security::ProtectedPaths;

const DELETE_NOT_UNDOABLE: &str =
    "Delete operations cannot be automatically undone. Files are in Trash.";

/// Result of trying to reverse one log entry
enum Reversal {
    Undone,
    Failed(String),
    /// Nothing to reverse (skip actions, pre-existing, non-empty or missing
    /// folders)
    Skipped(&'static str),
}

#[derive(Clone)]
pub struct UndoManager {
    audit: AuditLog,
    registry: Arc<dyn TaskRegistry>,
    protected: ProtectedPaths,
}

impl UndoManager {
    pub fn new(audit: AuditLog, registry: Arc<dyn TaskRegistry>) -> Self {
        Self {
            audit,
            registry,
            protected: ProtectedPaths::builtin(),
        }
    }

    /// Paths undo must never write into
    pub fn with_protected_paths(mut self, protected: ProtectedPaths) -> Self {
        self.protected = protected;
        self
    }

    /// Whether `task_id` can be undone, and why not if it can't
    pub fn can_undo(&self, task_id: &str) -> (bool, Option<String>) {
        let task = match self.registry.get(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => return (false, Some(format!("Task {} not found", task_id))),
            Err(e) => return (false, Some(format!("Failed to read task registry: {}", e))),
        };

        if !task.undo_available {
            return (false, Some("Task has already been undone".to_string()));
        }

        if self.audit.successful_entries(task_id).is_empty() {
            return (false, Some("No successful operations to undo".to_string()));
        }

        (true, None)
    }

    /// What undo would do for each successful operation, newest first.
    /// Read-only.
    pub fn preview_undo(&self, task_id: &str) -> Vec<UndoOperation> {
        let mut entries = self.audit.successful_entries(task_id);
        entries.reverse();

        entries
            .into_iter()
            .map(|entry| {
                let undo_reason = self.blocking_reason(&entry);
                UndoOperation {
                    task_id: task_id.to_string(),
                    action_type: entry.action_type,
                    original_path: entry.source_path,
                    new_path: entry.destination_path,
                    timestamp: entry.timestamp,
                    can_undo: undo_reason.is_none(),
                    undo_reason,
                }
            })
            .collect()
    }

    fn blocking_reason(&self, entry: &ExecutionLogEntry) -> Option<String> {
        match entry.action_type {
            ActionType::Delete => Some(
                "Delete operations cannot be automatically undone. File is in Trash.".to_string(),
            ),
            ActionType::Move | ActionType::Rename => {
                let destination = match &entry.destination_path {
                    Some(destination) => destination,
                    None => return Some("No destination recorded for this operation".to_string()),
                };
                if !path_exists(destination) {
                    Some(format!(
                        "File no longer exists at destination: {}",
                        destination.display()
                    ))
                } else if path_exists(&entry.source_path) {
                    Some(format!(
                        "Original path is now occupied: {}",
                        entry.source_path.display()
                    ))
                } else if self.protected.is_protected(&entry.source_path) {
                    Some(format!(
                        "Original path is protected: {}",
                        entry.source_path.display()
                    ))
                } else {
                    None
                }
            }
            ActionType::CreateFolder => {
                let folder = match created_folder(entry) {
                    Some(folder) => folder,
                    None => return None,
                };
                if !folder.is_dir() {
                    Some(format!("Folder no longer exists: {}", folder.display()))
                } else if !is_empty_dir(folder) {
                    Some(format!("Folder is not empty: {}", folder.display()))
                } else {
                    None
                }
            }
            ActionType::Skip => None,
        }
    }

    /// Reverse every successful operation of `task_id`, newest first.
    ///
    /// Fails only on preconditions; drift and I/O problems are reported per
    /// operation in the result. The task can never be undone again after
    /// this returns `Ok`.
    pub async fn undo(&self, task_id: &str) -> Result<ExecutionResult, UndoError> {
        let task = self
            .registry
            .get(task_id)?
            .ok_or_else(|| UndoError::UnknownTask(task_id.to_string()))?;
        if !task.undo_available {
            return Err(UndoError::AlreadyUndone(task_id.to_string()));
        }

        let mut entries = self.audit.successful_entries(task_id);
        if entries.is_empty() {
            return Err(UndoError::NoOperations(task_id.to_string()));
        }

        // Claim the one-shot flag before any filesystem work
        if !self.registry.claim_undo(task_id)? {
            return Err(UndoError::AlreadyUndone(task_id.to_string()));
        }

        let undo_task_id = format!("undo_{}", task_id);
        tracing::info!(task_id, operations = entries.len(), "Undoing task");

        let total_actions = entries.len();
        let mut successful_actions = 0;
        let mut failed_actions = 0;
        let mut error_message = None;
        let mut logs = Vec::new();

        entries.reverse();
        for entry in entries {
            let current = entry
                .destination_path
                .clone()
                .unwrap_or_else(|| entry.source_path.clone());

            match self.reverse(&entry).await {
                Reversal::Undone => {
                    successful_actions += 1;
                    logs.push(self.audit.record(
                        &undo_task_id,
                        entry.action_type,
                        current,
                        Some(entry.source_path.clone()),
                        LogStatus::Success,
                        None,
                    ));
                }
                Reversal::Failed(reason) => {
                    failed_actions += 1;
                    tracing::warn!(
                        task_id,
                        action = %entry.action_type,
                        path = %current.display(),
                        error = %reason,
                        "Could not undo operation"
                    );
                    error_message = Some(if entry.action_type == ActionType::Delete {
                        reason.clone()
                    } else {
                        format!("Failed to undo {}: {}", entry.action_type, reason)
                    });
                    logs.push(self.audit.record(
                        &undo_task_id,
                        entry.action_type,
                        current,
                        Some(entry.source_path.clone()),
                        LogStatus::Failed,
                        Some(reason),
                    ));
                }
                Reversal::Skipped(why) => {
                    tracing::debug!(
                        task_id,
                        action = %entry.action_type,
                        path = %current.display(),
                        why,
                        "Nothing to undo"
                    );
                }
            }
        }

        tracing::info!(
            task_id,
            successful = successful_actions,
            failed = failed_actions,
            "Undo finished"
        );

        Ok(ExecutionResult {
            task_id: undo_task_id,
            total_actions,
            successful_actions,
            failed_actions,
            logs,
            error_message,
            rollback_performed: false,
        })
    }

    async fn reverse(&self, entry: &ExecutionLogEntry) -> Reversal {
        match entry.action_type {
            ActionType::Move | ActionType::Rename => {
                let destination = match &entry.destination_path {
                    Some(destination) => destination.clone(),
                    None => return Reversal::Failed("No destination recorded".to_string()),
                };
                let source = entry.source_path.clone();

                if !path_exists(&destination) {
                    return Reversal::Failed(format!(
                        "Cannot undo: file not found at: {}",
                        destination.display()
                    ));
                }
                if path_exists(&source) {
                    return Reversal::Failed(format!(
                        "Cannot undo: original path already exists: {}",
                        source.display()
                    ));
                }
                if self.protected.is_protected(&source) {
                    return Reversal::Failed(format!(
                        "Cannot undo into protected path: {}",
                        source.display()
                    ));
                }

                match run_blocking(move || move_path(&destination, &source)).await {
                    Ok(()) => Reversal::Undone,
                    Err(e) => Reversal::Failed(e),
                }
            }
            ActionType::Delete => Reversal::Failed(DELETE_NOT_UNDOABLE.to_string()),
            ActionType::CreateFolder => {
                let folder: PathBuf = match created_folder(entry) {
                    Some(folder) => folder.to_path_buf(),
                    None => return Reversal::Skipped("folder existed before execution"),
                };
                match run_blocking(move || remove_empty_dir(&folder)).await {
                    Ok(true) => Reversal::Undone,
                    Ok(false) => Reversal::Skipped("folder missing or not empty"),
                    Err(e) => Reversal::Failed(e),
                }
            }
            ActionType::Skip => Reversal::Skipped("skip action"),
        }
    }
}

/// The folder a create_folder entry actually created. Entries without a
/// destination name a folder that was already there.
fn created_folder(entry: &ExecutionLogEntry) -> Option<&Path> {
    entry.destination_path.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SqliteStore;
    use crate::models::TaskRecord;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (Arc<SqliteStore>, AuditLog, UndoManager) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let audit = AuditLog::new(store.clone());
        let undo = UndoManager::new(audit.clone(), store.clone())
            .with_protected_paths(ProtectedPaths::none());
        (store, audit, undo)
    }

    fn log_move(audit: &AuditLog, task_id: &str, from: &Path, to: &Path) {
        audit.record(
            task_id,
            ActionType::Move,
            from,
            Some(to.to_path_buf()),
            LogStatus::Success,
            None,
        );
    }

    #[test]
    fn test_can_undo_reasons() {
        let (store, _audit, undo) = setup();
        assert_eq!(undo.can_undo("nope").1.unwrap(), "Task nope not found");

        store.register(&TaskRecord::new("t1", "")).unwrap();
        assert_eq!(
            undo.can_undo("t1").1.unwrap(),
            "No successful operations to undo"
        );
    }

    #[tokio::test]
    async fn test_undo_move_restores_and_is_one_shot() {
        let dir = tempdir().unwrap();
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let original = dir.path().join("a.txt");
        let moved = dir.path().join("docs/a.txt");
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(&moved, "content").unwrap();
        log_move(&audit, "t1", &original, &moved);

        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.task_id, "undo_t1");
        assert_eq!(result.successful_actions, 1);
        assert_eq!(fs::read_to_string(&original).unwrap(), "content");
        assert_eq!(audit.entries_for("undo_t1").len(), 1);

        assert!(matches!(undo.undo("t1").await, Err(UndoError::AlreadyUndone(_))));
        assert_eq!(
            undo.can_undo("t1").1.unwrap(),
            "Task has already been undone"
        );
    }

    // macOS filesystems reject names that are not valid UTF-8
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_undo_restores_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let name = OsStr::from_bytes(b"r\xe9sum\xe9.txt");
        let original = dir.path().join(name);
        let moved = dir.path().join("docs").join(name);
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(&moved, "cv").unwrap();
        log_move(&audit, "t1", &original, &moved);

        assert!(undo.preview_undo("t1")[0].can_undo);
        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.successful_actions, 1);
        assert_eq!(fs::read_to_string(&original).unwrap(), "cv");
    }

    #[tokio::test]
    async fn test_no_operations_keeps_flag() {
        let (store, _audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        assert!(matches!(undo.undo("t1").await, Err(UndoError::NoOperations(_))));
        assert!(store.get("t1").unwrap().unwrap().undo_available);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (_store, _audit, undo) = setup();
        assert!(matches!(undo.undo("ghost").await, Err(UndoError::UnknownTask(_))));
    }

    #[tokio::test]
    async fn test_drift_is_reported_not_forced() {
        let dir = tempdir().unwrap();
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let original = dir.path().join("a.txt");
        let moved = dir.path().join("b.txt");
        fs::write(&moved, "moved").unwrap();
        fs::write(&original, "someone else").unwrap();
        log_move(&audit, "t1", &original, &moved);

        let preview = undo.preview_undo("t1");
        assert!(!preview[0].can_undo);
        assert!(preview[0]
            .undo_reason
            .as_deref()
            .unwrap()
            .starts_with("Original path is now occupied"));

        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.failed_actions, 1);
        assert_eq!(fs::read_to_string(&original).unwrap(), "someone else");
        assert!(moved.exists());
        assert!(!store.get("t1").unwrap().unwrap().undo_available);
    }

    #[tokio::test]
    async fn test_delete_counts_as_failure() {
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();
        audit.record("t1", ActionType::Delete, "/scope/old.log", None, LogStatus::Success, None);

        let preview = undo.preview_undo("t1");
        assert!(!preview[0].can_undo);
        assert!(preview[0].undo_reason.as_deref().unwrap().contains("Trash"));

        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.failed_actions, 1);
        assert_eq!(result.error_message.as_deref(), Some(DELETE_NOT_UNDOABLE));
    }

    #[tokio::test]
    async fn test_folders_removed_only_when_empty() {
        let dir = tempdir().unwrap();
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        fs::create_dir(&empty).unwrap();
        fs::create_dir(&full).unwrap();
        fs::write(full.join("keep.txt"), "x").unwrap();
        for folder in [&empty, &full] {
            audit.record(
                "t1",
                ActionType::CreateFolder,
                folder.as_path(),
                Some(folder.to_path_buf()),
                LogStatus::Success,
                None,
            );
        }

        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.total_actions, 2);
        assert_eq!(result.successful_actions, 1);
        assert_eq!(result.failed_actions, 0);
        assert!(!empty.exists());
        assert!(full.join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_pre_existing_folder_is_left_alone() {
        let dir = tempdir().unwrap();
        let (store, audit, undo) = setup();
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let existing = dir.path().join("Photos");
        fs::create_dir(&existing).unwrap();
        audit.record(
            "t1",
            ActionType::CreateFolder,
            existing.as_path(),
            None,
            LogStatus::Success,
            None,
        );

        assert!(undo.preview_undo("t1")[0].can_undo);
        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.successful_actions, 0);
        assert_eq!(result.failed_actions, 0);
        assert!(existing.is_dir());
        assert!(audit.entries_for("undo_t1").is_empty());
    }

    #[tokio::test]
    async fn test_protected_original_is_refused() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let audit = AuditLog::new(store.clone());
        let system = dir.path().join("system");
        let undo = UndoManager::new(audit.clone(), store.clone()).with_protected_paths(
            ProtectedPaths::for_platform(crate::security::Platform::current(), [system.clone()]),
        );
        store.register(&TaskRecord::new("t1", "")).unwrap();

        let moved = dir.path().join("moved.txt");
        fs::write(&moved, "x").unwrap();
        log_move(&audit, "t1", &system.join("config.txt"), &moved);

        let result = undo.undo("t1").await.unwrap();
        assert_eq!(result.failed_actions, 1);
        assert!(moved.exists());
    }
}
