//! Audit log facade over a [`LogStore`].
//!
//! Writing to the log never fails from the caller's point of view: a store
//! error is reported through tracing and the entry comes back unpersisted
//! (`id == None`). Execution and undo results stay truthful either way.

use std::path::PathBuf;
use std::sync::Arc;

use super::store::LogStore;
use crate::models::{ActionType, ExecutionLogEntry, LogStatus};

#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn LogStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn LogStore>) -> Self {
        Self { store }
    }

    /// Persist an entry, returning it with its row id when the write succeeds
    pub fn append(&self, mut entry: ExecutionLogEntry) -> ExecutionLogEntry {
        match self.store.insert(&entry) {
            Ok(id) => entry.id = Some(id),
            Err(e) => {
                tracing::warn!(
                    task_id = %entry.task_id,
                    action = %entry.action_type,
                    status = %entry.status,
                    error = %e,
                    "Failed to write audit log entry"
                );
                entry.id = None;
            }
        }
        entry
    }

    /// Build and append an entry stamped with the current time
    pub fn record(
        &self,
        task_id: &str,
        action_type: ActionType,
        source_path: impl Into<PathBuf>,
        destination_path: Option<PathBuf>,
        status: LogStatus,
        error_message: Option<String>,
    ) -> ExecutionLogEntry {
        self.append(ExecutionLogEntry::new(
            task_id,
            action_type,
            source_path,
            destination_path,
            status,
            error_message,
        ))
    }

    /// Chronological entries of a task; empty if the store cannot be read
    pub fn entries_for(&self, task_id: &str) -> Vec<ExecutionLogEntry> {
        self.store.entries_for(task_id).unwrap_or_else(|e| {
            tracing::error!(task_id, error = %e, "Failed to read audit log");
            Vec::new()
        })
    }

    pub fn entries_with_status(&self, task_id: &str, status: LogStatus) -> Vec<ExecutionLogEntry> {
        self.store
            .entries_with_status(task_id, status)
            .unwrap_or_else(|e| {
                tracing::error!(task_id, %status, error = %e, "Failed to read audit log");
                Vec::new()
            })
    }

    /// Successful operations of a task, which are what undo reverses
    pub fn successful_entries(&self, task_id: &str) -> Vec<ExecutionLogEntry> {
        self.entries_with_status(task_id, LogStatus::Success)
    }
}
