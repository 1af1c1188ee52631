//! Audit log entries and the results produced by execution and undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::plan::ActionType;
use crate::error::ParseEnumError;

/// Outcome recorded for one attempted unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Success,
    Failed,
    RolledBack,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Failed => "failed",
            LogStatus::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(LogStatus::Success),
            "failed" => Ok(LogStatus::Failed),
            "rolled_back" => Ok(LogStatus::RolledBack),
            other => Err(ParseEnumError {
                kind: "log status",
                value: other.to_string(),
            }),
        }
    }
}

/// One append-only audit record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Row id assigned by the store; `None` when the write did not persist
    pub id: Option<i64>,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub status: LogStatus,
    pub error_message: Option<String>,
}

impl ExecutionLogEntry {
    pub fn new(
        task_id: impl Into<String>,
        action_type: ActionType,
        source_path: impl Into<PathBuf>,
        destination_path: Option<PathBuf>,
        status: LogStatus,
        error_message: Option<String>,
    ) -> Self {
        Self {
            id: None,
            task_id: task_id.into(),
            timestamp: Utc::now(),
            action_type,
            source_path: source_path.into(),
            destination_path,
            status,
            error_message,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Outcome of one execution or undo session. Always returned, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub task_id: String,
    pub total_actions: usize,
    pub successful_actions: usize,
    pub failed_actions: usize,
    pub logs: Vec<ExecutionLogEntry>,
    pub error_message: Option<String>,
    pub rollback_performed: bool,
}

impl ExecutionResult {
    /// Whether every attempted unit succeeded
    pub fn is_success(&self) -> bool {
        self.failed_actions == 0 && self.error_message.is_none()
    }
}

/// Read-only preview of reversing one logged operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoOperation {
    pub task_id: String,
    pub action_type: ActionType,
    pub original_path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
    pub can_undo: bool,
    /// Why the operation cannot be reversed
    pub undo_reason: Option<String>,
}
