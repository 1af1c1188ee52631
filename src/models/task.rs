use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseEnumError;

/// Lifecycle state of a user task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Scanning,
    Planning,
    Review,
    Executing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scanning => "scanning",
            TaskStatus::Planning => "planning",
            TaskStatus::Review => "review",
            TaskStatus::Executing => "executing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scanning" => Ok(TaskStatus::Scanning),
            "planning" => Ok(TaskStatus::Planning),
            "review" => Ok(TaskStatus::Review),
            "executing" => Ok(TaskStatus::Executing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ParseEnumError {
                kind: "task status",
                value: other.to_string(),
            }),
        }
    }
}

/// Registry record for a high-level user task.
///
/// `undo_available` only ever goes from `true` to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub user_prompt: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub undo_available: bool,
}

impl TaskRecord {
    pub fn new(task_id: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            user_prompt: user_prompt.into(),
            created_at: Utc::now(),
            status: TaskStatus::default(),
            undo_available: true,
        }
    }
}
