//! Error types for the parts of the core that can fail as values.
//!
//! Safety violations and execution failures are reported as data
//! (`SafetyValidationResult`, `ExecutionResult`); only caller misuse and
//! store/config problems surface through these enums.

use thiserror::Error;

use crate::models::ActionType;
use crate::security::SafetyValidationResult;

/// A plan action that breaks its structural invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Destination path is required for {0} actions")]
    MissingDestination(ActionType),
    #[error("Confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),
}

/// Failure reading or writing the persistence store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Precondition failures raised by `UndoManager::undo`.
///
/// Drift (a file moved again, an original path re-occupied) is never an
/// error here; it is reported per operation in the undo result.
#[derive(Debug, Error)]
pub enum UndoError {
    #[error("Task {0} not found")]
    UnknownTask(String),
    #[error("Task {0} has already been undone")]
    AlreadyUndone(String),
    #[error("Task {0} has no successful operations to undo")]
    NoOperations(String),
    #[error("Failed to read task registry: {0}")]
    Store(#[from] StoreError),
}

/// Raised by `SafetyGate` when a plan is refused before execution.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Plan failed safety validation: {}", .0.errors.join("; "))]
    Rejected(Box<SafetyValidationResult>),
}

/// Invalid configuration value.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// A stored enum value that does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}
