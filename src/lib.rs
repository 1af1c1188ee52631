//! Safety-gated filesystem execution core.
//!
//! A [`Plan`] of moves, renames, deletions and folder creations is checked
//! by the [`SafetyValidator`] against its scope root and the OS-critical
//! directories, run by the [`PlanExecutor`] with best-effort rollback,
//! recorded in the [`AuditLog`], and reversed once by the [`UndoManager`].
//! [`Sentinel`] wires all of it over one SQLite database.

pub mod config;
mod engine;
pub mod error;
pub mod execution;
pub mod history;
pub mod models;
pub mod quarantine;
pub mod security;

use tracing_subscriber::EnvFilter;

pub use config::SentinelConfig;
pub use engine::Sentinel;
pub use error::{ConfigError, GateError, PlanError, StoreError, UndoError};
pub use execution::{PlanExecutor, RecoverableTrash, SafetyGate, SystemTrash};
pub use history::{AuditLog, LogStore, SqliteStore, TaskRegistry, UndoManager};
pub use models::*;
pub use quarantine::QuarantineBin;
pub use security::{
    Platform, ProtectedPaths, SafetyIssue, SafetyValidationResult, SafetyValidator,
};

/// Install a fmt subscriber filtered by `RUST_LOG`
/// (default `warn,sentinel_core=info`).
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,sentinel_core=info")),
        )
        .try_init()
        .is_ok()
}
