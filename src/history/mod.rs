//! History module: the audit log, the task registry and undo.
//!
//! - `store`: SQLite persistence behind the `LogStore` / `TaskRegistry` traits
//! - `log`: failure-tolerant audit log facade
//! - `undo`: drift-aware, one-shot undo of executed tasks

mod log;
mod store;
mod undo;

pub use log::AuditLog;
pub use store::{LogStore, SqliteStore, TaskRegistry};
pub use undo::UndoManager;

#[cfg(test)]
pub(crate) use log::tests::BrokenStore;
