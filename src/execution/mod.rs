//! Execution Engine Module
//!
//! Sequential plan execution with best-effort rollback, the filesystem
//! primitives it is built on, and the gate that keeps unsafe plans out.

mod executor;
mod gate;
mod ops;

pub use executor::{ExecutionState, PlanExecutor};
pub use gate::SafetyGate;
pub use ops::{
    create_dir_all, is_empty_dir, move_path, path_exists, remove_empty_dir, RecoverableTrash,
    SystemTrash,
};

pub(crate) use ops::run_blocking;
