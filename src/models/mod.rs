//! Data model shared by the validator, executor, audit log and undo manager.

mod execution;
mod plan;
mod task;

pub use execution::*;
pub use plan::*;
pub use task::*;
