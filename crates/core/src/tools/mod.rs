//! Tool actions and executors.
//!
//! Todos produced by the planner are [`ToolAction`]s. The loop hands them to
//! a [`ToolExecutor`]; [`LocalToolExecutor`] applies them to the project
//! directory and [`MockToolExecutor`] keeps everything in memory.

pub mod base;
pub mod local;
pub mod mock;

pub use base::{ToolAction, ToolError, ToolExecutor, ToolOutcome};
pub use local::LocalToolExecutor;
pub use mock::MockToolExecutor;
