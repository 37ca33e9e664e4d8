//! Run state persistence and transitions.
//!
//! - [`store`]: atomic load/save of the state file
//! - [`transitions`]: the run/step state machine and its events

pub mod store;
pub mod transitions;

pub use store::{StateError, StateStore, LEGACY_STATE_FILE, STATE_FILE};
