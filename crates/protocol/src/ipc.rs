//! Observer events.
//!
//! The scheduler reports progress on an `mpsc` channel so a front end can
//! render it without reading the state file. Events are advisory: the state
//! file stays the source of truth, and a dropped receiver never affects
//! execution.
//!
//! Uses tagged enum serialization for TypeScript compatibility:
//! ```json
//! {
//!   "type": "stepStatusUpdate",
//!   "payload": {
//!     "process_id": "uuid-here",
//!     "step_id": "backend",
//!     "status": "running",
//!     "attempt": 1
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::process_models::StepStatus;
use crate::run_state::BudgetStatus;

/// Events sent from the engine to observers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A process run has started (or resumed).
    ProcessStarted {
        #[ts(type = "string")]
        process_id: Uuid,
        goal: String,
        step_count: usize,
    },

    /// A step's status or attempt counter has changed.
    StepStatusUpdate {
        #[ts(type = "string")]
        process_id: Uuid,
        step_id: String,
        status: StepStatus,
        attempt: u32,
    },

    /// A step has produced a log line.
    StepLog {
        #[ts(type = "string")]
        process_id: Uuid,
        step_id: String,
        content: String,
    },

    /// An agent crossed a budget threshold.
    BudgetAlert {
        #[ts(type = "string")]
        process_id: Uuid,
        agent_id: String,
        status: BudgetStatus,
        tokens_used: u64,
        cost_used: f64,
    },

    ProcessCompleted {
        #[ts(type = "string")]
        process_id: Uuid,
    },

    ProcessFailed {
        #[ts(type = "string")]
        process_id: Uuid,
        error: String,
    },

    ProcessCancelled {
        #[ts(type = "string")]
        process_id: Uuid,
    },
}
