//! Engine error types.
//!
//! Errors come in two tiers. `EngineError` aborts a whole process run before
//! or while it is scheduled. `FailureCause` explains why a single step ended
//! `failed`; it is recorded in the run state and never aborts the process on
//! its own (the failure policy decides what happens next).

use crate::state::store::StateError;
use std::time::Duration;
use thiserror::Error;

/// Process-level errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The step dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", .steps.join(" -> "))]
    DependencyCycle { steps: Vec<String> },

    /// A step depends on a step id that does not exist.
    #[error("step '{step_id}' depends on unknown step '{reference}'")]
    UnknownReference { step_id: String, reference: String },

    /// Two steps share the same id.
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),

    /// The run state could not be read or written.
    #[error(transparent)]
    State(#[from] StateError),

    /// The run was cancelled; in-flight steps were returned to pending.
    #[error("process run was cancelled")]
    Cancelled,
}

/// Why a step ended `failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureCause {
    /// A build, test, lint or custom check failed on the final attempt.
    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// A tool action failed and the evaluator did not accept the result.
    #[error("tool failure: {0}")]
    ToolFailure(String),

    /// The agent's budget is exhausted and `stop_on_limit` is set.
    #[error("budget exceeded for agent '{agent_id}': {detail}")]
    BudgetExceeded { agent_id: String, detail: String },

    /// The attempt ran past its wall-clock deadline.
    #[error("step timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The step references an agent the process does not define.
    #[error("agent '{0}' not found")]
    AgentNotFound(String),

    /// The LLM could not be reached, or kept failing.
    #[error("llm request failed: {0}")]
    Llm(String),

    /// The validation tooling itself could not run.
    #[error("validation tooling unavailable: {0}")]
    ValidationUnavailable(String),

    /// The evaluator rejected the last allowed attempt.
    #[error("rejected after {attempts} attempt(s): {feedback}")]
    Rejected { attempts: u32, feedback: String },
}
