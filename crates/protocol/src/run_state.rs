//! Persisted run state.
//!
//! A `RunState` is the durable record of one process execution. It is
//! created when a process starts, rewritten after every step transition and
//! never deleted automatically, so an interrupted run can be resumed without
//! redoing completed steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;
use uuid::Uuid;

use crate::process_models::StepStatus;

/// Lifecycle status of a whole process run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Created but not started yet.
    #[default]
    Pending,

    /// Steps are being scheduled.
    Running,

    /// Every step reached a terminal status and none failed.
    Completed,

    /// At least one step failed.
    Failed,

    /// The run was interrupted; in-flight steps were returned to pending.
    Cancelled,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The durable state of one process run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct RunState {
    #[ts(type = "string")]
    pub process_id: Uuid,

    /// Goal of the process this state belongs to.
    pub goal: String,

    #[serde(default)]
    pub base_model: String,

    pub status: ProcessStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error of the first step that failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// One record per step, in declaration order.
    pub steps: Vec<StepRecord>,

    /// Accumulated usage per agent id.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentUsage>,
}

impl RunState {
    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step_id == step_id)
    }

    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|record| record.step_id == step_id)
    }

    /// Number of steps currently in the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|record| record.status == status).count()
    }

    /// True when every step has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.steps.iter().all(|record| record.status.is_terminal())
    }
}

/// The durable record of one step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct StepRecord {
    pub step_id: String,

    #[serde(default)]
    pub name: String,

    pub agent_id: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    pub status: StepStatus,

    /// Number of attempts made in the current run of this step.
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Short description of the accepted result, handed to dependents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Every attempt ever made, including those of earlier runs.
    #[serde(default)]
    pub history: Vec<AttemptRecord>,
}

/// How a single attempt ended.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected,
    Fatal,
    /// The run was cancelled while the attempt was in flight.
    Interrupted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub cost: f64,
}

/// Accumulated spend of one agent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, TS)]
pub struct AgentUsage {
    pub tokens_used: u64,
    pub cost_used: f64,
}

/// Result of charging usage against a budget.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    #[default]
    Ok,
    /// A warning threshold was crossed. Advisory only.
    Warning,
    /// A hard limit was reached.
    Exceeded,
}
