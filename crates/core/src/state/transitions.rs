//! Run state machine.
//!
//! Functions that move a [`RunState`] or one of its steps between statuses
//! and emit the matching [`Event`]. The caller persists the state after each
//! transition.

use chrono::{DateTime, Utc};
use ledit_protocol::{
    AttemptOutcome, AttemptRecord, Event, ProcessDefinition, ProcessStatus, RunState, StepRecord,
    StepStatus,
};
use std::collections::HashSet;
use tokio::sync::mpsc::Sender;
use uuid::Uuid;

/// Create a fresh run state for a process. Steps the definition already
/// marks `completed` stay completed; every other step starts pending.
pub fn create_run_state(process: &ProcessDefinition) -> RunState {
    let now = Utc::now();
    RunState {
        process_id: Uuid::new_v4(),
        goal: process.goal.clone(),
        base_model: process.base_model.clone(),
        status: ProcessStatus::Pending,
        created_at: now,
        updated_at: now,
        completed_at: None,
        error: None,
        steps: process
            .steps
            .iter()
            .map(|step| StepRecord {
                step_id: step.id.clone(),
                name: step.name.clone(),
                agent_id: step.agent_id.clone(),
                depends_on: step.depends_on.clone(),
                status: match step.status {
                    StepStatus::Completed => StepStatus::Completed,
                    _ => StepStatus::Pending,
                },
                attempts: 0,
                started_at: None,
                ended_at: None,
                error: None,
                summary: None,
                history: Vec::new(),
            })
            .collect(),
        agents: process
            .agents
            .iter()
            .map(|agent| (agent.id.clone(), Default::default()))
            .collect(),
    }
}

/// Check that a stored state belongs to this process: same goal, same
/// steps, and each step with the same agent and dependencies.
///
/// # Returns
///
/// `Err` with a human-readable reason when the state cannot be reused.
pub fn check_compatibility(state: &RunState, process: &ProcessDefinition) -> Result<(), String> {
    if state.goal != process.goal {
        return Err(format!(
            "goal changed from '{}' to '{}'",
            state.goal, process.goal
        ));
    }

    let stored: HashSet<&str> = state.steps.iter().map(|s| s.step_id.as_str()).collect();
    let defined: HashSet<&str> = process.steps.iter().map(|s| s.id.as_str()).collect();
    if stored != defined {
        return Err("the set of steps changed".to_string());
    }

    for step in &process.steps {
        let Some(record) = state.step(&step.id) else {
            continue;
        };
        if record.agent_id != step.agent_id {
            return Err(format!(
                "step '{}' moved from agent '{}' to '{}'",
                step.id, record.agent_id, step.agent_id
            ));
        }
        let stored_deps: HashSet<&String> = record.depends_on.iter().collect();
        let defined_deps: HashSet<&String> = step.depends_on.iter().collect();
        if stored_deps != defined_deps {
            return Err(format!("dependencies of step '{}' changed", step.id));
        }
    }
    Ok(())
}

/// Prepare a stored state for another run. Completed steps are kept;
/// everything else goes back to pending with a fresh attempt counter.
/// Attempt history is kept.
pub fn reset_for_resume(state: &mut RunState, process: &ProcessDefinition) {
    for record in &mut state.steps {
        if record.status != StepStatus::Completed {
            record.status = StepStatus::Pending;
            record.attempts = 0;
            record.error = None;
            record.started_at = None;
            record.ended_at = None;
        }
    }
    // Keep step order and names aligned with the definition.
    state.steps.sort_by_key(|record| {
        process
            .steps
            .iter()
            .position(|step| step.id == record.step_id)
            .unwrap_or(usize::MAX)
    });
    for step in &process.steps {
        if let Some(record) = state.step_mut(&step.id) {
            record.name = step.name.clone();
        }
    }
    for agent in &process.agents {
        state.agents.entry(agent.id.clone()).or_default();
    }
    state.base_model = process.base_model.clone();
    state.status = ProcessStatus::Pending;
    state.error = None;
    state.completed_at = None;
    state.updated_at = Utc::now();
}

pub async fn start_run(state: &mut RunState, events_tx: &Sender<Event>) {
    state.status = ProcessStatus::Running;
    state.updated_at = Utc::now();
    let _ = events_tx
        .send(Event::ProcessStarted {
            process_id: state.process_id,
            goal: state.goal.clone(),
            step_count: state.steps.len(),
        })
        .await;
}

/// Move a step to running for its next attempt.
///
/// # Returns
///
/// The attempt number now in progress, or `None` for an unknown step.
pub async fn start_step(
    state: &mut RunState,
    step_id: &str,
    events_tx: &Sender<Event>,
) -> Option<u32> {
    let now = Utc::now();
    let record = state.step_mut(step_id)?;
    record.status = StepStatus::Running;
    record.attempts += 1;
    record.started_at.get_or_insert(now);
    let attempt = record.attempts;
    state.updated_at = now;

    send_status(state, step_id, StepStatus::Running, attempt, events_tx).await;
    Some(attempt)
}

/// Append an attempt to a step's history.
pub fn record_attempt(
    state: &mut RunState,
    step_id: &str,
    outcome: AttemptOutcome,
    started_at: DateTime<Utc>,
    feedback: Option<String>,
    tokens: u64,
    cost: f64,
) {
    let now = Utc::now();
    if let Some(record) = state.step_mut(step_id) {
        record.history.push(AttemptRecord {
            attempt: record.attempts,
            outcome,
            started_at,
            ended_at: now,
            feedback,
            tokens,
            cost,
        });
    }
    state.updated_at = now;
}

pub async fn complete_step(
    state: &mut RunState,
    step_id: &str,
    summary: String,
    events_tx: &Sender<Event>,
) {
    let now = Utc::now();
    let Some(record) = state.step_mut(step_id) else {
        return;
    };
    record.status = StepStatus::Completed;
    record.ended_at = Some(now);
    record.error = None;
    record.summary = Some(summary);
    let attempt = record.attempts;
    state.updated_at = now;

    send_status(state, step_id, StepStatus::Completed, attempt, events_tx).await;
}

/// Mark a step failed. The first failure of a run becomes the process error.
pub async fn fail_step(
    state: &mut RunState,
    step_id: &str,
    error: String,
    events_tx: &Sender<Event>,
) {
    let now = Utc::now();
    let Some(record) = state.step_mut(step_id) else {
        return;
    };
    record.status = StepStatus::Failed;
    record.ended_at = Some(now);
    record.error = Some(error.clone());
    let attempt = record.attempts;
    state.updated_at = now;
    if state.error.is_none() {
        state.error = Some(format!("step '{step_id}' failed: {error}"));
    }

    send_status(state, step_id, StepStatus::Failed, attempt, events_tx).await;
}

pub async fn skip_step(
    state: &mut RunState,
    step_id: &str,
    reason: String,
    events_tx: &Sender<Event>,
) {
    let now = Utc::now();
    let Some(record) = state.step_mut(step_id) else {
        return;
    };
    record.status = StepStatus::Skipped;
    record.ended_at = Some(now);
    record.error = Some(reason);
    let attempt = record.attempts;
    state.updated_at = now;

    send_status(state, step_id, StepStatus::Skipped, attempt, events_tx).await;
}

/// Return an interrupted step to pending so the next run retries it. The
/// interrupted attempt does not count.
pub async fn requeue_step(state: &mut RunState, step_id: &str, events_tx: &Sender<Event>) {
    let Some(record) = state.step_mut(step_id) else {
        return;
    };
    record.status = StepStatus::Pending;
    record.attempts = record.attempts.saturating_sub(1);
    let attempt = record.attempts;
    state.updated_at = Utc::now();

    send_status(state, step_id, StepStatus::Pending, attempt, events_tx).await;
}

pub async fn log_step(
    state: &RunState,
    step_id: &str,
    content: String,
    events_tx: &Sender<Event>,
) {
    let _ = events_tx
        .send(Event::StepLog {
            process_id: state.process_id,
            step_id: step_id.to_string(),
            content,
        })
        .await;
}

pub async fn complete_run(state: &mut RunState, events_tx: &Sender<Event>) {
    let now = Utc::now();
    state.status = ProcessStatus::Completed;
    state.completed_at = Some(now);
    state.updated_at = now;
    let _ = events_tx
        .send(Event::ProcessCompleted {
            process_id: state.process_id,
        })
        .await;
}

pub async fn fail_run(state: &mut RunState, events_tx: &Sender<Event>) {
    let now = Utc::now();
    state.status = ProcessStatus::Failed;
    state.completed_at = Some(now);
    state.updated_at = now;
    let error = state
        .error
        .clone()
        .unwrap_or_else(|| "process failed".to_string());
    let _ = events_tx
        .send(Event::ProcessFailed {
            process_id: state.process_id,
            error,
        })
        .await;
}

pub async fn cancel_run(state: &mut RunState, events_tx: &Sender<Event>) {
    state.status = ProcessStatus::Cancelled;
    state.updated_at = Utc::now();
    let _ = events_tx
        .send(Event::ProcessCancelled {
            process_id: state.process_id,
        })
        .await;
}

async fn send_status(
    state: &RunState,
    step_id: &str,
    status: StepStatus,
    attempt: u32,
    events_tx: &Sender<Event>,
) {
    let _ = events_tx
        .send(Event::StepStatusUpdate {
            process_id: state.process_id,
            step_id: step_id.to_string(),
            status,
            attempt,
        })
        .await;
}
