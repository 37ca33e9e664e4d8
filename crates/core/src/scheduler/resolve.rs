//! Per-step resolution of agent, model, limits and task text.

use crate::agent_loop::LoopInvocation;
use crate::agents::AgentRegistry;
use crate::error::FailureCause;
use ledit_protocol::{ProcessDefinition, RunState, StepSpec, StepStatus};
use std::fmt::Write;
use std::time::Duration;

/// Everything the scheduler needs to run a step.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub step_id: String,
    /// Attempt ceiling, at least 1.
    pub max_attempts: u32,
    pub timeout: Option<Duration>,
    /// Template for each attempt; the scheduler fills in attempt and feedback.
    pub invocation: LoopInvocation,
}

/// Resolve a step against its process and the current run state.
///
/// # Errors
///
/// `FailureCause::AgentNotFound` if the step names an agent the process
/// does not define.
pub fn resolve_step(
    process: &ProcessDefinition,
    registry: &AgentRegistry,
    step: &StepSpec,
    state: &RunState,
) -> Result<ResolvedStep, FailureCause> {
    let agent = registry
        .get_agent(&step.agent_id)
        .ok_or_else(|| FailureCause::AgentNotFound(step.agent_id.clone()))?;

    let max_attempts = step
        .retries
        .filter(|&retries| retries > 0)
        .unwrap_or(process.settings.max_retries)
        .max(1);

    let timeout = step
        .timeout
        .filter(|&seconds| seconds > 0)
        .or(Some(process.settings.step_timeout).filter(|&seconds| seconds > 0))
        .map(Duration::from_secs);

    let instruction = if step.description.trim().is_empty() {
        step.name.clone()
    } else {
        step.description.clone()
    };

    let invocation = LoopInvocation {
        agent: agent.clone(),
        model: registry.effective_model(agent),
        instruction,
        context: compose_task(process, step, state),
        expected_output: step.expected_output.clone(),
        validation: process.validation.clone(),
        feedback: Vec::new(),
        attempt: 1,
        timeout,
    };

    Ok(ResolvedStep {
        step_id: step.id.clone(),
        max_attempts,
        timeout,
        invocation,
    })
}

/// Context handed to the agent alongside the step's instruction: the goal,
/// the step name, its inputs sorted by key, and the recorded result of each
/// completed dependency.
pub fn compose_task(process: &ProcessDefinition, step: &StepSpec, state: &RunState) -> String {
    let mut text = String::new();
    if !process.goal.trim().is_empty() {
        let _ = writeln!(text, "Process goal: {}", process.goal.trim());
    }
    let name = if step.name.is_empty() { &step.id } else { &step.name };
    let _ = writeln!(text, "Step: {name}");

    if !step.input.is_empty() {
        text.push_str("\nInputs:\n");
        // BTreeMap iterates in key order.
        for (key, value) in &step.input {
            let _ = writeln!(text, "- {key}: {value}");
        }
    }

    let results: Vec<(&str, &str)> = step
        .depends_on
        .iter()
        .filter_map(|dependency| state.step(dependency))
        .filter(|record| record.status == StepStatus::Completed)
        .filter_map(|record| {
            record
                .summary
                .as_deref()
                .map(|summary| (record.step_id.as_str(), summary))
        })
        .collect();
    if !results.is_empty() {
        text.push_str("\nResults of completed dependencies:\n");
        for (step_id, summary) in results {
            let _ = writeln!(text, "- {step_id}: {}", summary.trim());
        }
    }
    text
}
