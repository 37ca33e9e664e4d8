//! Terminal rendering of events, run states and agent outcomes.

use colored::{ColoredString, Colorize};
use ledit_core::agent_loop::todo::TodoStatus;
use ledit_core::agent_loop::{LoopOutcome, Verdict};
use ledit_protocol::{BudgetStatus, Event, ProcessDefinition, ProcessStatus, RunState, StepStatus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Print events until every sender is dropped.
pub fn spawn_event_printer(mut rx: mpsc::Receiver<Event>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = format_event(&event) {
                println!("{line}");
            }
        }
    })
}

fn format_event(event: &Event) -> Option<String> {
    match event {
        Event::ProcessStarted {
            goal, step_count, ..
        } => Some(format!(
            "{} {goal} ({step_count} step(s))",
            "▶ process".bold()
        )),
        Event::StepStatusUpdate {
            step_id,
            status,
            attempt,
            ..
        } => match status {
            StepStatus::Running => Some(format!(
                "  {} {step_id} (attempt {attempt})",
                step_status(*status)
            )),
            StepStatus::Pending => None,
            _ => Some(format!("  {} {step_id}", step_status(*status))),
        },
        Event::StepLog {
            step_id, content, ..
        } => Some(format!("    {} {content}", format!("[{step_id}]").dimmed())),
        Event::BudgetAlert {
            agent_id,
            status,
            tokens_used,
            cost_used,
            ..
        } => {
            let label = match status {
                BudgetStatus::Exceeded => "budget exceeded".red().bold(),
                _ => "budget warning".yellow(),
            };
            Some(format!(
                "  {label} for {agent_id}: {tokens_used} tokens, ${cost_used:.4}"
            ))
        }
        Event::ProcessCompleted { .. } => {
            Some(format!("{}", "✔ process completed".green().bold()))
        }
        Event::ProcessFailed { error, .. } => {
            Some(format!("{} {error}", "✘ process failed:".red().bold()))
        }
        Event::ProcessCancelled { .. } => {
            Some(format!("{}", "■ process cancelled".yellow().bold()))
        }
    }
}

pub fn step_status(status: StepStatus) -> ColoredString {
    let label = format!("{:<9}", status.as_str());
    match status {
        StepStatus::Pending => label.dimmed(),
        StepStatus::Running => label.cyan(),
        StepStatus::Completed => label.green(),
        StepStatus::Failed => label.red(),
        StepStatus::Skipped => label.yellow(),
    }
}

fn process_status(status: ProcessStatus) -> ColoredString {
    match status {
        ProcessStatus::Completed => status.as_str().green().bold(),
        ProcessStatus::Failed => status.as_str().red().bold(),
        ProcessStatus::Cancelled => status.as_str().yellow().bold(),
        _ => status.as_str().cyan(),
    }
}

/// What is about to run, shown before asking for confirmation.
pub fn print_plan(process: &ProcessDefinition) {
    println!("{} {}", "Goal:".bold(), process.goal);
    if !process.base_model.is_empty() {
        println!("{} {}", "Model:".bold(), process.base_model);
    }
    println!("{}", "Agents:".bold());
    for agent in &process.agents {
        let model = agent.model.as_deref().unwrap_or(&process.base_model);
        println!("  - {} ({}) {}", agent.id, agent.persona, model.dimmed());
    }
    println!("{}", "Steps:".bold());
    for step in &process.steps {
        let after = if step.depends_on.is_empty() {
            String::new()
        } else {
            format!(" after {}", step.depends_on.join(", "))
        };
        println!("  - {} [{}]{}", step.id, step.agent_id, after.dimmed());
    }
    let mode = if process.settings.parallel_execution {
        "parallel"
    } else {
        "sequential"
    };
    println!("{} {mode}", "Mode:".bold());
}

pub fn print_state(state: &RunState) {
    println!("{} {}", "Goal:".bold(), state.goal);
    println!("{} {}", "Process:".bold(), state.process_id);
    println!("{} {}", "Status:".bold(), process_status(state.status));
    println!(
        "{} {}/{} completed, {} failed, {} skipped",
        "Steps:".bold(),
        state.count(StepStatus::Completed),
        state.steps.len(),
        state.count(StepStatus::Failed),
        state.count(StepStatus::Skipped)
    );
    for record in &state.steps {
        println!(
            "  {} {} [{}] attempts: {}",
            step_status(record.status),
            record.step_id,
            record.agent_id,
            record.attempts
        );
        if let Some(error) = &record.error {
            println!("      {}", error.red());
        } else if let Some(summary) = &record.summary {
            println!("      {}", first_line(summary).dimmed());
        }
    }
    if !state.agents.is_empty() {
        println!("{}", "Usage:".bold());
        for (agent_id, usage) in &state.agents {
            println!(
                "  {agent_id}: {} tokens, ${:.4}",
                usage.tokens_used, usage.cost_used
            );
        }
    }
    if let Some(error) = &state.error {
        println!("{} {}", "Error:".bold(), error.red());
    }
}

pub fn print_agent_outcome(outcome: &LoopOutcome, attempts: u32) {
    if let Some(answer) = &outcome.answer {
        println!("{answer}");
    }
    for todo in &outcome.todos {
        let mark = match todo.status {
            TodoStatus::Completed => "✔".green(),
            TodoStatus::Failed => "✘".red(),
            _ => "·".dimmed(),
        };
        println!("  {mark} {}", todo.description);
    }
    if let Some(gate) = &outcome.gate {
        let verdict = if gate.passed {
            "passed".green()
        } else {
            "failed".red()
        };
        println!("{} {verdict}", "Validation:".bold());
    }
    match &outcome.verdict {
        Verdict::Accept { summary } => {
            if outcome.answer.is_none() {
                println!("{} {}", "✔".green().bold(), first_line(summary));
            }
        }
        Verdict::Reject { cause, .. } | Verdict::Fatal(cause) => {
            println!("{} {cause}", "✘".red().bold());
        }
    }
    println!(
        "{}",
        format!(
            "{attempts} attempt(s), {} LLM call(s), {} tokens, ${:.4}",
            outcome.llm_calls, outcome.tokens, outcome.cost
        )
        .dimmed()
    );
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
