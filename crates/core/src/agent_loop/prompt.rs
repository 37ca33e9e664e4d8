//! Prompt construction.
//!
//! Prompts are deliberately plain: the task, what the agent knows, and the
//! exact response shape the parser expects.

use crate::agent_loop::todo::{Todo, TodoStatus};
use crate::agent_loop::LoopInvocation;
use crate::agents::Persona;
use crate::validation::GateReport;
use std::fmt::Write;

fn header(invocation: &LoopInvocation) -> String {
    let persona = Persona::from_tag(&invocation.agent.persona);
    let mut text = format!("You are {}, acting as {}.\n", agent_name(invocation), persona.name());
    let _ = writeln!(text, "{}", persona.focus());
    if !invocation.agent.skills.is_empty() {
        let _ = writeln!(text, "Skills: {}", invocation.agent.skills.join(", "));
    }
    text.push('\n');
    text
}

fn agent_name(invocation: &LoopInvocation) -> &str {
    if invocation.agent.name.is_empty() {
        &invocation.agent.id
    } else {
        &invocation.agent.name
    }
}

fn task_section(invocation: &LoopInvocation, text: &mut String) {
    let _ = writeln!(text, "## Task\n{}\n", invocation.instruction.trim());
    if !invocation.context.trim().is_empty() {
        let _ = writeln!(text, "## Context\n{}\n", invocation.context.trim());
    }
    if !invocation.expected_output.trim().is_empty() {
        let _ = writeln!(
            text,
            "## Expected output\n{}\n",
            invocation.expected_output.trim()
        );
    }
}

pub fn answer(invocation: &LoopInvocation, workspace: &str) -> String {
    let mut text = header(invocation);
    task_section(invocation, &mut text);
    if !workspace.is_empty() {
        let _ = writeln!(text, "## Workspace\n{workspace}");
    }
    text.push_str("Answer the question directly and concisely. Do not propose file changes.\n");
    text
}

pub fn plan(invocation: &LoopInvocation, workspace: &str) -> String {
    let mut text = header(invocation);
    task_section(invocation, &mut text);
    if !workspace.is_empty() {
        let _ = writeln!(text, "## Workspace\n{workspace}");
    }
    if !invocation.feedback.is_empty() {
        text.push_str("## Feedback from previous attempts\n");
        for (index, feedback) in invocation.feedback.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", index + 1, feedback.trim());
        }
        text.push('\n');
    }
    text.push_str(
        "Respond with a JSON array of todos and nothing else. Each todo has a \
         \"description\" and an \"action\", one of:\n\
         - {\"action\":\"read_file\",\"path\":...}\n\
         - {\"action\":\"write_file\",\"path\":...,\"content\":...} (omit content to have it generated)\n\
         - {\"action\":\"edit_file\",\"path\":...,\"instructions\":...}\n\
         - {\"action\":\"run_shell\",\"command\":...}\n\
         - {\"action\":\"search_files\",\"pattern\":...}\n\
         - {\"action\":\"fetch_url\",\"url\":...}\n",
    );
    text
}

pub fn generate(invocation: &LoopInvocation, todo: &Todo, current: Option<&str>) -> String {
    let mut text = header(invocation);
    task_section(invocation, &mut text);
    let _ = writeln!(text, "## Current todo\n{}", todo.description.trim());
    if let crate::tools::ToolAction::EditFile { instructions, .. } = &todo.action {
        if !instructions.trim().is_empty() {
            let _ = writeln!(text, "Instructions: {}", instructions.trim());
        }
    }
    let _ = writeln!(text, "File: {}\n", todo.action.target());
    if let Some(current) = current {
        let _ = writeln!(text, "## Current content\n```\n{current}\n```\n");
    }
    text.push_str("Respond with the complete new content of the file and nothing else.\n");
    text
}

pub fn evaluate(invocation: &LoopInvocation, todos: &[Todo], gate: Option<&GateReport>) -> String {
    let mut text = header(invocation);
    task_section(invocation, &mut text);

    text.push_str("## Work performed\n");
    for todo in todos {
        let status = match todo.status {
            TodoStatus::Completed => "done",
            TodoStatus::Failed => "FAILED",
            TodoStatus::Pending | TodoStatus::Running => "not run",
        };
        let _ = write!(text, "- [{status}] {}", todo.description.trim());
        if let Some(error) = &todo.error {
            let _ = write!(text, " ({})", error.trim());
        }
        text.push('\n');
    }
    if let Some(gate) = gate {
        let _ = writeln!(text, "\n## Validation\n{}", gate.summary());
    }

    text.push_str(
        "\nDecide whether the work meets the expected output. Respond with JSON only: \
         {\"status\":\"accept\"|\"reject\",\"feedback\":\"...\"}\n",
    );
    text
}
