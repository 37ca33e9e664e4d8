//! Todos and plan parsing.
//!
//! The planner answers with a JSON array of todos. Models like to wrap JSON
//! in prose or code fences, so parsing looks for the array inside the text
//! before giving up.

use crate::tools::ToolAction;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One planned work item. Lives only for the duration of an attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    pub description: String,
    pub action: ToolAction,
    pub status: TodoStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl Todo {
    pub fn new(description: impl Into<String>, action: ToolAction) -> Self {
        Self {
            description: description.into(),
            action,
            status: TodoStatus::Pending,
            result: None,
            error: None,
        }
    }

    pub fn complete(&mut self, result: String) {
        self.status = TodoStatus::Completed;
        self.result = Some(result);
    }

    pub fn fail(&mut self, error: String) {
        self.status = TodoStatus::Failed;
        self.error = Some(error);
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("planner response is not a todo list: {0}")]
    Malformed(String),
    #[error("planner returned no todos")]
    Empty,
}

#[derive(Deserialize)]
struct PlannedTodo {
    #[serde(default)]
    description: String,
    #[serde(flatten)]
    action: ToolAction,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    List(Vec<PlannedTodo>),
    Wrapped { todos: Vec<PlannedTodo> },
}

/// Parse a planner response into todos.
pub fn parse_plan(text: &str) -> Result<Vec<Todo>, PlanError> {
    let document = candidates(text)
        .into_iter()
        .find_map(|candidate| serde_json::from_str::<PlanDocument>(candidate).ok())
        .ok_or_else(|| PlanError::Malformed(preview(text)))?;

    let planned = match document {
        PlanDocument::List(todos) | PlanDocument::Wrapped { todos } => todos,
    };
    if planned.is_empty() {
        return Err(PlanError::Empty);
    }

    Ok(planned
        .into_iter()
        .map(|todo| {
            let description = if todo.description.trim().is_empty() {
                format!("{} {}", todo.action.name(), todo.action.target())
            } else {
                todo.description
            };
            Todo::new(description, todo.action)
        })
        .collect())
}

/// Substrings of `text` that may hold the JSON document, most likely first.
fn candidates(text: &str) -> Vec<&str> {
    let trimmed = text.trim();
    let mut found = vec![trimmed];

    if let Some(fenced) = fenced_block(trimmed) {
        found.push(fenced);
    }
    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if start < end {
            found.push(&trimmed[start..=end]);
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            found.push(&trimmed[start..=end]);
        }
    }
    found
}

/// The body of the first fenced code block, if any.
pub(crate) fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(200) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}
