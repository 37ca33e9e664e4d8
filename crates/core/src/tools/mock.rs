//! In-memory tool executor for testing.

use crate::tools::base::{ToolAction, ToolError, ToolExecutor, ToolOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Keeps files in a map and records every action it is asked to run.
pub struct MockToolExecutor {
    available: bool,
    files: Mutex<HashMap<String, String>>,
    failing_targets: HashSet<String>,
    calls: Mutex<Vec<ToolAction>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self {
            available: true,
            files: Mutex::new(HashMap::new()),
            failing_targets: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns `ToolError::NotAvailable`.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Actions on `target` (path, command, pattern or url) report failure.
    pub fn failing_on(mut self, target: &str) -> Self {
        self.failing_targets.insert(target.to_string());
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn calls(&self) -> Vec<ToolAction> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn run_tool(&self, action: &ToolAction) -> Result<ToolOutcome, ToolError> {
        if !self.available {
            return Err(ToolError::NotAvailable(
                "Mock tools not available".to_string(),
            ));
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());

        if self.failing_targets.contains(action.target()) {
            return Ok(ToolOutcome::failed(format!(
                "{} failed on {}",
                action.name(),
                action.target()
            )));
        }

        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = match action {
            ToolAction::ReadFile { path } => match files.get(path) {
                Some(content) => ToolOutcome::ok(content.clone()),
                None => ToolOutcome::failed(format!("{path} not found")),
            },
            ToolAction::WriteFile {
                path,
                content: Some(content),
            } => {
                files.insert(path.clone(), content.clone());
                ToolOutcome::ok(format!("wrote {path}"))
            }
            ToolAction::WriteFile { path, content: None } | ToolAction::EditFile { path, .. } => {
                ToolOutcome::failed(format!("no content supplied for {path}"))
            }
            ToolAction::RunShell { command } => ToolOutcome::ok(format!("ran {command}")),
            ToolAction::SearchFiles { pattern } => {
                let mut hits: Vec<&String> = files
                    .iter()
                    .filter(|(_, content)| content.contains(pattern.as_str()))
                    .map(|(path, _)| path)
                    .collect();
                hits.sort();
                ToolOutcome::ok(
                    hits.into_iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
            ToolAction::FetchUrl { url } => ToolOutcome::ok(format!("fetched {url}")),
        };

        Ok(outcome)
    }
}
