//! Tool actions and the executor trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A discrete action a todo performs on the workspace.
///
/// Serialized with an `action` tag so planner output can be read directly:
///
/// ```json
/// {"action": "write_file", "path": "src/lib.rs", "content": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ToolAction {
    ReadFile {
        path: String,
    },
    /// Write a whole file. Without `content` the loop generates it first.
    WriteFile {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
    /// Rewrite an existing file according to `instructions`.
    EditFile {
        path: String,
        #[serde(default)]
        instructions: String,
    },
    RunShell {
        command: String,
    },
    SearchFiles {
        pattern: String,
    },
    FetchUrl {
        url: String,
    },
}

impl ToolAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile { .. } => "read_file",
            Self::WriteFile { .. } => "write_file",
            Self::EditFile { .. } => "edit_file",
            Self::RunShell { .. } => "run_shell",
            Self::SearchFiles { .. } => "search_files",
            Self::FetchUrl { .. } => "fetch_url",
        }
    }

    /// The path, command, pattern or url the action works on.
    pub fn target(&self) -> &str {
        match self {
            Self::ReadFile { path }
            | Self::WriteFile { path, .. }
            | Self::EditFile { path, .. } => path,
            Self::RunShell { command } => command,
            Self::SearchFiles { pattern } => pattern,
            Self::FetchUrl { url } => url,
        }
    }

    /// True for actions that change files in the workspace.
    pub fn mutates(&self) -> bool {
        matches!(self, Self::WriteFile { .. } | Self::EditFile { .. })
    }
}

/// What a tool call produced.
///
/// `success = false` is a recoverable failure: the todo is marked failed and
/// execution continues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    pub result: String,
    pub diff: Option<String>,
    /// Usage of tools that call a model themselves.
    pub tokens: u64,
    pub cost: f64,
}

impl ToolOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
            ..Default::default()
        }
    }

    pub fn failed(result: impl Into<String>) -> Self {
        Self {
            success: false,
            result: result.into(),
            ..Default::default()
        }
    }
}

/// The executor itself is unusable. Unlike a failed [`ToolOutcome`], this
/// ends the attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool executor not available: {0}")]
    NotAvailable(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn run_tool(&self, action: &ToolAction) -> Result<ToolOutcome, ToolError>;
}
