//! Process definition models.
//!
//! A process is a declarative, multi-step, multi-agent plan: a goal, the
//! agents that may work on it, the steps they perform (with dependencies),
//! the validation commands that gate accepted work and the execution
//! settings that control scheduling.
//!
//! Process files are JSON (or YAML) documents whose arrays keep declaration
//! order. Declaration order is significant: it is the primary ordering key
//! when several steps are ready at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// A complete process definition as read from a process file.
///
/// # Example
///
/// ```json
/// {
///   "goal": "Add a health endpoint",
///   "base_model": "gpt-4o",
///   "agents": [{ "id": "backend", "name": "Backend", "persona": "backend_developer" }],
///   "steps": [{ "id": "impl", "name": "Implement", "agent_id": "backend" }]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ProcessDefinition {
    /// Format version of the process file. Defaults to `"1.0"` when loaded.
    #[serde(default)]
    pub version: String,

    /// The natural-language goal of the whole process.
    pub goal: String,

    #[serde(default)]
    pub description: String,

    /// Model used by every agent that does not override it.
    #[serde(default)]
    pub base_model: String,

    pub agents: Vec<AgentSpec>,

    pub steps: Vec<StepSpec>,

    #[serde(default)]
    pub validation: ValidationSpec,

    #[serde(default)]
    pub settings: ExecutionSettings,
}

impl ProcessDefinition {
    /// Look up an agent by id.
    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|step| step.id == id)
    }
}

/// An agent: a named persona bound to a model and an optional budget.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct AgentSpec {
    /// Unique agent identifier, referenced by `StepSpec::agent_id`.
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Capability tag such as `backend_developer` or `qa_engineer`.
    #[serde(default)]
    pub persona: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Model override. Empty or absent means the process `base_model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Scheduling priority; higher runs first among equally ordered steps.
    /// Defaults to 100 when loaded with 0.
    #[serde(default)]
    pub priority: i32,

    /// Other agents whose work this agent builds on.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Free-form flags. `intent = question|edit` forces the loop's intent.
    #[serde(default)]
    pub config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetSpec>,
}

/// Per-agent spending limits.
///
/// A zero limit means "no limit" in that dimension.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(default)]
pub struct BudgetSpec {
    pub max_tokens: u64,
    pub max_cost: f64,
    pub token_warning: u64,
    pub cost_warning: f64,
    /// Log a warning when a warning threshold is crossed.
    pub alert_on_limit: bool,
    /// Refuse further LLM calls once a limit is reached.
    pub stop_on_limit: bool,
}

/// A single unit of work assigned to one agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct StepSpec {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// The agent that performs this step.
    pub agent_id: String,

    /// Named inputs handed to the agent alongside the description.
    #[serde(default)]
    pub input: BTreeMap<String, String>,

    /// What an accepted result looks like. Used by the evaluator.
    #[serde(default)]
    pub expected_output: String,

    #[serde(default)]
    pub status: StepStatus,

    /// Steps that must complete before this one may start.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Per-attempt timeout in seconds. Absent or 0 falls back to the
    /// process `step_timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Maximum number of attempts. Absent or 0 falls back to the process
    /// `max_retries`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

/// Lifecycle status of a step.
///
/// `Completed`, `Failed` and `Skipped` are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Commands that gate accepted work. Absent or empty commands pass.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(default)]
pub struct ValidationSpec {
    /// Run the gate even when no todo mutated the workspace.
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint_command: Option<String>,
    pub custom_checks: Vec<String>,
}

impl ValidationSpec {
    /// True when at least one command is configured.
    pub fn has_checks(&self) -> bool {
        [&self.build_command, &self.test_command, &self.lint_command]
            .iter()
            .any(|command| command.as_deref().is_some_and(|c| !c.trim().is_empty()))
            || self.custom_checks.iter().any(|c| !c.trim().is_empty())
    }
}

/// Process-wide scheduling settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Default maximum number of attempts per step.
    pub max_retries: u32,
    /// Default per-attempt timeout in seconds.
    pub step_timeout: u64,
    pub parallel_execution: bool,
    pub stop_on_failure: bool,
    pub log_level: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            step_timeout: 300,
            parallel_execution: false,
            stop_on_failure: true,
            log_level: "info".to_string(),
        }
    }
}
