//! Engine configuration models for `.ledit/config.toml`.
//!
//! This module defines the structure of the project-local configuration
//! file that controls where state lives and how the LLM is reached.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// Represents engine settings from `.ledit/config.toml`.
///
/// # Example
///
/// ```toml
/// # .ledit/config.toml
/// state_dir = ".ledit"
/// default_model = "gpt-4o"
/// llm_command = ["llm-bridge", "--json"]
/// shell = "sh"
/// log_level = "info"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory (relative to the project root) that holds the run state.
    pub state_dir: String,

    /// Model used when neither the process nor the command line names one.
    pub default_model: String,

    /// Program and arguments of the external completion command.
    ///
    /// The command receives the prompt on stdin and the model via
    /// `--model <name>`, and answers with JSON lines.
    pub llm_command: Vec<String>,

    /// Shell used to run validation commands and shell todos.
    pub shell: String,

    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_dir: ".ledit".to_string(),
            default_model: String::new(),
            llm_command: Vec::new(),
            shell: "sh".to_string(),
            log_level: "info".to_string(),
        }
    }
}
