//! Process definition loading.
//!
//! A process file is JSON (`.json`) or YAML (`.yaml`, `.yml`). Loading
//! applies defaults and validates the structure so the scheduler only ever
//! sees well-formed definitions from disk.

use crate::config::error::{ConfigError, ConfigResult};
use crate::scheduler::graph::DependencyGraph;
use ledit_protocol::{AgentSpec, ExecutionSettings, ProcessDefinition, StepSpec, StepStatus};
use std::collections::HashSet;
use std::path::Path;

/// Default agent priority when a file leaves it at 0.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Longest step timeout a process file may ask for, in seconds (one week).
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Load, default and validate a process file.
///
/// # Errors
///
/// - `FileRead` if the file cannot be read
/// - `UnsupportedFormat` for extensions other than json, yaml and yml
/// - `JsonParse` / `YamlParse` for syntax errors
/// - `InvalidProcess` if validation fails
pub fn load_process_file(path: &Path) -> ConfigResult<ProcessDefinition> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut process: ProcessDefinition = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?
        }
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => {
            return Err(ConfigError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    apply_defaults(&mut process);
    validate_process(&process).map_err(|reason| ConfigError::InvalidProcess {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(process)
}

/// Fill in the values a file may leave out.
pub fn apply_defaults(process: &mut ProcessDefinition) {
    if process.version.trim().is_empty() {
        process.version = "1.0".to_string();
    }
    for agent in &mut process.agents {
        if agent.priority == 0 {
            agent.priority = DEFAULT_PRIORITY;
        }
        if agent.name.trim().is_empty() {
            agent.name = agent.id.clone();
        }
    }
    for step in &mut process.steps {
        if step.name.trim().is_empty() {
            step.name = step.id.clone();
        }
    }
}

/// Check the structure of a process definition.
///
/// # Returns
///
/// `Err` with the first problem found.
pub fn validate_process(process: &ProcessDefinition) -> Result<(), String> {
    if process.goal.trim().is_empty() {
        return Err("goal is required".to_string());
    }
    if process.agents.is_empty() {
        return Err("at least one agent must be defined".to_string());
    }
    if process.steps.is_empty() {
        return Err("at least one step must be defined".to_string());
    }

    if process.settings.step_timeout > MAX_TIMEOUT_SECS {
        return Err(format!(
            "settings.step_timeout must be at most {MAX_TIMEOUT_SECS} seconds"
        ));
    }

    let mut agent_ids = HashSet::new();
    for (index, agent) in process.agents.iter().enumerate() {
        if agent.id.trim().is_empty() {
            return Err(format!("agent {}: id is required", index + 1));
        }
        if !agent_ids.insert(agent.id.as_str()) {
            return Err(format!("duplicate agent id '{}'", agent.id));
        }
    }

    for agent in &process.agents {
        for dependency in &agent.depends_on {
            if dependency == &agent.id {
                return Err(format!("agent '{}' cannot depend on itself", agent.id));
            }
            if !agent_ids.contains(dependency.as_str()) {
                return Err(format!(
                    "agent '{}' depends on unknown agent '{dependency}'",
                    agent.id
                ));
            }
        }
        if let Some(budget) = &agent.budget {
            if budget.max_tokens > 0 && budget.token_warning > budget.max_tokens {
                return Err(format!(
                    "agent '{}': token_warning exceeds max_tokens",
                    agent.id
                ));
            }
            if budget.max_cost > 0.0 && budget.cost_warning > budget.max_cost {
                return Err(format!("agent '{}': cost_warning exceeds max_cost", agent.id));
            }
        }
    }

    for (index, step) in process.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(format!("step {}: id is required", index + 1));
        }
        if step.agent_id.trim().is_empty() {
            return Err(format!("step '{}': agent_id is required", step.id));
        }
        if !agent_ids.contains(step.agent_id.as_str()) {
            return Err(format!(
                "step '{}': agent '{}' not found",
                step.id, step.agent_id
            ));
        }
        if step.timeout.is_some_and(|seconds| seconds > MAX_TIMEOUT_SECS) {
            return Err(format!(
                "step '{}': timeout must be at most {MAX_TIMEOUT_SECS} seconds",
                step.id
            ));
        }
    }

    DependencyGraph::build(&process.steps).map_err(|e| e.to_string())?;
    Ok(())
}

/// A one-agent, one-step process for a free-form prompt.
pub fn implicit_process(prompt: &str, model: &str) -> ProcessDefinition {
    let agent = AgentSpec {
        id: "agent".to_string(),
        name: "Agent".to_string(),
        persona: "generalist".to_string(),
        description: "Handles the whole task".to_string(),
        skills: Vec::new(),
        model: None,
        priority: DEFAULT_PRIORITY,
        depends_on: Vec::new(),
        config: Default::default(),
        budget: None,
    };
    let step = StepSpec {
        id: "task".to_string(),
        name: "Task".to_string(),
        description: prompt.to_string(),
        agent_id: agent.id.clone(),
        input: Default::default(),
        expected_output: String::new(),
        status: StepStatus::Pending,
        depends_on: Vec::new(),
        timeout: None,
        retries: None,
    };

    ProcessDefinition {
        version: "1.0".to_string(),
        goal: prompt.to_string(),
        description: String::new(),
        base_model: model.to_string(),
        agents: vec![agent],
        steps: vec![step],
        validation: Default::default(),
        settings: ExecutionSettings::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledit_protocol::BudgetSpec;
    use std::fs;
    use tempfile::tempdir;

    const PROCESS_JSON: &str = r#"{
        "goal": "Build a todo API",
        "base_model": "gpt-4o",
        "agents": [
            { "id": "dev", "persona": "backend_developer" },
            { "id": "qa", "persona": "qa_engineer", "priority": 5, "depends_on": ["dev"] }
        ],
        "steps": [
            { "id": "api", "agent_id": "dev", "description": "Create the API" },
            { "id": "tests", "agent_id": "qa", "description": "Write tests", "depends_on": ["api"] }
        ]
    }"#;

    #[test]
    fn test_load_json_applies_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.json");
        fs::write(&path, PROCESS_JSON).unwrap();

        let process = load_process_file(&path).unwrap();

        assert_eq!(process.version, "1.0");
        assert_eq!(process.agents[0].priority, DEFAULT_PRIORITY);
        assert_eq!(process.agents[0].name, "dev");
        assert_eq!(process.agents[1].priority, 5);
        assert_eq!(process.steps[0].name, "api");
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.yml");
        fs::write(
            &path,
            "goal: Fix the bug\nagents:\n  - id: dev\nsteps:\n  - id: fix\n    agent_id: dev\n",
        )
        .unwrap();

        let process = load_process_file(&path).unwrap();
        assert_eq!(process.goal, "Fix the bug");
        assert_eq!(process.steps.len(), 1);
    }

    #[test]
    fn test_unsupported_and_malformed_files() {
        let dir = tempdir().unwrap();
        let txt = dir.path().join("p.txt");
        fs::write(&txt, PROCESS_JSON).unwrap();
        assert!(matches!(
            load_process_file(&txt),
            Err(ConfigError::UnsupportedFormat { .. })
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ \"goal\": ").unwrap();
        assert!(matches!(
            load_process_file(&bad),
            Err(ConfigError::JsonParse { .. })
        ));
    }

    #[test]
    fn test_invalid_process_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cycle.json");
        fs::write(
            &path,
            r#"{
                "goal": "g",
                "agents": [{ "id": "a" }],
                "steps": [
                    { "id": "x", "agent_id": "a", "depends_on": ["y"] },
                    { "id": "y", "agent_id": "a", "depends_on": ["x"] }
                ]
            }"#,
        )
        .unwrap();

        match load_process_file(&path) {
            Err(ConfigError::InvalidProcess { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("cycle"));
            }
            other => panic!("expected InvalidProcess, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_rules() {
        let base: ProcessDefinition = serde_json::from_str(PROCESS_JSON).unwrap();
        assert!(validate_process(&base).is_ok());

        let mut p = base.clone();
        p.goal = " ".to_string();
        assert_eq!(validate_process(&p).unwrap_err(), "goal is required");

        let mut p = base.clone();
        p.agents[1].id = "dev".to_string();
        assert!(validate_process(&p).unwrap_err().contains("duplicate agent id"));

        let mut p = base.clone();
        p.agents[0].depends_on = vec!["dev".to_string()];
        assert!(validate_process(&p).unwrap_err().contains("cannot depend on itself"));

        let mut p = base.clone();
        p.steps[1].agent_id = "ghost".to_string();
        assert!(validate_process(&p).unwrap_err().contains("not found"));

        let mut p = base.clone();
        p.steps[1].depends_on = vec!["nowhere".to_string()];
        assert!(validate_process(&p).unwrap_err().contains("unknown step"));

        let mut p = base.clone();
        p.steps[0].timeout = Some(u64::MAX);
        assert!(validate_process(&p).unwrap_err().contains("step 'api': timeout"));

        let mut p = base.clone();
        p.settings.step_timeout = MAX_TIMEOUT_SECS + 1;
        assert!(validate_process(&p).unwrap_err().contains("step_timeout"));

        let mut p = base;
        p.agents[0].budget = Some(BudgetSpec {
            max_tokens: 100,
            token_warning: 200,
            ..Default::default()
        });
        assert!(validate_process(&p).unwrap_err().contains("token_warning"));
    }

    #[test]
    fn test_implicit_process_is_valid() {
        let process = implicit_process("Add a README", "gpt-4o");
        assert!(validate_process(&process).is_ok());
        assert_eq!(process.goal, "Add a README");
        assert_eq!(process.steps[0].description, "Add a README");
        assert_eq!(process.base_model, "gpt-4o");
    }
}
