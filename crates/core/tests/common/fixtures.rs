//! Process definitions for integration tests.

#![allow(dead_code)]

use ledit_protocol::{
    AgentSpec, BudgetSpec, ExecutionSettings, ProcessDefinition, StepSpec, StepStatus,
};

pub fn agent(id: &str) -> AgentSpec {
    AgentSpec {
        id: id.to_string(),
        name: id.to_string(),
        persona: "backend_developer".to_string(),
        description: String::new(),
        skills: Vec::new(),
        model: None,
        priority: 100,
        depends_on: Vec::new(),
        config: Default::default(),
        budget: None,
    }
}

/// An agent that stops once it has used `max_tokens`.
pub fn agent_with_budget(id: &str, max_tokens: u64) -> AgentSpec {
    AgentSpec {
        budget: Some(BudgetSpec {
            max_tokens,
            stop_on_limit: true,
            ..Default::default()
        }),
        ..agent(id)
    }
}

/// An agent whose first LLM call exhausts its budget, so every step it runs
/// fails.
pub fn broke_agent(id: &str) -> AgentSpec {
    agent_with_budget(id, 1)
}

/// A step whose instruction classifies as an edit.
pub fn step(id: &str, agent_id: &str, depends_on: &[&str]) -> StepSpec {
    StepSpec {
        id: id.to_string(),
        name: id.to_string(),
        description: format!("Create the {id} module"),
        agent_id: agent_id.to_string(),
        input: Default::default(),
        expected_output: String::new(),
        status: StepStatus::Pending,
        depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
        timeout: None,
        retries: None,
    }
}

pub fn process(agents: Vec<AgentSpec>, steps: Vec<StepSpec>) -> ProcessDefinition {
    ProcessDefinition {
        version: "1.0".to_string(),
        goal: "Build the test project".to_string(),
        description: String::new(),
        base_model: "test-model".to_string(),
        agents,
        steps,
        validation: Default::default(),
        settings: ExecutionSettings::default(),
    }
}

/// Same as [`process`] with parallel execution enabled.
pub fn parallel_process(agents: Vec<AgentSpec>, steps: Vec<StepSpec>) -> ProcessDefinition {
    let mut process = process(agents, steps);
    process.settings.parallel_execution = true;
    process
}
