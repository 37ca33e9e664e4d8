//! Agent registry for a process.
//!
//! The `AgentRegistry` is responsible for:
//! - Registering the agents a process declares
//! - Looking up agents by id
//! - Resolving each agent's effective model
//! - Seeding the budget ledger with each agent's limits

use crate::budget::BudgetLedger;
use ledit_protocol::{AgentSpec, ProcessDefinition};
use std::collections::HashMap;

/// Holds the agents of one process, in declaration order.
pub struct AgentRegistry {
    agents: HashMap<String, AgentSpec>,
    order: Vec<String>,
    base_model: String,
}

impl AgentRegistry {
    /// Create a registry from the agents of `process`.
    ///
    /// # Arguments
    ///
    /// * `process` - The process whose `agents` are registered
    pub fn new(process: &ProcessDefinition) -> Self {
        let mut agents = HashMap::new();
        let mut order = Vec::new();

        for agent in &process.agents {
            if agents.insert(agent.id.clone(), agent.clone()).is_none() {
                order.push(agent.id.clone());
            }
        }

        Self {
            agents,
            order,
            base_model: process.base_model.clone(),
        }
    }

    /// Get an agent by id.
    ///
    /// # Returns
    ///
    /// `Some(&AgentSpec)` if found, `None` otherwise.
    pub fn get_agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.get(id)
    }

    /// The model an agent runs with: its own override, else the base model.
    pub fn effective_model(&self, agent: &AgentSpec) -> String {
        agent
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(&self.base_model)
            .to_string()
    }

    /// Scheduling priority of an agent; unknown agents rank lowest.
    pub fn priority(&self, id: &str) -> i32 {
        self.agents.get(id).map_or(i32::MIN, |agent| agent.priority)
    }

    /// Register every agent's budget with `ledger`.
    pub fn register_budgets(&self, ledger: &BudgetLedger) {
        for id in &self.order {
            if let Some(agent) = self.agents.get(id) {
                ledger.register(id, agent.budget.clone());
            }
        }
    }

    /// List all registered agent ids in declaration order.
    pub fn list_agents(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Check if an agent with the given id is registered.
    pub fn has_agent(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }
}
