//! Per-agent budget accounting.
//!
//! The ledger keeps accumulated token and cost totals per agent and compares
//! them against that agent's `BudgetSpec`. It never refuses a charge: it
//! reports a `BudgetStatus`, and callers decide what to do with it. The agent
//! loop consults [`BudgetHandle::is_blocked`] before every LLM call.

use ledit_protocol::{AgentUsage, BudgetSpec, BudgetStatus};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Debug, Default)]
struct AgentBudget {
    spec: Option<BudgetSpec>,
    usage: AgentUsage,
}

/// Budget totals for every agent of a process run.
///
/// Cloning is cheap; clones share the same totals.
#[derive(Debug, Clone, Default)]
pub struct BudgetLedger {
    agents: Arc<Mutex<HashMap<String, AgentBudget>>>,
}

impl BudgetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the limits of an agent. `None` means unlimited.
    pub fn register(&self, agent_id: &str, spec: Option<BudgetSpec>) {
        let mut agents = self.lock();
        agents.entry(agent_id.to_string()).or_default().spec = spec;
    }

    /// Seed totals from a persisted run state.
    pub fn restore(&self, usage: &BTreeMap<String, AgentUsage>) {
        let mut agents = self.lock();
        for (agent_id, totals) in usage {
            agents.entry(agent_id.clone()).or_default().usage = *totals;
        }
    }

    /// Add usage to an agent's totals and report where it now stands.
    pub fn charge(&self, agent_id: &str, tokens: u64, cost: f64) -> BudgetStatus {
        let mut agents = self.lock();
        let budget = agents.entry(agent_id.to_string()).or_default();
        budget.usage.tokens_used = budget.usage.tokens_used.saturating_add(tokens);
        budget.usage.cost_used += cost;

        let status = evaluate(budget.spec.as_ref(), &budget.usage);
        if let Some(spec) = &budget.spec {
            if status != BudgetStatus::Ok && spec.alert_on_limit {
                warn!(
                    agent_id,
                    tokens_used = budget.usage.tokens_used,
                    cost_used = budget.usage.cost_used,
                    ?status,
                    "agent budget threshold crossed"
                );
            }
        }
        status
    }

    /// Current status without charging anything.
    pub fn status(&self, agent_id: &str) -> BudgetStatus {
        let agents = self.lock();
        agents
            .get(agent_id)
            .map(|budget| evaluate(budget.spec.as_ref(), &budget.usage))
            .unwrap_or_default()
    }

    /// True when the agent reached a hard limit and must stop.
    pub fn is_blocked(&self, agent_id: &str) -> bool {
        let agents = self.lock();
        agents.get(agent_id).is_some_and(|budget| {
            budget.spec.as_ref().is_some_and(|spec| spec.stop_on_limit)
                && evaluate(budget.spec.as_ref(), &budget.usage) == BudgetStatus::Exceeded
        })
    }

    pub fn usage(&self, agent_id: &str) -> AgentUsage {
        let agents = self.lock();
        agents
            .get(agent_id)
            .map(|budget| budget.usage)
            .unwrap_or_default()
    }

    /// Totals of every agent that has been registered or charged.
    pub fn snapshot(&self) -> BTreeMap<String, AgentUsage> {
        let agents = self.lock();
        agents
            .iter()
            .map(|(agent_id, budget)| (agent_id.clone(), budget.usage))
            .collect()
    }

    /// A view of the ledger scoped to one agent.
    pub fn handle(&self, agent_id: &str) -> BudgetHandle {
        BudgetHandle {
            agent_id: agent_id.to_string(),
            ledger: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AgentBudget>> {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An agent-scoped view of a [`BudgetLedger`].
#[derive(Debug, Clone)]
pub struct BudgetHandle {
    agent_id: String,
    ledger: BudgetLedger,
}

impl BudgetHandle {
    /// A handle over a private ledger with no limits. Used for ad-hoc runs.
    pub fn unlimited(agent_id: &str) -> Self {
        BudgetLedger::new().handle(agent_id)
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn charge(&self, tokens: u64, cost: f64) -> BudgetStatus {
        self.ledger.charge(&self.agent_id, tokens, cost)
    }

    pub fn status(&self) -> BudgetStatus {
        self.ledger.status(&self.agent_id)
    }

    pub fn is_blocked(&self) -> bool {
        self.ledger.is_blocked(&self.agent_id)
    }

    pub fn usage(&self) -> AgentUsage {
        self.ledger.usage(&self.agent_id)
    }
}

fn evaluate(spec: Option<&BudgetSpec>, usage: &AgentUsage) -> BudgetStatus {
    let Some(spec) = spec else {
        return BudgetStatus::Ok;
    };

    let tokens_exceeded = spec.max_tokens > 0 && usage.tokens_used >= spec.max_tokens;
    let cost_exceeded = spec.max_cost > 0.0 && usage.cost_used >= spec.max_cost;
    if tokens_exceeded || cost_exceeded {
        return BudgetStatus::Exceeded;
    }

    let tokens_warning = spec.token_warning > 0 && usage.tokens_used >= spec.token_warning;
    let cost_warning = spec.cost_warning > 0.0 && usage.cost_used >= spec.cost_warning;
    if tokens_warning || cost_warning {
        return BudgetStatus::Warning;
    }

    BudgetStatus::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(max_tokens: u64, token_warning: u64, stop_on_limit: bool) -> BudgetSpec {
        BudgetSpec {
            max_tokens,
            token_warning,
            stop_on_limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_charge_progresses_through_thresholds() {
        let ledger = BudgetLedger::new();
        ledger.register("dev", Some(spec(100, 80, true)));

        assert_eq!(ledger.charge("dev", 50, 0.0), BudgetStatus::Ok);
        assert_eq!(ledger.charge("dev", 30, 0.0), BudgetStatus::Warning);
        assert!(!ledger.is_blocked("dev"));
        assert_eq!(ledger.charge("dev", 20, 0.0), BudgetStatus::Exceeded);
        assert!(ledger.is_blocked("dev"));
        assert_eq!(ledger.usage("dev").tokens_used, 100);
    }

    #[test]
    fn test_exceeded_without_stop_on_limit_is_not_blocking() {
        let ledger = BudgetLedger::new();
        ledger.register("dev", Some(spec(10, 0, false)));

        assert_eq!(ledger.charge("dev", 20, 0.0), BudgetStatus::Exceeded);
        assert!(!ledger.is_blocked("dev"));
    }

    #[test]
    fn test_cost_limit() {
        let ledger = BudgetLedger::new();
        ledger.register(
            "dev",
            Some(BudgetSpec {
                max_cost: 1.0,
                cost_warning: 0.5,
                stop_on_limit: true,
                ..Default::default()
            }),
        );

        assert_eq!(ledger.charge("dev", 0, 0.6), BudgetStatus::Warning);
        assert_eq!(ledger.charge("dev", 0, 0.6), BudgetStatus::Exceeded);
        assert!(ledger.is_blocked("dev"));
    }

    #[test]
    fn test_zero_limits_mean_unlimited() {
        let ledger = BudgetLedger::new();
        ledger.register("dev", Some(BudgetSpec::default()));

        assert_eq!(ledger.charge("dev", u64::MAX / 2, 1_000.0), BudgetStatus::Ok);
        assert_eq!(ledger.status("unknown"), BudgetStatus::Ok);
    }

    #[test]
    fn test_restore_and_snapshot() {
        let ledger = BudgetLedger::new();
        ledger.register("dev", Some(spec(100, 0, true)));

        let mut persisted = BTreeMap::new();
        persisted.insert(
            "dev".to_string(),
            AgentUsage {
                tokens_used: 100,
                cost_used: 0.0,
            },
        );
        ledger.restore(&persisted);

        assert!(ledger.is_blocked("dev"));
        assert_eq!(ledger.snapshot().get("dev").map(|u| u.tokens_used), Some(100));
    }

    #[test]
    fn test_handles_share_totals() {
        let ledger = BudgetLedger::new();
        let first = ledger.handle("dev");
        let second = ledger.handle("dev");

        first.charge(5, 0.1);
        second.charge(5, 0.1);

        assert_eq!(ledger.usage("dev").tokens_used, 10);
        assert_eq!(first.agent_id(), "dev");
        assert_eq!(BudgetHandle::unlimited("x").status(), BudgetStatus::Ok);
    }
}
