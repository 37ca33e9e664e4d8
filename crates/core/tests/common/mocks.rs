//! A temp-dir backed test environment with mock collaborators.

#![allow(dead_code)]

use ledit_core::agent_loop::Collaborators;
use ledit_core::llm::MockLlmClient;
use ledit_core::scheduler::StepScheduler;
use ledit_core::state::StateStore;
use ledit_core::tools::MockToolExecutor;
use ledit_core::validation::MockValidationRunner;
use ledit_core::workspace::EmptyContext;
use ledit_protocol::{Event, RunState};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub struct TestEnv {
    pub dir: TempDir,
    pub llm: Arc<MockLlmClient>,
    pub tools: Arc<MockToolExecutor>,
    pub validator: Arc<MockValidationRunner>,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with(MockLlmClient::new(), MockValidationRunner::passing())
    }

    pub fn with(llm: MockLlmClient, validator: MockValidationRunner) -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            llm: Arc::new(llm),
            tools: Arc::new(MockToolExecutor::new()),
            validator: Arc::new(validator),
        }
    }

    /// Swap in a fresh LLM client, keeping the state directory.
    pub fn replace_llm(&mut self, llm: MockLlmClient) {
        self.llm = Arc::new(llm);
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            llm: self.llm.clone(),
            tools: self.tools.clone(),
            validator: self.validator.clone(),
            workspace: Arc::new(EmptyContext),
        }
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.dir.path().join(".ledit"))
    }

    pub fn scheduler(&self) -> StepScheduler {
        StepScheduler::new(self.collaborators(), self.store())
    }

    /// A scheduler with an event channel large enough to never block a run.
    pub fn scheduler_with_events(&self) -> (StepScheduler, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(1024);
        (self.scheduler().with_events(tx), rx)
    }

    /// The run state as persisted on disk.
    pub fn saved_state(&self) -> RunState {
        self.store()
            .load()
            .expect("read state")
            .expect("state file exists")
    }

    pub fn llm_calls(&self) -> usize {
        self.llm.calls().len()
    }
}
