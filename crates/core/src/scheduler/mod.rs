//! Dependency-aware step scheduler.
//!
//! The `StepScheduler` owns the [`RunState`] of a process run. It:
//! 1. Validates the step graph before anything runs
//! 2. Loads a resumable state or creates a fresh one
//! 3. Dispatches ready steps to the agent loop, one attempt at a time
//! 4. Applies the retry and failure policies
//! 5. Persists the state after every transition

pub mod graph;
pub mod resolve;

use crate::agent_loop::{AgentLoop, Collaborators, LoopOutcome, Verdict};
use crate::agents::AgentRegistry;
use crate::budget::BudgetLedger;
use crate::error::{EngineError, FailureCause};
use crate::state::transitions::{
    cancel_run, check_compatibility, complete_run, complete_step, create_run_state, fail_run,
    fail_step, log_step, record_attempt, requeue_step, reset_for_resume, skip_step, start_run,
    start_step,
};
use crate::state::{StateError, StateStore};
use chrono::{DateTime, Utc};
use graph::DependencyGraph;
use ledit_protocol::{
    AttemptOutcome, BudgetStatus, Event, ProcessDefinition, ProcessStatus, RunState, StepStatus,
};
use resolve::{resolve_step, ResolvedStep};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Reuse a compatible stored run state instead of starting over.
    pub resume: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { resume: true }
    }
}

/// How a process run ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ProcessStatus,
    /// Error of the first step that failed.
    pub error: Option<String>,
    pub state: RunState,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ProcessStatus::Completed
    }
}

pub struct StepScheduler {
    collaborators: Collaborators,
    store: StateStore,
    events_tx: mpsc::Sender<Event>,
    cancel: Option<watch::Receiver<bool>>,
    options: SchedulerOptions,
}

impl StepScheduler {
    /// Create a scheduler that persists to `store`.
    pub fn new(collaborators: Collaborators, store: StateStore) -> Self {
        // Nobody listens until `with_events` is called; sends fail silently.
        let (events_tx, _) = mpsc::channel(1);
        Self {
            collaborators,
            store,
            events_tx,
            cancel: None,
            options: SchedulerOptions::default(),
        }
    }

    /// Send progress events to `events_tx`.
    pub fn with_events(mut self, events_tx: mpsc::Sender<Event>) -> Self {
        self.events_tx = events_tx;
        self
    }

    /// Cancel the run once `cancel` becomes `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run a process to completion.
    ///
    /// # Returns
    ///
    /// The final status and state. A process whose steps fail still returns
    /// `Ok` with `ProcessStatus::Failed`.
    ///
    /// # Errors
    ///
    /// - `DependencyCycle`, `UnknownReference`, `DuplicateStep` before any
    ///   step runs or any state is written
    /// - `State` if the state file cannot be read or written
    /// - `Cancelled` if the cancellation signal fired
    pub async fn run(&self, process: &ProcessDefinition) -> Result<RunOutcome, EngineError> {
        let graph = DependencyGraph::build(&process.steps)?;

        let state = match self.prepare_state(process)? {
            Prepared::Settled(state) => {
                info!(goal = %process.goal, "every step already completed, nothing to do");
                return Ok(RunOutcome {
                    status: ProcessStatus::Completed,
                    error: state.error.clone(),
                    state,
                });
            }
            Prepared::Ready(state) => state,
        };

        let registry = AgentRegistry::new(process);
        let ledger = BudgetLedger::new();
        registry.register_budgets(&ledger);
        ledger.restore(&state.agents);

        let mut run = Run {
            process,
            graph,
            registry,
            ledger,
            store: &self.store,
            events_tx: &self.events_tx,
            agent_loop: Arc::new(AgentLoop::new(self.collaborators.clone())),
            state,
            tasks: JoinSet::new(),
            active: HashMap::new(),
            aborted: false,
        };
        run.execute(self.cancel.clone()).await
    }

    fn prepare_state(&self, process: &ProcessDefinition) -> Result<Prepared, EngineError> {
        if !self.options.resume {
            return Ok(Prepared::Ready(create_run_state(process)));
        }

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(StateError::Parse { path, source }) => {
                warn!(
                    path = %path.display(),
                    error = %source,
                    "could not read stored run state, starting fresh"
                );
                return self.start_over(process);
            }
            Err(e) => return Err(e.into()),
        };
        let Some(mut stored) = stored else {
            return Ok(Prepared::Ready(create_run_state(process)));
        };

        if let Err(reason) = check_compatibility(&stored, process) {
            warn!(%reason, "stored run state does not match this process, starting fresh");
            return self.start_over(process);
        }

        if !stored.steps.is_empty() && stored.count(StepStatus::Completed) == stored.steps.len() {
            return Ok(Prepared::Settled(stored));
        }

        info!(
            completed = stored.count(StepStatus::Completed),
            total = stored.steps.len(),
            "resuming process run"
        );
        reset_for_resume(&mut stored, process);
        Ok(Prepared::Ready(stored))
    }

    /// Move the stored state aside and begin with a fresh one.
    fn start_over(&self, process: &ProcessDefinition) -> Result<Prepared, EngineError> {
        if let Some(backup) = self.store.backup()? {
            info!(path = %backup.display(), "previous run state backed up");
        }
        Ok(Prepared::Ready(create_run_state(process)))
    }
}

enum Prepared {
    /// A stored state whose steps are all completed.
    Settled(RunState),
    Ready(RunState),
}

/// A step with an attempt in flight.
struct ActiveStep {
    agent_id: String,
    resolved: ResolvedStep,
    feedback: Vec<String>,
    attempt: u32,
    attempt_started: DateTime<Utc>,
}

/// The state of one `StepScheduler::run` call.
struct Run<'a> {
    process: &'a ProcessDefinition,
    graph: DependencyGraph,
    registry: AgentRegistry,
    ledger: BudgetLedger,
    store: &'a StateStore,
    events_tx: &'a mpsc::Sender<Event>,
    agent_loop: Arc<AgentLoop>,
    state: RunState,
    tasks: JoinSet<(String, LoopOutcome)>,
    active: HashMap<String, ActiveStep>,
    /// Set once `stop_on_failure` fired; nothing is dispatched after that.
    aborted: bool,
}

impl Run<'_> {
    async fn execute(
        &mut self,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<RunOutcome, EngineError> {
        info!(
            process_id = %self.state.process_id,
            goal = %self.process.goal,
            steps = self.state.steps.len(),
            parallel = self.process.settings.parallel_execution,
            "starting process run"
        );
        start_run(&mut self.state, self.events_tx).await;
        self.save()?;

        loop {
            if is_cancelled(&cancel) {
                return self.cancel().await;
            }

            if !self.aborted && self.dispatch_ready().await? {
                // A step failed during dispatch; re-evaluate readiness.
                continue;
            }

            if self.tasks.is_empty() {
                self.skip_unreachable().await?;
                break;
            }

            tokio::select! {
                biased;
                _ = wait_for_cancel(&mut cancel) => return self.cancel().await,
                joined = self.tasks.join_next() => match joined {
                    Some(Ok((step_id, outcome))) => self.handle_outcome(step_id, outcome).await?,
                    Some(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Some(Err(err)) => debug!(error = %err, "step task ended without a result"),
                    None => {}
                },
            }
        }

        self.finish().await
    }

    /// Dispatch every step that may start now.
    ///
    /// # Returns
    ///
    /// `true` if a step failed before it could be dispatched.
    async fn dispatch_ready(&mut self) -> Result<bool, EngineError> {
        let parallel = self.process.settings.parallel_execution;

        for step_id in self.ready_steps() {
            if !parallel && !self.tasks.is_empty() {
                break;
            }
            let Some(step) = self.process.step(&step_id) else {
                continue;
            };
            if self
                .active
                .values()
                .any(|active| active.agent_id == step.agent_id)
            {
                continue;
            }

            let resolved = match resolve_step(self.process, &self.registry, step, &self.state) {
                Ok(resolved) => resolved,
                Err(cause) => {
                    warn!(step_id = %step_id, %cause, "step cannot be dispatched");
                    fail_step(&mut self.state, &step_id, cause.to_string(), self.events_tx).await;
                    self.save()?;
                    self.on_step_failed(&step_id).await?;
                    return Ok(true);
                }
            };

            let active = ActiveStep {
                agent_id: step.agent_id.clone(),
                resolved,
                feedback: Vec::new(),
                attempt: 0,
                attempt_started: Utc::now(),
            };
            self.active.insert(step_id.clone(), active);
            self.start_attempt(&step_id).await?;
        }
        Ok(false)
    }

    /// Pending steps whose dependencies have all completed, ordered by
    /// declaration index and then agent priority.
    fn ready_steps(&self) -> Vec<String> {
        let mut ready: Vec<(usize, i32, String)> = self
            .state
            .steps
            .iter()
            .filter(|record| record.status == StepStatus::Pending)
            .filter(|record| {
                self.graph.dependencies(&record.step_id).iter().all(|dependency| {
                    self.state
                        .step(dependency)
                        .is_some_and(|dep| dep.status == StepStatus::Completed)
                })
            })
            .map(|record| {
                (
                    self.graph.position(&record.step_id).unwrap_or(usize::MAX),
                    self.registry.priority(&record.agent_id),
                    record.step_id.clone(),
                )
            })
            .collect();

        ready.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
        ready.into_iter().map(|(_, _, step_id)| step_id).collect()
    }

    /// Move an active step to its next attempt and spawn it.
    async fn start_attempt(&mut self, step_id: &str) -> Result<(), EngineError> {
        let Some(attempt) = start_step(&mut self.state, step_id, self.events_tx).await else {
            return Ok(());
        };
        self.save()?;

        let Some(active) = self.active.get_mut(step_id) else {
            return Ok(());
        };
        active.attempt = attempt;
        active.attempt_started = Utc::now();

        let mut invocation = active.resolved.invocation.clone();
        invocation.attempt = attempt;
        invocation.feedback = active.feedback.clone();

        info!(
            step_id,
            agent_id = %active.agent_id,
            attempt,
            max_attempts = active.resolved.max_attempts,
            "dispatching step"
        );

        let agent_loop = Arc::clone(&self.agent_loop);
        let budget = self.ledger.handle(&active.agent_id);
        let timeout = active.resolved.timeout;
        let step_id = step_id.to_string();

        self.tasks.spawn(async move {
            let outcome = match timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, agent_loop.run(&invocation, &budget)).await {
                        Ok(outcome) => outcome,
                        Err(_) => LoopOutcome::fatal(FailureCause::Timeout(limit)),
                    }
                }
                None => agent_loop.run(&invocation, &budget).await,
            };
            (step_id, outcome)
        });
        Ok(())
    }

    async fn handle_outcome(
        &mut self,
        step_id: String,
        outcome: LoopOutcome,
    ) -> Result<(), EngineError> {
        let Some(active) = self.active.get(&step_id) else {
            return Ok(());
        };
        let agent_id = active.agent_id.clone();
        let attempt = active.attempt;
        let max_attempts = active.resolved.max_attempts;
        let attempt_started = active.attempt_started;

        self.sync_budget(&agent_id).await;

        match outcome.verdict {
            Verdict::Accept { summary } => {
                info!(step_id = %step_id, attempt, "step completed");
                record_attempt(
                    &mut self.state,
                    &step_id,
                    AttemptOutcome::Accepted,
                    attempt_started,
                    None,
                    outcome.tokens,
                    outcome.cost,
                );
                log_step(
                    &self.state,
                    &step_id,
                    format!("attempt {attempt} accepted"),
                    self.events_tx,
                )
                .await;
                self.active.remove(&step_id);
                complete_step(&mut self.state, &step_id, summary, self.events_tx).await;
                self.save()?;
            }
            Verdict::Reject { cause, feedback } => {
                record_attempt(
                    &mut self.state,
                    &step_id,
                    AttemptOutcome::Rejected,
                    attempt_started,
                    Some(feedback.clone()),
                    outcome.tokens,
                    outcome.cost,
                );
                log_step(
                    &self.state,
                    &step_id,
                    format!("attempt {attempt} rejected: {feedback}"),
                    self.events_tx,
                )
                .await;

                if attempt < max_attempts && !self.aborted {
                    info!(step_id = %step_id, attempt, max_attempts, %feedback, "retrying step");
                    if let Some(active) = self.active.get_mut(&step_id) {
                        active.feedback.push(feedback);
                    }
                    self.start_attempt(&step_id).await?;
                } else {
                    warn!(step_id = %step_id, attempt, %cause, "step failed, no attempts left");
                    self.active.remove(&step_id);
                    fail_step(&mut self.state, &step_id, cause.to_string(), self.events_tx).await;
                    self.save()?;
                    self.on_step_failed(&step_id).await?;
                }
            }
            Verdict::Fatal(cause) => {
                warn!(step_id = %step_id, attempt, %cause, "step failed");
                record_attempt(
                    &mut self.state,
                    &step_id,
                    AttemptOutcome::Fatal,
                    attempt_started,
                    Some(cause.to_string()),
                    outcome.tokens,
                    outcome.cost,
                );
                self.active.remove(&step_id);
                fail_step(&mut self.state, &step_id, cause.to_string(), self.events_tx).await;
                self.save()?;
                self.on_step_failed(&step_id).await?;
            }
        }
        Ok(())
    }

    /// Apply the failure policy after `step_id` failed.
    async fn on_step_failed(&mut self, step_id: &str) -> Result<(), EngineError> {
        if self.process.settings.stop_on_failure {
            warn!(step_id, "stop_on_failure is set, aborting process run");
            self.aborted = true;
            self.tasks.shutdown().await;

            let reason = format!("aborted after step '{step_id}' failed");
            let interrupted: Vec<(String, DateTime<Utc>)> = self
                .active
                .drain()
                .map(|(id, active)| (id, active.attempt_started))
                .collect();
            for (id, started) in interrupted {
                record_attempt(
                    &mut self.state,
                    &id,
                    AttemptOutcome::Interrupted,
                    started,
                    None,
                    0,
                    0.0,
                );
                skip_step(&mut self.state, &id, reason.clone(), self.events_tx).await;
            }
            self.sync_all_budgets();

            let pending: Vec<String> = self
                .state
                .steps
                .iter()
                .filter(|record| record.status == StepStatus::Pending)
                .map(|record| record.step_id.clone())
                .collect();
            for id in pending {
                skip_step(&mut self.state, &id, reason.clone(), self.events_tx).await;
            }
        } else {
            let dependents: Vec<String> = self
                .graph
                .transitive_dependents(step_id)
                .into_iter()
                .map(str::to_string)
                .collect();
            for id in dependents {
                let pending = self
                    .state
                    .step(&id)
                    .is_some_and(|record| record.status == StepStatus::Pending);
                if pending {
                    debug!(step_id = %id, failed = step_id, "skipping dependent of failed step");
                    skip_step(
                        &mut self.state,
                        &id,
                        format!("dependency '{step_id}' failed"),
                        self.events_tx,
                    )
                    .await;
                }
            }
        }
        self.save()
    }

    /// Skip pending steps that can never become ready.
    async fn skip_unreachable(&mut self) -> Result<(), EngineError> {
        let pending: Vec<String> = self
            .state
            .steps
            .iter()
            .filter(|record| record.status == StepStatus::Pending)
            .map(|record| record.step_id.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        for id in pending {
            warn!(step_id = %id, "step can no longer run, skipping");
            skip_step(
                &mut self.state,
                &id,
                "dependencies can no longer complete".to_string(),
                self.events_tx,
            )
            .await;
        }
        self.save()
    }

    async fn finish(&mut self) -> Result<RunOutcome, EngineError> {
        self.sync_all_budgets();

        if self.state.count(StepStatus::Failed) > 0 {
            fail_run(&mut self.state, self.events_tx).await;
            warn!(error = ?self.state.error, "process failed");
        } else {
            complete_run(&mut self.state, self.events_tx).await;
            info!(process_id = %self.state.process_id, "process completed");
        }
        for (agent_id, usage) in &self.state.agents {
            info!(
                agent_id = %agent_id,
                tokens_used = usage.tokens_used,
                cost_used = usage.cost_used,
                "agent usage"
            );
        }
        self.save()?;

        Ok(RunOutcome {
            status: self.state.status,
            error: self.state.error.clone(),
            state: self.state.clone(),
        })
    }

    /// Stop everything in flight and return those steps to pending.
    async fn cancel(&mut self) -> Result<RunOutcome, EngineError> {
        warn!(in_flight = self.active.len(), "cancelling process run");
        self.tasks.shutdown().await;

        let interrupted: Vec<(String, DateTime<Utc>)> = self
            .active
            .drain()
            .map(|(id, active)| (id, active.attempt_started))
            .collect();
        for (id, started) in interrupted {
            record_attempt(
                &mut self.state,
                &id,
                AttemptOutcome::Interrupted,
                started,
                None,
                0,
                0.0,
            );
            requeue_step(&mut self.state, &id, self.events_tx).await;
        }
        self.sync_all_budgets();
        cancel_run(&mut self.state, self.events_tx).await;
        self.save()?;
        Err(EngineError::Cancelled)
    }

    /// Copy an agent's totals into the state and report threshold crossings.
    async fn sync_budget(&mut self, agent_id: &str) {
        let usage = self.ledger.usage(agent_id);
        self.state.agents.insert(agent_id.to_string(), usage);

        let status = self.ledger.status(agent_id);
        if status != BudgetStatus::Ok {
            let _ = self
                .events_tx
                .send(Event::BudgetAlert {
                    process_id: self.state.process_id,
                    agent_id: agent_id.to_string(),
                    status,
                    tokens_used: usage.tokens_used,
                    cost_used: usage.cost_used,
                })
                .await;
        }
    }

    fn sync_all_budgets(&mut self) {
        self.state.agents.extend(self.ledger.snapshot());
    }

    fn save(&self) -> Result<(), EngineError> {
        self.store.save(&self.state)?;
        Ok(())
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once cancellation is requested. Never resolves without a
/// receiver or after the sender is gone.
async fn wait_for_cancel(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if rx.wait_for(|&cancelled| cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
