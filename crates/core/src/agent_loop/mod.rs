//! The agent execution loop.
//!
//! One call to [`AgentLoop::run`] is one attempt at a task:
//!
//! ```text
//! Classify ─┬─ question ──> Answer ──────────────────────────> Accept
//!           └─ edit ──────> Plan ──> Execute ──> Evaluate ──┬─> Accept
//!                                                           ├─> Reject
//!                                                           └─> Fatal
//! ```
//!
//! A `Reject` goes back to `Plan` by invoking the loop again with the
//! evaluator feedback appended to [`LoopInvocation::feedback`]. The step
//! scheduler does this for process steps so every attempt is persisted;
//! [`AgentLoop::run_with_retries`] does it for standalone tasks.
//!
//! Before every LLM call the agent's budget is consulted, and the
//! wall-clock deadline is checked at every phase boundary.

pub mod evaluation;
pub mod intent;
pub mod prompt;
pub mod todo;

use crate::budget::BudgetHandle;
use crate::error::FailureCause;
use crate::llm::{Completion, LlmClient, LlmPurpose, LlmRequest};
use crate::tools::{ToolAction, ToolExecutor};
use crate::validation::{GateReport, ValidationGate, ValidationRunner};
use crate::workspace::WorkspaceContext;
use evaluation::{parse_assessment, Assessment};
use intent::{classify_for, Intent};
use ledit_protocol::{AgentSpec, ValidationSpec};
use std::sync::Arc;
use std::time::Duration;
use todo::{parse_plan, Todo, TodoStatus};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// The external services an agent loop works through.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: Arc<dyn LlmClient>,
    pub tools: Arc<dyn ToolExecutor>,
    pub validator: Arc<dyn ValidationRunner>,
    pub workspace: Arc<dyn WorkspaceContext>,
}

/// Everything one attempt needs to know.
#[derive(Debug, Clone)]
pub struct LoopInvocation {
    pub agent: AgentSpec,
    /// Effective model for this agent.
    pub model: String,
    /// The task as written. Used for intent classification.
    pub instruction: String,
    /// Inputs and results of completed dependencies.
    pub context: String,
    pub expected_output: String,
    pub validation: ValidationSpec,
    /// Feedback of every earlier attempt, oldest first.
    pub feedback: Vec<String>,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Wall-clock limit for this attempt.
    pub timeout: Option<Duration>,
}

impl LoopInvocation {
    /// An invocation with no context, no validation and no timeout.
    pub fn new(agent: AgentSpec, model: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            agent,
            model: model.into(),
            instruction: instruction.into(),
            context: String::new(),
            expected_output: String::new(),
            validation: ValidationSpec::default(),
            feedback: Vec::new(),
            attempt: 1,
            timeout: None,
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The work is done. `summary` is handed to dependent steps.
    Accept { summary: String },
    /// Try again; `feedback` goes to the next plan. `cause` is recorded
    /// if no attempts remain.
    Reject { cause: FailureCause, feedback: String },
    /// Stop; retrying cannot help.
    Fatal(FailureCause),
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub verdict: Verdict,
    pub intent: Intent,
    pub answer: Option<String>,
    pub todos: Vec<Todo>,
    pub gate: Option<GateReport>,
    pub tokens: u64,
    pub cost: f64,
    pub llm_calls: u32,
}

impl LoopOutcome {
    /// An outcome for an attempt that never got to run.
    pub fn fatal(cause: FailureCause) -> Self {
        Self {
            verdict: Verdict::Fatal(cause),
            intent: Intent::Edit,
            answer: None,
            todos: Vec::new(),
            gate: None,
            tokens: 0,
            cost: 0.0,
            llm_calls: 0,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.verdict, Verdict::Accept { .. })
    }
}

/// Early exit from a phase.
type Phase<T> = Result<T, Verdict>;

/// Per-attempt bookkeeping.
struct Attempt<'a> {
    invocation: &'a LoopInvocation,
    budget: &'a BudgetHandle,
    deadline: Option<Instant>,
    tokens: u64,
    cost: f64,
    llm_calls: u32,
}

impl Attempt<'_> {
    fn check_deadline(&self) -> Phase<()> {
        match (self.deadline, self.invocation.timeout) {
            (Some(deadline), Some(timeout)) if Instant::now() >= deadline => {
                Err(Verdict::Fatal(FailureCause::Timeout(timeout)))
            }
            _ => Ok(()),
        }
    }

    fn budget_exceeded(&self) -> Verdict {
        let usage = self.budget.usage();
        Verdict::Fatal(FailureCause::BudgetExceeded {
            agent_id: self.budget.agent_id().to_string(),
            detail: format!(
                "{} tokens and ${:.4} used",
                usage.tokens_used, usage.cost_used
            ),
        })
    }

    fn charge(&mut self, tokens: u64, cost: f64) -> Phase<()> {
        self.tokens += tokens;
        self.cost += cost;
        self.budget.charge(tokens, cost);
        if self.budget.is_blocked() {
            return Err(self.budget_exceeded());
        }
        Ok(())
    }
}

pub struct AgentLoop {
    collaborators: Collaborators,
    gate: ValidationGate,
}

impl AgentLoop {
    pub fn new(collaborators: Collaborators) -> Self {
        let gate = ValidationGate::new(collaborators.validator.clone());
        Self {
            collaborators,
            gate,
        }
    }

    /// Run one attempt.
    ///
    /// # Arguments
    ///
    /// * `invocation` - The task, its context and prior feedback
    /// * `budget` - The budget of the agent doing the work
    pub async fn run(&self, invocation: &LoopInvocation, budget: &BudgetHandle) -> LoopOutcome {
        let span = info_span!(
            "agent_loop",
            agent_id = %invocation.agent.id,
            attempt = invocation.attempt
        );
        self.run_attempt(invocation, budget).instrument(span).await
    }

    /// Run attempts until one is accepted, one is fatal or `max_attempts`
    /// have been made. Each retry sees the feedback of all earlier attempts.
    ///
    /// # Returns
    ///
    /// The last outcome and the number of attempts made.
    pub async fn run_with_retries(
        &self,
        invocation: &LoopInvocation,
        budget: &BudgetHandle,
        max_attempts: u32,
    ) -> (LoopOutcome, u32) {
        let max_attempts = max_attempts.max(1);
        let mut current = invocation.clone();
        let mut attempt = 1;

        loop {
            current.attempt = attempt;
            let outcome = self.run(&current, budget).await;

            match &outcome.verdict {
                Verdict::Reject { feedback, .. } if attempt < max_attempts => {
                    info!(attempt, %feedback, "attempt rejected, retrying");
                    current.feedback.push(feedback.clone());
                    attempt += 1;
                }
                _ => return (outcome, attempt),
            }
        }
    }

    async fn run_attempt(&self, invocation: &LoopInvocation, budget: &BudgetHandle) -> LoopOutcome {
        let mut attempt = Attempt {
            invocation,
            budget,
            // Too far out to represent means no deadline.
            deadline: invocation
                .timeout
                .and_then(|timeout| Instant::now().checked_add(timeout)),
            tokens: 0,
            cost: 0.0,
            llm_calls: 0,
        };
        let intent = classify_for(&invocation.agent, &invocation.instruction);
        debug!(?intent, "classified task");

        let mut outcome = LoopOutcome {
            verdict: Verdict::Fatal(FailureCause::Llm("attempt did not run".to_string())),
            intent,
            answer: None,
            todos: Vec::new(),
            gate: None,
            tokens: 0,
            cost: 0.0,
            llm_calls: 0,
        };

        let verdict = match intent {
            Intent::Question => self.answer(&mut attempt, &mut outcome).await,
            Intent::Edit => self.plan_execute_evaluate(&mut attempt, &mut outcome).await,
        };
        outcome.verdict = verdict.unwrap_or_else(|early| early);
        outcome.tokens = attempt.tokens;
        outcome.cost = attempt.cost;
        outcome.llm_calls = attempt.llm_calls;

        match &outcome.verdict {
            Verdict::Accept { .. } => info!(tokens = outcome.tokens, "attempt accepted"),
            Verdict::Reject { feedback, .. } => info!(%feedback, "attempt rejected"),
            Verdict::Fatal(cause) => warn!(%cause, "attempt failed"),
        }
        outcome
    }

    async fn answer(&self, attempt: &mut Attempt<'_>, outcome: &mut LoopOutcome) -> Phase<Verdict> {
        let workspace = self
            .collaborators
            .workspace
            .summarize(&attempt.invocation.instruction)
            .await;
        let request = prompt::answer(attempt.invocation, &workspace);
        let completion = self.ask(attempt, LlmPurpose::Answer, request).await?;

        let answer = completion.text.trim().to_string();
        outcome.answer = Some(answer.clone());
        Ok(Verdict::Accept { summary: answer })
    }

    async fn plan_execute_evaluate(
        &self,
        attempt: &mut Attempt<'_>,
        outcome: &mut LoopOutcome,
    ) -> Phase<Verdict> {
        // Plan
        let workspace = self
            .collaborators
            .workspace
            .summarize(&attempt.invocation.instruction)
            .await;
        let request = prompt::plan(attempt.invocation, &workspace);
        let completion = self.ask(attempt, LlmPurpose::Plan, request).await?;
        let todos = match parse_plan(&completion.text) {
            Ok(todos) => todos,
            Err(e) => {
                return Ok(Verdict::Reject {
                    cause: FailureCause::Llm(e.to_string()),
                    feedback: format!(
                        "The plan could not be used: {e}. Respond with a JSON array of todos."
                    ),
                });
            }
        };
        debug!(todos = todos.len(), "plan ready");
        outcome.todos = todos;

        // Execute
        for index in 0..outcome.todos.len() {
            attempt.check_deadline()?;
            self.execute_todo(attempt, &mut outcome.todos[index]).await?;
        }

        // Evaluate
        attempt.check_deadline()?;
        self.evaluate(attempt, outcome).await
    }

    async fn execute_todo(&self, attempt: &mut Attempt<'_>, todo: &mut Todo) -> Phase<()> {
        todo.status = TodoStatus::Running;

        let action = match &todo.action {
            ToolAction::WriteFile {
                path,
                content: None,
            } => {
                let content = self.generate_content(attempt, todo, None).await?;
                ToolAction::WriteFile {
                    path: path.clone(),
                    content: Some(content),
                }
            }
            ToolAction::EditFile { path, .. } => {
                let read = ToolAction::ReadFile { path: path.clone() };
                let current = match self.collaborators.tools.run_tool(&read).await {
                    Ok(outcome) if outcome.success => Some(outcome.result),
                    Ok(_) => None,
                    Err(e) => return Err(Verdict::Fatal(FailureCause::ToolFailure(e.to_string()))),
                };
                let content = self
                    .generate_content(attempt, todo, current.as_deref())
                    .await?;
                ToolAction::WriteFile {
                    path: path.clone(),
                    content: Some(content),
                }
            }
            other => other.clone(),
        };

        let result = self
            .collaborators
            .tools
            .run_tool(&action)
            .await
            .map_err(|e| Verdict::Fatal(FailureCause::ToolFailure(e.to_string())))?;

        if result.tokens > 0 || result.cost > 0.0 {
            attempt.charge(result.tokens, result.cost)?;
        }

        if result.success {
            debug!(tool = action.name(), target = action.target(), "todo completed");
            todo.complete(result.result);
        } else {
            debug!(
                tool = action.name(),
                target = action.target(),
                error = %result.result,
                "todo failed"
            );
            todo.fail(result.result);
        }
        Ok(())
    }

    async fn generate_content(
        &self,
        attempt: &mut Attempt<'_>,
        todo: &Todo,
        current: Option<&str>,
    ) -> Phase<String> {
        let request = prompt::generate(attempt.invocation, todo, current);
        let completion = self.ask(attempt, LlmPurpose::Generate, request).await?;

        let text = completion.text;
        Ok(todo::fenced_block(&text)
            .map(str::to_string)
            .unwrap_or(text))
    }

    async fn evaluate(
        &self,
        attempt: &mut Attempt<'_>,
        outcome: &mut LoopOutcome,
    ) -> Phase<Verdict> {
        let invocation = attempt.invocation;
        let mutated = outcome
            .todos
            .iter()
            .any(|todo| todo.status == TodoStatus::Completed && todo.action.mutates());

        if invocation.validation.required || mutated {
            let report = self
                .gate
                .check(&invocation.validation)
                .await
                .map_err(|e| Verdict::Fatal(FailureCause::ValidationUnavailable(e.to_string())))?;
            let passed = report.passed;
            let details = report.details.clone();
            outcome.gate = Some(report);

            if !passed {
                return Ok(Verdict::Reject {
                    cause: FailureCause::ValidationFailure(details.clone()),
                    feedback: details,
                });
            }
        }

        let failed: Vec<String> = outcome
            .todos
            .iter()
            .filter(|todo| todo.status == TodoStatus::Failed)
            .map(|todo| {
                format!(
                    "{}: {}",
                    todo.description,
                    todo.error.as_deref().unwrap_or("failed")
                )
            })
            .collect();

        if invocation.expected_output.trim().is_empty() && failed.is_empty() {
            let summary = format!("completed {} todo(s)", outcome.todos.len());
            return Ok(Verdict::Accept { summary });
        }

        attempt.check_deadline()?;
        let request = prompt::evaluate(invocation, &outcome.todos, outcome.gate.as_ref());
        let completion = self.ask(attempt, LlmPurpose::Evaluate, request).await?;

        Ok(match parse_assessment(&completion.text) {
            Assessment::Accept(feedback) => {
                let summary = if feedback.trim().is_empty() {
                    format!("completed {} todo(s)", outcome.todos.len())
                } else {
                    feedback
                };
                Verdict::Accept { summary }
            }
            Assessment::Reject(feedback) if !failed.is_empty() => Verdict::Reject {
                cause: FailureCause::ToolFailure(failed.join("; ")),
                feedback,
            },
            Assessment::Reject(feedback) => Verdict::Reject {
                cause: FailureCause::Rejected {
                    attempts: invocation.attempt,
                    feedback: feedback.clone(),
                },
                feedback,
            },
        })
    }

    /// One budget-checked LLM call.
    async fn ask(
        &self,
        attempt: &mut Attempt<'_>,
        purpose: LlmPurpose,
        prompt: String,
    ) -> Phase<Completion> {
        attempt.check_deadline()?;
        if attempt.budget.is_blocked() {
            return Err(attempt.budget_exceeded());
        }

        let request = LlmRequest::new(purpose, attempt.invocation.model.clone(), prompt);
        debug!(purpose = purpose.name(), model = %request.model, "calling llm");

        match self.collaborators.llm.complete(&request).await {
            Ok(completion) => {
                attempt.llm_calls += 1;
                attempt.charge(completion.tokens, completion.cost)?;
                Ok(completion)
            }
            Err(e) if e.is_fatal() => Err(Verdict::Fatal(FailureCause::Llm(e.to_string()))),
            Err(e) => Err(Verdict::Reject {
                cause: FailureCause::Llm(e.to_string()),
                feedback: format!("The previous attempt was interrupted by an LLM error: {e}"),
            }),
        }
    }
}
