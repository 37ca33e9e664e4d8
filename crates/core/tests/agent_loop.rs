//! Agent loop runs against the local tool executor and shell validation.

mod common;

use common::agent;
use ledit_core::agent_loop::intent::Intent;
use ledit_core::agent_loop::{AgentLoop, Collaborators, LoopInvocation, Verdict};
use ledit_core::budget::{BudgetHandle, BudgetLedger};
use ledit_core::llm::{LlmError, LlmPurpose, MockLlmClient};
use ledit_core::tools::{LocalToolExecutor, MockToolExecutor};
use ledit_core::validation::{MockValidationRunner, ShellValidationRunner};
use ledit_core::workspace::{EmptyContext, FileListContext};
use ledit_core::FailureCause;
use ledit_protocol::{BudgetSpec, ValidationSpec};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn local_collaborators(root: &Path, llm: MockLlmClient) -> Collaborators {
    Collaborators {
        llm: Arc::new(llm),
        tools: Arc::new(LocalToolExecutor::new(root.to_path_buf(), "sh")),
        validator: Arc::new(ShellValidationRunner::new("sh", root.to_path_buf())),
        workspace: Arc::new(FileListContext::new(root.to_path_buf())),
    }
}

fn plan_writing(path: &str, content: &str) -> String {
    format!(
        r#"[{{"description":"Write {path}","action":"write_file","path":"{path}","content":"{content}"}}]"#
    )
}

#[cfg(unix)]
#[tokio::test]
async fn test_edit_writes_to_disk_and_passes_gate() {
    let dir = TempDir::new().unwrap();
    let agent_loop = AgentLoop::new(local_collaborators(dir.path(), MockLlmClient::new()));
    let mut invocation = LoopInvocation::new(agent("dev"), "test-model", "Create output.txt");
    invocation.validation = ValidationSpec {
        build_command: Some("test -f output.txt".to_string()),
        ..Default::default()
    };

    let outcome = agent_loop
        .run(&invocation, &BudgetHandle::unlimited("dev"))
        .await;

    assert!(outcome.is_accepted(), "unexpected verdict: {:?}", outcome.verdict);
    assert_eq!(outcome.intent, Intent::Edit);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("output.txt")).unwrap(),
        "done"
    );
    let gate = outcome.gate.expect("gate ran");
    assert!(gate.passed);
    assert_eq!(gate.checks.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_gate_failure_feeds_the_next_attempt() {
    let dir = TempDir::new().unwrap();
    let llm = MockLlmClient::new()
        .with_queued(LlmPurpose::Plan, Ok(plan_writing("status.txt", "broken")))
        .with_response(LlmPurpose::Plan, plan_writing("status.txt", "fixed"));
    let collaborators = local_collaborators(dir.path(), llm);
    let agent_loop = AgentLoop::new(collaborators);
    let mut invocation = LoopInvocation::new(agent("dev"), "test-model", "Fix status.txt");
    invocation.validation.test_command = Some("grep -q fixed status.txt".to_string());

    let (outcome, attempts) = agent_loop
        .run_with_retries(&invocation, &BudgetHandle::unlimited("dev"), 3)
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(attempts, 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("status.txt")).unwrap(),
        "fixed"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_gate_failure_exhausts_attempts() {
    let dir = TempDir::new().unwrap();
    let agent_loop = AgentLoop::new(local_collaborators(dir.path(), MockLlmClient::new()));
    let mut invocation = LoopInvocation::new(agent("dev"), "test-model", "Create output.txt");
    invocation.validation.lint_command = Some("exit 3".to_string());

    let (outcome, attempts) = agent_loop
        .run_with_retries(&invocation, &BudgetHandle::unlimited("dev"), 2)
        .await;

    assert_eq!(attempts, 2);
    match outcome.verdict {
        Verdict::Reject { cause, feedback } => {
            assert!(matches!(cause, FailureCause::ValidationFailure(_)));
            assert!(feedback.contains("exit 3"));
        }
        other => panic!("expected Reject, got {other:?}"),
    }
}

#[tokio::test]
async fn test_question_is_answered_without_tools() {
    let tools = Arc::new(MockToolExecutor::new());
    let validator = Arc::new(MockValidationRunner::passing());
    let agent_loop = AgentLoop::new(Collaborators {
        llm: Arc::new(
            MockLlmClient::new().with_response(LlmPurpose::Answer, "It parses process files."),
        ),
        tools: tools.clone(),
        validator: validator.clone(),
        workspace: Arc::new(EmptyContext),
    });
    let mut invocation = LoopInvocation::new(agent("dev"), "test-model", "How does loading work?");
    invocation.validation.required = true;
    invocation.validation.build_command = Some("make".to_string());

    let outcome = agent_loop
        .run(&invocation, &BudgetHandle::unlimited("dev"))
        .await;

    assert_eq!(outcome.intent, Intent::Question);
    assert_eq!(outcome.answer.as_deref(), Some("It parses process files."));
    assert!(outcome.is_accepted());
    assert!(outcome.tokens > 0);
    assert!(outcome.gate.is_none());
    assert!(tools.calls().is_empty());
    assert!(validator.calls().is_empty());
}

#[tokio::test]
async fn test_budget_is_shared_across_attempts() {
    let ledger = BudgetLedger::new();
    ledger.register(
        "dev",
        Some(BudgetSpec {
            max_tokens: 15,
            stop_on_limit: true,
            ..Default::default()
        }),
    );
    let llm = Arc::new(MockLlmClient::new());
    let agent_loop = AgentLoop::new(Collaborators {
        llm: llm.clone(),
        tools: Arc::new(MockToolExecutor::new()),
        validator: Arc::new(MockValidationRunner::passing()),
        workspace: Arc::new(EmptyContext),
    });
    let invocation = LoopInvocation::new(agent("dev"), "test-model", "Create output.txt");
    let budget = ledger.handle("dev");

    let first = agent_loop.run(&invocation, &budget).await;
    let second = agent_loop.run(&invocation, &budget).await;

    assert!(first.is_accepted());
    assert!(matches!(
        second.verdict,
        Verdict::Fatal(FailureCause::BudgetExceeded { .. })
    ));
    assert_eq!(llm.calls().len(), 2);
    assert_eq!(ledger.usage("dev").tokens_used, 20);
}

#[tokio::test]
async fn test_unreachable_llm_is_fatal() {
    let agent_loop = AgentLoop::new(Collaborators {
        llm: Arc::new(MockLlmClient::unavailable()),
        tools: Arc::new(MockToolExecutor::new()),
        validator: Arc::new(MockValidationRunner::passing()),
        workspace: Arc::new(EmptyContext),
    });
    let invocation = LoopInvocation::new(agent("dev"), "test-model", "Create output.txt");

    let (outcome, attempts) = agent_loop
        .run_with_retries(&invocation, &BudgetHandle::unlimited("dev"), 3)
        .await;

    assert_eq!(attempts, 1);
    assert!(matches!(outcome.verdict, Verdict::Fatal(FailureCause::Llm(_))));
}

#[tokio::test]
async fn test_transient_llm_error_is_retried() {
    let llm = MockLlmClient::new().with_queued(
        LlmPurpose::Plan,
        Err(LlmError::ApiError("connection reset".to_string())),
    );
    let agent_loop = AgentLoop::new(Collaborators {
        llm: Arc::new(llm),
        tools: Arc::new(MockToolExecutor::new()),
        validator: Arc::new(MockValidationRunner::passing()),
        workspace: Arc::new(EmptyContext),
    });
    let invocation = LoopInvocation::new(agent("dev"), "test-model", "Create output.txt");

    let (outcome, attempts) = agent_loop
        .run_with_retries(&invocation, &BudgetHandle::unlimited("dev"), 3)
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(attempts, 2);
}
