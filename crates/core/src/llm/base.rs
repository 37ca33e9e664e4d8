//! Base LLM client trait and supporting types.

use async_trait::async_trait;
use thiserror::Error;

/// What a completion request is for.
///
/// The prompt alone is enough for a provider; the purpose is carried so
/// logs, usage reports and scripted test clients can tell calls apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmPurpose {
    /// Answer a question directly.
    Answer,
    /// Break a task into todos.
    Plan,
    /// Produce file content for a write or edit todo.
    Generate,
    /// Judge the result of an attempt.
    Evaluate,
}

impl LlmPurpose {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Plan => "plan",
            Self::Generate => "generate",
            Self::Evaluate => "evaluate",
        }
    }
}

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub purpose: LlmPurpose,
    pub model: String,
    pub prompt: String,
}

impl LlmRequest {
    pub fn new(purpose: LlmPurpose, model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

/// The text of a completion and what it cost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens: u64,
    pub cost: f64,
}

impl Completion {
    pub fn new(text: impl Into<String>, tokens: u64) -> Self {
        Self {
            text: text.into(),
            tokens,
            cost: 0.0,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM not available: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Stream parsing error: {0}")]
    StreamParseError(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
}

impl LlmError {
    /// Errors that a retry cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NotAvailable(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn check_availability(&self) -> bool;
    async fn complete(&self, request: &LlmRequest) -> Result<Completion, LlmError>;
}

/// Rough token count for providers that do not report usage.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
