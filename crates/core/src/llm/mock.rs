//! Scripted LLM client for testing.
//!
//! Responses are chosen by [`LlmPurpose`]: queued responses are consumed
//! first, then the per-purpose default is returned. Every request is
//! recorded so tests can assert on call counts and prompts.

use crate::llm::base::{Completion, LlmClient, LlmError, LlmPurpose, LlmRequest};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A plan with a single write todo, the default answer to `Plan` requests.
pub const DEFAULT_PLAN: &str =
    r#"[{"description":"Write the result","action":"write_file","path":"output.txt","content":"done"}]"#;

/// The default answer to `Evaluate` requests.
pub const DEFAULT_ACCEPT: &str = r#"{"status":"accept","feedback":"looks good"}"#;

pub struct MockLlmClient {
    available: bool,
    tokens_per_call: u64,
    delay: Option<Duration>,
    model_delays: HashMap<String, Duration>,
    defaults: HashMap<LlmPurpose, String>,
    queued: Mutex<HashMap<LlmPurpose, VecDeque<Result<String, LlmError>>>>,
    calls: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    /// A client that plans one write, generates content and accepts.
    pub fn new() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(LlmPurpose::Answer, "Mock answer".to_string());
        defaults.insert(LlmPurpose::Plan, DEFAULT_PLAN.to_string());
        defaults.insert(LlmPurpose::Generate, "generated content".to_string());
        defaults.insert(LlmPurpose::Evaluate, DEFAULT_ACCEPT.to_string());

        Self {
            available: true,
            tokens_per_call: 10,
            delay: None,
            model_delays: HashMap::new(),
            defaults,
            queued: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Replace the default response for a purpose.
    pub fn with_response(mut self, purpose: LlmPurpose, text: impl Into<String>) -> Self {
        self.defaults.insert(purpose, text.into());
        self
    }

    /// Queue a one-shot response (or error) for a purpose.
    pub fn with_queued(self, purpose: LlmPurpose, response: Result<String, LlmError>) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(purpose)
            .or_default()
            .push_back(response);
        self
    }

    pub fn with_tokens_per_call(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering requests for `model`. Overrides `with_delay`.
    pub fn with_model_delay(mut self, model: impl Into<String>, delay: Duration) -> Self {
        self.model_delays.insert(model.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<LlmRequest> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, purpose: LlmPurpose) -> usize {
        self.calls()
            .iter()
            .filter(|request| request.purpose == purpose)
            .count()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn complete(&self, request: &LlmRequest) -> Result<Completion, LlmError> {
        if !self.available {
            return Err(LlmError::NotAvailable("Mock LLM not available".to_string()));
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let delay = self.model_delays.get(&request.model).copied().or(self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&request.purpose)
            .and_then(VecDeque::pop_front);

        let text = match queued {
            Some(response) => response?,
            None => self
                .defaults
                .get(&request.purpose)
                .cloned()
                .unwrap_or_default(),
        };

        Ok(Completion::new(text, self.tokens_per_call))
    }
}
