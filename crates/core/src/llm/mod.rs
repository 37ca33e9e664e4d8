//! LLM client abstraction.
//!
//! The engine talks to language models only through the [`LlmClient`]
//! trait. [`CommandLlmClient`] bridges to an external command;
//! [`MockLlmClient`] answers from a script.

pub mod base;
pub mod command_client;
pub mod mock;

pub use base::{estimate_tokens, Completion, LlmClient, LlmError, LlmPurpose, LlmRequest};
pub use command_client::CommandLlmClient;
pub use mock::MockLlmClient;
