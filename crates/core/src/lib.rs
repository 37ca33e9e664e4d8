//! # ledit-core
//!
//! Orchestration and agent-execution engine for ledit.
//!
//! This crate provides:
//! - A dependency-aware step scheduler with retries, failure policies,
//!   cancellation and resumable run state
//! - The agent execution loop (classify, answer or plan, execute, evaluate)
//! - Per-agent budget accounting and the validation gate
//! - Configuration and process loading from the `.ledit/` directory
//! - Traits for the external collaborators (LLM, tools, validation runner,
//!   workspace context) with local and mock implementations
//!
//! ## Modules
//!
//! - [`scheduler`]: Step scheduler and dependency graph
//! - [`agent_loop`]: Agent execution loop
//! - [`budget`]: Budget ledger
//! - [`validation`]: Validation gate and runners
//! - [`state`]: Run state store and transitions
//! - [`agents`]: Agent registry and personas
//! - [`config`]: Configuration loading
//! - [`init`]: Project initialization templates
//! - [`llm`], [`tools`], [`workspace`]: Collaborator traits and implementations

pub mod agent_loop;
pub mod agents;
pub mod budget;
pub mod config;
pub mod error;
pub mod init;
pub mod llm;
pub mod scheduler;
pub mod state;
pub mod tools;
pub mod validation;
pub mod workspace;

pub use error::{EngineError, FailureCause};
