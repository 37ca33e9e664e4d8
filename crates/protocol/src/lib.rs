//! # ledit-protocol
//!
//! Data model shared by the ledit engine and its front ends.
//!
//! This crate defines all shared data structures used for:
//! - Process definition files (JSON or YAML)
//! - The persisted run state (`orchestration_state.json`)
//! - Engine configuration (`.ledit/config.toml`)
//! - Progress events streamed to observers
//!
//! ## Modules
//!
//! - [`process_models`]: Process, agent, step, budget and validation definitions
//! - [`run_state`]: Persisted per-run, per-step and per-agent state
//! - [`config_models`]: Engine configuration from config.toml
//! - [`ipc`]: Events sent from the engine to observers
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, chrono and uuid
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other ledit crates

pub mod config_models;
pub mod ipc;
pub mod process_models;
pub mod run_state;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use process_models::*;
pub use run_state::*;
