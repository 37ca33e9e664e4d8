//! Configuration and process loading.
//!
//! This module loads the engine configuration and the process definitions
//! kept in the `.ledit/` directory, and validates process files.

pub mod error;
pub mod loader;
pub mod models;
pub mod process;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
pub use models::{AppConfig, NamedProcess};
