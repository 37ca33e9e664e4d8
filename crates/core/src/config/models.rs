//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines the
//! engine settings and the process definitions found under `.ledit/`.

use ledit_protocol::{EngineConfig, ProcessDefinition};
use std::path::PathBuf;

/// Name of the project-local configuration directory.
pub const CONFIG_DIR: &str = ".ledit";

/// Unified application configuration loaded from the `.ledit/` directory.
///
/// # Example
///
/// ```rust,no_run
/// use ledit_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} processes", config.processes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Engine settings from `config.toml`.
    pub engine: EngineConfig,

    /// Process definitions from `processes/*.{json,yaml,yml}`, sorted by name.
    pub processes: Vec<NamedProcess>,
}

impl AppConfig {
    /// Find a process by its file stem.
    pub fn process(&self, name: &str) -> Option<&NamedProcess> {
        self.processes.iter().find(|process| process.name == name)
    }
}

/// A process definition and the file it came from.
#[derive(Debug, Clone)]
pub struct NamedProcess {
    /// File name without extension.
    pub name: String,
    pub path: PathBuf,
    pub definition: ProcessDefinition,
}
