//! Configuration loader for the `.ledit/` directory structure.
//!
//! This module loads:
//! - `config.toml`: Engine settings
//! - `processes/*.{json,yaml,yml}`: Process definitions

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::{AppConfig, NamedProcess, CONFIG_DIR};
use crate::config::process::load_process_file;
use ledit_protocol::EngineConfig;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Loads all configuration from the `.ledit/` directory under `root`.
///
/// # Returns
///
/// An `AppConfig`. Missing directories or files yield defaults rather than
/// an error.
///
/// # Errors
///
/// Returns `ConfigError` if a file exists but cannot be read, parsed or
/// validated.
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_dir = root.join(CONFIG_DIR);

    if !config_dir.exists() {
        return Ok(AppConfig::default());
    }

    let engine = load_engine_config(&config_dir)?;
    let processes = load_processes(&config_dir)?;

    Ok(AppConfig { engine, processes })
}

/// Loads engine settings from `config.toml`.
fn load_engine_config(config_dir: &Path) -> ConfigResult<EngineConfig> {
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(EngineConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path,
        source,
    })
}

/// Loads every process definition from `processes/`.
fn load_processes(config_dir: &Path) -> ConfigResult<Vec<NamedProcess>> {
    let processes_dir = config_dir.join("processes");

    if !processes_dir.exists() {
        return Ok(Vec::new());
    }

    let mut processes = Vec::new();

    for entry in WalkDir::new(&processes_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: processes_dir.clone(),
            source,
        })?;

        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if !matches!(ext, Some("json" | "yaml" | "yml")) {
            continue;
        }

        let definition = load_process_file(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        debug!(name = %name, path = %path.display(), "loaded process definition");

        processes.push(NamedProcess {
            name,
            path: path.to_path_buf(),
            definition,
        });
    }

    Ok(processes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_config_empty_directory() {
        let dir = tempdir().expect("Failed to create temp dir");

        let config = load_config(dir.path())
            .await
            .expect("Should handle missing .ledit");

        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.processes.is_empty());
    }

    #[tokio::test]
    async fn test_load_config_with_processes() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(".ledit");
        fs::create_dir_all(config_dir.join("processes")).unwrap();

        fs::write(
            config_dir.join("config.toml"),
            "default_model = \"gpt-4o\"\nllm_command = [\"llm-bridge\", \"--json\"]\n",
        )
        .unwrap();
        fs::write(
            config_dir.join("processes/api.json"),
            r#"{"goal":"API","agents":[{"id":"a"}],"steps":[{"id":"s","agent_id":"a"}]}"#,
        )
        .unwrap();
        fs::write(
            config_dir.join("processes/docs.yaml"),
            "goal: Docs\nagents:\n  - id: w\nsteps:\n  - id: d\n    agent_id: w\n",
        )
        .unwrap();
        fs::write(config_dir.join("processes/notes.md"), "ignored").unwrap();

        let config = load_config(dir.path()).await.unwrap();

        assert_eq!(config.engine.default_model, "gpt-4o");
        assert_eq!(config.engine.llm_command, vec!["llm-bridge", "--json"]);
        assert_eq!(config.engine.state_dir, ".ledit");
        let names: Vec<_> = config.processes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["api", "docs"]);
        assert_eq!(config.process("docs").unwrap().definition.goal, "Docs");
    }

    #[tokio::test]
    async fn test_load_config_invalid_toml() {
        let dir = tempdir().expect("Failed to create temp dir");
        let config_dir = dir.path().join(".ledit");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(config_dir.join("config.toml"), "shell = [invalid toml").unwrap();

        let result = load_config(dir.path()).await;

        if let Err(ConfigError::TomlParse { path, .. }) = result {
            assert!(path.ends_with("config.toml"));
        } else {
            panic!("Expected TomlParse error");
        }
    }

    #[tokio::test]
    async fn test_load_config_invalid_process() {
        let dir = tempdir().expect("Failed to create temp dir");
        let processes_dir = dir.path().join(".ledit/processes");
        fs::create_dir_all(&processes_dir).unwrap();
        fs::write(
            processes_dir.join("empty.json"),
            r#"{"goal":"g","agents":[],"steps":[]}"#,
        )
        .unwrap();

        let result = load_config(dir.path()).await;
        assert!(matches!(result, Err(ConfigError::InvalidProcess { .. })));
    }
}
