//! Directory structure and file generation for `.ledit/` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::models::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Options for initializing a `.ledit` directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Project root where `.ledit` will be created.
    pub target_dir: PathBuf,

    /// Overwrite existing template files.
    pub force: bool,

    /// Only write `config.toml` and the single-task process.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate the `.ledit` directory structure from the embedded templates.
///
/// ```text
/// .ledit/
/// ├── config.toml
/// └── processes/
///     ├── example.json (unless minimal)
///     └── single-task.json
/// ```
///
/// A run state already present in `.ledit` is left untouched.
///
/// # Returns
/// The paths written.
///
/// # Errors
/// - `AlreadyInitialized` if `config.toml` exists and `force` is not set
/// - `TemplateNotFound` if an embedded template is missing
/// - `DirectoryCreate` / `FileWrite` on file system failures
pub async fn generate_ledit_structure(options: InitOptions) -> InitResult<Vec<PathBuf>> {
    let config_dir = options.target_dir.join(CONFIG_DIR);

    if config_dir.join("config.toml").exists() && !options.force {
        return Err(InitError::AlreadyInitialized(config_dir));
    }

    let mut templates = vec!["config.toml".to_string()];
    if options.minimal {
        templates.push("processes/single-task.json".to_string());
    } else {
        templates.extend(list_templates("processes/"));
    }

    let mut written = Vec::with_capacity(templates.len());
    for template in &templates {
        written.push(write_template_file(&config_dir, template)?);
    }
    Ok(written)
}

fn write_template_file(config_dir: &Path, template_path: &str) -> InitResult<PathBuf> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = config_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path.clone(),
        source,
    })?;
    debug!(path = %target_path.display(), "wrote template");

    Ok(target_path)
}
