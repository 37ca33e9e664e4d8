//! Embedded template files for `.ledit/` initialization.
//!
//! The crate's `templates/` directory is embedded at compile time, so the
//! CLI can generate a project layout without any files on disk. With the
//! `debug-embed` feature the files are still read from the binary in debug
//! builds, keeping tests independent of the working directory.

use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates"]
pub struct TemplateAssets;

/// Get template file content by path.
///
/// # Arguments
/// * `path` - Relative path from templates root (e.g., "config.toml", "processes/example.json")
///
/// # Example
/// ```
/// use ledit_core::init::templates::get_template;
///
/// let config = get_template("config.toml").expect("config.toml should exist");
/// assert!(config.contains("state_dir ="));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// List all template files under a directory prefix, sorted.
///
/// # Example
/// ```
/// use ledit_core::init::templates::list_templates;
///
/// let processes = list_templates("processes/");
/// assert!(processes.contains(&"processes/example.json".to_string()));
/// ```
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect();
    paths.sort();
    paths
}
