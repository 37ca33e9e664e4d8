//! Workspace context providers.
//!
//! A provider gives the planner a short picture of the project so plans
//! reference real paths.

use async_trait::async_trait;
use std::path::PathBuf;
use walkdir::WalkDir;

#[async_trait]
pub trait WorkspaceContext: Send + Sync {
    /// A summary of the files relevant to `task`. May be empty.
    async fn summarize(&self, task: &str) -> String;
}

/// Provides no context at all.
pub struct EmptyContext;

#[async_trait]
impl WorkspaceContext for EmptyContext {
    async fn summarize(&self, _task: &str) -> String {
        String::new()
    }
}

/// Lists project files, skipping hidden and build directories.
pub struct FileListContext {
    root: PathBuf,
    max_entries: usize,
}

impl FileListContext {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_entries: 200,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

#[async_trait]
impl WorkspaceContext for FileListContext {
    async fn summarize(&self, _task: &str) -> String {
        let root = self.root.clone();
        let max_entries = self.max_entries;
        let files = tokio::task::spawn_blocking(move || list_files(&root, max_entries))
            .await
            .unwrap_or_default();

        if files.is_empty() {
            return String::new();
        }
        let mut summary = String::from("Project files:\n");
        for file in files {
            summary.push_str("- ");
            summary.push_str(&file);
            summary.push('\n');
        }
        summary
    }
}

fn list_files(root: &std::path::Path, max_entries: usize) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_name().to_str().is_some_and(|name| {
                    name.starts_with('.') || name == "target" || name == "node_modules"
                })
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|path| path.display().to_string())
        })
        .take(max_entries)
        .collect();
    files.sort();
    files
}
