//! Tool executor that works directly on the local project directory.
//!
//! Paths are resolved relative to the project root; absolute paths and
//! paths that climb out of the root are refused. URL fetching is not
//! supported locally and always fails.

use crate::tools::base::{ToolAction, ToolError, ToolExecutor, ToolOutcome};
use crate::validation::runner::run_shell;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

const MAX_SEARCH_MATCHES: usize = 50;
const SKIPPED_DIRS: &[&str] = &[".git", ".ledit", "target", "node_modules"];

pub struct LocalToolExecutor {
    root: PathBuf,
    shell: String,
}

impl LocalToolExecutor {
    pub fn new(root: PathBuf, shell: impl Into<String>) -> Self {
        Self {
            root,
            shell: shell.into(),
        }
    }

    /// Resolve a workspace-relative path, refusing anything outside the root.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if path.trim().is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative))
    }

    async fn read_file(&self, path: &str) -> ToolOutcome {
        let Some(full) = self.resolve(path) else {
            return outside_root(path);
        };
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => ToolOutcome::ok(content),
            Err(e) => ToolOutcome::failed(format!("cannot read {path}: {e}")),
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> ToolOutcome {
        let Some(full) = self.resolve(path) else {
            return outside_root(path);
        };
        let previous = tokio::fs::read_to_string(&full).await.ok();

        if let Some(parent) = full.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolOutcome::failed(format!("cannot create {}: {e}", parent.display()));
            }
        }
        if let Err(e) = tokio::fs::write(&full, content).await {
            return ToolOutcome::failed(format!("cannot write {path}: {e}"));
        }

        let verb = if previous.is_some() { "updated" } else { "created" };
        let mut outcome = ToolOutcome::ok(format!("{verb} {path} ({} bytes)", content.len()));
        outcome.diff = Some(line_summary(previous.as_deref(), content));
        outcome
    }

    async fn search(&self, pattern: &str) -> ToolOutcome {
        if pattern.is_empty() {
            return ToolOutcome::failed("empty search pattern");
        }
        let root = self.root.clone();
        let pattern = pattern.to_string();
        let matches = tokio::task::spawn_blocking(move || search_tree(&root, &pattern)).await;

        match matches {
            Ok(matches) if matches.is_empty() => ToolOutcome::ok("no matches"),
            Ok(matches) => ToolOutcome::ok(matches.join("\n")),
            Err(e) => ToolOutcome::failed(format!("search aborted: {e}")),
        }
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    async fn run_tool(&self, action: &ToolAction) -> Result<ToolOutcome, ToolError> {
        debug!(tool = action.name(), target = action.target(), "running tool");

        let outcome = match action {
            ToolAction::ReadFile { path } => self.read_file(path).await,
            ToolAction::WriteFile {
                path,
                content: Some(content),
            } => self.write_file(path, content).await,
            ToolAction::WriteFile { path, content: None } => {
                ToolOutcome::failed(format!("no content supplied for {path}"))
            }
            ToolAction::EditFile { path, .. } => {
                ToolOutcome::failed(format!("edit of {path} needs generated content"))
            }
            ToolAction::RunShell { command } => {
                match run_shell(&self.shell, command, &self.root).await {
                    Ok(output) if output.success() => ToolOutcome::ok(output.combined()),
                    Ok(output) => ToolOutcome::failed(output.combined()),
                    Err(e) => {
                        return Err(ToolError::NotAvailable(format!(
                            "cannot start {}: {e}",
                            self.shell
                        )))
                    }
                }
            }
            ToolAction::SearchFiles { pattern } => self.search(pattern).await,
            ToolAction::FetchUrl { url } => {
                ToolOutcome::failed(format!("fetching {url} is not supported locally"))
            }
        };

        Ok(outcome)
    }
}

fn outside_root(path: &str) -> ToolOutcome {
    ToolOutcome::failed(format!("path '{path}' is outside the project root"))
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn search_tree(root: &Path, pattern: &str) -> Vec<String> {
    let mut matches = Vec::new();
    let files = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file());

    for entry in files {
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        for (number, line) in content.lines().enumerate() {
            if line.contains(pattern) {
                matches.push(format!("{}:{}: {}", relative.display(), number + 1, line.trim()));
                if matches.len() >= MAX_SEARCH_MATCHES {
                    return matches;
                }
            }
        }
    }
    matches
}

fn line_summary(previous: Option<&str>, next: &str) -> String {
    let before = previous.map_or(0, |text| text.lines().count());
    let after = next.lines().count();
    format!("{before} -> {after} lines")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(dir: &Path) -> LocalToolExecutor {
        LocalToolExecutor::new(dir.to_path_buf(), "sh")
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let tools = executor(dir.path());

        let write = ToolAction::WriteFile {
            path: "src/new.txt".to_string(),
            content: Some("hello\nworld\n".to_string()),
        };
        let outcome = tools.run_tool(&write).await.unwrap();
        assert!(outcome.success, "{}", outcome.result);
        assert!(outcome.result.starts_with("created src/new.txt"));
        assert_eq!(outcome.diff.as_deref(), Some("0 -> 2 lines"));

        let read = ToolAction::ReadFile {
            path: "src/new.txt".to_string(),
        };
        let outcome = tools.run_tool(&read).await.unwrap();
        assert_eq!(outcome.result, "hello\nworld\n");
    }

    #[tokio::test]
    async fn test_refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let tools = executor(dir.path());

        for path in ["../escape.txt", "/etc/passwd", ""] {
            let outcome = tools
                .run_tool(&ToolAction::ReadFile {
                    path: path.to_string(),
                })
                .await
                .unwrap();
            assert!(!outcome.success, "{path} should be refused");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_recoverable_failure() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = executor(dir.path())
            .run_tool(&ToolAction::ReadFile {
                path: "missing.txt".to_string(),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn test_search_skips_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn main() {}\n// needle here\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".ledit")).unwrap();
        std::fs::write(dir.path().join(".ledit/state.json"), "needle").unwrap();

        let outcome = executor(dir.path())
            .run_tool(&ToolAction::SearchFiles {
                pattern: "needle".to_string(),
            })
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.result, "a.rs:2: // needle here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_exit_status_maps_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let tools = executor(dir.path());

        let ok = tools
            .run_tool(&ToolAction::RunShell {
                command: "echo hi".to_string(),
            })
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.result, "hi");

        let failed = tools
            .run_tool(&ToolAction::RunShell {
                command: "exit 4".to_string(),
            })
            .await
            .unwrap();
        assert!(!failed.success);
    }

    #[tokio::test]
    async fn test_fetch_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = executor(dir.path())
            .run_tool(&ToolAction::FetchUrl {
                url: "https://example.com".to_string(),
            })
            .await
            .unwrap();
        assert!(!outcome.success);
    }
}
