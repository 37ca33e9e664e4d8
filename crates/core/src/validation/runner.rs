//! Shell command runner used by the validation gate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Captured result of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Validation runner not available: {0}")]
    NotAvailable(String),
    #[error("Failed to run '{command}': {reason}")]
    ExecutionError { command: String, reason: String },
}

#[async_trait]
pub trait ValidationRunner: Send + Sync {
    async fn check_availability(&self) -> bool;
    async fn run(&self, command: &str) -> Result<CommandOutput, ValidationError>;
}

/// Run `command` through `<shell> -c` in `working_dir`.
pub async fn run_shell(
    shell: &str,
    command: &str,
    working_dir: &Path,
) -> std::io::Result<CommandOutput> {
    let output = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Runs validation commands with the configured shell.
pub struct ShellValidationRunner {
    shell: String,
    working_dir: PathBuf,
}

impl ShellValidationRunner {
    pub fn new(shell: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            shell: shell.into(),
            working_dir,
        }
    }
}

#[async_trait]
impl ValidationRunner for ShellValidationRunner {
    async fn check_availability(&self) -> bool {
        which::which(&self.shell).is_ok() && self.working_dir.is_dir()
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ValidationError> {
        run_shell(&self.shell, command, &self.working_dir)
            .await
            .map_err(|e| ValidationError::ExecutionError {
                command: command.to_string(),
                reason: e.to_string(),
            })
    }
}
