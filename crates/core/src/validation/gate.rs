//! The validation gate.
//!
//! Runs the configured build, test, lint and custom commands in that order
//! and stops at the first failure. Commands that are absent or blank are
//! skipped, so an empty `ValidationSpec` always passes. The gate never
//! retries; retrying is the scheduler's job.

use crate::validation::runner::{ValidationError, ValidationRunner};
use ledit_protocol::ValidationSpec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Output kept in failure details, counted from the end.
const MAX_DETAIL_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Build,
    Test,
    Lint,
    Custom,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Lint => "lint",
            Self::Custom => "custom check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub command: String,
    pub passed: bool,
    pub output: String,
}

/// Outcome of one gate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    pub passed: bool,
    /// Checks that actually ran, in order.
    pub checks: Vec<CheckResult>,
    /// Failure description fed back to the planner. Empty when passed.
    pub details: String,
}

impl GateReport {
    pub fn summary(&self) -> String {
        if self.checks.is_empty() {
            return "no validation checks configured".to_string();
        }
        if self.passed {
            return format!("{} validation check(s) passed", self.checks.len());
        }
        self.details.clone()
    }
}

pub struct ValidationGate {
    runner: Arc<dyn ValidationRunner>,
}

impl ValidationGate {
    pub fn new(runner: Arc<dyn ValidationRunner>) -> Self {
        Self { runner }
    }

    /// Run every configured check, short-circuiting on the first failure.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` when the runner is unavailable or a command
    /// cannot be started at all. A command that runs and exits non-zero is a
    /// failed check, not an error.
    pub async fn check(&self, spec: &ValidationSpec) -> Result<GateReport, ValidationError> {
        let planned = planned_checks(spec);
        if planned.is_empty() {
            return Ok(GateReport {
                passed: true,
                checks: Vec::new(),
                details: String::new(),
            });
        }

        if !self.runner.check_availability().await {
            return Err(ValidationError::NotAvailable(
                "validation shell could not be found".to_string(),
            ));
        }

        let mut checks = Vec::with_capacity(planned.len());
        for (kind, command) in planned {
            debug!(%kind, command, "running validation check");
            let output = self.runner.run(command).await?;
            let passed = output.success();
            let combined = output.combined();
            checks.push(CheckResult {
                kind,
                command: command.to_string(),
                passed,
                output: combined.clone(),
            });

            if !passed {
                let exit = output
                    .exit_code
                    .map_or_else(|| "signal".to_string(), |code| code.to_string());
                let details = format!(
                    "{kind} `{command}` failed (exit {exit}):\n{}",
                    tail(&combined, MAX_DETAIL_CHARS)
                );
                info!(%kind, command, "validation check failed");
                return Ok(GateReport {
                    passed: false,
                    checks,
                    details,
                });
            }
        }

        Ok(GateReport {
            passed: true,
            checks,
            details: String::new(),
        })
    }
}

fn planned_checks(spec: &ValidationSpec) -> Vec<(CheckKind, &str)> {
    let fixed = [
        (CheckKind::Build, spec.build_command.as_deref()),
        (CheckKind::Test, spec.test_command.as_deref()),
        (CheckKind::Lint, spec.lint_command.as_deref()),
    ];

    fixed
        .into_iter()
        .filter_map(|(kind, command)| command.map(|c| (kind, c)))
        .chain(
            spec.custom_checks
                .iter()
                .map(|c| (CheckKind::Custom, c.as_str())),
        )
        .filter(|(_, command)| !command.trim().is_empty())
        .collect()
}

fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    text.char_indices()
        .nth(skip)
        .map_or(text, |(index, _)| &text[index..])
}
