//! Scripted validation runner for testing.

use crate::validation::runner::{CommandOutput, ValidationError, ValidationRunner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy)]
enum Script {
    /// Fail this many more times, then pass.
    FailTimes(u32),
    AlwaysFail,
}

pub struct MockValidationRunner {
    available: bool,
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
}

impl MockValidationRunner {
    /// Every command exits 0.
    pub fn passing() -> Self {
        Self {
            available: true,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::passing()
        }
    }

    /// `command` fails its first `times` runs, then passes.
    pub fn fail_times(self, command: &str, times: u32) -> Self {
        self.script(command, Script::FailTimes(times))
    }

    pub fn always_fail(self, command: &str) -> Self {
        self.script(command, Script::AlwaysFail)
    }

    /// Commands run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn script(self, command: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), script);
        self
    }
}

#[async_trait]
impl ValidationRunner for MockValidationRunner {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, ValidationError> {
        if !self.available {
            return Err(ValidationError::NotAvailable(
                "Mock runner not available".to_string(),
            ));
        }

        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());

        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        let fails = match scripts.get_mut(command) {
            Some(Script::AlwaysFail) => true,
            Some(Script::FailTimes(remaining)) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };

        Ok(if fails {
            CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("{command}: failed"),
            }
        } else {
            CommandOutput {
                exit_code: Some(0),
                stdout: format!("{command}: ok"),
                stderr: String::new(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_times_then_pass() {
        let runner = MockValidationRunner::passing().fail_times("make", 1);

        assert!(!runner.run("make").await.unwrap().success());
        assert!(runner.run("make").await.unwrap().success());
        assert!(runner.run("other").await.unwrap().success());
        assert_eq!(runner.calls(), vec!["make", "make", "other"]);
    }
}
