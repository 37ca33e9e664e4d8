//! LLM client backed by an external command.
//!
//! The command receives the prompt on stdin and `--model <name>` as its last
//! arguments, and writes JSON Lines / NDJSON to stdout. Each line is one of:
//!
//! ```text
//! {"type":"text","text":"partial answer"}
//! {"type":"usage","tokens":123,"cost":0.002}
//! {"type":"error","message":"rate limited"}
//! ```
//!
//! Text chunks are concatenated. When no usage line is sent the token count
//! is estimated from prompt and answer length.

use crate::llm::base::{estimate_tokens, Completion, LlmClient, LlmError, LlmRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

/// One line of the command's output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandMessage {
    Text {
        text: String,
    },
    Usage {
        #[serde(default)]
        tokens: u64,
        #[serde(default)]
        cost: f64,
    },
    Error {
        message: String,
    },
}

pub struct CommandLlmClient {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
}

impl CommandLlmClient {
    /// Build a client from `llm_command` (program followed by arguments).
    ///
    /// # Errors
    ///
    /// Returns `LlmError::NotAvailable` if the command line is empty.
    pub fn from_command_line(command: &[String], working_dir: PathBuf) -> Result<Self, LlmError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            LlmError::NotAvailable("no llm_command configured in .ledit/config.toml".to_string())
        })?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            working_dir,
        })
    }

    /// Spawn the command, feed it `stdin` and parse its stdout line by line.
    ///
    /// Empty lines are skipped. Lines that fail to parse yield
    /// `LlmError::StreamParseError`. A non-zero exit yields a final
    /// `LlmError::ExecutionError` carrying stderr.
    pub fn execute(
        program: String,
        args: Vec<String>,
        working_dir: PathBuf,
        stdin: String,
    ) -> Pin<Box<dyn Stream<Item = Result<CommandMessage, LlmError>> + Send>> {
        let stream = async_stream::stream! {
            let mut cmd = Command::new(&program);
            cmd.args(&args);
            cmd.current_dir(&working_dir);
            cmd.stdin(Stdio::piped());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(LlmError::NotAvailable(format!(
                        "Failed to spawn command '{program}': {e}"
                    )));
                    return;
                }
            };

            if let Some(mut input) = child.stdin.take() {
                if let Err(e) = input.write_all(stdin.as_bytes()).await {
                    yield Err(LlmError::ExecutionError(format!("Failed to write prompt: {e}")));
                    return;
                }
                drop(input);
            }

            let stderr_task = child.stderr.take().map(|mut stderr| {
                tokio::spawn(async move {
                    let mut buf = String::new();
                    let _ = stderr.read_to_string(&mut buf).await;
                    buf
                })
            });

            let stdout = match child.stdout.take() {
                Some(stdout) => stdout,
                None => {
                    yield Err(LlmError::ExecutionError("Failed to capture stdout".to_string()));
                    return;
                }
            };

            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<CommandMessage>(&line) {
                    Ok(message) => {
                        yield Ok(message);
                    }
                    Err(e) => {
                        yield Err(LlmError::StreamParseError(format!(
                            "Failed to parse JSON: {e} (line: {line})"
                        )));
                    }
                }
            }

            let status = child.wait().await;
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            match status {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    yield Err(LlmError::ExecutionError(format!(
                        "'{program}' exited with {status}: {}",
                        stderr.trim()
                    )));
                }
                Err(e) => {
                    yield Err(LlmError::ExecutionError(format!(
                        "Failed to wait for '{program}': {e}"
                    )));
                }
            }
        };

        Box::pin(stream)
    }
}

#[async_trait]
impl LlmClient for CommandLlmClient {
    async fn check_availability(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn complete(&self, request: &LlmRequest) -> Result<Completion, LlmError> {
        let mut args = self.args.clone();
        if !request.model.is_empty() {
            args.push("--model".to_string());
            args.push(request.model.clone());
        }

        debug!(
            program = %self.program,
            purpose = request.purpose.name(),
            model = %request.model,
            "sending completion request"
        );

        let mut stream = Self::execute(
            self.program.clone(),
            args,
            self.working_dir.clone(),
            request.prompt.clone(),
        );

        let mut text = String::new();
        let mut usage: Option<(u64, f64)> = None;
        while let Some(message) = stream.next().await {
            match message? {
                CommandMessage::Text { text: chunk } => text.push_str(&chunk),
                CommandMessage::Usage { tokens, cost } => usage = Some((tokens, cost)),
                CommandMessage::Error { message } => return Err(LlmError::ApiError(message)),
            }
        }

        let (tokens, cost) = usage.unwrap_or_else(|| {
            (estimate_tokens(&request.prompt) + estimate_tokens(&text), 0.0)
        });
        Ok(Completion { text, tokens, cost })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::base::LlmPurpose;

    fn write_script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("fake-llm.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn test_empty_command_line_is_unavailable() {
        let result = CommandLlmClient::from_command_line(&[], PathBuf::from("."));
        assert!(matches!(result, Err(LlmError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_execute_invalid_command() {
        let stream = CommandLlmClient::execute(
            "nonexistent-command-xyz".to_string(),
            vec![],
            PathBuf::from("."),
            String::new(),
        );

        let results: Vec<_> = stream.collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(
            &results[0],
            Err(LlmError::NotAvailable(msg)) if msg.contains("Failed to spawn")
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_concatenates_text_and_reads_usage() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"cat > /dev/null
echo '{"type":"text","text":"Hello, "}'
echo ''
echo '{"type":"text","text":"world"}'
echo '{"type":"usage","tokens":17,"cost":0.25}'"#,
        );

        let client = CommandLlmClient::from_command_line(
            &[script.to_string_lossy().to_string()],
            dir.path().to_path_buf(),
        )
        .unwrap();
        assert!(client.check_availability().await);

        let request = LlmRequest::new(LlmPurpose::Answer, "test-model", "Say hello");
        let completion = client.complete(&request).await.unwrap();

        assert_eq!(completion.text, "Hello, world");
        assert_eq!(completion.tokens, 17);
        assert_eq!(completion.cost, 0.25);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_estimates_tokens_without_usage_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"cat > /dev/null
echo '{"type":"text","text":"abcdefgh"}'"#,
        );

        let client = CommandLlmClient::from_command_line(
            &[script.to_string_lossy().to_string()],
            dir.path().to_path_buf(),
        )
        .unwrap();

        let request = LlmRequest::new(LlmPurpose::Answer, "", "abcd");
        let completion = client.complete(&request).await.unwrap();
        assert_eq!(completion.tokens, 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_surfaces_error_messages() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"cat > /dev/null
echo '{"type":"error","message":"rate limited"}'"#,
        );

        let client = CommandLlmClient::from_command_line(
            &[script.to_string_lossy().to_string()],
            dir.path().to_path_buf(),
        )
        .unwrap();

        let request = LlmRequest::new(LlmPurpose::Plan, "m", "p");
        let err = client.complete(&request).await.unwrap_err();
        assert_eq!(err, LlmError::ApiError("rate limited".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_complete_reports_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "cat > /dev/null\necho boom >&2\nexit 3");

        let client = CommandLlmClient::from_command_line(
            &[script.to_string_lossy().to_string()],
            dir.path().to_path_buf(),
        )
        .unwrap();

        let request = LlmRequest::new(LlmPurpose::Plan, "m", "p");
        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, LlmError::ExecutionError(msg) if msg.contains("boom")));
    }
}
