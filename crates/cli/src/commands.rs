//! Subcommand implementations.

use crate::logging;
use crate::output::{print_agent_outcome, print_plan, print_state, spawn_event_printer};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use colored::Colorize;
use ledit_core::agent_loop::{AgentLoop, Collaborators, LoopInvocation};
use ledit_core::budget::BudgetHandle;
use ledit_core::config::process::{implicit_process, load_process_file};
use ledit_core::config::{load_config, AppConfig};
use ledit_core::init::{generate_ledit_structure, InitOptions};
use ledit_core::llm::{CommandLlmClient, LlmClient};
use ledit_core::scheduler::{SchedulerOptions, StepScheduler};
use ledit_core::state::StateStore;
use ledit_core::tools::LocalToolExecutor;
use ledit_core::validation::ShellValidationRunner;
use ledit_core::workspace::FileListContext;
use ledit_core::EngineError;
use ledit_protocol::{ExecutionSettings, ProcessDefinition, StepStatus};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// The project the CLI was started in and its `.ledit` configuration.
pub struct Project {
    pub root: PathBuf,
    pub config: AppConfig,
}

impl Project {
    pub async fn load(root: PathBuf) -> Result<Self> {
        let config = load_config(&root)
            .await
            .wrap_err("failed to load .ledit configuration")?;
        Ok(Self { root, config })
    }

    fn state_store(&self) -> StateStore {
        StateStore::new(self.root.join(&self.config.engine.state_dir))
    }

    async fn collaborators(&self) -> Result<Collaborators> {
        let engine = &self.config.engine;
        let llm = CommandLlmClient::from_command_line(&engine.llm_command, self.root.clone())
            .wrap_err("set llm_command in .ledit/config.toml")?;
        if !llm.check_availability().await {
            bail!(
                "llm_command '{}' was not found on PATH",
                engine.llm_command.join(" ")
            );
        }

        Ok(Collaborators {
            llm: Arc::new(llm),
            tools: Arc::new(LocalToolExecutor::new(self.root.clone(), &engine.shell)),
            validator: Arc::new(ShellValidationRunner::new(&engine.shell, self.root.clone())),
            workspace: Arc::new(FileListContext::new(self.root.clone())),
        })
    }
}

/// `ledit process <target>`
pub async fn run_process(
    project: &Project,
    target: &str,
    model: Option<&str>,
    skip_prompt: bool,
    fresh: bool,
) -> Result<()> {
    let (mut process, source) = resolve_process(project, target)?;
    logging::init(logging::level_for(
        &process.settings,
        &project.config.engine.log_level,
    ));
    source.log(target);
    apply_model(&mut process, model, &project.config.engine.default_model);

    print_plan(&process);
    if !skip_prompt && !confirm("Run this process?")? {
        println!("Aborted.");
        return Ok(());
    }

    let collaborators = project.collaborators().await?;
    let (events_tx, events_rx) = mpsc::channel(256);
    let printer = spawn_event_printer(events_rx);
    let scheduler = StepScheduler::new(collaborators, project.state_store())
        .with_events(events_tx)
        .with_cancellation(cancel_on_ctrl_c())
        .with_options(SchedulerOptions { resume: !fresh });

    let result = scheduler.run(&process).await;
    // Closing the event channel lets the printer drain and stop.
    drop(scheduler);
    let _ = printer.await;

    match result {
        Ok(outcome) if outcome.is_success() => {
            println!(
                "{} step(s) completed",
                outcome.state.count(StepStatus::Completed)
            );
            Ok(())
        }
        Ok(outcome) => Err(eyre!(
            "{}",
            outcome
                .error
                .unwrap_or_else(|| "process failed".to_string())
        )),
        Err(EngineError::Cancelled) => {
            bail!("process cancelled; run the same command again to resume")
        }
        Err(e) => Err(e).wrap_err("process run aborted"),
    }
}

/// `ledit agent <prompt>`
pub async fn run_agent(
    project: &Project,
    prompt: &str,
    model: Option<&str>,
    skip_prompt: bool,
) -> Result<()> {
    let model = model.unwrap_or(&project.config.engine.default_model);
    let process = implicit_process(prompt, model);
    let Some(agent) = process.agents.first().cloned() else {
        bail!("no agent available for the prompt");
    };

    println!("{} {prompt}", "Task:".bold());
    if !skip_prompt && !confirm("Run the agent on this project?")? {
        println!("Aborted.");
        return Ok(());
    }

    let settings = ExecutionSettings::default();
    let mut invocation = LoopInvocation::new(agent, model, prompt);
    invocation.timeout = Some(Duration::from_secs(settings.step_timeout));

    let agent_loop = AgentLoop::new(project.collaborators().await?);
    let budget = BudgetHandle::unlimited(&invocation.agent.id);

    let (outcome, attempts) = tokio::select! {
        result = agent_loop.run_with_retries(&invocation, &budget, settings.max_retries) => result,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };

    print_agent_outcome(&outcome, attempts);
    if !outcome.is_accepted() {
        bail!("the agent did not complete the task");
    }
    Ok(())
}

/// `ledit status`
pub fn show_status(project: &Project, json: bool) -> Result<()> {
    let store = project.state_store();
    let Some(state) = store.load().wrap_err("failed to read the run state")? else {
        println!("No run state found in {}", store.dir().display());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print_state(&state);
    }
    Ok(())
}

/// `ledit init`
pub async fn init(root: &Path, force: bool, minimal: bool) -> Result<()> {
    let written = generate_ledit_structure(InitOptions {
        target_dir: root.to_path_buf(),
        force,
        minimal,
    })
    .await
    .wrap_err("failed to initialize .ledit")?;

    for path in &written {
        let shown = path.strip_prefix(root).unwrap_or(path);
        println!("  {} {}", "created".green(), shown.display());
    }
    println!("Set llm_command in .ledit/config.toml before running a process.");
    Ok(())
}

/// A file path, then a named process from `.ledit/processes`, then a
/// free-form prompt.
/// Where `ledit process` found its process.
#[derive(Debug, PartialEq)]
enum ProcessSource {
    File(PathBuf),
    Named { name: String, path: PathBuf },
    Prompt,
}

impl ProcessSource {
    fn log(&self, target: &str) {
        match self {
            Self::File(path) => info!(path = %path.display(), "loading process file"),
            Self::Named { name, path } => {
                info!(name = %name, path = %path.display(), "using named process")
            }
            Self::Prompt if looks_like_path(target) => {
                warn!(target, "no such process file, treating the argument as a prompt")
            }
            Self::Prompt => info!("running the argument as a one-step prompt"),
        }
    }
}

fn resolve_process(project: &Project, target: &str) -> Result<(ProcessDefinition, ProcessSource)> {
    let path = project.root.join(target);
    if path.is_file() {
        let process = load_process_file(&path)
            .wrap_err_with(|| format!("failed to load process file {}", path.display()))?;
        return Ok((process, ProcessSource::File(path)));
    }
    if let Some(named) = project.config.process(target) {
        let source = ProcessSource::Named {
            name: named.name.clone(),
            path: named.path.clone(),
        };
        return Ok((named.definition.clone(), source));
    }
    Ok((implicit_process(target, ""), ProcessSource::Prompt))
}

fn looks_like_path(target: &str) -> bool {
    !target.contains(char::is_whitespace)
        && [".json", ".yaml", ".yml"]
            .iter()
            .any(|ext| target.ends_with(ext))
}

/// `--model` replaces the base model; otherwise an empty base model falls
/// back to the configured default.
fn apply_model(process: &mut ProcessDefinition, model: Option<&str>, default_model: &str) {
    match model {
        Some(model) => process.base_model = model.to_string(),
        None if process.base_model.trim().is_empty() => {
            process.base_model = default_model.to_string();
        }
        None => {}
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            let _ = cancel_tx.send(true);
        }
    });
    cancel_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_apply_model() {
        let mut process = implicit_process("Fix it", "");
        apply_model(&mut process, None, "gpt-4o");
        assert_eq!(process.base_model, "gpt-4o");

        apply_model(&mut process, Some("fast"), "gpt-4o");
        assert_eq!(process.base_model, "fast");

        apply_model(&mut process, None, "other");
        assert_eq!(process.base_model, "fast");
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("processes/web.json"));
        assert!(looks_like_path("flow.yml"));
        assert!(!looks_like_path("Add a README.json section"));
        assert!(!looks_like_path("example"));
    }

    #[tokio::test]
    async fn test_resolve_process_order() {
        let dir = tempdir().unwrap();
        init(dir.path(), false, true).await.unwrap();
        fs::write(
            dir.path().join("custom.yaml"),
            "goal: From a file\nagents:\n  - id: dev\nsteps:\n  - id: a\n    agent_id: dev\n",
        )
        .unwrap();
        let project = Project::load(dir.path().to_path_buf()).await.unwrap();

        let (from_file, source) = resolve_process(&project, "custom.yaml").unwrap();
        assert_eq!(from_file.goal, "From a file");
        assert_eq!(source, ProcessSource::File(dir.path().join("custom.yaml")));

        let (named, source) = resolve_process(&project, "single-task").unwrap();
        assert_eq!(named.steps[0].id, "write_readme");
        assert!(matches!(source, ProcessSource::Named { name, .. } if name == "single-task"));

        let (prompt, source) = resolve_process(&project, "Add a CHANGELOG").unwrap();
        assert_eq!(source, ProcessSource::Prompt);
        assert_eq!(prompt.goal, "Add a CHANGELOG");
        assert_eq!(prompt.steps.len(), 1);
    }
}
