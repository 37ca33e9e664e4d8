//! `ledit`: run LLM agents over a project, one process step at a time.
//!
//! ```bash
//! ledit init                       # write .ledit/ with example processes
//! ledit process example            # run .ledit/processes/example.json
//! ledit process "Add a README"     # one agent, one step
//! ledit agent "How is config loaded?"
//! ledit status
//! ```
//!
//! Set `RUST_LOG=ledit_core=debug` for verbose logs on stderr.

mod args;
mod commands;
mod logging;
mod output;

use args::{Cli, Commands};
use clap::Parser;
use color_eyre::eyre::WrapErr;
use commands::Project;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let root = std::env::current_dir().wrap_err("cannot determine the working directory")?;

    match cli.command {
        Commands::Init { force, minimal } => {
            logging::init("info");
            commands::init(&root, force, minimal).await
        }
        Commands::Process {
            target,
            model,
            skip_prompt,
            fresh,
        } => {
            // Logging starts once the process, and its log level, is known.
            let project = Project::load(root).await?;
            commands::run_process(&project, &target, model.as_deref(), skip_prompt, fresh).await
        }
        Commands::Agent {
            prompt,
            model,
            skip_prompt,
        } => {
            let project = load_project(root).await?;
            commands::run_agent(&project, &prompt, model.as_deref(), skip_prompt).await
        }
        Commands::Status { json } => {
            let project = load_project(root).await?;
            commands::show_status(&project, json)
        }
    }
}

async fn load_project(root: std::path::PathBuf) -> color_eyre::Result<Project> {
    let project = Project::load(root).await?;
    logging::init(&project.config.engine.log_level);
    Ok(project)
}
