//! Command-line arguments.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ledit",
    version,
    about = "Run multi-agent coding processes against a project"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a process: a definition file, a process name from
    /// `.ledit/processes`, or a free-form prompt.
    Process {
        /// Process file, process name or prompt.
        target: String,

        /// Model used by agents that do not name one.
        #[arg(long)]
        model: Option<String>,

        /// Run without asking for confirmation.
        #[arg(long)]
        skip_prompt: bool,

        /// Ignore any stored run state and start over.
        #[arg(long)]
        fresh: bool,
    },

    /// Run a single agent on a prompt, outside of any process.
    Agent {
        prompt: String,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        skip_prompt: bool,
    },

    /// Show the stored run state.
    Status {
        /// Print the raw state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create `.ledit/` with a config file and example processes.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,

        /// Only write the config file and the single-task process.
        #[arg(long)]
        minimal: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::try_parse_from([
            "ledit",
            "process",
            "example",
            "--model",
            "gpt-4o",
            "--skip-prompt",
            "--fresh",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                target,
                model,
                skip_prompt,
                fresh,
            } => {
                assert_eq!(target, "example");
                assert_eq!(model.as_deref(), Some("gpt-4o"));
                assert!(skip_prompt);
                assert!(fresh);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_agent_requires_prompt() {
        assert!(Cli::try_parse_from(["ledit", "agent"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
