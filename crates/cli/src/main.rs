//! Unison CLI, the main entry point.
//!
//! Commands:
//! - `agent`   Run one autonomous agent on a task
//! - `clan`    Plan and run a clan described by a TOML file
//! - `tools`   List the built-in tools and their parameters
//! - `onboard` Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "unison",
    about = "Unison: autonomous agents and agent clans",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.unison/config.toml
    #[arg(short, long, global = true, env = "UNISON_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single agent until it passes a result
    Agent {
        /// What the agent should accomplish
        #[arg(short, long)]
        task: String,

        /// Name the agent answers to; also names its history file
        #[arg(short, long, default_value = "Unison")]
        identity: String,

        /// One-line description shown to the model
        #[arg(short, long, default_value = "A helpful autonomous agent")]
        description: String,

        /// Override agent.max_iterations
        #[arg(short, long)]
        max_iterations: Option<u32>,

        /// Write the final result to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Never prompt on stdin, even if the agent asks
        #[arg(long)]
        no_ask_user: bool,
    },

    /// Run a clan defined in a TOML file
    Clan {
        /// Path to the clan definition
        file: PathBuf,
    },

    /// List built-in tools
    Tools {
        /// Print each tool's JSON schema
        #[arg(long)]
        json: bool,
    },

    /// Write a default config file
    Onboard,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Agent {
            task,
            identity,
            description,
            max_iterations,
            output,
            no_ask_user,
        } => commands::agent::run(
            config,
            commands::agent::AgentArgs {
                task,
                identity,
                description,
                max_iterations,
                output,
                ask_user: !no_ask_user,
            },
        )?,
        Commands::Clan { file } => commands::clan::run(config, &file)?,
        Commands::Tools { json } => commands::tools::run(json)?,
        Commands::Onboard => commands::onboard::run()?,
    }

    Ok(())
}
