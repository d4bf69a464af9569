//! `unison agent`: run one agent on one task.

use std::path::{Path, PathBuf};
use unison_agent::Agent;
use unison_core::Tool;
use unison_tools::{BUILTIN_TOOLS, by_name};

use super::{build_model, connect_mcp, interactive_input, load_config};

pub struct AgentArgs {
    pub task: String,
    pub identity: String,
    pub description: String,
    pub max_iterations: Option<u32>,
    pub output: Option<PathBuf>,
    pub ask_user: bool,
}

pub fn run(config_path: Option<&Path>, args: AgentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let model = build_model(&config)?;
    let remote = connect_mcp(&config)?;

    let builtin = BUILTIN_TOOLS.iter().filter_map(|name| by_name(name));
    let bridged = remote
        .tools
        .iter()
        .cloned()
        .map(|tool| Box::new(tool) as Box<dyn Tool>);

    let mut agent = Agent::new(&args.identity, &args.description, model)
        .with_task(&args.task)
        .with_tools(builtin.chain(bridged))
        .with_max_iterations(args.max_iterations.unwrap_or(config.agent.max_iterations))
        .with_history_folder(&config.agent.history_folder);

    if let Some(output) = args.output.or(config.agent.output_file) {
        agent = agent.with_output_file(output);
    }
    if args.ask_user && config.agent.ask_user {
        agent = agent.with_user_input(Box::new(interactive_input()?));
    }

    eprintln!();
    eprintln!("  Agent:     {}", agent.identity());
    eprintln!("  Model:     {}", config.model.model);
    eprintln!("  Tools:     {}", agent.tools().names().join(", "));
    eprintln!();

    let outcome = agent.run(&args.task);

    println!("{}", outcome.result);
    eprintln!();
    eprintln!(
        "  {} in {} iteration(s), {:.1}s",
        if outcome.success { "Completed" } else { "Failed" },
        outcome.iterations_used,
        outcome.execution_time.as_secs_f64()
    );

    match outcome.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}
