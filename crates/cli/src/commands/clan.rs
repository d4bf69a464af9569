//! `unison clan`: plan and run a clan from a TOML definition.

use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use unison_agent::{Agent, Clan};
use unison_config::{AppConfig, ClanFile, MemberConfig};
use unison_core::{LanguageModel, Tool};
use unison_mcp::McpTool;

use super::{build_model, connect_mcp, interactive_input, load_config};

pub fn run(config_path: Option<&Path>, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let definition = ClanFile::load(file)?;
    let model = build_model(&config)?;
    let remote = connect_mcp(&config)?;

    let agents = definition
        .members
        .iter()
        .map(|member| build_member(member, &definition, &config, &model, &remote.tools))
        .collect::<Result<Vec<_>, _>>()?;

    let mut clan = Clan::new(
        &definition.name,
        &definition.manager,
        agents,
        &definition.shared_instruction,
        &definition.goal,
    )?;

    eprintln!();
    eprintln!("  Clan:      {}", clan.name());
    eprintln!("  Manager:   {}", clan.manager());
    eprintln!("  Members:   {}", clan.identities().join(", "));
    eprintln!("  Goal:      {}", clan.goal());
    eprintln!();

    let outcome = clan.unleash();

    if let Some(plan) = clan.plan() {
        eprintln!("  Plan:\n{plan}\n");
    }
    println!("{}", outcome.result);
    eprintln!();
    eprintln!(
        "  {} in {:.1}s",
        if outcome.success { "Mission complete" } else { "Mission failed" },
        outcome.execution_time.as_secs_f64()
    );

    match outcome.error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn build_member(
    member: &MemberConfig,
    definition: &ClanFile,
    config: &AppConfig,
    model: &Arc<dyn LanguageModel>,
    remote: &[McpTool],
) -> Result<Agent, Box<dyn std::error::Error>> {
    let tools = member.tools.iter().filter_map(|name| {
        let tool = unison_tools::by_name(name).or_else(|| {
            remote
                .iter()
                .find(|tool| tool.name() == name)
                .map(|tool| Box::new(tool.clone()) as Box<dyn Tool>)
        });
        if tool.is_none() {
            warn!(agent = %member.identity, tool = %name, "Unknown tool, skipping");
        }
        tool
    });

    let mut agent = Agent::new(&member.identity, &member.description, Arc::clone(model))
        .with_task(&member.task)
        .with_tools(tools)
        .with_max_iterations(definition.max_iterations.unwrap_or(config.agent.max_iterations))
        .with_history_folder(&config.agent.history_folder);

    if member.identity == definition.manager {
        if let Some(output) = definition.output_file.as_ref().or(config.agent.output_file.as_ref()) {
            agent = agent.with_output_file(output);
        }
        if config.agent.ask_user {
            agent = agent.with_user_input(Box::new(interactive_input()?));
        }
    }
    Ok(agent)
}
