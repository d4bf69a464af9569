pub mod agent;
pub mod clan;
pub mod onboard;
pub mod tools;

use std::path::Path;
use std::sync::Arc;
use unison_agent::StdinInput;
use unison_config::AppConfig;
use unison_core::LanguageModel;
use unison_mcp::{McpTool, SessionRegistry};
use unison_providers::OpenAiCompatModel;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn build_model(config: &AppConfig) -> Result<Arc<dyn LanguageModel>, Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    UNISON_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let model = OpenAiCompatModel::from_config(&config.model)?;
    Ok(Arc::new(model))
}

/// Connected MCP servers plus the bridge tools they expose.
///
/// The registry owns the sessions; the tools only hold weak handles, so it
/// has to outlive every agent that uses them.
pub struct Remote {
    pub registry: Option<Arc<SessionRegistry>>,
    pub tools: Vec<McpTool>,
}

pub fn connect_mcp(config: &AppConfig) -> Result<Remote, Box<dyn std::error::Error>> {
    let Some(path) = config.mcp.config_path.as_deref() else {
        return Ok(Remote {
            registry: None,
            tools: Vec::new(),
        });
    };

    let registry = SessionRegistry::new()?;
    let tools = registry.connect_file(path)?;
    tracing::info!(servers = registry.keys().len(), tools = tools.len(), "MCP tools ready");
    Ok(Remote {
        registry: Some(registry),
        tools,
    })
}

/// Stdin answers for `ask_user`.
///
/// Ctrl-C while a question is waiting cancels only that question, which the
/// agent treats as no answer. Anywhere else, or twice in a row, it exits.
pub fn interactive_input() -> Result<StdinInput, Box<dyn std::error::Error>> {
    let input = StdinInput::new();
    let interrupter = input.interrupter();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("unison-signals".into())
        .spawn(move || {
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if !interrupter.interrupt() {
                        eprintln!();
                        std::process::exit(130);
                    }
                    tracing::info!("Question cancelled");
                }
            });
        })?;
    Ok(input)
}
