//! End-to-end tests for the Unison agent runtime.
//!
//! These drive whole runs through the public crate APIs: a scripted model
//! stands in for the LLM, everything else (parser, validator, tools,
//! history, clan delegation) is real.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use unison_agent::{Agent, Clan, Command, parse_response};
use unison_config::{AppConfig, ClanFile};
use unison_core::{
    LanguageModel, ModelRequest, ParamMap, ParamType, ProviderError, Tool, ToolParameter,
    validate_arguments,
};
use unison_mcp::{McpTool, SessionRegistry};
use unison_tools::{TimeTool, default_registry};

// ── Scripted Model ───────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedModel {
    responses: Vec<String>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn prompt(&self, call: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[call].prompt().unwrap_or_default().to_string()
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    fn complete(&self, request: ModelRequest) -> Result<String, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);
        let response = self
            .responses
            .get(index)
            .or(self.responses.last())
            .unwrap_or_else(|| panic!("ScriptedModel has no responses (call #{index})"));
        Ok(response.clone())
    }
}

fn block(name: &str, params: Value) -> String {
    format!("```yaml\nthoughts: >\n  On it.\nname: {name}\nparams: >\n  {params}\n```")
}

fn args(value: Value) -> ParamMap {
    match value {
        Value::Object(map) => map,
        _ => panic!("arguments must be an object"),
    }
}

// ── E2E: Parser ──────────────────────────────────────────────────────────

#[test]
fn e2e_parser_recovers_fenced_pass_result() {
    let text = format!(
        "Here is my answer.\n{}\nThanks.",
        block("pass_result", json!({"result": "X"}))
    );
    let blocks = parse_response(&text);
    assert_eq!(blocks.len(), 1);
    match &blocks[0].command {
        Command::PassResult { result } => assert_eq!(result, "X"),
        other => panic!("expected pass_result, got {other:?}"),
    }
}

#[test]
fn e2e_parser_falls_back_to_bare_blocks() {
    let text = "thoughts: >\n  Looking things up.\nname: tool_a\nparams: >\n  {\"k\":\"v\"}\n";
    let blocks = parse_response(text);
    assert_eq!(blocks.len(), 1);
    match &blocks[0].command {
        Command::Invoke { name, params } => {
            assert_eq!(name, "tool_a");
            assert_eq!(params.get("k"), Some(&json!("v")));
        }
        other => panic!("expected a tool call, got {other:?}"),
    }
}

// ── E2E: Validation & Tools ──────────────────────────────────────────────

#[test]
fn e2e_integer_coercion_boundary() {
    let params = [ToolParameter::new("count", "How many", ParamType::Integer)];

    let ok = validate_arguments(&params, &args(json!({"count": 4.0}))).unwrap();
    assert_eq!(ok.get("count"), Some(&json!(4)));

    let err = validate_arguments(&params, &args(json!({"count": 4.5}))).unwrap_err();
    assert_eq!(err.parameters(), vec!["count"]);
}

#[test]
fn e2e_execute_never_fails_loudly() {
    let mut registry = default_registry();
    let inputs = [
        json!({}),
        json!({"expression": null}),
        json!({"expression": "1 / 0"}),
        json!({"expression": "((("}),
        json!({"expression": ["not", "a", "string"]}),
        json!({"action": "explode"}),
        json!({"format": 42}),
        json!({"expression": format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000))}),
        json!({"expression": "-".repeat(10_000) + "1"}),
    ];

    let names: Vec<String> = registry.names().iter().map(|n| n.to_string()).collect();
    for name in &names {
        let tool = registry.get_mut(name).unwrap();
        for input in &inputs {
            let outcome = tool.execute(&args(input.clone()));
            if !outcome.success {
                assert!(outcome.error.is_some(), "{name} failed without an error");
            }
        }
    }
}

#[test]
fn e2e_bridge_without_session_fails_cleanly() {
    let registry = SessionRegistry::new().unwrap();
    let schema = json!({
        "type": "object",
        "properties": {"query": {"type": "string"}},
        "required": ["query"]
    });
    let mut tool = McpTool::new("github_search", "Search GitHub", &schema, "github", "search", &registry);

    let outcome = tool.execute(&args(json!({"query": "unison"})));
    assert!(!outcome.success);
    let error = outcome.error.unwrap();
    assert!(error.contains("github_search"), "{error}");
    assert!(error.contains("MCP client 'github' not found"), "{error}");
}

// ── E2E: Single Agent ────────────────────────────────────────────────────

#[test]
fn e2e_happy_path_time_then_pass_result() {
    let history = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        &block("time_tool", json!({"format": "%H:%M"})),
        &block("pass_result", json!({"result": "It is lunch time"})),
    ]);

    let mut agent = Agent::new("Clock", "Tells the time", model.clone())
        .with_tool(Box::new(TimeTool::new()))
        .with_history_folder(history.path());
    let outcome = agent.run("what time is it");

    assert!(outcome.success);
    assert_eq!(outcome.result, "It is lunch time");
    assert_eq!(outcome.iterations_used, 2);
    assert_eq!(model.calls(), 2);

    let context = model.prompt(1);
    let time = context.strip_prefix("Tool response: ").unwrap();
    assert_eq!(time.len(), 5, "expected HH:MM, got {time}");
    assert_eq!(&time[2..3], ":");

    assert!(history.path().join("Clock.json").exists());
}

#[test]
fn e2e_iteration_ceiling_is_exact() {
    let history = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&["Still thinking about it."]);

    let mut agent = Agent::new("Ponder", "Thinks a lot", model.clone())
        .with_max_iterations(3)
        .with_history_folder(history.path());
    let outcome = agent.run("think");

    assert!(outcome.success);
    assert_eq!(outcome.iterations_used, 3);
    assert_eq!(model.calls(), 3);
    assert_eq!(outcome.result, "Still thinking about it.");
}

#[test]
fn e2e_unknown_tool_keeps_looping() {
    let history = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        &block("nonexistent_tool", json!({})),
        &block("pass_result", json!({"result": "recovered"})),
    ]);

    let mut agent = Agent::new("Lost", "Guesses tool names", model.clone())
        .with_history_folder(history.path());
    let outcome = agent.run("do something");

    assert!(outcome.success);
    assert_eq!(outcome.result, "recovered");
    assert_eq!(outcome.iterations_used, 2);
}

#[test]
fn e2e_output_artifact_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out").join("result.txt");
    let model = ScriptedModel::new(&[&block("pass_result", json!({"result": "42"}))]);

    let mut agent = Agent::new("Writer", "Writes results", model)
        .with_history_folder(dir.path().join("history"))
        .with_output_file(&output);
    let outcome = agent.run("answer everything");

    assert!(outcome.success);
    let artifact = std::fs::read_to_string(&output).unwrap();
    assert!(artifact.contains("Agent: Writer"));
    assert!(artifact.contains("42"));
}

// ── E2E: Clan ────────────────────────────────────────────────────────────

#[test]
fn e2e_clan_delegation_feeds_response_back() {
    let history = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        "<think>B is the worker.</think><plan><step>1: A asks B to do X</step></plan>",
        &block("send_message", json!({"agent_name": "B", "message": "do X"})),
        &block("pass_result", json!({"result": "X is done"})),
        &block("pass_result", json!({"result": "All done"})),
    ]);

    let a = Agent::new("A", "Manager", model.clone())
        .with_task("Deliver X")
        .with_history_folder(history.path());
    let b = Agent::new("B", "Worker", model.clone())
        .with_task("Do whatever A asks")
        .with_history_folder(history.path());

    let mut clan = Clan::new("Alpha", "A", vec![a, b], "Work together.", "Get X done").unwrap();
    let outcome = clan.unleash();

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(outcome.result, "All done");
    assert_eq!(clan.plan(), Some("<plan><step>1: A asks B to do X</step></plan>"));

    assert_eq!(model.calls(), 4);
    assert_eq!(model.prompt(2), "Message from A: do X");
    assert_eq!(model.prompt(3), "Response from B: X is done");
}

#[test]
fn e2e_clan_from_definition_file() {
    let definition: ClanFile = toml::from_str(
        r#"
name = "Alpha"
goal = "Get X done"
shared_instruction = "Work together."
manager = "A"

[[members]]
identity = "A"
description = "Manager"
task = "Deliver X"

[[members]]
identity = "B"
description = "Worker"
task = "Compute"
tools = ["calculator"]
"#,
    )
    .unwrap();
    definition.validate().unwrap();

    let config = AppConfig::default();
    let history = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&["<plan>1: A finishes</plan>", &block("pass_result", json!({"result": "ok"}))]);

    let agents = definition
        .members
        .iter()
        .map(|member| {
            let tools = member.tools.iter().filter_map(|name| unison_tools::by_name(name));
            Agent::new(&member.identity, &member.description, model.clone() as Arc<dyn LanguageModel>)
                .with_task(&member.task)
                .with_tools(tools)
                .with_max_iterations(config.agent.max_iterations)
                .with_history_folder(history.path())
        })
        .collect();

    let mut clan = Clan::new(
        &definition.name,
        &definition.manager,
        agents,
        &definition.shared_instruction,
        &definition.goal,
    )
    .unwrap();

    let worker = clan.member("B").unwrap();
    assert!(worker.lock().unwrap().tools().contains("calculator"));

    let outcome = clan.unleash();
    assert!(outcome.success);
    assert_eq!(outcome.result, "ok");
    assert_eq!(clan.round(), 1);
}
