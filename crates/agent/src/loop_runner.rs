//! The agent execution loop.
//!
//! One [`Agent::run`] call is one task attempt:
//!
//! 1. Load the agent's transcript from its history folder
//! 2. Ask the model, with the original task first and then either the
//!    newest context (tool response, user answer, agent response) or a
//!    fixed continuation prompt
//! 3. Parse the response into command blocks and dispatch them in order
//! 4. Stop on `pass_result`, on a response that looks finished, or when
//!    the iteration ceiling is reached
//!
//! The loop is a plain `while` with loop-local state; tool results and
//! user answers never recurse into `run`. Only clan delegation does, and
//! that call runs a *different* agent.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use unison_core::{
    LanguageModel, Message, ModelRequest, ParamMap, Result, TaskResult, Tool, ToolRegistry,
    Transcript, panic_message,
};

use crate::clan::{ClanMembership, Delivery};
use crate::history::HistoryStore;
use crate::input::UserInput;
use crate::parser::{Command, parse_response};
use crate::prompts::{self, CONTINUE_PROMPT, NO_TOOLS};

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Phrases that end the loop when a turn dispatched nothing.
const COMPLETION_PHRASES: [&str; 5] = [
    "pass_result",
    "task complete",
    "final result",
    "conclusion",
    "summary",
];

const FAILED_RESULT: &str = "Task execution failed due to critical error";

/// A command block resolved against this agent's capabilities.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    AskUser(String),
    PassResult(String),
    SendMessage {
        agent_name: String,
        message: String,
        additional_resource: Option<String>,
    },
    Tool {
        name: String,
        params: ParamMap,
    },
    /// Not a registered tool, or a clan verb outside a clan.
    Unknown(String),
}

/// What dispatching one block did to the loop.
enum Step {
    /// New context for the next iteration
    Context(String),
    /// The task is done with this result
    Finished(String),
    Skipped,
}

/// An autonomous agent: identity, tools, transcript, and the loop that
/// drives them.
pub struct Agent {
    pub(crate) identity: String,
    description: String,
    task: String,
    pub(crate) model: Arc<dyn LanguageModel>,
    tools: ToolRegistry,
    history: HistoryStore,
    max_iterations: u32,
    output_file: Option<PathBuf>,
    pub(crate) input: Option<Box<dyn UserInput>>,
    pub(crate) clan: Option<ClanMembership>,
    iteration: u32,
    transcript: Transcript,
}

impl Agent {
    /// Create an agent with no tools, no user input, and history kept in
    /// `./history`.
    pub fn new(
        identity: impl Into<String>,
        description: impl Into<String>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            identity: identity.into(),
            description: description.into(),
            task: String::new(),
            model,
            tools: ToolRegistry::new(),
            history: HistoryStore::new("history"),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            output_file: None,
            input: None,
            clan: None,
            iteration: 0,
            transcript: Transcript::new(),
        }
    }

    /// The agent's standing goal, shown to clan mates in the roster.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_tool(mut self, tool: Box<dyn Tool>) -> Self {
        if let Some(old) = self.tools.register(tool) {
            warn!(agent = %self.identity, tool = %old.name(), "Replacing tool with the same name");
        }
        self
    }

    pub fn with_tools(self, tools: impl IntoIterator<Item = Box<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, Self::with_tool)
    }

    /// Set the iteration ceiling. Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_history_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.history = HistoryStore::new(folder);
        self
    }

    /// Write the final result here when `pass_result` is dispatched.
    pub fn with_output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Enable `ask_user`, answered from `input`.
    pub fn with_user_input(mut self, input: Box<dyn UserInput>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Iterations used by the current or most recent run.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn accepts_user_input(&self) -> bool {
        self.input.is_some()
    }

    pub fn clan_name(&self) -> Option<&str> {
        self.clan.as_ref().map(|c| c.clan_name.as_str())
    }

    /// The clan plan this agent was handed, if any.
    pub fn plan(&self) -> Option<&Arc<str>> {
        self.clan.as_ref().and_then(|c| c.plan.as_ref())
    }

    /// Run one task attempt. Never panics and never returns an error: a
    /// model failure, an I/O failure, or a panic becomes a failed result.
    pub fn run(&mut self, task: &str) -> TaskResult {
        let start = Instant::now();
        self.iteration = 0;
        info!(agent = %self.identity, "Starting task");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.attempt(task)));
        let elapsed = start.elapsed();

        let failure = match outcome {
            Ok(Ok(result)) => {
                info!(
                    agent = %self.identity,
                    iterations = self.iteration,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Task finished"
                );
                return TaskResult::completed(&self.identity, result, elapsed, self.iteration);
            }
            Ok(Err(e)) => format!("Task execution failed: {e}"),
            Err(payload) => format!("Task execution failed: {}", panic_message(payload.as_ref())),
        };

        error!(agent = %self.identity, iterations = self.iteration, error = %failure, "Critical error");
        TaskResult::failed(&self.identity, FAILED_RESULT, failure, elapsed, self.iteration)
    }

    fn attempt(&mut self, original: &str) -> Result<String> {
        self.transcript = self.history.load(&self.identity)?;

        // The task the system prompt is primed with; replaced by each new
        // piece of context.
        let mut current = original.to_string();
        let mut pending: Option<String> = None;
        let mut last_response = String::new();

        while self.iteration < self.max_iterations {
            self.iteration += 1;
            debug!(
                agent = %self.identity,
                iteration = self.iteration,
                max = self.max_iterations,
                "Agent loop iteration"
            );

            let prompt = match pending.take() {
                Some(context) => {
                    current.clone_from(&context);
                    context
                }
                None if self.iteration == 1 => original.to_string(),
                None => CONTINUE_PROMPT.to_string(),
            };

            self.transcript.push(Message::user(prompt));
            let request = ModelRequest {
                system: self.system_prompt(&current),
                messages: self.transcript.messages.clone(),
            };
            let response = self.model.complete(request)?;
            debug!(agent = %self.identity, response = %response, "Model response");

            self.transcript.push(Message::assistant(response.as_str()));
            if let Err(e) = self.history.save(&self.identity, &self.transcript) {
                warn!(agent = %self.identity, error = %e, "Could not save history");
            }

            let mut dispatched = false;
            for block in parse_response(&response) {
                if !block.thoughts.is_empty() {
                    debug!(agent = %self.identity, thoughts = %block.thoughts, "Agent thoughts");
                }
                let dispatch = self.resolve(block.command);
                match self.dispatch(dispatch, original) {
                    Step::Finished(result) => return Ok(result),
                    Step::Context(context) => {
                        pending = Some(context);
                        dispatched = true;
                    }
                    Step::Skipped => {}
                }
            }

            if !dispatched && looks_complete(&response) {
                info!(agent = %self.identity, iteration = self.iteration, "Response looks complete");
                return Ok(response);
            }
            last_response = response;
        }

        warn!(
            agent = %self.identity,
            iterations = self.iteration,
            "Max iterations reached, returning last response"
        );
        Ok(last_response)
    }

    /// Map a parsed command onto what this agent can actually do.
    pub fn resolve(&self, command: Command) -> Dispatch {
        match command {
            Command::AskUser { question } => Dispatch::AskUser(question),
            Command::PassResult { result } => Dispatch::PassResult(result),
            Command::SendMessage {
                agent_name,
                message,
                additional_resource,
            } if self.clan.is_some() => Dispatch::SendMessage {
                agent_name,
                message,
                additional_resource,
            },
            Command::SendMessage { .. } => Dispatch::Unknown("send_message".into()),
            Command::Invoke { name, params } if self.tools.contains(&name) => {
                Dispatch::Tool { name, params }
            }
            Command::Invoke { name, .. } => Dispatch::Unknown(name),
        }
    }

    fn dispatch(&mut self, dispatch: Dispatch, original: &str) -> Step {
        match dispatch {
            Dispatch::AskUser(question) => self.ask_user(&question),
            Dispatch::PassResult(result) => {
                info!(agent = %self.identity, "Final result delivered");
                if let Some(path) = &self.output_file {
                    match write_output(path, &self.identity, original, &result) {
                        Ok(()) => info!(path = %path.display(), "Results saved"),
                        Err(e) => warn!(path = %path.display(), error = %e, "Could not save results"),
                    }
                }
                Step::Finished(result)
            }
            Dispatch::Tool { name, params } => self.call_tool(&name, &params),
            Dispatch::SendMessage {
                agent_name,
                message,
                additional_resource,
            } => self.send_message(&agent_name, &message, additional_resource.as_deref()),
            Dispatch::Unknown(name) => {
                warn!(agent = %self.identity, command = %name, "Unknown command, skipping");
                Step::Skipped
            }
        }
    }

    fn ask_user(&mut self, question: &str) -> Step {
        let Some(input) = self.input.as_mut() else {
            info!(agent = %self.identity, "ask_user is disabled, skipping");
            return Step::Skipped;
        };

        info!(agent = %self.identity, question, "Agent question");
        match input.ask(question) {
            Some(answer) if !answer.trim().is_empty() => Step::Context(answer),
            _ => {
                info!(agent = %self.identity, "No answer from user");
                Step::Skipped
            }
        }
    }

    fn call_tool(&mut self, name: &str, params: &ParamMap) -> Step {
        let Some(tool) = self.tools.get_mut(name) else {
            return Step::Skipped;
        };

        let outcome = tool.execute(params);
        if outcome.success {
            let text = outcome.text().unwrap_or_default();
            info!(
                agent = %self.identity,
                tool = name,
                elapsed_ms = outcome.execution_time.as_millis() as u64,
                "Tool executed"
            );
            debug!(tool = name, result = %text, "Tool result");
            Step::Context(format!("Tool response: {text}"))
        } else {
            warn!(
                agent = %self.identity,
                tool = name,
                error = outcome.error.as_deref().unwrap_or("unknown error"),
                "Tool execution failed"
            );
            Step::Skipped
        }
    }

    fn send_message(&self, target: &str, message: &str, resource: Option<&str>) -> Step {
        let Some(clan) = &self.clan else {
            return Step::Skipped;
        };

        match clan.deliver(&self.identity, target, message, resource) {
            Delivery::Response(result) => Step::Context(format!("Response from {target}: {result}")),
            Delivery::Reply => Step::Finished(message.to_string()),
            Delivery::Skipped => Step::Skipped,
        }
    }

    fn system_prompt(&self, task: &str) -> String {
        let tools = if self.tools.is_empty() {
            NO_TOOLS.to_string()
        } else {
            self.tools.describe()
        };

        match &self.clan {
            None => prompts::individual(&self.identity, &self.description, task, &tools),
            Some(clan) if clan.is_manager => {
                prompts::manager(&self.identity, &self.description, task, &tools, &clan.context())
            }
            Some(clan) => prompts::member(&self.identity, &self.description, task, &tools, &clan.context()),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("identity", &self.identity)
            .field("model", &self.model.name())
            .field("tools", &self.tools.names())
            .field("max_iterations", &self.max_iterations)
            .field("clan", &self.clan_name())
            .finish_non_exhaustive()
    }
}

fn looks_complete(response: &str) -> bool {
    let lower = response.to_lowercase();
    COMPLETION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn write_output(path: &Path, identity: &str, task: &str, result: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("Agent: {identity}\nTask: {task}\nResult:\n{result}\n"))
}
