//! Response parser: recovers command blocks from raw model text.
//!
//! Models are asked to answer with a YAML block:
//!
//! ```text
//! thoughts: >
//!   reasoning
//! name: calculator
//! params: >
//!   {"expression": "2 + 2"}
//! ```
//!
//! Fenced ```` ```yaml ```` blocks are preferred. When a response has none,
//! the parser falls back to bare blocks that start at a `thoughts:` line.
//! Anything that cannot be read as a command is logged and dropped; parsing
//! never fails.

use regex_lite::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};
use unison_core::ParamMap;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```[ \t]*ya?ml[ \t]*\r?\n(.*?)```").expect("fence pattern is valid")
});
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("comma pattern is valid"));
static LEADING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\s*,").expect("comma pattern is valid"));
/// `key: > text` on one line, which YAML rejects after a block indicator.
static INLINE_SCALAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([A-Za-z_]+):[ \t]*([>|][+-]?)[ \t]+([^#\s].*)$")
        .expect("inline scalar pattern is valid")
});

/// Top-level keys a bare block may carry besides `thoughts`.
const BLOCK_KEYS: [&str; 3] = ["name", "params", "verification"];

const DEFAULT_QUESTION: &str = "Please provide more information.";
const DEFAULT_RESULT: &str = "Task completed.";

/// One parsed unit of model output.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandBlock {
    pub thoughts: String,
    pub command: Command,
}

/// What a command block asks the loop to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AskUser {
        question: String,
    },
    PassResult {
        result: String,
    },
    SendMessage {
        agent_name: String,
        message: String,
        additional_resource: Option<String>,
    },
    /// Any other name; resolved against the agent's tool registry.
    Invoke { name: String, params: ParamMap },
}

impl Command {
    /// The verb or tool name as it appeared in the block.
    pub fn name(&self) -> &str {
        match self {
            Self::AskUser { .. } => "ask_user",
            Self::PassResult { .. } => "pass_result",
            Self::SendMessage { .. } => "send_message",
            Self::Invoke { name, .. } => name,
        }
    }
}

/// Recover every command block in `text`, in the order encountered.
pub fn parse_response(text: &str) -> Vec<CommandBlock> {
    let mut candidates = fenced_blocks(text);
    if candidates.is_empty() {
        candidates = bare_blocks(text);
    }
    if candidates.is_empty() {
        debug!("No command blocks found in response");
    }

    candidates.iter().filter_map(|block| parse_block(block)).collect()
}

fn fenced_blocks(text: &str) -> Vec<String> {
    FENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
        .filter(|body| !body.is_empty())
        .collect()
}

fn starts_bare_block(line: &str) -> bool {
    line.strip_prefix("thoughts:")
        .is_some_and(|rest| matches!(rest.trim_start().chars().next(), Some('>' | '|')))
}

fn continues_bare_block(line: &str) -> bool {
    line.trim().is_empty()
        || line.starts_with([' ', '\t'])
        || BLOCK_KEYS.iter().any(|key| {
            line.strip_prefix(key)
                .is_some_and(|rest| rest.starts_with(':'))
        })
}

/// Unfenced blocks: a `thoughts: >` line plus everything that still looks
/// like part of the same mapping.
fn bare_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in text.lines() {
        if starts_bare_block(line) {
            if let Some(lines) = current.replace(vec![line]) {
                blocks.push(lines.join("\n"));
            }
            continue;
        }

        let Some(lines) = current.as_mut() else {
            continue;
        };
        if continues_bare_block(line) {
            lines.push(line);
            continue;
        }
        blocks.push(lines.join("\n"));
        current = None;
    }
    if let Some(lines) = current {
        blocks.push(lines.join("\n"));
    }

    blocks
}

fn parse_block(block: &str) -> Option<CommandBlock> {
    let doc: Value = match serde_yaml::from_str(block) {
        Ok(doc) => doc,
        Err(e) => match repair_inline_scalars(block) {
            Some(doc) => doc,
            None => {
                warn!(error = %e, "Discarding unparsable command block");
                return None;
            }
        },
    };

    let Value::Object(map) = doc else {
        warn!("Discarding command block that is not a mapping");
        return None;
    };

    let Some(name) = map.get("name").and_then(scalar_text) else {
        warn!("Discarding command block without a name");
        return None;
    };
    let name = name.trim().to_string();

    let thoughts = map
        .get("thoughts")
        .and_then(scalar_text)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
    let params = normalize_params(map.get("params"));

    let command = match name.as_str() {
        "ask_user" => Command::AskUser {
            question: text_param(&params, "question").unwrap_or_else(|| DEFAULT_QUESTION.into()),
        },
        "pass_result" => Command::PassResult {
            result: text_param(&params, "result").unwrap_or_else(|| DEFAULT_RESULT.into()),
        },
        "send_message" => {
            let (Some(agent_name), Some(message)) =
                (text_param(&params, "agent_name"), text_param(&params, "message"))
            else {
                warn!("Discarding send_message without agent_name or message");
                return None;
            };
            Command::SendMessage {
                agent_name: agent_name.trim().to_string(),
                message,
                additional_resource: text_param(&params, "additional_resource")
                    .filter(|r| !r.trim().is_empty()),
            }
        }
        _ => Command::Invoke { name, params },
    };

    Some(CommandBlock { thoughts, command })
}

/// Move text that follows a `>`/`|` indicator onto its own indented line
/// and parse again.
fn repair_inline_scalars(block: &str) -> Option<Value> {
    if !INLINE_SCALAR.is_match(block) {
        return None;
    }
    let repaired = INLINE_SCALAR.replace_all(block, "${1}: ${2}\n  ${3}");
    debug!("Retrying command block with inline block-scalar text");
    serde_yaml::from_str(&repaired).ok()
}

/// Strings verbatim, other non-null scalars in their JSON form.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}

fn text_param(params: &ParamMap, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Coerce whatever the model put under `params` into an argument map.
pub fn normalize_params(raw: Option<&Value>) -> ParamMap {
    match raw {
        None | Some(Value::Null) => ParamMap::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(text)) => params_from_text(text),
        Some(other) => wrap_value(other.clone()),
    }
}

fn wrap_value(value: Value) -> ParamMap {
    let mut map = ParamMap::new();
    map.insert("value".into(), value);
    map
}

fn into_map(value: Value) -> ParamMap {
    match value {
        Value::Object(map) => map,
        other => wrap_value(other),
    }
}

fn params_from_text(text: &str) -> ParamMap {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParamMap::new();
    }

    let cleaned = trimmed.replace("\\\"", "\"");
    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return into_map(value);
    }
    if let Some(map) = repair_json(&cleaned) {
        debug!("Recovered params from malformed JSON");
        return map;
    }

    match serde_yaml::from_str::<Value>(&cleaned) {
        Ok(value) => into_map(value),
        Err(_) => {
            let mut map = ParamMap::new();
            map.insert("raw_input".into(), Value::String(trimmed.to_string()));
            map
        }
    }
}

/// Best-effort fixes for the JSON models usually get almost right:
/// surrounding prose, single quotes, stray commas.
fn repair_json(text: &str) -> Option<ParamMap> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    let candidate = text[start..=end].replace('\'', "\"");
    let candidate = TRAILING_COMMA.replace_all(&candidate, "$1");
    let candidate = LEADING_COMMA.replace_all(&candidate, "{");

    match serde_json::from_str(&candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
