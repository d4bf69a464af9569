//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool declares a name, a description, and an ordered list of typed
//! parameters. The agent loop never calls [`Tool::run`] directly: it goes
//! through [`Tool::execute`], which validates the raw arguments against the
//! declared schema and folds every failure into an [`ExecutionResult`].
//!
//! Validation is deliberately lenient about *extra* keys. Models invent
//! fields; only declared parameters are checked and passed through.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::error::{IssueKind, ParameterIssue, ToolError, ValidationError};

/// Tool arguments, keyed by parameter name.
pub type ParamMap = serde_json::Map<String, Value>;

/// Supported parameter types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Dict => "dict",
            Self::Any => "any",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Lower bound, numeric types only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound, numeric types only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Value>>,
}

fn default_required() -> bool {
    true
}

impl ToolParameter {
    /// A required parameter with no default and no constraints.
    pub fn new(name: impl Into<String>, description: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            param_type,
            default: None,
            required: true,
            min: None,
            max: None,
            choices: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Value used when the caller omits the parameter or passes null.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Inclusive numeric bounds. Ignored for non-numeric types.
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Check one non-null value, returning it coerced to the declared type.
    fn check(&self, value: &Value) -> Result<Value, IssueKind> {
        let mismatch = || IssueKind::TypeMismatch { expected: self.param_type };

        let value = match self.param_type {
            ParamType::String if value.is_string() => value.clone(),
            ParamType::Integer => coerce_integer(value).ok_or_else(mismatch)?,
            ParamType::Float if value.is_number() => value.clone(),
            ParamType::Boolean if value.is_boolean() => value.clone(),
            ParamType::List if value.is_array() => value.clone(),
            ParamType::Dict if value.is_object() => value.clone(),
            ParamType::Any => value.clone(),
            _ => return Err(mismatch()),
        };

        if self.param_type.is_numeric() {
            let n = value.as_f64().unwrap_or(f64::NAN);
            let below = self.min.is_some_and(|min| n < min);
            let above = self.max.is_some_and(|max| n > max);
            if below || above {
                return Err(IssueKind::OutOfRange { min: self.min, max: self.max });
            }
        }

        if let Some(choices) = &self.choices {
            if !choices.iter().any(|c| values_equal(c, &value)) {
                return Err(IssueKind::NotInChoices);
            }
        }

        Ok(value)
    }
}

/// Integers pass through; floats pass only when they have no fractional part.
fn coerce_integer(value: &Value) -> Option<Value> {
    if value.is_i64() || value.is_u64() {
        return Some(value.clone());
    }
    let f = value.as_f64()?;
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

/// JSON equality that compares numbers by value (`4 == 4.0`).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Validate raw arguments against a parameter schema.
///
/// Returns every declared parameter that has an effective value (supplied,
/// or defaulted), coerced to its declared type. Undeclared keys are dropped.
/// On failure the error lists every offending parameter.
pub fn validate_arguments(
    params: &[ToolParameter],
    raw: &ParamMap,
) -> Result<ParamMap, ValidationError> {
    let mut validated = ParamMap::new();
    let mut issues = Vec::new();

    for param in params {
        let supplied = raw.get(&param.name).filter(|v| !v.is_null());
        let effective = supplied.or(param.default.as_ref().filter(|v| !v.is_null()));

        let Some(value) = effective else {
            if param.required {
                issues.push(ParameterIssue {
                    parameter: param.name.clone(),
                    kind: IssueKind::Missing,
                });
            }
            continue;
        };

        match param.check(value) {
            Ok(value) => {
                validated.insert(param.name.clone(), value);
            }
            Err(kind) => issues.push(ParameterIssue {
                parameter: param.name.clone(),
                kind,
            }),
        }
    }

    if issues.is_empty() {
        Ok(validated)
    } else {
        Err(ValidationError { tool: None, issues })
    }
}

/// The outcome of one tool invocation.
///
/// Exactly one of `result` / `error` is meaningful, depending on `success`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    /// Covers validation and execution
    #[serde(with = "crate::task::secs_f64")]
    pub execution_time: Duration,
}

impl ExecutionResult {
    pub fn ok(result: Value, execution_time: Duration) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            execution_time,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time,
        }
    }

    /// The result rendered as text: strings verbatim, anything else as JSON.
    pub fn text(&self) -> Option<String> {
        self.result.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// The core Tool trait.
///
/// Each capability (calculator, ledger, a bridged MCP tool, ...) implements
/// this trait and is registered in an agent's [`ToolRegistry`]. `run`
/// takes `&mut self`: a tool may keep state across invocations within one
/// agent's lifetime, so callers must not assume it is stateless.
pub trait Tool: Send {
    /// The unique name of this tool within an agent's toolset.
    fn name(&self) -> &str;

    /// A description of what this tool does (shown to the model).
    fn description(&self) -> &str;

    /// Declared parameters, in prompt order.
    fn parameters(&self) -> &[ToolParameter];

    /// The tool's own computation, over already-validated arguments.
    fn run(&mut self, args: &ParamMap) -> Result<Value, ToolError>;

    /// Check raw arguments against [`Tool::parameters`].
    fn validate(&self, raw: &ParamMap) -> Result<ParamMap, ValidationError> {
        validate_arguments(self.parameters(), raw).map_err(|mut e| {
            e.tool = Some(self.name().to_string());
            e
        })
    }

    /// Validate and run in a single failure domain.
    ///
    /// Never panics and never returns an error: validation failures, tool
    /// errors, and panics inside `run` all become a failed result.
    fn execute(&mut self, raw: &ParamMap) -> ExecutionResult {
        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Value, ToolError> {
            let args = self.validate(raw)?;
            self.run(&args)
        }));
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(value)) => ExecutionResult::ok(value, elapsed),
            Ok(Err(e)) => ExecutionResult::failed(format!("Tool execution failed: {e}"), elapsed),
            Err(payload) => ExecutionResult::failed(
                format!(
                    "Tool execution failed: {} panicked: {}",
                    self.name(),
                    panic_message(payload.as_ref())
                ),
                elapsed,
            ),
        }
    }

    /// Parameter schema for documentation or UI generation.
    fn schema(&self) -> Value {
        let parameters: Vec<Value> = self
            .parameters()
            .iter()
            .map(|p| {
                let mut entry = serde_json::json!({
                    "name": p.name,
                    "description": p.description,
                    "type": p.param_type.as_str(),
                    "required": p.required,
                    "default": p.default.clone().unwrap_or(Value::Null),
                });
                if let Some(min) = p.min {
                    entry["min_value"] = serde_json::json!(min);
                }
                if let Some(max) = p.max {
                    entry["max_value"] = serde_json::json!(max);
                }
                if let Some(choices) = &p.choices {
                    entry["choices"] = Value::Array(choices.clone());
                }
                entry
            })
            .collect();

        serde_json::json!({
            "tool_name": self.name(),
            "description": self.description(),
            "parameters": parameters,
        })
    }
}

/// Render a caught panic payload as text.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A registry of the tools owned by one agent.
///
/// Names are unique; iteration order is by name so prompts are stable.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Returns the tool it replaced, if any.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Option<Box<dyn Tool>> {
        let name = tool.name().to_string();
        self.tools.insert(name, tool)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Tool + 'static)> {
        self.tools.get_mut(name).map(|t| t.as_mut())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the toolset for inclusion in a system prompt.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (idx, tool) in self.tools.values().enumerate() {
            out.push_str(&format!("-TOOL{}:\n", idx + 1));
            out.push_str(&format!("  NAME: {}\n", tool.name()));
            out.push_str(&format!("  DESCRIPTION: {}\n", tool.description()));
            out.push_str("  PARAMS:\n");
            for p in tool.parameters() {
                let default = p.default.as_ref().map_or("none".to_string(), |d| d.to_string());
                out.push_str(&format!("    {}:\n", p.name));
                out.push_str(&format!("      - description: {}\n", p.description));
                out.push_str(&format!("      - type: {}\n", p.param_type));
                out.push_str(&format!("      - default_value: {default}\n"));
                out.push_str(&format!("      - required: {}\n", p.required));
            }
        }
        out
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
