//! McpTool: a remote MCP tool exposed through the synchronous [`Tool`] trait.
//!
//! The bridge never owns a session. It keeps a weak handle to the registry
//! and the session key, and resolves both on every call, so a server that
//! went away shows up as an ordinary tool failure.

use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::debug;
use unison_core::error::ToolError;
use unison_core::tool::{ParamMap, ParamType, Tool, ToolParameter};

use crate::registry::SessionRegistry;

#[derive(Clone, Debug)]
pub struct McpTool {
    name: String,
    description: String,
    params: Vec<ToolParameter>,
    session_key: String,
    remote_name: String,
    registry: Weak<SessionRegistry>,
}

impl McpTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: &Value,
        session_key: impl Into<String>,
        remote_name: impl Into<String>,
        registry: &Arc<SessionRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: convert_schema(input_schema),
            session_key: session_key.into(),
            remote_name: remote_name.into(),
            registry: Arc::downgrade(registry),
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

/// Translate a JSON-schema `object` into tool parameters.
///
/// Unknown or missing `type` tags fall back to `string`.
pub fn convert_schema(schema: &Value) -> Vec<ToolParameter> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, info)| {
            let param_type = match info.get("type").and_then(Value::as_str) {
                Some("integer") => ParamType::Integer,
                Some("number") => ParamType::Float,
                Some("boolean") => ParamType::Boolean,
                Some("array") => ParamType::List,
                Some("object") => ParamType::Dict,
                _ => ParamType::String,
            };
            let description = info
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Parameter {name}"));

            let mut param = ToolParameter::new(name, description, param_type);
            if !required.contains(&name.as_str()) {
                param = param.optional();
            }
            if let Some(default) = info.get("default").filter(|d| !d.is_null()) {
                param = param.with_default(default.clone());
            }
            param
        })
        .collect()
}

impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.params
    }

    fn run(&mut self, args: &ParamMap) -> Result<Value, ToolError> {
        let not_found = || ToolError::ExecutionFailed {
            tool_name: self.name.clone(),
            reason: format!("MCP client '{}' not found", self.session_key),
            source: None,
        };

        let registry = self.registry.upgrade().ok_or_else(not_found)?;
        let session = registry.session(&self.session_key).ok_or_else(not_found)?;

        debug!(tool = %self.name, remote = %self.remote_name, "Calling MCP tool");
        registry
            .dispatch(session, &self.remote_name, Value::Object(args.clone()))
            .map(Value::String)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: format!("Failed to execute MCP tool '{}': {e}", self.name),
                source: Some(Box::new(e)),
            })
    }
}
