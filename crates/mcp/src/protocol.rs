//! JSON-RPC 2.0 framing and the MCP messages Unison speaks.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::McpError;

/// MCP protocol version we support
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC 2.0 request (or notification, when `id` is `None`)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            method: method.into(),
            params: None,
        }
    }
}

/// Any inbound JSON-RPC message. Server-initiated requests and
/// notifications carry a `method`; responses carry `result` or `error`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcMessage {
    /// Whether this is the response to request `id`.
    pub fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(error) = self.error {
            return Err(McpError::Protocol(format!(
                "JSON-RPC error {}: {}",
                error.code, error.message
            )));
        }
        self.result
            .ok_or_else(|| McpError::Protocol("response has neither result nor error".into()))
    }
}

pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "unison",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsList {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

pub fn parse_tools(result: Value) -> Result<Vec<ToolDescriptor>, McpError> {
    serde_json::from_value::<ToolsList>(result)
        .map(|list| list.tools)
        .map_err(|e| McpError::Protocol(format!("bad tools/list result: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<Content>,
    #[serde(default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Text of a `tools/call` result: text items joined by newlines.
pub fn call_output(tool_name: &str, result: Value) -> Result<String, McpError> {
    let call: CallToolResult = serde_json::from_value(result)
        .map_err(|e| McpError::Protocol(format!("bad tools/call result: {e}")))?;

    let text = call
        .content
        .iter()
        .filter(|c| c.kind == "text")
        .filter_map(|c| c.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    if call.is_error {
        return Err(McpError::ToolExecution {
            tool_name: tool_name.to_string(),
            message: text,
            source: None,
        });
    }
    Ok(text)
}
