//! `mcpServers` configuration documents.
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "fs":  { "command": "npx", "args": ["-y", "@modelcontextprotocol/server-filesystem", "."] },
//!     "web": { "url": "http://127.0.0.1:3000/mcp", "headers": { "Authorization": "Bearer ..." } }
//!   }
//! }
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::McpError;

/// How to reach one server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerConfig {
    /// Spawn a child process and speak JSON-RPC over its stdio.
    Stdio {
        command: String,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    },
    /// POST JSON-RPC to a streamable HTTP endpoint.
    Http {
        url: String,
        headers: BTreeMap<String, String>,
    },
}

/// A validated `mcpServers` document, keyed by server name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct McpServersConfig {
    pub servers: BTreeMap<String, ServerConfig>,
}

impl McpServersConfig {
    /// Validate a raw document. Any shape error is fatal.
    pub fn from_value(doc: &Value) -> Result<Self, McpError> {
        let servers = doc
            .get("mcpServers")
            .ok_or_else(|| McpError::config("missing 'mcpServers' key", Some(doc)))?
            .as_object()
            .ok_or_else(|| McpError::config("'mcpServers' must be an object", Some(doc)))?;

        let servers = servers
            .iter()
            .map(|(name, raw)| parse_server(name, raw).map(|server| (name.clone(), server)))
            .collect::<Result<_, _>>()?;

        Ok(Self { servers })
    }

    pub fn load(path: &Path) -> Result<Self, McpError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            McpError::config(format!("cannot read {}: {e}", path.display()), None)
        })?;
        let doc: Value = serde_json::from_str(&content).map_err(|e| {
            McpError::config(format!("{} is not valid JSON: {e}", path.display()), None)
        })?;
        Self::from_value(&doc)
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

fn parse_server(name: &str, raw: &Value) -> Result<ServerConfig, McpError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| McpError::config(format!("server '{name}' must be an object"), Some(raw)))?;

    if let Some(command) = obj.get("command") {
        let command = command.as_str().ok_or_else(|| {
            McpError::config(format!("server '{name}': 'command' must be a string"), Some(raw))
        })?;

        let args = match obj.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|a| a.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    McpError::config(
                        format!("server '{name}': every entry of 'args' must be a string"),
                        Some(raw),
                    )
                })?,
            Some(_) => {
                return Err(McpError::config(
                    format!("server '{name}': 'args' must be a list"),
                    Some(raw),
                ));
            }
        };

        let cwd = match obj.get("cwd") {
            None | Some(Value::Null) => None,
            Some(Value::String(dir)) => Some(PathBuf::from(dir)),
            Some(_) => {
                return Err(McpError::config(
                    format!("server '{name}': 'cwd' must be a string"),
                    Some(raw),
                ));
            }
        };

        return Ok(ServerConfig::Stdio {
            command: command.to_string(),
            args,
            env: string_map(name, "env", obj, raw)?,
            cwd,
        });
    }

    if let Some(url) = obj.get("url") {
        let url = url.as_str().ok_or_else(|| {
            McpError::config(format!("server '{name}': 'url' must be a string"), Some(raw))
        })?;
        return Ok(ServerConfig::Http {
            url: url.to_string(),
            headers: string_map(name, "headers", obj, raw)?,
        });
    }

    Err(McpError::config(
        format!("server '{name}' needs either 'command' or 'url'"),
        Some(raw),
    ))
}

/// An optional object of string values (`env`, `headers`).
fn string_map(
    name: &str,
    key: &str,
    obj: &Map<String, Value>,
    raw: &Value,
) -> Result<BTreeMap<String, String>, McpError> {
    let invalid = || {
        McpError::config(
            format!("server '{name}': '{key}' must be an object of strings"),
            Some(raw),
        )
    };

    match obj.get(key) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}
