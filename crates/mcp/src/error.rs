//! MCP error types.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    /// The server could not be reached, spawned, or stopped responding.
    #[error("MCP server '{server}' connection failed: {reason}")]
    Connection { server: String, reason: String },

    /// The server ran the tool and reported a failure.
    #[error("MCP tool '{tool_name}' failed: {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The `mcpServers` document has the wrong shape. Fatal to setup.
    #[error("Invalid MCP configuration: {message}")]
    Configuration {
        message: String,
        /// The offending fragment, when there is one
        config: Option<Value>,
    },

    /// Malformed or unexpected JSON-RPC traffic.
    #[error("MCP protocol error: {0}")]
    Protocol(String),
}

impl McpError {
    pub(crate) fn connection(server: &str, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            server: server.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>, config: Option<&Value>) -> Self {
        Self::Configuration {
            message: message.into(),
            config: config.cloned(),
        }
    }
}
