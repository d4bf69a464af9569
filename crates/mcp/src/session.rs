//! McpSession trait: one live connection to an MCP server.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpError;
use crate::protocol::ToolDescriptor;

/// A connected, initialized MCP server.
///
/// Sessions are created by the [`SessionRegistry`](crate::SessionRegistry)
/// and only ever driven on its runtime.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// Tools the server advertises.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError>;

    /// Invoke a remote tool and return its text output.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError>;
}
