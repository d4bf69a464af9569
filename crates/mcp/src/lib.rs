//! # Unison MCP
//!
//! Model Context Protocol support: validated `mcpServers` configuration,
//! stdio and HTTP sessions, a [`SessionRegistry`] that owns the async
//! runtime they run on, and [`McpTool`], which exposes each remote tool to
//! the synchronous agent loop.

pub mod bridge;
pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod stdio;

pub use bridge::{McpTool, convert_schema};
pub use config::{McpServersConfig, ServerConfig};
pub use error::McpError;
pub use http::HttpSession;
pub use protocol::ToolDescriptor;
pub use registry::SessionRegistry;
pub use session::McpSession;
pub use stdio::StdioSession;
