//! Session registry: owns the async runtime and every live MCP session.
//!
//! The agent loop is synchronous. Everything asynchronous in the process
//! runs on the registry's own multi-thread runtime; synchronous callers
//! hand work over with [`SessionRegistry::dispatch`] and block on a oneshot
//! until the session answers.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::bridge::McpTool;
use crate::config::{McpServersConfig, ServerConfig};
use crate::error::McpError;
use crate::http::HttpSession;
use crate::protocol::ToolDescriptor;
use crate::session::McpSession;
use crate::stdio::StdioSession;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<dyn McpSession>>>,
    runtime: Runtime,
}

impl SessionRegistry {
    /// Start the registry's runtime. Must not be called from async code.
    pub fn new() -> Result<Arc<Self>, McpError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("unison-mcp")
            .enable_all()
            .build()
            .map_err(|e| McpError::Protocol(format!("cannot start MCP runtime: {e}")))?;

        Ok(Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            runtime,
        }))
    }

    /// Register a session under `key`, returning the one it replaced.
    pub fn insert(&self, key: impl Into<String>, session: Arc<dyn McpSession>) -> Option<Arc<dyn McpSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), session)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<dyn McpSession>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn session(&self, key: &str) -> Option<Arc<dyn McpSession>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Run `call_tool` on the registry's runtime and block until it finishes.
    ///
    /// Must be called from a thread that is not driving a Tokio runtime.
    pub fn dispatch(
        &self,
        session: Arc<dyn McpSession>,
        tool: &str,
        arguments: Value,
    ) -> Result<String, McpError> {
        let (tx, rx) = oneshot::channel();
        let tool = tool.to_string();
        self.runtime.spawn(async move {
            let _ = tx.send(session.call_tool(&tool, arguments).await);
        });
        rx.blocking_recv()
            .map_err(|_| McpError::Protocol("MCP call was dropped before completing".into()))?
    }

    /// Call a tool on the session registered under `key`.
    pub fn call(&self, key: &str, tool: &str, arguments: Value) -> Result<String, McpError> {
        let session = self
            .session(key)
            .ok_or_else(|| McpError::connection(key, "no such session"))?;
        self.dispatch(session, tool, arguments)
    }

    /// Validate a `mcpServers` document, connect every server, and return
    /// one bridge tool per remote tool, named `<server>_<tool>`.
    ///
    /// An invalid document fails the whole call. A server that cannot be
    /// reached is logged and skipped.
    pub fn connect(self: &Arc<Self>, doc: &Value) -> Result<Vec<McpTool>, McpError> {
        let config = McpServersConfig::from_value(doc)?;
        Ok(self.connect_servers(&config))
    }

    /// [`SessionRegistry::connect`] for a JSON file on disk.
    pub fn connect_file(self: &Arc<Self>, path: &Path) -> Result<Vec<McpTool>, McpError> {
        let config = McpServersConfig::load(path)?;
        Ok(self.connect_servers(&config))
    }

    fn connect_servers(self: &Arc<Self>, config: &McpServersConfig) -> Vec<McpTool> {
        let connecting = config
            .servers
            .iter()
            .map(|(name, server)| async move { (name, open_session(name, server).await) });
        let results = self.runtime.block_on(join_all(connecting));

        let mut tools = Vec::new();
        for (name, result) in results {
            match result {
                Ok((session, descriptors)) => {
                    info!(server = %name, tools = descriptors.len(), "Connected MCP server");
                    self.insert(name.clone(), session);
                    tools.extend(descriptors.into_iter().map(|d| {
                        McpTool::new(
                            format!("{name}_{}", d.name),
                            d.description,
                            &d.input_schema,
                            name.clone(),
                            d.name,
                            self,
                        )
                    }));
                }
                Err(e) => warn!(server = %name, error = %e, "Skipping MCP server"),
            }
        }
        tools
    }
}

async fn open_session(
    name: &str,
    server: &ServerConfig,
) -> Result<(Arc<dyn McpSession>, Vec<ToolDescriptor>), McpError> {
    let session: Arc<dyn McpSession> = match server {
        ServerConfig::Stdio { command, args, env, cwd } => {
            Arc::new(StdioSession::spawn(name, command, args, env, cwd.as_deref()).await?)
        }
        ServerConfig::Http { url, headers } => Arc::new(HttpSession::connect(name, url, headers).await?),
    };
    let tools = session.list_tools().await?;
    Ok((session, tools))
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        // Sessions own child processes and sockets; release them while the
        // runtime is still alive.
        let _guard = self.runtime.enter();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").field("sessions", &self.keys()).finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes its arguments back, or fails for the tool named `broken`.
    pub(crate) struct FakeSession;

    #[async_trait]
    impl McpSession for FakeSession {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
            Ok(vec![ToolDescriptor {
                name: "echo".into(),
                description: "Echo".into(),
                input_schema: json!({"type": "object"}),
            }])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
            if name == "broken" {
                return Err(McpError::ToolExecution {
                    tool_name: name.into(),
                    message: "remote failure".into(),
                    source: None,
                });
            }
            Ok(format!("{name}:{arguments}"))
        }
    }

    #[test]
    fn insert_lookup_remove() {
        let registry = SessionRegistry::new().unwrap();
        assert!(registry.insert("b", Arc::new(FakeSession)).is_none());
        registry.insert("a", Arc::new(FakeSession));
        assert_eq!(registry.keys(), vec!["a", "b"]);
        assert!(registry.session("a").is_some());
        assert!(registry.remove("a").is_some());
        assert!(registry.session("a").is_none());
    }

    #[test]
    fn call_blocks_until_session_answers() {
        let registry = SessionRegistry::new().unwrap();
        registry.insert("fake", Arc::new(FakeSession));
        let out = registry.call("fake", "echo", json!({"x": 1})).unwrap();
        assert_eq!(out, r#"echo:{"x":1}"#);
    }

    #[test]
    fn call_unknown_key_is_connection_error() {
        let registry = SessionRegistry::new().unwrap();
        let err = registry.call("missing", "echo", json!({})).unwrap_err();
        assert!(matches!(err, McpError::Connection { ref server, .. } if server == "missing"));
    }

    #[test]
    fn remote_failure_propagates() {
        let registry = SessionRegistry::new().unwrap();
        registry.insert("fake", Arc::new(FakeSession));
        let err = registry.call("fake", "broken", json!({})).unwrap_err();
        assert!(err.to_string().contains("remote failure"));
    }

    #[test]
    fn connect_rejects_invalid_config() {
        let registry = SessionRegistry::new().unwrap();
        let err = registry.connect(&json!({"servers": {}})).unwrap_err();
        assert!(matches!(err, McpError::Configuration { .. }));
    }

    #[test]
    fn connect_skips_unreachable_servers() {
        let registry = SessionRegistry::new().unwrap();
        let tools = registry
            .connect(&json!({"mcpServers": {
                "ghost": {"command": "/nonexistent/unison-mcp-server"}
            }}))
            .unwrap();
        assert!(tools.is_empty());
        assert!(registry.keys().is_empty());
    }
}
