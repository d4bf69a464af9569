//! Stdio transport: a child process speaking newline-delimited JSON-RPC.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::McpError;
use crate::protocol::{self, JsonRpcMessage, JsonRpcRequest, ToolDescriptor};
use crate::session::McpSession;

pub struct StdioSession {
    server: String,
    pipes: Mutex<Pipes>,
    next_id: AtomicU64,
}

struct Pipes {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    /// Held so the process is killed when the session drops
    _child: Child,
}

impl StdioSession {
    /// Spawn the server process and run the `initialize` handshake.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn spawn(
        server: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&Path>,
    ) -> Result<Self, McpError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::connection(server, format!("cannot spawn '{command}': {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::connection(server, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::connection(server, "failed to capture stdout"))?;

        // Drain stderr so a chatty server never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            let name = server.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if !line.is_empty() {
                        debug!(server = %name, "stderr: {line}");
                    }
                }
            });
        }

        let session = Self {
            server: server.to_string(),
            pipes: Mutex::new(Pipes {
                stdin,
                stdout: BufReader::new(stdout).lines(),
                _child: child,
            }),
            next_id: AtomicU64::new(1),
        };

        session
            .request("initialize", Some(protocol::initialize_params()))
            .await?;
        session.notify("notifications/initialized").await?;

        info!(server = %session.server, command, "MCP stdio session ready");
        Ok(session)
    }

    async fn send(&self, request: &JsonRpcRequest, pipes: &mut Pipes) -> Result<(), McpError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| McpError::Protocol(format!("cannot encode request: {e}")))?;
        line.push('\n');

        pipes
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| McpError::connection(&self.server, e))?;
        pipes
            .stdin
            .flush()
            .await
            .map_err(|e| McpError::connection(&self.server, e))
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let mut pipes = self.pipes.lock().await;
        self.send(&JsonRpcRequest::notification(method), &mut pipes).await
    }

    /// Send a request and wait for the line answering it.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut pipes = self.pipes.lock().await;
        self.send(&JsonRpcRequest::new(id, method, params), &mut pipes)
            .await?;

        loop {
            let line = pipes
                .stdout
                .next_line()
                .await
                .map_err(|e| McpError::connection(&self.server, e))?
                .ok_or_else(|| McpError::connection(&self.server, "server closed stdout"))?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcMessage>(&line) {
                Ok(msg) if msg.answers(id) => return msg.into_result(),
                Ok(_) => debug!(server = %self.server, "skipping unrelated message"),
                Err(_) => debug!(server = %self.server, "skipping non-JSON line: {line}"),
            }
        }
    }
}

#[async_trait]
impl McpSession for StdioSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        protocol::parse_tools(self.request("tools/list", None).await?)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let params = serde_json::json!({"name": name, "arguments": arguments});
        protocol::call_output(name, self.request("tools/call", Some(params)).await?)
    }
}
