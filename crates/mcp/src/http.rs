//! HTTP transport: JSON-RPC POSTed to a streamable-HTTP MCP endpoint.
//!
//! Servers answer either with `application/json` or with a short
//! `text/event-stream` whose `data:` lines carry the response.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::McpError;
use crate::protocol::{self, JsonRpcMessage, JsonRpcRequest, ToolDescriptor};
use crate::session::McpSession;

const SESSION_HEADER: &str = "Mcp-Session-Id";

pub struct HttpSession {
    server: String,
    url: String,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl HttpSession {
    /// Connect and run the `initialize` handshake.
    pub async fn connect(
        server: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, McpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| McpError::connection(server, e))?;

        let session = Self {
            server: server.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            client,
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(1),
        };

        session
            .request("initialize", Some(protocol::initialize_params()))
            .await?;
        session
            .post(&JsonRpcRequest::notification("notifications/initialized"))
            .await?;

        info!(server = %session.server, url, "MCP HTTP session ready");
        Ok(session)
    }

    fn current_session_id(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// POST one message and return the raw body with its content type.
    async fn post(&self, message: &JsonRpcRequest) -> Result<(String, String), McpError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(message);

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(id) = self.current_session_id() {
            request = request.header(SESSION_HEADER, id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| McpError::connection(&self.server, e))?;

        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self
                .session_id
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(id.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::connection(&self.server, format!("HTTP {status}: {body}")));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| McpError::connection(&self.server, e))?;

        Ok((content_type, body))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (content_type, body) = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        debug!(server = %self.server, method, content_type = %content_type, "MCP HTTP response");

        let message = if content_type.starts_with("text/event-stream") {
            find_in_event_stream(&body, id)
                .ok_or_else(|| McpError::Protocol(format!("no response to request {id} in event stream")))?
        } else {
            serde_json::from_str::<JsonRpcMessage>(&body)
                .map_err(|e| McpError::Protocol(format!("invalid JSON-RPC response: {e}")))?
        };

        message.into_result()
    }
}

/// Find the response to `id` among the `data:` payloads of an SSE body.
fn find_in_event_stream(body: &str, id: u64) -> Option<JsonRpcMessage> {
    body.replace("\r\n", "\n")
        .split("\n\n")
        .map(|event| {
            event
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(str::trim_start)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|data| !data.is_empty())
        .filter_map(|data| serde_json::from_str::<JsonRpcMessage>(&data).ok())
        .find(|msg| msg.answers(id))
}

#[async_trait]
impl McpSession for HttpSession {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        protocol::parse_tools(self.request("tools/list", None).await?)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let params = serde_json::json!({"name": name, "arguments": arguments});
        protocol::call_output(name, self.request("tools/call", Some(params)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_stream_picks_matching_response() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                    event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"ok\":true}}\n\n";
        let msg = find_in_event_stream(body, 7).unwrap();
        assert_eq!(msg.into_result().unwrap()["ok"], true);
    }

    #[test]
    fn event_stream_without_match() {
        let body = "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        assert!(find_in_event_stream(body, 2).is_none());
        assert!(find_in_event_stream("", 1).is_none());
    }

    #[test]
    fn multi_line_data_is_joined() {
        let body = "data: {\"jsonrpc\":\"2.0\",\ndata: \"id\":3,\"result\":[]}\n\n";
        assert!(find_in_event_stream(body, 3).is_some());
    }
}
