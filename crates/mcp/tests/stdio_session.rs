//! Stdio sessions against a scripted `sh` server.
#![cfg(unix)]

use serde_json::json;
use std::collections::BTreeMap;
use unison_core::Tool;
use unison_mcp::{McpError, McpSession, SessionRegistry, StdioSession};

/// Answers initialize, tools/list and tools/call with canned JSON-RPC
/// responses, echoing the request id back. Noise lines come first on
/// tools/list so the reader has to skip them.
const FAKE_SERVER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/^{"jsonrpc":"2.0","id":\([0-9]*\),.*/\1/p')
  case "$line" in
    *'"initialize"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake","version":"0.1"}}}' ;;
    *'tools/list'*)
      echo 'starting up'
      echo ''
      echo '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info"}}'
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"tools":[{"name":"echo","description":"Echo text","inputSchema":{"type":"object","properties":{"text":{"type":"string","description":"Text to echo"}},"required":["text"]}}]}}' ;;
    *'"fail"'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"isError":true,"content":[{"type":"text","text":"boom"}]}}' ;;
    *'tools/call'*)
      echo '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"hello"},{"type":"image","data":"AAAA"},{"type":"text","text":"world"}]}}' ;;
  esac
done
"#;

fn script_args() -> Vec<String> {
    vec!["-c".to_string(), FAKE_SERVER.to_string()]
}

#[tokio::test]
async fn handshake_list_and_call() {
    let session = StdioSession::spawn("fake", "sh", &script_args(), &BTreeMap::new(), None)
        .await
        .unwrap();

    let tools = session.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
    assert_eq!(tools[0].input_schema["required"][0], "text");

    let out = session.call_tool("echo", json!({"text": "hi"})).await.unwrap();
    assert_eq!(out, "hello\nworld");

    // A second call gets its own id and still finds its answer.
    let again = session.call_tool("echo", json!({"text": "again"})).await.unwrap();
    assert_eq!(again, "hello\nworld");
}

#[tokio::test]
async fn is_error_becomes_tool_execution_error() {
    let session = StdioSession::spawn("fake", "sh", &script_args(), &BTreeMap::new(), None)
        .await
        .unwrap();

    let err = session.call_tool("fail", json!({})).await.unwrap_err();
    match err {
        McpError::ToolExecution { tool_name, message, .. } => {
            assert_eq!(tool_name, "fail");
            assert_eq!(message, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_binary_is_connection_error() {
    let result = StdioSession::spawn(
        "ghost",
        "/nonexistent/unison-mcp-server",
        &[],
        &BTreeMap::new(),
        None,
    )
    .await;
    assert!(matches!(result, Err(McpError::Connection { .. })));
}

#[test]
fn registry_bridges_remote_tools() {
    let registry = SessionRegistry::new().unwrap();
    let mut tools = registry
        .connect(&json!({"mcpServers": {
            "fake": {"command": "sh", "args": script_args()},
            "ghost": {"command": "/nonexistent/unison-mcp-server"}
        }}))
        .unwrap();

    assert_eq!(registry.keys(), vec!["fake"]);
    assert_eq!(tools.len(), 1);

    let tool = &mut tools[0];
    assert_eq!(tool.name(), "fake_echo");
    assert_eq!(tool.description(), "Echo text");
    assert_eq!(tool.parameters()[0].name, "text");
    assert!(tool.parameters()[0].required);

    let args = json!({"text": "hi"}).as_object().cloned().unwrap();
    let result = tool.execute(&args);
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.text().as_deref(), Some("hello\nworld"));

    // Validation runs before anything reaches the server.
    let result = tool.execute(&Default::default());
    assert!(!result.success);
    assert!(result.error.unwrap().contains("missing required parameter 'text'"));
}
