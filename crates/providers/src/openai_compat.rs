//! OpenAI-compatible chat model.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM, and any endpoint exposing
//! `/chat/completions`. The agent loop is synchronous, so each call drives
//! the async `reqwest` client on a private current-thread runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use unison_config::ModelConfig;
use unison_core::error::ProviderError;
use unison_core::message::{Message, Role};
use unison_core::model::{LanguageModel, ModelRequest};

/// A chat model behind an OpenAI-compatible HTTP API.
///
/// Must not be called from inside another Tokio runtime: `complete` blocks
/// the calling thread until the response arrives.
pub struct OpenAiCompatModel {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl OpenAiCompatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("runtime: {e}")))?;

        let model = model.into();
        Ok(Self {
            name: format!("openai-compat:{model}"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model,
            temperature: 0.7,
            max_tokens: None,
            client,
            runtime,
        })
    }

    /// Build from the `[model]` config section. Fails without an API key.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key: set model.api_key or UNISON_API_KEY".into(),
            )
        })?;

        Ok(Self::new(&config.api_url, api_key, &config.model)?
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// System prompt first, then the conversation.
    fn to_api_messages(request: &ModelRequest) -> Vec<ApiMessage> {
        let system = (!request.system.is_empty()).then(|| ApiMessage {
            role: "system".into(),
            content: Some(request.system.clone()),
        });

        system
            .into_iter()
            .chain(request.messages.iter().map(|m: &Message| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            }))
            .collect()
    }

    async fn send(&self, request: &ModelRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(request),
            "temperature": self.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(model = %self.model, messages = request.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(status_error(status, retry_after, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })
    }
}

/// Map a non-200 status to the matching provider error.
fn status_error(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

impl LanguageModel for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, request: ModelRequest) -> Result<String, ProviderError> {
        self.runtime.block_on(self.send(&request))
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    /// Serve one canned HTTP response on a local port, returning the base URL
    /// and a handle yielding the raw request.
    fn serve_once(status: &str, body: &str) -> (String, std::thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse().ok())?
                        })
                        .unwrap_or(0usize);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });

        (format!("http://{addr}/v1"), handle)
    }

    #[test]
    fn system_prompt_leads_messages() {
        let request = ModelRequest {
            system: "be terse".into(),
            messages: vec![Message::user("hi"), Message::assistant("hello")],
        };
        let api = OpenAiCompatModel::to_api_messages(&request);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[2].role, "assistant");
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let api = OpenAiCompatModel::to_api_messages(&ModelRequest::single("", "hi"));
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].role, "user");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(429, Some(30), String::new()),
            ProviderError::RateLimited { retry_after_secs: 30 }
        ));
        assert!(matches!(
            status_error(401, None, String::new()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(500, None, "oops".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[test]
    fn from_config_requires_key() {
        let config = ModelConfig::default();
        assert!(matches!(
            OpenAiCompatModel::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn complete_round_trips_over_http() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"pong"}}]}"#,
        );
        let model = OpenAiCompatModel::new(url, "sk-test", "test-model").unwrap();

        let text = model.complete(ModelRequest::single("sys", "ping")).unwrap();
        assert_eq!(text, "pong");

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.contains("Bearer sk-test"));
        assert!(raw.contains("\"test-model\""));
    }

    #[test]
    fn complete_surfaces_api_errors() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"error":"down"}"#);
        let model = OpenAiCompatModel::new(url, "sk-test", "m").unwrap();

        let err = model.complete(ModelRequest::single("", "ping")).unwrap_err();
        assert!(matches!(err, ProviderError::ApiError { status_code: 500, .. }));
        server.join().unwrap();
    }
}
