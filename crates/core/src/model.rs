//! LanguageModel trait: the abstraction over text generators.
//!
//! The agent loop treats the model as an opaque function: a system prompt
//! plus the conversation so far goes in, raw text comes out. Everything
//! else (HTTP, retries, streaming) is the implementation's business.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// One completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// System instructions for this turn
    pub system: String,

    /// The conversation, oldest first; the last entry is the new prompt
    pub messages: Vec<Message>,
}

impl ModelRequest {
    /// A single-prompt request with no prior history.
    pub fn single(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: vec![Message::user(prompt)],
        }
    }

    /// The newest prompt in the request, if any.
    pub fn prompt(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }
}

/// The core LanguageModel trait.
///
/// Implementations must be shareable between agents of one clan, so the
/// receiver is `&self`; mutable client state belongs behind a lock.
pub trait LanguageModel: Send + Sync {
    /// A human-readable name for this model backend.
    fn name(&self) -> &str;

    /// Send a request and get the complete response text.
    fn complete(&self, request: ModelRequest) -> std::result::Result<String, ProviderError>;
}
