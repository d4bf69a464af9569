//! Shared test doubles for loop and clan tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Arc;
use unison_core::{LanguageModel, ModelRequest, ProviderError};

use crate::input::UserInput;

/// A model that replies from a script, one entry per call, and keeps
/// repeating the last entry once the script runs out.
pub struct ScriptedModel {
    responses: Vec<String>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: responses.into_iter().map(Into::into).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete(&self, request: ModelRequest) -> Result<String, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let index = requests.len();
        requests.push(request);
        self.responses
            .get(index)
            .or(self.responses.last())
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured("empty script".into()))
    }
}

/// A model whose backend is unreachable.
pub struct FailingModel;

impl LanguageModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn complete(&self, _request: ModelRequest) -> Result<String, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

pub struct PanickingModel;

impl LanguageModel for PanickingModel {
    fn name(&self) -> &str {
        "panicking"
    }

    fn complete(&self, _request: ModelRequest) -> Result<String, ProviderError> {
        panic!("model exploded")
    }
}

/// Answers questions from a script; `None` entries act like an
/// interrupted read.
pub struct ScriptedInput {
    answers: VecDeque<Option<String>>,
}

impl ScriptedInput {
    pub fn new<'a>(answers: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            answers: answers.into_iter().map(|a| a.map(str::to_string)).collect(),
        }
    }
}

impl UserInput for ScriptedInput {
    fn ask(&mut self, _question: &str) -> Option<String> {
        self.answers.pop_front().flatten()
    }
}

/// A fenced command block as a model would write it.
pub fn block(name: &str, params: &str) -> String {
    format!("```yaml\nthoughts: >\n  Working on it.\nname: {name}\nparams: >\n  {params}\n```")
}

pub fn send(agent_name: &str, message: &str) -> String {
    let params = serde_json::json!({"agent_name": agent_name, "message": message});
    block("send_message", &params.to_string())
}
