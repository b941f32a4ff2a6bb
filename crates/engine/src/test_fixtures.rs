//! Shared test doubles for agent and pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, ToolDefinition,
};

#[derive(Debug, Clone)]
enum Scripted {
    Json(serde_json::Value),
    Text(String),
}

/// A scripted LLM provider.
///
/// Responses can be queued globally (FIFO) or keyed to a marker substring of
/// the system prompt. Keying is what makes concurrently running agents
/// deterministic in pipeline tests, since each agent's prompt carries a
/// distinctive role line.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    inner: Arc<Mutex<ScriptedState>>,
}

#[derive(Default)]
struct ScriptedState {
    global: VecDeque<Scripted>,
    keyed_queues: Vec<(String, VecDeque<Scripted>)>,
    keyed_static: Vec<(String, Scripted)>,
    requests: Vec<String>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a global FIFO JSON response.
    pub fn push_json(&self, value: serde_json::Value) {
        self.lock().global.push_back(Scripted::Json(value));
    }

    /// Queue a global FIFO text response.
    pub fn push_text(&self, text: impl Into<String>) {
        self.lock().global.push_back(Scripted::Text(text.into()));
    }

    /// Queue a JSON response for requests whose system prompt contains `marker`.
    pub fn push_for(&self, marker: impl Into<String>, value: serde_json::Value) {
        let marker = marker.into();
        let mut state = self.lock();
        if let Some((_, queue)) = state.keyed_queues.iter_mut().find(|(m, _)| *m == marker) {
            queue.push_back(Scripted::Json(value));
        } else {
            state
                .keyed_queues
                .push((marker, VecDeque::from([Scripted::Json(value)])));
        }
    }

    /// Fixed JSON response for every request matching `marker`.
    pub fn set_for(&self, marker: impl Into<String>, value: serde_json::Value) {
        self.lock()
            .keyed_static
            .push((marker.into(), Scripted::Json(value)));
    }

    /// Fixed text response for every request matching `marker`.
    pub fn set_text_for(&self, marker: impl Into<String>, text: impl Into<String>) {
        self.lock()
            .keyed_static
            .push((marker.into(), Scripted::Text(text.into())));
    }

    /// User-content of every request seen, in arrival order.
    pub fn seen_requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_for(&self, request: &LlmRequest) -> Scripted {
        let mut state = self.lock();
        let user_content = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        state.requests.push(user_content);

        let system = request.system_prompt.clone().unwrap_or_default();

        if let Some((_, queue)) = state
            .keyed_queues
            .iter_mut()
            .find(|(marker, queue)| system.contains(marker.as_str()) && !queue.is_empty())
        {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        // Later registrations win, so tests can override a baseline
        if let Some((_, response)) = state
            .keyed_static
            .iter()
            .rev()
            .find(|(marker, _)| system.contains(marker.as_str()))
        {
            return response.clone();
        }
        if let Some(response) = state.global.pop_front() {
            return response;
        }
        Scripted::Text("The scene continues.".to_string())
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let content = match self.next_for(&request) {
            Scripted::Text(text) => text,
            Scripted::Json(value) => value.to_string(),
        };
        Ok(LlmResponse {
            content,
            tool_calls: vec![],
        })
    }

    async fn complete_with_schema(
        &self,
        request: LlmRequest,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        match self.next_for(&request) {
            Scripted::Json(value) => Ok(value),
            Scripted::Text(text) => serde_json::from_str(&text)
                .map_err(|e| LlmError::InvalidResponse(format!("scripted text is not JSON: {e}"))),
        }
    }

    async fn complete_with_tools(
        &self,
        request: LlmRequest,
        _tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        self.complete(request).await
    }
}
