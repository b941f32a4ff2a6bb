//! OpenAI chat-completions client.
//!
//! The wire types here are shared with the Ollama client, which speaks the
//! same OpenAI-compatible API against a local server.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, MessageRole, ToolCall, ToolDefinition,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Client for the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        // LLM requests can be slow; 120s covers long narrative generations
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Create client from `OPENAI_API_KEY` / `OPENAI_BASE_URL` / `OPENAI_MODEL`.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
        Self::new(&base_url, &api_key, &model)
    }

    async fn send(&self, api_request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("{status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LlmPort for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_request = ChatRequest {
            model,
            messages: build_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: None,
            response_format: None,
        };
        convert_response(self.send(api_request).await?)
    }

    async fn complete_with_schema(
        &self,
        request: LlmRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let mut messages = build_messages(&request);
        // JSON mode needs the schema spelled out in the conversation
        messages.push(WireMessage {
            role: "system".to_string(),
            content: Some(format!(
                "Respond with a single JSON object matching this schema exactly. \
                 No prose, no markdown fences.\n{schema}"
            )),
            tool_calls: None,
        });
        let api_request = ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: None,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };
        let response = convert_response(self.send(api_request).await?)?;
        parse_json_content(&response.content)
    }

    async fn complete_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let api_tools: Vec<WireTool> = tools
            .into_iter()
            .map(|t| WireTool {
                r#type: "function".to_string(),
                function: WireFunction {
                    name: t.name,
                    description: t.description,
                    parameters: t.parameters,
                },
            })
            .collect();
        let api_request = ChatRequest {
            model,
            messages: build_messages(&request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            tools: Some(api_tools),
            response_format: None,
        };
        convert_response(self.send(api_request).await?)
    }
}

/// Parse a JSON object out of model text, tolerating markdown fences.
pub(crate) fn parse_json_content(content: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed);
    serde_json::from_str(stripped).map_err(|e| {
        LlmError::InvalidResponse(format!("expected JSON object, got parse error: {e}"))
    })
}

pub(crate) fn build_messages(request: &LlmRequest) -> Vec<WireMessage> {
    let mut messages = Vec::new();

    if let Some(system) = &request.system_prompt {
        messages.push(WireMessage {
            role: "system".to_string(),
            content: Some(system.clone()),
            tool_calls: None,
        });
    }

    for msg in &request.messages {
        messages.push(WireMessage {
            role: match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::System => "system",
            }
            .to_string(),
            content: Some(msg.content.clone()),
            tool_calls: None,
        });
    }

    messages
}

pub(crate) fn convert_response(response: ChatResponse) -> Result<LlmResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("No choices in LLM response".to_string()))?;

    let mut tool_calls = Vec::new();
    for tc in choice.message.tool_calls.unwrap_or_default() {
        let arguments: serde_json::Value =
            serde_json::from_str(&tc.function.arguments).map_err(|e| {
                LlmError::InvalidResponse(format!(
                    "Invalid tool call arguments for '{}': {}",
                    tc.function.name, e
                ))
            })?;
        tool_calls.push(ToolCall {
            name: tc.function.name,
            arguments,
        });
    }

    Ok(LlmResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

// =============================================================================
// OpenAI API wire types (shared with the Ollama client)
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseFormat {
    pub r#type: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireTool {
    pub r#type: String,
    pub function: WireFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct WireChoice {
    pub message: WireMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireToolCall {
    pub function: WireToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WireToolCallFunction {
    pub name: String,
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_content_plain() {
        let value = parse_json_content("{\"ok\": true}").expect("parses");
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_parse_json_content_fenced() {
        let value = parse_json_content("```json\n{\"ok\": 1}\n```").expect("parses");
        assert_eq!(value["ok"], 1);
    }

    #[test]
    fn test_parse_json_content_rejects_prose() {
        assert!(parse_json_content("Sure! Here's the plan.").is_err());
    }

    #[test]
    fn test_build_messages_includes_system() {
        let request = LlmRequest::new("be brief", "hello");
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
