//! Anthropic Messages API client.
//!
//! Structured output is implemented with a forced tool call whose
//! `input_schema` is the agent's output schema, so the model must fill the
//! schema to "call" the tool. This is the only provider here that supports
//! grounded web search.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, MessageRole, ToolCall, ToolDefinition,
};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const STRUCTURED_OUTPUT_TOOL: &str = "structured_output";

#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
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

    /// Create client from `ANTHROPIC_API_KEY` / `ANTHROPIC_BASE_URL` / `ANTHROPIC_MODEL`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("ANTHROPIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_ANTHROPIC_BASE_URL.to_string());
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let model = std::env::var("ANTHROPIC_MODEL")
            .unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string());
        Self::new(&base_url, &api_key, &model)
    }

    async fn send(&self, body: MessagesRequest) -> Result<MessagesResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 529 {
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

    fn base_request(&self, request: &LlmRequest) -> MessagesRequest {
        MessagesRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            system: request.system_prompt.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: match m.role {
                        MessageRole::Assistant => "assistant",
                        // Anthropic has no system role inside messages
                        _ => "user",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(4096),
            temperature: request.temperature,
            tools: None,
            tool_choice: None,
        }
    }
}

#[async_trait]
impl LlmPort for AnthropicClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.base_request(&request);
        Ok(collect_response(self.send(body).await?))
    }

    async fn complete_with_schema(
        &self,
        request: LlmRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let mut body = self.base_request(&request);
        body.tools = Some(vec![WireTool::function(
            STRUCTURED_OUTPUT_TOOL,
            "Record the structured result of this task.",
            schema.clone(),
        )]);
        body.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": STRUCTURED_OUTPUT_TOOL,
        }));

        let response = self.send(body).await?;
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { input, .. } => Some(input),
                _ => None,
            })
            .ok_or_else(|| {
                LlmError::InvalidResponse("model did not produce structured output".to_string())
            })
    }

    async fn complete_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        let mut body = self.base_request(&request);
        body.tools = Some(
            tools
                .into_iter()
                .map(|t| WireTool::function(&t.name, &t.description, t.parameters))
                .collect(),
        );
        Ok(collect_response(self.send(body).await?))
    }

    fn supports_search(&self) -> bool {
        true
    }

    async fn complete_with_search(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let mut body = self.base_request(&request);
        body.tools = Some(vec![WireTool::server_web_search()]);
        Ok(collect_response(self.send(body).await?))
    }
}

fn collect_response(response: MessagesResponse) -> LlmResponse {
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::ToolUse { name, input } => tool_calls.push(ToolCall {
                name,
                arguments: input,
            }),
            ContentBlock::Other => {}
        }
    }
    LlmResponse {
        content,
        tool_calls,
    }
}

// =============================================================================
// Anthropic API wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    input_schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    tool_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_uses: Option<u32>,
}

impl WireTool {
    fn function(name: &str, description: &str, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            tool_type: None,
            max_uses: None,
        }
    }

    fn server_web_search() -> Self {
        Self {
            name: "web_search".to_string(),
            description: String::new(),
            input_schema: serde_json::Value::Null,
            tool_type: Some("web_search_20250305".to_string()),
            max_uses: Some(3),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}
