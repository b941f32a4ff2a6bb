//! Ollama LLM client (OpenAI-compatible API).
//!
//! Reuses the OpenAI wire types; only the endpoint, auth, and defaults
//! differ. Useful as the local/offline provider for cheap agents.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, ToolDefinition,
};
use crate::infrastructure::providers::openai::{
    build_messages, convert_response, parse_json_content, ChatRequest, ChatResponse,
    ResponseFormat, WireFunction, WireMessage, WireTool,
};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

/// Client for Ollama's OpenAI-compatible API.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create client from `OLLAMA_BASE_URL` and `OLLAMA_MODEL`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_string());
        let model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string());
        Self::new(&base_url, &model)
    }

    async fn send(&self, api_request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .map_err(|e| LlmError::RequestFailed(e.to_string()))?;
            return Err(LlmError::RequestFailed(error_text));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL)
    }
}

#[async_trait]
impl LlmPort for OllamaClient {
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
