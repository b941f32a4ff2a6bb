//! The uniform agent contract: prompt + output schema + typed call.
//!
//! Every LLM agent is an [`Agent<O>`]: it resolves its provider through the
//! routing registry, requests structured output against its schema, strict-
//! parses, retries with backoff on parse failure, and finally hands the raw
//! text to the repair agent. Timeouts substitute a caller-provided default so
//! the pipeline never stalls on one slow sibling.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::infrastructure::ports::{LlmError, LlmRequest};
use crate::infrastructure::router::{AgentKey, ProviderManager};
use crate::prompts;

/// Parse attempts before the repair path kicks in.
const MAX_PARSE_ATTEMPTS: u32 = 3;
/// Base backoff between parse retries.
const RETRY_BASE_DELAY_MS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("provider error: {0}")]
    Provider(#[from] LlmError),
    #[error("schema parse failed after {attempts} attempts: {last_error}")]
    SchemaParse { attempts: u32, last_error: String },
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),
}

pub struct Agent<O> {
    key: AgentKey,
    system_prompt: &'static str,
    schema: serde_json::Value,
    manager: Arc<ProviderManager>,
    timeout: Duration,
    _output: PhantomData<fn() -> O>,
}

impl<O: DeserializeOwned> Agent<O> {
    pub fn new(key: AgentKey, schema: serde_json::Value, manager: Arc<ProviderManager>) -> Self {
        Self {
            key,
            system_prompt: prompts::get(key).content,
            schema,
            manager,
            timeout: Duration::from_secs(60),
            _output: PhantomData,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self) -> AgentKey {
        self.key
    }

    pub fn system_prompt(&self) -> &'static str {
        self.system_prompt
    }

    /// Structured call: provider -> strict parse -> bounded retry -> repair.
    pub async fn call(&self, user_context: String) -> Result<O, AgentError> {
        let mut last_error = String::new();
        let mut last_raw: Option<serde_json::Value> = None;

        for attempt in 1..=MAX_PARSE_ATTEMPTS {
            let request = LlmRequest::new(self.system_prompt, user_context.clone());
            let value = self
                .manager
                .complete_with_schema(self.key, request, &self.schema)
                .await?;

            match serde_json::from_value::<O>(value.clone()) {
                Ok(output) => return Ok(output),
                Err(e) => {
                    last_error = e.to_string();
                    last_raw = Some(value);
                    tracing::warn!(
                        agent = self.key.as_str(),
                        attempt,
                        error = %last_error,
                        "structured output failed strict parse"
                    );
                    if attempt < MAX_PARSE_ATTEMPTS {
                        let delay = RETRY_BASE_DELAY_MS * 2u64.saturating_pow(attempt - 1);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                }
            }
        }

        // Last resort: hand schema + raw + error to the repair agent
        if let Some(raw) = last_raw {
            match self.repair(&raw, &last_error).await {
                Ok(output) => {
                    tracing::info!(agent = self.key.as_str(), "repair agent recovered output");
                    return Ok(output);
                }
                Err(e) => {
                    tracing::error!(agent = self.key.as_str(), error = %e, "repair agent failed");
                }
            }
        }

        Err(AgentError::SchemaParse {
            attempts: MAX_PARSE_ATTEMPTS,
            last_error,
        })
    }

    async fn repair(&self, raw: &serde_json::Value, error: &str) -> Result<O, AgentError> {
        let context = format!(
            "SCHEMA:\n{}\n\nRAW OUTPUT:\n{}\n\nPARSE ERROR:\n{}",
            self.schema, raw, error
        );
        let request = LlmRequest::new(prompts::get(AgentKey::Repair).content, context);
        let value = self
            .manager
            .complete_with_schema(AgentKey::Repair, request, &self.schema)
            .await?;
        serde_json::from_value(value).map_err(|e| AgentError::SchemaParse {
            attempts: MAX_PARSE_ATTEMPTS + 1,
            last_error: e.to_string(),
        })
    }

    /// Call with a per-agent timeout; on timeout or any error, substitute the
    /// given schema-valid default and keep the pipeline moving.
    pub async fn call_or_default(&self, user_context: String, default: O) -> O {
        match tokio::time::timeout(self.timeout, self.call(user_context)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!(agent = self.key.as_str(), error = %e, "agent failed, using default");
                default
            }
            Err(_) => {
                tracing::error!(
                    agent = self.key.as_str(),
                    timeout = ?self.timeout,
                    "agent timed out, using default"
                );
                default
            }
        }
    }
}

/// Minimal JSON-schema builder for agent output declarations.
/// Keeps the schemas readable at the call sites.
pub fn object_schema(properties: &[(&str, serde_json::Value)], required: &[&str]) -> serde_json::Value {
    let mut props = serde_json::Map::new();
    for (name, schema) in properties {
        props.insert((*name).to_string(), schema.clone());
    }
    serde_json::json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}
