//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete
//! types. Ports exist for:
//! - LLM providers (swap Anthropic/OpenAI/Ollama per agent)
//! - Embeddings (hosted model vs deterministic test embedder)
//! - Portrait lookup (owned by the media collaborator)
//! - Clock/Random (for deterministic tests)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use showrunner_domain::CampaignId;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error, Clone)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Capability not supported: {0}")]
    Unsupported(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(err: serde_json::Error) -> Self {
        RepoError::Serialization(err.to_string())
    }
}

// =============================================================================
// LLM Port
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    /// Model override; providers fall back to their configured default.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(system_prompt: impl Into<String>, user_content: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            messages: vec![ChatMessage::user(user_content)],
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// A chat-completion provider.
///
/// `complete_with_schema` must return a JSON value the caller can decode into
/// its typed output; providers are free to implement it via native structured
/// output, tool calling, or plain JSON-mode prompting.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError>;

    async fn complete_with_schema(
        &self,
        request: LlmRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError>;

    async fn complete_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError>;

    /// Grounded web retrieval. Callers must check [`LlmPort::supports_search`]
    /// and degrade gracefully when the capability is missing.
    fn supports_search(&self) -> bool {
        false
    }

    async fn complete_with_search(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Unsupported("grounded search".to_string()))
    }
}

// =============================================================================
// Embedding Port
// =============================================================================

#[async_trait]
pub trait EmbeddingPort: Send + Sync {
    /// Embed a batch of texts. All vectors share one dimensionality.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

// =============================================================================
// Portrait Port (media collaborator)
// =============================================================================

#[async_trait]
pub trait PortraitPort: Send + Sync {
    /// Resolve a character name to a portrait URL, if one exists.
    async fn portrait_url(&self, campaign_id: CampaignId, name: &str) -> Option<String>;
}

/// No-portraits fallback used when the media collaborator is absent.
pub struct NoPortraits;

#[async_trait]
impl PortraitPort for NoPortraits {
    async fn portrait_url(&self, _campaign_id: CampaignId, _name: &str) -> Option<String> {
        None
    }
}

// =============================================================================
// Testability Ports
// =============================================================================

pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomPort: Send + Sync {
    /// Inclusive roll in [min, max].
    fn roll(&self, min: i32, max: i32) -> i32;
}
