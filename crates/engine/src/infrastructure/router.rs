//! Typed agent routing: `AgentKey -> (provider, model)`.
//!
//! New agents are added by registering a route and a prompt, never by string
//! matching. The manager also enforces per-provider concurrency caps and
//! keeps a call log so tests (and ops) can observe exactly which agents hit
//! a provider on a given turn.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, ToolDefinition,
};

/// Every LLM-backed agent in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Intent,
    Outcome,
    Pacing,
    Validator,
    MemoryRanker,
    Writer,
    Progression,
    Director,
    Relationship,
    WorldBuilder,
    Compactor,
    Recap,
    /// Schema-repair fallback for malformed structured output.
    Repair,
}

impl AgentKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKey::Intent => "intent",
            AgentKey::Outcome => "outcome",
            AgentKey::Pacing => "pacing",
            AgentKey::Validator => "validator",
            AgentKey::MemoryRanker => "memory_ranker",
            AgentKey::Writer => "writer",
            AgentKey::Progression => "progression",
            AgentKey::Director => "director",
            AgentKey::Relationship => "relationship",
            AgentKey::WorldBuilder => "world_builder",
            AgentKey::Compactor => "compactor",
            AgentKey::Recap => "recap",
            AgentKey::Repair => "repair",
        }
    }
}

/// Provider families the engine can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentRoute {
    pub provider: ProviderKind,
    pub model: String,
}

struct RegisteredProvider {
    port: Arc<dyn LlmPort>,
    limiter: Arc<Semaphore>,
}

/// Resolves agents to providers, caps per-provider concurrency, and records
/// every call for observability.
pub struct ProviderManager {
    providers: DashMap<ProviderKind, RegisteredProvider>,
    routes: DashMap<AgentKey, AgentRoute>,
    default_route: std::sync::RwLock<Option<AgentRoute>>,
    call_log: std::sync::Mutex<Vec<(AgentKey, ProviderKind)>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            routes: DashMap::new(),
            default_route: std::sync::RwLock::new(None),
            call_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn register_provider(
        &self,
        kind: ProviderKind,
        port: Arc<dyn LlmPort>,
        max_concurrency: usize,
    ) {
        self.providers.insert(
            kind,
            RegisteredProvider {
                port,
                limiter: Arc::new(Semaphore::new(max_concurrency.max(1))),
            },
        );
    }

    pub fn set_route(&self, key: AgentKey, provider: ProviderKind, model: impl Into<String>) {
        self.routes.insert(
            key,
            AgentRoute {
                provider,
                model: model.into(),
            },
        );
    }

    /// Fallback route for agents without an explicit entry.
    pub fn set_default_route(&self, provider: ProviderKind, model: impl Into<String>) {
        let mut guard = self
            .default_route
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = Some(AgentRoute {
            provider,
            model: model.into(),
        });
    }

    pub fn route_for(&self, key: AgentKey) -> Result<AgentRoute, LlmError> {
        if let Some(route) = self.routes.get(&key) {
            return Ok(route.clone());
        }
        let guard = self.default_route.read().unwrap_or_else(|e| e.into_inner());
        guard.clone().ok_or_else(|| {
            LlmError::RequestFailed(format!("no route configured for agent '{}'", key.as_str()))
        })
    }

    fn record_call(&self, key: AgentKey, provider: ProviderKind) {
        let mut log = self.call_log.lock().unwrap_or_else(|e| e.into_inner());
        log.push((key, provider));
    }

    /// Calls made so far for a given agent (observability hook; also how the
    /// trivial-action fast path is asserted in tests).
    pub fn calls_for(&self, key: AgentKey) -> usize {
        let log = self.call_log.lock().unwrap_or_else(|e| e.into_inner());
        log.iter().filter(|(k, _)| *k == key).count()
    }

    pub fn total_calls(&self) -> usize {
        let log = self.call_log.lock().unwrap_or_else(|e| e.into_inner());
        log.len()
    }

    async fn provider_for(
        &self,
        key: AgentKey,
    ) -> Result<(Arc<dyn LlmPort>, tokio::sync::OwnedSemaphorePermit, AgentRoute), LlmError> {
        let route = self.route_for(key)?;
        let (port, limiter) = {
            let registered = self.providers.get(&route.provider).ok_or_else(|| {
                LlmError::RequestFailed(format!(
                    "provider '{}' not registered",
                    route.provider.as_str()
                ))
            })?;
            (registered.port.clone(), registered.limiter.clone())
        };
        let permit = limiter
            .acquire_owned()
            .await
            .map_err(|_| LlmError::RequestFailed("provider limiter closed".to_string()))?;
        self.record_call(key, route.provider);
        Ok((port, permit, route))
    }

    pub async fn complete(
        &self,
        key: AgentKey,
        mut request: LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let (port, _permit, route) = self.provider_for(key).await?;
        request.model.get_or_insert(route.model);
        port.complete(request).await
    }

    pub async fn complete_with_schema(
        &self,
        key: AgentKey,
        mut request: LlmRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let (port, _permit, route) = self.provider_for(key).await?;
        request.model.get_or_insert(route.model);
        port.complete_with_schema(request, schema).await
    }

    pub async fn complete_with_tools(
        &self,
        key: AgentKey,
        mut request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        let (port, _permit, route) = self.provider_for(key).await?;
        request.model.get_or_insert(route.model);
        port.complete_with_tools(request, tools).await
    }

    /// Grounded search with graceful degradation: falls back to a plain
    /// completion when the routed provider lacks the capability.
    pub async fn complete_with_search(
        &self,
        key: AgentKey,
        mut request: LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let (port, _permit, route) = self.provider_for(key).await?;
        request.model.get_or_insert(route.model);
        if port.supports_search() {
            port.complete_with_search(request).await
        } else {
            tracing::warn!(
                agent = key.as_str(),
                provider = route.provider.as_str(),
                "provider lacks grounded search, degrading to plain completion"
            );
            port.complete(request).await
        }
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoLlm;

    #[async_trait]
    impl LlmPort for EchoLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                content: request.model.unwrap_or_default(),
                tool_calls: vec![],
            })
        }

        async fn complete_with_schema(
            &self,
            _request: LlmRequest,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, LlmError> {
            Ok(serde_json::json!({}))
        }

        async fn complete_with_tools(
            &self,
            request: LlmRequest,
            _tools: Vec<ToolDefinition>,
        ) -> Result<LlmResponse, LlmError> {
            self.complete(request).await
        }
    }

    fn manager() -> ProviderManager {
        let manager = ProviderManager::new();
        manager.register_provider(ProviderKind::Ollama, Arc::new(EchoLlm), 4);
        manager
    }

    #[tokio::test]
    async fn test_route_resolution_applies_model() {
        let manager = manager();
        manager.set_route(AgentKey::Intent, ProviderKind::Ollama, "tiny-model");

        let response = manager
            .complete(AgentKey::Intent, LlmRequest::default())
            .await
            .expect("routed");
        assert_eq!(response.content, "tiny-model");
    }

    #[tokio::test]
    async fn test_default_route_fallback() {
        let manager = manager();
        manager.set_default_route(ProviderKind::Ollama, "fallback-model");

        let response = manager
            .complete(AgentKey::Writer, LlmRequest::default())
            .await
            .expect("fell back");
        assert_eq!(response.content, "fallback-model");
    }

    #[tokio::test]
    async fn test_missing_route_errors() {
        let manager = manager();
        let result = manager.complete(AgentKey::Writer, LlmRequest::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_call_log_counts_per_agent() {
        let manager = manager();
        manager.set_default_route(ProviderKind::Ollama, "m");

        manager
            .complete(AgentKey::Intent, LlmRequest::default())
            .await
            .expect("ok");
        manager
            .complete(AgentKey::Intent, LlmRequest::default())
            .await
            .expect("ok");
        manager
            .complete(AgentKey::Writer, LlmRequest::default())
            .await
            .expect("ok");

        assert_eq!(manager.calls_for(AgentKey::Intent), 2);
        assert_eq!(manager.calls_for(AgentKey::Writer), 1);
        assert_eq!(manager.calls_for(AgentKey::Outcome), 0);
        assert_eq!(manager.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_search_degrades_gracefully() {
        let manager = manager();
        manager.set_default_route(ProviderKind::Ollama, "m");
        // EchoLlm does not support search; must not error
        let response = manager
            .complete_with_search(AgentKey::Director, LlmRequest::default())
            .await;
        assert!(response.is_ok());
    }
}
