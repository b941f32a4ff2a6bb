//! Resilient LLM client wrapper with exponential backoff retry.
//!
//! Wraps any LlmPort implementation with retry logic to handle transient
//! failures and provider rate limits.

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::infrastructure::ports::{
    LlmError, LlmPort, LlmRequest, LlmResponse, ToolDefinition,
};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Base delay in milliseconds before first retry
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (caps exponential growth)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0-1.0) for randomizing delays to prevent thundering herd
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            jitter_factor: 0.2,
        }
    }
}

/// Wrapper that adds retry logic to any LLM client
pub struct ResilientLlmClient {
    inner: Arc<dyn LlmPort>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmPort>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate delay for a given attempt number using exponential backoff with jitter
    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    fn is_retryable(error: &LlmError) -> bool {
        match error {
            LlmError::RateLimited(_) => true,
            // Don't retry on auth errors or bad requests
            LlmError::RequestFailed(msg) => {
                !msg.contains("401") && !msg.contains("403") && !msg.contains("400")
            }
            // Could be transient (truncated or malformed body)
            LlmError::InvalidResponse(_) => true,
            LlmError::Unsupported(_) => false,
        }
    }

    async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!(
                            attempt = attempt + 1,
                            operation = operation_name,
                            "LLM request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let is_retryable = Self::is_retryable(&e);

                    if attempt < self.config.max_retries && is_retryable {
                        let delay = self.calculate_delay(attempt + 1);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay,
                            error = %e,
                            operation = operation_name,
                            "LLM request failed, retrying..."
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    } else if !is_retryable {
                        tracing::error!(
                            error = %e,
                            operation = operation_name,
                            "LLM request failed with non-retryable error"
                        );
                        return Err(e);
                    }

                    last_error = Some(e);
                }
            }
        }

        let error =
            last_error.unwrap_or_else(|| LlmError::RequestFailed("Unknown error".to_string()));
        tracing::error!(
            attempts = self.config.max_retries + 1,
            error = %error,
            operation = operation_name,
            "LLM request failed after all retry attempts"
        );
        Err(error)
    }
}

#[async_trait]
impl LlmPort for ResilientLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            async move { inner.complete(request).await }
        })
        .await
    }

    async fn complete_with_schema(
        &self,
        request: LlmRequest,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete_with_schema", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            let schema = schema.clone();
            async move { inner.complete_with_schema(request, &schema).await }
        })
        .await
    }

    async fn complete_with_tools(
        &self,
        request: LlmRequest,
        tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete_with_tools", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            let tools = tools.clone();
            async move { inner.complete_with_tools(request, tools).await }
        })
        .await
    }

    fn supports_search(&self) -> bool {
        self.inner.supports_search()
    }

    async fn complete_with_search(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete_with_search", || {
            let inner = Arc::clone(&inner);
            let request = request.clone();
            async move { inner.complete_with_search(request).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Mock provider that fails a configurable number of times per method,
    /// counts every attempt, and optionally supports grounded search.
    struct FlakyLlm {
        failures_remaining: AtomicU32,
        attempts: AtomicU32,
        error_type: LlmError,
        searchable: bool,
    }

    impl FlakyLlm {
        fn new(failure_count: u32, error: LlmError) -> Self {
            Self {
                failures_remaining: AtomicU32::new(failure_count),
                attempts: AtomicU32::new(0),
                error_type: error,
                searchable: false,
            }
        }

        fn searchable(failure_count: u32, error: LlmError) -> Self {
            Self {
                searchable: true,
                ..Self::new(failure_count, error)
            }
        }

        fn next(&self) -> Result<(), LlmError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
                Err(self.error_type.clone())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LlmPort for FlakyLlm {
        async fn complete(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            self.next()?;
            Ok(LlmResponse {
                content: "ok".to_string(),
                tool_calls: vec![],
            })
        }

        async fn complete_with_schema(
            &self,
            _request: LlmRequest,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, LlmError> {
            self.next()?;
            Ok(serde_json::json!({"ok": true}))
        }

        async fn complete_with_tools(
            &self,
            request: LlmRequest,
            _tools: Vec<ToolDefinition>,
        ) -> Result<LlmResponse, LlmError> {
            self.complete(request).await
        }

        fn supports_search(&self) -> bool {
            self.searchable
        }

        async fn complete_with_search(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            if !self.searchable {
                self.attempts.fetch_add(1, Ordering::SeqCst);
                return Err(LlmError::Unsupported("grounded search".to_string()));
            }
            self.next()?;
            Ok(LlmResponse {
                content: "grounded".to_string(),
                tool_calls: vec![],
            })
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test]
    async fn test_schema_retries_through_rate_limits() {
        let mock = Arc::new(FlakyLlm::new(2, LlmError::RateLimited("slow down".into())));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        let value = client
            .complete_with_schema(LlmRequest::default(), &serde_json::json!({"type": "object"}))
            .await
            .expect("recovers");
        assert_eq!(value["ok"], true);
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_schema_retries_on_invalid_response() {
        // A truncated body can be transient; one retry gets the real payload
        let mock = Arc::new(FlakyLlm::new(1, LlmError::InvalidResponse("eof".into())));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        let value = client
            .complete_with_schema(LlmRequest::default(), &serde_json::json!({"type": "object"}))
            .await
            .expect("recovers");
        assert_eq!(value["ok"], true);
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_schema_fails_after_exhausting_rate_limit_retries() {
        let mock = Arc::new(FlakyLlm::new(10, LlmError::RateLimited("slow down".into())));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(2));

        let result = client
            .complete_with_schema(LlmRequest::default(), &serde_json::json!({"type": "object"}))
            .await;
        assert!(matches!(result, Err(LlmError::RateLimited(_))));
        // Initial attempt plus two retries
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_errors_fail_fast() {
        let mock = Arc::new(FlakyLlm::new(
            10,
            LlmError::RequestFailed("401 Unauthorized".into()),
        ));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        let result = client.complete(LlmRequest::default()).await;
        assert!(result.is_err());
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_capability_forwarded_and_retried() {
        let mock = Arc::new(FlakyLlm::searchable(
            1,
            LlmError::RateLimited("slow down".into()),
        ));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        assert!(client.supports_search());
        let response = client
            .complete_with_search(LlmRequest::default())
            .await
            .expect("recovers");
        assert_eq!(response.content, "grounded");
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unsupported_search_is_not_retried() {
        let mock = Arc::new(FlakyLlm::new(0, LlmError::RequestFailed("unused".into())));
        let mock_ref = Arc::clone(&mock);
        let client = ResilientLlmClient::new(mock, fast_config(3));

        assert!(!client.supports_search());
        let result = client.complete_with_search(LlmRequest::default()).await;
        assert!(matches!(result, Err(LlmError::Unsupported(_))));
        // A missing capability never improves with retries
        assert_eq!(mock_ref.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retryability_classification() {
        assert!(ResilientLlmClient::is_retryable(&LlmError::RateLimited(
            "429".into()
        )));
        assert!(ResilientLlmClient::is_retryable(&LlmError::InvalidResponse(
            "truncated".into()
        )));
        assert!(ResilientLlmClient::is_retryable(&LlmError::RequestFailed(
            "connection reset".into()
        )));
        for fatal in ["401 unauthorized", "403 forbidden", "400 bad request"] {
            assert!(!ResilientLlmClient::is_retryable(&LlmError::RequestFailed(
                fatal.into()
            )));
        }
        assert!(!ResilientLlmClient::is_retryable(&LlmError::Unsupported(
            "grounded search".into()
        )));
    }

    #[test]
    fn test_backoff_growth_is_capped() {
        let client = ResilientLlmClient::new(
            Arc::new(FlakyLlm::new(0, LlmError::RequestFailed(String::new()))),
            RetryConfig {
                max_retries: 5,
                base_delay_ms: 1000,
                max_delay_ms: 4000,
                jitter_factor: 0.0,
            },
        );
        assert!(client.calculate_delay(2) > client.calculate_delay(1));
        // Exponential growth stops at the configured ceiling
        assert_eq!(client.calculate_delay(6), 4000);
    }
}
