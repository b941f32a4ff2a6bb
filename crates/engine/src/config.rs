//! Environment-driven engine configuration.
//!
//! Everything has a workable default; `.env` files are honored via dotenvy.

use crate::infrastructure::router::{AgentKey, ProviderKind};

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Max concurrent in-flight requests against this provider.
    pub max_concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_url: String,
    pub anthropic: ProviderSettings,
    pub openai: ProviderSettings,
    pub ollama: ProviderSettings,
    /// Fallback (provider, model) for agents without an explicit route.
    pub default_route: (ProviderKind, String),
    /// Per-agent routing overrides.
    pub routes: Vec<(AgentKey, ProviderKind, String)>,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        // .env is optional; missing files are fine
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("SHOWRUNNER_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://showrunner.db?mode=rwc".to_string());

        let cap = |name: &str, default: usize| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        };

        let anthropic = ProviderSettings {
            enabled: std::env::var("ANTHROPIC_API_KEY").is_ok(),
            max_concurrency: cap("ANTHROPIC_MAX_CONCURRENCY", 4),
        };
        let openai = ProviderSettings {
            enabled: std::env::var("OPENAI_API_KEY").is_ok(),
            max_concurrency: cap("OPENAI_MAX_CONCURRENCY", 4),
        };
        let ollama = ProviderSettings {
            enabled: true, // local, always available to try
            max_concurrency: cap("OLLAMA_MAX_CONCURRENCY", 2),
        };

        // Default routing: heavyweight narrative work on Anthropic when
        // available, cheap structured extraction on the local model
        let default_route = if anthropic.enabled {
            (
                ProviderKind::Anthropic,
                std::env::var("ANTHROPIC_MODEL")
                    .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string()),
            )
        } else if openai.enabled {
            (
                ProviderKind::OpenAi,
                std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            )
        } else {
            (
                ProviderKind::Ollama,
                std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string()),
            )
        };

        let mut routes = Vec::new();
        if anthropic.enabled {
            let writer_model = std::env::var("WRITER_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-5".to_string());
            routes.push((AgentKey::Writer, ProviderKind::Anthropic, writer_model.clone()));
            routes.push((AgentKey::Director, ProviderKind::Anthropic, writer_model));
        }

        Self {
            database_url,
            anthropic,
            openai,
            ollama,
            default_route,
            routes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_has_workable_defaults() {
        let config = EngineConfig::from_env();
        assert!(!config.database_url.is_empty());
        assert!(config.ollama.enabled);
        assert!(config.ollama.max_concurrency >= 1);
    }
}
