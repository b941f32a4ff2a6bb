//! Composition root: wires providers, stores, and agents into an
//! [`Orchestrator`], and the registry the HTTP collaborator swaps
//! orchestrators through on profile change or full reset.

use std::sync::Arc;

use dashmap::DashMap;

use showrunner_domain::{LoreChunk, NarrativeProfile, ProfileId};

use crate::agents::combat::CombatAgent;
use crate::agents::director::DirectorAgent;
use crate::agents::intent::IntentClassifier;
use crate::agents::memory_ranker::MemoryRanker;
use crate::agents::outcome::OutcomeJudge;
use crate::agents::overrides::OverrideHandler;
use crate::agents::pacing::PacingAgent;
use crate::agents::progression::ProgressionAgent;
use crate::agents::recap::RecapAgent;
use crate::agents::relationship::RelationshipAnalyzer;
use crate::agents::validator::ValidatorAgent;
use crate::agents::world_builder::WorldBuilderAgent;
use crate::agents::writer::NarrativeWriter;
use crate::config::EngineConfig;
use crate::context::lore::ProfileLibrary;
use crate::context::memory::MemoryStore;
use crate::context::rules::RuleLibrary;
use crate::context::selector::ContextSelector;
use crate::infrastructure::clock::{SystemClock, SystemRandom};
use crate::infrastructure::persistence::{open_pool, StateStore};
use crate::infrastructure::ports::{
    ClockPort, EmbeddingPort, LlmPort, NoPortraits, PortraitPort, RandomPort,
};
use crate::infrastructure::providers::{
    AnthropicClient, HashEmbedder, OllamaClient, OpenAiClient, OpenAiEmbedder,
};
use crate::infrastructure::resilient::{ResilientLlmClient, RetryConfig};
use crate::infrastructure::router::{AgentKey, ProviderKind, ProviderManager};
use crate::orchestrator::foreshadow::ForeshadowingLedger;
use crate::orchestrator::{EngineError, Orchestrator, Parts};

/// Wire up tracing the way the engine expects (env-filtered, compact).
/// Call once at process start.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("showrunner_engine=info,sqlx=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init();
}

pub struct EngineBuilder {
    config: EngineConfig,
    profile: NarrativeProfile,
    lore: Vec<LoreChunk>,
    providers: Vec<(ProviderKind, Arc<dyn LlmPort>, usize)>,
    embedder: Option<Arc<dyn EmbeddingPort>>,
    portraits: Option<Arc<dyn PortraitPort>>,
    clock: Option<Arc<dyn ClockPort>>,
    rng: Option<Arc<dyn RandomPort>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig, profile: NarrativeProfile) -> Self {
        Self {
            config,
            profile,
            lore: Vec::new(),
            providers: Vec::new(),
            embedder: None,
            portraits: None,
            clock: None,
            rng: None,
        }
    }

    /// Lore chunks to (re-)install for this profile.
    pub fn with_lore(mut self, lore: Vec<LoreChunk>) -> Self {
        self.lore = lore;
        self
    }

    /// Register a provider explicitly (tests register scripted ones).
    pub fn with_provider(
        mut self,
        kind: ProviderKind,
        port: Arc<dyn LlmPort>,
        max_concurrency: usize,
    ) -> Self {
        self.providers.push((kind, port, max_concurrency));
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingPort>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_portraits(mut self, portraits: Arc<dyn PortraitPort>) -> Self {
        self.portraits = Some(portraits);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn ClockPort>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn RandomPort>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Register the real providers the config enables, each behind the retry
    /// wrapper.
    fn register_env_providers(&mut self) {
        let retry = RetryConfig::default();
        if self.config.anthropic.enabled {
            self.providers.push((
                ProviderKind::Anthropic,
                Arc::new(ResilientLlmClient::new(
                    Arc::new(AnthropicClient::from_env()),
                    retry.clone(),
                )),
                self.config.anthropic.max_concurrency,
            ));
        }
        if self.config.openai.enabled {
            self.providers.push((
                ProviderKind::OpenAi,
                Arc::new(ResilientLlmClient::new(
                    Arc::new(OpenAiClient::from_env()),
                    retry.clone(),
                )),
                self.config.openai.max_concurrency,
            ));
        }
        if self.config.ollama.enabled {
            self.providers.push((
                ProviderKind::Ollama,
                Arc::new(ResilientLlmClient::new(
                    Arc::new(OllamaClient::from_env()),
                    retry,
                )),
                self.config.ollama.max_concurrency,
            ));
        }
    }

    pub async fn build(mut self) -> Result<Orchestrator, EngineError> {
        if self.providers.is_empty() {
            self.register_env_providers();
        }

        let pool = open_pool(&self.config.database_url)
            .await
            .map_err(|e| EngineError::Repo(e.into()))?;

        let clock: Arc<dyn ClockPort> = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let rng: Arc<dyn RandomPort> = self.rng.unwrap_or_else(|| Arc::new(SystemRandom::new()));
        let embedder: Arc<dyn EmbeddingPort> = self.embedder.unwrap_or_else(|| {
            if std::env::var("OPENAI_API_KEY").is_ok() {
                Arc::new(OpenAiEmbedder::from_env())
            } else {
                // Offline fallback: deterministic hashing embedder
                Arc::new(HashEmbedder::default())
            }
        });
        let portraits: Arc<dyn PortraitPort> =
            self.portraits.unwrap_or_else(|| Arc::new(NoPortraits));

        let manager = Arc::new(ProviderManager::new());
        for (kind, port, max_concurrency) in self.providers {
            manager.register_provider(kind, port, max_concurrency);
        }
        let (default_provider, default_model) = self.config.default_route.clone();
        manager.set_default_route(default_provider, default_model);
        for (key, provider, model) in &self.config.routes {
            manager.set_route(*key, *provider, model.clone());
        }

        let profile_id = self.profile.id.clone();
        let campaign_id = StateStore::get_or_create_campaign(
            &pool,
            &profile_id,
            &format!("{} Campaign", self.profile.name),
            clock.as_ref(),
        )
        .await?;
        let store = Arc::new(StateStore::new(pool.clone(), campaign_id, clock.clone()));

        let memory = Arc::new(MemoryStore::new(
            pool.clone(),
            format!("campaign_{campaign_id}"),
            embedder.clone(),
            manager.clone(),
            clock.clone(),
        ));
        let rules = Arc::new(RuleLibrary::open(pool.clone(), embedder.clone()).await?);
        let lore = Arc::new(ProfileLibrary::new(pool, embedder));
        if !self.lore.is_empty() {
            lore.install_profile(&profile_id, &self.lore).await?;
        }

        let selector = ContextSelector::new(
            memory.clone(),
            rules.clone(),
            lore.clone(),
            MemoryRanker::new(manager.clone()),
        );
        let foreshadowing = ForeshadowingLedger::load(store.clone()).await?;
        let overrides = OverrideHandler::new(store.clone(), memory.clone(), clock.clone());

        let parts = Parts {
            intent: IntentClassifier::new(manager.clone()),
            outcome: OutcomeJudge::new(manager.clone()),
            pacing: PacingAgent::new(manager.clone()),
            validator: ValidatorAgent::new(manager.clone()),
            writer: NarrativeWriter::new(manager.clone(), self.profile.clone()),
            combat: CombatAgent::new(rng),
            progression: ProgressionAgent::new(manager.clone(), rules.clone()),
            director: DirectorAgent::new(manager.clone()),
            relationship: RelationshipAnalyzer::new(manager.clone()),
            world_builder: WorldBuilderAgent::new(manager.clone()),
            recap: RecapAgent::new(manager.clone()),
            overrides,
            foreshadowing,
            portraits,
            clock,
            selector,
            manager,
            memory,
            rules,
            lore,
            store,
            profile_id,
            profile: self.profile,
            bg_lock: Arc::new(tokio::sync::Mutex::new(())),
            recap_generated: std::sync::atomic::AtomicBool::new(false),
            last_composition: std::sync::Mutex::new(
                showrunner_domain::CompositionMode::Standard,
            ),
        };

        Ok(Orchestrator::from_parts(parts))
    }
}

/// Orchestrator registry, keyed by profile. The HTTP layer swaps entries on
/// profile change and clears on full reset. No module-level singletons.
#[derive(Default)]
pub struct EngineRegistry {
    orchestrators: DashMap<ProfileId, Orchestrator>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile_id: ProfileId, orchestrator: Orchestrator) {
        self.orchestrators.insert(profile_id, orchestrator);
    }

    pub fn get(&self, profile_id: &ProfileId) -> Option<Orchestrator> {
        self.orchestrators.get(profile_id).map(|o| o.clone())
    }

    pub fn remove(&self, profile_id: &ProfileId) -> Option<Orchestrator> {
        self.orchestrators.remove(profile_id).map(|(_, o)| o)
    }

    /// Full reset: drop every orchestrator.
    pub fn clear(&self) {
        self.orchestrators.clear();
    }

    pub fn len(&self) -> usize {
        self.orchestrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orchestrators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ScriptedLlm;

    fn test_config() -> EngineConfig {
        EngineConfig {
            database_url: "sqlite::memory:".to_string(),
            anthropic: crate::config::ProviderSettings {
                enabled: false,
                max_concurrency: 1,
            },
            openai: crate::config::ProviderSettings {
                enabled: false,
                max_concurrency: 1,
            },
            ollama: crate::config::ProviderSettings {
                enabled: true,
                max_concurrency: 2,
            },
            default_route: (ProviderKind::Ollama, "test-model".to_string()),
            routes: vec![],
        }
    }

    #[tokio::test]
    async fn test_builder_wires_an_orchestrator() {
        let profile = NarrativeProfile::new(ProfileId::from("test_show"), "Test Show");
        let orchestrator = EngineBuilder::new(test_config(), profile)
            .with_provider(ProviderKind::Ollama, Arc::new(ScriptedLlm::new()), 2)
            .with_embedder(Arc::new(HashEmbedder::default()))
            .build()
            .await
            .expect("builds");
        // Campaign was created and is stable across rebuilds of the same profile
        let campaign_id = orchestrator.campaign_id();
        assert!(!campaign_id.to_string().is_empty());
    }

    #[tokio::test]
    async fn test_registry_swap_and_reset() {
        let registry = EngineRegistry::new();
        let profile_id = ProfileId::from("test_show");
        let profile = NarrativeProfile::new(profile_id.clone(), "Test Show");
        let orchestrator = EngineBuilder::new(test_config(), profile)
            .with_provider(ProviderKind::Ollama, Arc::new(ScriptedLlm::new()), 2)
            .with_embedder(Arc::new(HashEmbedder::default()))
            .build()
            .await
            .expect("builds");

        registry.insert(profile_id.clone(), orchestrator);
        assert!(registry.get(&profile_id).is_some());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get(&profile_id).is_none());
    }
}
