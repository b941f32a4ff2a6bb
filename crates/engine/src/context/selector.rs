//! Context assembly for a turn: intent-tiered memory retrieval,
//! multi-query decomposition, plot-critical forcing, lore filtering, and
//! conditional LLM reranking.

use std::sync::Arc;

use showrunner_domain::{IntentKind, MemoryKind, PageType, ProfileId};

use crate::agents::intent::IntentOutput;
use crate::agents::memory_ranker::MemoryRanker;
use crate::context::lore::ProfileLibrary;
use crate::context::memory::{MemoryStore, SearchOptions};
use crate::context::rules::RuleLibrary;
use crate::infrastructure::persistence::GameContext;
use crate::infrastructure::ports::RepoError;

/// Keep-threshold on LLM rank scores.
const RANK_KEEP_THRESHOLD: f64 = 0.4;
/// Memories surviving the rerank.
const RANK_KEEP_LIMIT: usize = 5;
/// Plot-critical force-include cap.
const CRITICAL_INCLUDE_LIMIT: usize = 3;

/// A memory candidate surviving merge/dedup, pre-rerank.
#[derive(Debug, Clone)]
pub struct MemoryCandidate {
    pub content: String,
    pub kind: MemoryKind,
    pub score: f32,
    pub plot_critical: bool,
}

/// Everything the base retrieval pass produces for a turn.
#[derive(Debug, Default)]
pub struct RetrievedContext {
    pub raw_memories: Vec<MemoryCandidate>,
    pub rules: String,
    pub lore: String,
}

pub struct ContextSelector {
    memory: Arc<MemoryStore>,
    rules: Arc<RuleLibrary>,
    lore: Arc<ProfileLibrary>,
    ranker: MemoryRanker,
}

impl ContextSelector {
    pub fn new(
        memory: Arc<MemoryStore>,
        rules: Arc<RuleLibrary>,
        lore: Arc<ProfileLibrary>,
        ranker: MemoryRanker,
    ) -> Self {
        Self {
            memory,
            rules,
            lore,
            ranker,
        }
    }

    /// Trivial actions skip retrieval, judgment, ranking, and pacing.
    pub fn is_trivial_action(&self, intent: &IntentOutput) -> bool {
        intent.declared_epicness < 0.2
            && !matches!(
                intent.intent,
                IntentKind::Combat | IntentKind::Ability | IntentKind::Social
            )
            && intent.special_conditions.is_empty()
    }

    /// Memory candidate count by intent tier: 0 (trivial), 3 (mundane),
    /// 6 (normal), 9 (dramatic). Boundaries are inclusive.
    pub fn memory_tier(&self, intent: &IntentOutput) -> usize {
        if self.is_trivial_action(intent) {
            return 0;
        }
        let mut tier = if intent.declared_epicness <= 0.3 {
            1
        } else if intent.declared_epicness <= 0.6 {
            2
        } else {
            3
        };
        // Combat always gets at least the normal tier
        if intent.intent == IntentKind::Combat && tier < 2 {
            tier = 2;
        }
        if !intent.special_conditions.is_empty() {
            tier = (tier + 1).min(3);
        }
        match tier {
            1 => 3,
            2 => 6,
            _ => 9,
        }
    }

    /// Base retrieval: memories (tiered), rules, and intent-filtered lore.
    pub async fn get_base_context(
        &self,
        player_input: &str,
        context: &GameContext,
        profile_id: &ProfileId,
        intent: &IntentOutput,
    ) -> Result<RetrievedContext, RepoError> {
        let memory_limit = self.memory_tier(intent);

        let raw_memories = if memory_limit > 0 {
            let queries = decompose_queries(player_input, context, intent);
            let mut merged = self.multi_query_search(&queries, memory_limit).await?;
            self.force_include_critical(&mut merged).await?;
            merged
        } else {
            Vec::new()
        };

        let rules = self
            .rules
            .relevant_rules(&format!("{player_input} {}", context.situation), 3)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "rule retrieval failed");
                String::new()
            });

        let lore = self.retrieve_lore(profile_id, context, intent).await;

        Ok(RetrievedContext {
            raw_memories,
            rules,
            lore,
        })
    }

    async fn multi_query_search(
        &self,
        queries: &[String],
        total_limit: usize,
    ) -> Result<Vec<MemoryCandidate>, RepoError> {
        let per_query = (total_limit / queries.len().max(1) + 1).max(3);
        let mut all = Vec::new();
        for query in queries {
            let query = query.trim();
            if query.is_empty() {
                continue;
            }
            let hits = self
                .memory
                .search(
                    query,
                    SearchOptions {
                        limit: per_query,
                        ..Default::default()
                    },
                )
                .await?;
            all.extend(hits.into_iter().map(|h| MemoryCandidate {
                plot_critical: h.record.is_plot_critical(),
                content: h.record.content,
                kind: h.record.kind,
                score: h.score,
            }));
        }

        // Dedup by first 100 chars of content; higher score wins
        let mut deduped: Vec<MemoryCandidate> = Vec::new();
        for candidate in all {
            let key: String = candidate.content.chars().take(100).collect();
            match deduped
                .iter_mut()
                .find(|c| c.content.chars().take(100).collect::<String>() == key)
            {
                Some(existing) => {
                    if candidate.score > existing.score {
                        *existing = candidate;
                    }
                }
                None => deduped.push(candidate),
            }
        }
        deduped.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        deduped.truncate(total_limit);
        Ok(deduped)
    }

    /// Plot-critical memories are always included, prepended at max score.
    async fn force_include_critical(
        &self,
        merged: &mut Vec<MemoryCandidate>,
    ) -> Result<(), RepoError> {
        let critical = self
            .memory
            .plot_critical_memories(CRITICAL_INCLUDE_LIMIT)
            .await?;
        if critical.is_empty() {
            return Ok(());
        }
        let critical_keys: Vec<String> = critical
            .iter()
            .map(|c| c.content.chars().take(100).collect())
            .collect();
        merged.retain(|m| {
            let key: String = m.content.chars().take(100).collect();
            !critical_keys.contains(&key)
        });
        let mut fused: Vec<MemoryCandidate> = critical
            .into_iter()
            .map(|record| MemoryCandidate {
                content: record.content,
                kind: record.kind,
                score: 1.0,
                plot_critical: true,
            })
            .collect();
        fused.append(merged);
        *merged = fused;
        Ok(())
    }

    async fn retrieve_lore(
        &self,
        profile_id: &ProfileId,
        context: &GameContext,
        intent: &IntentOutput,
    ) -> String {
        // Intent -> preferred page type and budget
        let (page_type, limit): (Option<PageType>, usize) = match intent.intent {
            IntentKind::Combat => (None, 3),
            IntentKind::Ability => (Some(PageType::Techniques), 3),
            IntentKind::Social => (Some(PageType::Characters), 2),
            IntentKind::Exploration => (Some(PageType::Locations), 2),
            _ => return String::new(),
        };

        let query = format!(
            "{} {} {}",
            intent.action,
            intent.target.as_deref().unwrap_or(""),
            context.situation
        );
        match self
            .lore
            .search_lore(profile_id, &query, limit, page_type)
            .await
        {
            Ok(chunks) if !chunks.is_empty() => {
                tracing::info!(
                    profile = %profile_id,
                    count = chunks.len(),
                    page_type = ?page_type,
                    "lore retrieved"
                );
                chunks.join("\n\n")
            }
            Ok(_) => String::new(),
            Err(e) => {
                tracing::error!(error = %e, "lore retrieval failed");
                String::new()
            }
        }
    }

    /// LLM reranking with conditional skip: system commands and small
    /// candidate sets go through unranked. Returns the formatted memory block
    /// for the writer.
    pub async fn rank_memories(
        &self,
        raw_memories: &[MemoryCandidate],
        situation: &str,
        intent: &IntentOutput,
    ) -> String {
        if raw_memories.is_empty() {
            return "No relevant past memories found.".to_string();
        }

        let skip_reason = if intent.intent.is_system_command() {
            Some(format!("system_command:{}", intent.intent))
        } else if raw_memories.len() <= 3 {
            Some(format!("low_candidates:{}", raw_memories.len()))
        } else {
            None
        };

        let kept: Vec<&MemoryCandidate> = match skip_reason {
            Some(reason) => {
                tracing::info!(reason = %reason, "skipping memory ranking");
                raw_memories.iter().take(RANK_KEEP_LIMIT).collect()
            }
            None => {
                let contents: Vec<String> =
                    raw_memories.iter().map(|m| m.content.clone()).collect();
                let scores = self.ranker.rank(situation, &contents).await;
                let mut scored: Vec<(&MemoryCandidate, f64)> =
                    raw_memories.iter().zip(scores).collect();
                scored.retain(|(_, score)| *score > RANK_KEEP_THRESHOLD);
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                scored
                    .into_iter()
                    .take(RANK_KEEP_LIMIT)
                    .map(|(candidate, _)| candidate)
                    .collect()
            }
        };

        if kept.is_empty() {
            return "No relevant past memories found.".to_string();
        }
        kept.iter()
            .map(|m| format!("- [{}] {}", m.kind.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Decompose an action into 2-3 targeted search queries: action-focused,
/// situation-focused, and entity-focused.
fn decompose_queries(
    player_input: &str,
    context: &GameContext,
    intent: &IntentOutput,
) -> Vec<String> {
    let mut queries = Vec::new();

    if !intent.action.is_empty() {
        queries.push(format!(
            "{} {}",
            intent.action,
            intent.target.as_deref().unwrap_or("")
        ));
    } else {
        queries.push(player_input.to_string());
    }

    if !context.situation.is_empty() {
        queries.push(context.situation.clone());
    }

    if let Some(target) = &intent.target {
        queries.push(format!("{target} relationship history"));
    } else if !context.location.is_empty() {
        queries.push(format!("{} events", context.location));
    }

    if queries.len() < 2 {
        queries.push(format!("{player_input} {}", context.situation));
    }
    queries.truncate(3);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::persistence::StateStore;
    use crate::infrastructure::providers::HashEmbedder;
    use crate::infrastructure::router::{ProviderKind, ProviderManager};
    use crate::test_fixtures::ScriptedLlm;
    use showrunner_domain::{CampaignId, Character, SpecialCondition, WorldState, FLAG_PLOT_CRITICAL};

    fn intent(kind: IntentKind, epicness: f64) -> IntentOutput {
        IntentOutput {
            intent: kind,
            action: "act".to_string(),
            target: None,
            declared_epicness: epicness,
            special_conditions: vec![],
        }
    }

    struct Fixture {
        selector: ContextSelector,
        memory: Arc<MemoryStore>,
        context: GameContext,
        profile_id: ProfileId,
    }

    async fn fixture(scripted: ScriptedLlm) -> Fixture {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 4);
        manager.set_default_route(ProviderKind::Ollama, "m");

        let embedder = Arc::new(HashEmbedder::default());
        let clock = Arc::new(SystemClock::new());
        let memory = Arc::new(MemoryStore::new(
            pool.clone(),
            "selector_test",
            embedder.clone(),
            manager.clone(),
            clock.clone(),
        ));
        let rules = Arc::new(
            RuleLibrary::open(pool.clone(), embedder.clone())
                .await
                .expect("rules"),
        );
        let lore = Arc::new(ProfileLibrary::new(pool.clone(), embedder.clone()));

        let store = StateStore::new(pool, CampaignId::new(), clock);
        store.save_character(&Character::new("Rin")).await.expect("save");
        store
            .save_world(&WorldState::new("Ramen Alley", "Mia blocks your path"))
            .await
            .expect("save");
        let context = store.get_context().await.expect("context");

        Fixture {
            selector: ContextSelector::new(memory.clone(), rules, lore, MemoryRanker::new(manager)),
            memory,
            context,
            profile_id: ProfileId::from("test"),
        }
    }

    #[tokio::test]
    async fn test_trivial_detection() {
        let f = fixture(ScriptedLlm::new()).await;
        assert!(f.selector.is_trivial_action(&intent(IntentKind::Exploration, 0.1)));
        // Combat, ability, and social always need context
        assert!(!f.selector.is_trivial_action(&intent(IntentKind::Combat, 0.1)));
        assert!(!f.selector.is_trivial_action(&intent(IntentKind::Social, 0.1)));
        // Epicness at or above 0.2 is not trivial
        assert!(!f.selector.is_trivial_action(&intent(IntentKind::Exploration, 0.2)));
        // Special conditions disqualify
        let mut flagged = intent(IntentKind::Exploration, 0.1);
        flagged.special_conditions.push(SpecialCondition::FirstTimePower);
        assert!(!f.selector.is_trivial_action(&flagged));
    }

    #[tokio::test]
    async fn test_memory_tier_boundaries_inclusive() {
        let f = fixture(ScriptedLlm::new()).await;
        // Trivial skips entirely
        assert_eq!(f.selector.memory_tier(&intent(IntentKind::Exploration, 0.1)), 0);
        // Inclusive boundaries: 0.3 is tier 1, 0.6 is tier 2
        assert_eq!(f.selector.memory_tier(&intent(IntentKind::Exploration, 0.3)), 3);
        assert_eq!(f.selector.memory_tier(&intent(IntentKind::Exploration, 0.6)), 6);
        assert_eq!(f.selector.memory_tier(&intent(IntentKind::Exploration, 0.61)), 9);
        // Combat floors at tier 2 even when mundane
        assert_eq!(f.selector.memory_tier(&intent(IntentKind::Combat, 0.25)), 6);
        // Special conditions bump one tier, capped
        let mut dramatic = intent(IntentKind::Social, 0.25);
        dramatic.special_conditions.push(SpecialCondition::EmotionalClimax);
        assert_eq!(f.selector.memory_tier(&dramatic), 6);
        let mut peak = intent(IntentKind::Combat, 0.9);
        peak.special_conditions.push(SpecialCondition::NamedAttack);
        assert_eq!(f.selector.memory_tier(&peak), 9);
    }

    #[tokio::test]
    async fn test_trivial_action_retrieves_no_memories() {
        let f = fixture(ScriptedLlm::new()).await;
        f.memory
            .add_memory(MemoryKind::Event, "Something happened once.", 1, None, vec![], None)
            .await
            .expect("insert");

        let retrieved = f
            .selector
            .get_base_context("I look around", &f.context, &f.profile_id, &intent(IntentKind::Exploration, 0.1))
            .await
            .expect("retrieval");
        assert!(retrieved.raw_memories.is_empty());
    }

    #[tokio::test]
    async fn test_plot_critical_always_included_and_first() {
        let f = fixture(ScriptedLlm::new()).await;
        f.memory
            .add_memory(
                MemoryKind::Fact,
                "The shogun's seal was stolen by a masked courier.",
                1,
                None,
                vec![FLAG_PLOT_CRITICAL.to_string()],
                None,
            )
            .await
            .expect("insert");
        f.memory
            .add_memory(MemoryKind::Event, "You ate excellent ramen at the alley stand.", 2, None, vec![], None)
            .await
            .expect("insert");

        let retrieved = f
            .selector
            .get_base_context(
                "I order ramen again",
                &f.context,
                &f.profile_id,
                &intent(IntentKind::Exploration, 0.5),
            )
            .await
            .expect("retrieval");
        assert!(retrieved.raw_memories[0].plot_critical);
        assert_eq!(retrieved.raw_memories[0].score, 1.0);
        // No duplicate of the critical memory later in the list
        let critical_count = retrieved
            .raw_memories
            .iter()
            .filter(|m| m.content.contains("shogun's seal"))
            .count();
        assert_eq!(critical_count, 1);
    }

    #[tokio::test]
    async fn test_rank_skip_for_system_commands_and_small_sets() {
        let f = fixture(ScriptedLlm::new()).await;
        let candidates = vec![
            MemoryCandidate {
                content: "a".to_string(),
                kind: MemoryKind::Event,
                score: 0.9,
                plot_critical: false,
            },
            MemoryCandidate {
                content: "b".to_string(),
                kind: MemoryKind::Event,
                score: 0.8,
                plot_critical: false,
            },
        ];
        // Small set: no ranker call
        let block = f
            .selector
            .rank_memories(&candidates, "situation", &intent(IntentKind::Exploration, 0.5))
            .await;
        assert!(block.contains("- [EVENT] a"));

        // System command: no ranker call either
        let block = f
            .selector
            .rank_memories(&candidates, "situation", &intent(IntentKind::OpCommand, 0.5))
            .await;
        assert!(block.contains("- [EVENT] b"));
    }

    #[tokio::test]
    async fn test_rank_keeps_only_above_threshold() {
        let scripted = ScriptedLlm::new();
        scripted.set_for(
            "memory relevance ranker",
            serde_json::json!({
                "rankings": [
                    {"index": 0, "rank_score": 0.9},
                    {"index": 1, "rank_score": 0.2},
                    {"index": 2, "rank_score": 0.5},
                    {"index": 3, "rank_score": 0.1},
                ],
            }),
        );
        let f = fixture(scripted).await;
        let candidates: Vec<MemoryCandidate> = (0..4)
            .map(|i| MemoryCandidate {
                content: format!("memory {i}"),
                kind: MemoryKind::Event,
                score: 0.5,
                plot_critical: false,
            })
            .collect();

        let block = f
            .selector
            .rank_memories(&candidates, "situation", &intent(IntentKind::Social, 0.5))
            .await;
        assert!(block.contains("memory 0"));
        assert!(block.contains("memory 2"));
        assert!(!block.contains("memory 1"));
        assert!(!block.contains("memory 3"));
    }

    #[tokio::test]
    async fn test_lore_filtered_by_intent() {
        let f = fixture(ScriptedLlm::new()).await;
        let lore_chunks = vec![
            showrunner_domain::LoreChunk {
                profile_id: f.profile_id.clone(),
                page_type: PageType::Techniques,
                title: "Flame Step".to_string(),
                content: "Flame Step: a burst movement technique.".to_string(),
            },
            showrunner_domain::LoreChunk {
                profile_id: f.profile_id.clone(),
                page_type: PageType::Characters,
                title: "Mia".to_string(),
                content: "Mia: rival swordswoman.".to_string(),
            },
        ];
        f.selector
            .lore
            .install_profile(&f.profile_id, &lore_chunks)
            .await
            .expect("install");

        let mut ability = intent(IntentKind::Ability, 0.5);
        ability.action = "use Flame Step technique".to_string();
        let retrieved = f
            .selector
            .get_base_context("I use Flame Step", &f.context, &f.profile_id, &ability)
            .await
            .expect("retrieval");
        assert!(retrieved.lore.contains("Flame Step"));
        assert!(!retrieved.lore.contains("rival swordswoman"));
    }
}
