//! Batch relationship analysis for every NPC present in a turn.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::runtime::{object_schema, Agent};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDelta {
    pub npc_name: String,
    #[serde(default)]
    pub affinity_delta: i32,
    #[serde(default)]
    pub emotional_milestone: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BatchOutput {
    #[serde(default)]
    results: Vec<RelationshipDelta>,
}

pub struct RelationshipAnalyzer {
    agent: Agent<BatchOutput>,
}

impl RelationshipAnalyzer {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Relationship, schema(), manager),
        }
    }

    /// One call for all present NPCs. Deltas are clamped to the schema range
    /// on the way out; failures return an empty batch (no drift this turn).
    pub async fn analyze_batch(
        &self,
        npc_names: &[String],
        action: &str,
        outcome: &str,
        narrative_excerpt: &str,
    ) -> Vec<RelationshipDelta> {
        if npc_names.is_empty() {
            return Vec::new();
        }
        let context = format!(
            "NPCS PRESENT: {}\n\nPLAYER ACTION:\n{action}\n\nOUTCOME:\n{outcome}\n\n\
             NARRATIVE EXCERPT:\n{narrative_excerpt}",
            npc_names.join(", "),
        );
        let mut output = self
            .agent
            .call_or_default(context, BatchOutput::default())
            .await;
        for delta in &mut output.results {
            delta.affinity_delta = delta.affinity_delta.clamp(-10, 10);
        }
        output.results
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[(
            "results",
            serde_json::json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "npc_name": {"type": "string"},
                        "affinity_delta": {"type": "integer", "minimum": -10, "maximum": 10},
                        "emotional_milestone": {"type": ["string", "null"]},
                        "reasoning": {"type": "string"},
                    },
                    "required": ["npc_name", "affinity_delta"],
                },
            }),
        )],
        &["results"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;

    #[tokio::test]
    async fn test_batch_clamps_deltas() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(serde_json::json!({
            "results": [
                {"npc_name": "Mia", "affinity_delta": 99, "emotional_milestone": "first_trust_test", "reasoning": "you saved her"},
                {"npc_name": "Kaz", "affinity_delta": -1, "reasoning": "you haggled hard"},
            ],
        }));
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");

        let analyzer = RelationshipAnalyzer::new(manager);
        let results = analyzer
            .analyze_batch(
                &["Mia".to_string(), "Kaz".to_string()],
                "shielded Mia from the blast",
                "success",
                "You take the hit meant for her.",
            )
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].affinity_delta, 10);
        assert_eq!(results[0].emotional_milestone.as_deref(), Some("first_trust_test"));
        assert_eq!(results[1].affinity_delta, -1);
    }

    #[tokio::test]
    async fn test_empty_npc_list_skips_call() {
        let manager = Arc::new(ProviderManager::new());
        let analyzer = RelationshipAnalyzer::new(manager.clone());
        let results = analyzer.analyze_batch(&[], "wave", "success", "…").await;
        assert!(results.is_empty());
        assert_eq!(manager.total_calls(), 0);
    }
}
