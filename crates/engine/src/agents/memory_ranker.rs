//! LLM reranking of memory candidates against the live situation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agents::runtime::{object_schema, Agent};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMemory {
    pub index: usize,
    pub rank_score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankerOutput {
    #[serde(default)]
    pub rankings: Vec<RankedMemory>,
}

pub struct MemoryRanker {
    agent: Agent<RankerOutput>,
}

impl MemoryRanker {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::MemoryRanker, schema(), manager)
                .with_timeout(Duration::from_secs(15)),
        }
    }

    /// Score each candidate's relevance to the situation, 0.0..=1.0. On any
    /// failure, every candidate keeps a neutral passing score; reranking is
    /// an optimization, never a gate on the turn.
    pub async fn rank(&self, situation: &str, candidates: &[String]) -> Vec<f64> {
        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{i}] {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        let context =
            format!("CURRENT SITUATION:\n{situation}\n\nCANDIDATE MEMORIES:\n{listing}");

        let neutral = vec![0.5; candidates.len()];
        let output = self
            .agent
            .call_or_default(context, RankerOutput::default())
            .await;
        if output.rankings.is_empty() {
            return neutral;
        }

        let mut scores = vec![0.5; candidates.len()];
        for ranking in output.rankings {
            if ranking.index < scores.len() {
                scores[ranking.index] = ranking.rank_score.clamp(0.0, 1.0);
            }
        }
        scores
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[(
            "rankings",
            serde_json::json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "index": {"type": "integer", "minimum": 0},
                        "rank_score": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                    },
                    "required": ["index", "rank_score"],
                },
            }),
        )],
        &["rankings"],
    )
}
