//! "Previously on..." generation for resumed sessions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::ArcSummary;

use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecapOutput {
    pub recap_text: String,
    #[serde(default)]
    pub key_threads: Vec<String>,
}

impl RecapOutput {
    /// Render the block prepended to the first turn's narrative.
    pub fn render(&self) -> String {
        let mut block = format!("---\n\n**Previously On...**\n\n{}\n\n", self.recap_text);
        if !self.key_threads.is_empty() {
            block.push_str(&format!(
                "**Active Threads:** {}\n\n",
                self.key_threads.join(" • ")
            ));
        }
        block.push_str("---\n\n");
        block
    }
}

pub struct RecapAgent {
    agent: Agent<RecapOutput>,
}

impl RecapAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Recap, schema(), manager),
        }
    }

    pub async fn generate_recap(
        &self,
        arc_history: &[ArcSummary],
        narrative_beats: &[String],
        director_notes: &str,
        current_situation: &str,
        character_name: &str,
        arc_phase: &str,
    ) -> Result<RecapOutput, AgentError> {
        let history = arc_history
            .iter()
            .map(|a| format!("- {} (concluded turn {}): {}", a.name, a.concluded_turn, a.summary))
            .collect::<Vec<_>>()
            .join("\n");
        let beats = narrative_beats
            .iter()
            .map(|b| format!("- {b}"))
            .collect::<Vec<_>>()
            .join("\n");
        let context = format!(
            "PROTAGONIST: {character_name}\nCURRENT ARC PHASE: {arc_phase}\n\n\
             ARC HISTORY:\n{}\n\nKEY NARRATIVE BEATS:\n{}\n\n\
             DIRECTOR NOTES:\n{director_notes}\n\nCURRENT SITUATION:\n{current_situation}",
            if history.is_empty() { "(none)" } else { &history },
            if beats.is_empty() { "(none)" } else { &beats },
        );
        self.agent.call(context).await
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            ("recap_text", serde_json::json!({"type": "string"})),
            (
                "key_threads",
                serde_json::json!({"type": "array", "items": {"type": "string"}}),
            ),
        ],
        &["recap_text"],
    )
}
