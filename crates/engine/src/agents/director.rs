//! The campaign director: cross-episode planning. Runs at session startup
//! and on the background hybrid trigger, never on the critical path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::{ArcPhase, CampaignBible, NarrativeProfile, WorldState};

use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::agents::tools::ResearchToolbox;
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorOutput {
    pub arc_phase: ArcPhase,
    pub tension_level: f64,
    pub current_arc: String,
    #[serde(default)]
    pub active_foreshadowing: Vec<String>,
    #[serde(default)]
    pub director_notes: String,
    #[serde(default)]
    pub active_goals: Vec<String>,
    #[serde(default)]
    pub arc_objectives: Vec<String>,
}

pub struct DirectorAgent {
    agent: Agent<DirectorOutput>,
}

impl DirectorAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Director, schema(), manager),
        }
    }

    /// Opening briefing at gameplay handoff: plan the pilot arc from Session
    /// Zero output.
    pub async fn run_startup_briefing(
        &self,
        session_zero_summary: &str,
        profile: &NarrativeProfile,
        character_name: &str,
        character_concept: &str,
        starting_location: &str,
        op_mode_guidance: Option<&str>,
    ) -> Result<DirectorOutput, AgentError> {
        let mut context = format!(
            "STARTUP BRIEFING — plan the opening arc.\n\nSESSION ZERO SUMMARY:\n{session_zero_summary}\n\n\
             PROFILE: {} (tone: {}, genres: {})\nWORLD TIER: {}\n\n\
             PROTAGONIST: {character_name} — {character_concept}\nSTARTING LOCATION: {starting_location}",
            profile.name,
            profile.tone,
            profile.detected_genres.join(", "),
            profile.world_tier,
        );
        if let Some(guidance) = op_mode_guidance {
            context.push_str(&format!("\n\nOP MODE GUIDANCE:\n{guidance}"));
        }
        self.agent.call(context).await
    }

    /// Periodic review on the hybrid trigger. `research` grants the director
    /// the same bounded tools the writer gets; context carries everything the
    /// background pipeline already holds.
    pub async fn run_session_review(
        &self,
        bible: &CampaignBible,
        world: &WorldState,
        profile: &NarrativeProfile,
        recent_summary: &str,
        arc_events: &[String],
        spotlight_debt: &str,
        open_seeds: &str,
        op_mode_guidance: Option<&str>,
        compaction_text: &str,
        _research: Option<&ResearchToolbox>,
    ) -> Result<DirectorOutput, AgentError> {
        let mut context = format!(
            "SESSION REVIEW — update the campaign plan.\n\n\
             CURRENT ARC: {}\nARC PHASE: {} ({} turns in phase)\nTENSION: {:.2}\n\n\
             PREVIOUS DIRECTOR NOTES:\n{}\n\nACTIVE GOALS: {}\nARC OBJECTIVES: {}\n\n\
             PROFILE: {} ({})\n\nRECENT TURNS:\n{}\n\nARC EVENTS SINCE LAST REVIEW: {}\n\n\
             OPEN FORESHADOWING SEEDS:\n{}\n\nSPOTLIGHT DEBT (NPCs owed screen time):\n{}",
            bible.current_arc,
            world.arc_phase,
            world.turns_in_phase,
            world.tension_level(),
            bible.director_notes,
            bible.active_goals.join("; "),
            bible.arc_objectives.join("; "),
            profile.name,
            profile.tone,
            recent_summary,
            if arc_events.is_empty() {
                "none".to_string()
            } else {
                arc_events.join(", ")
            },
            open_seeds,
            spotlight_debt,
        );
        if let Some(guidance) = op_mode_guidance {
            context.push_str(&format!("\n\nOP MODE GUIDANCE:\n{guidance}"));
        }
        if !compaction_text.is_empty() {
            context.push_str(&format!("\n\nEARLIER THIS SESSION (compacted):\n{compaction_text}"));
        }
        self.agent.call(context).await
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            (
                "arc_phase",
                serde_json::json!({
                    "type": "string",
                    "enum": ["exposition", "rising_action", "climax", "falling_action", "resolution"],
                }),
            ),
            (
                "tension_level",
                serde_json::json!({"type": "number", "minimum": 0.0, "maximum": 1.0}),
            ),
            ("current_arc", serde_json::json!({"type": "string"})),
            (
                "active_foreshadowing",
                serde_json::json!({"type": "array", "items": {"type": "string"}}),
            ),
            ("director_notes", serde_json::json!({"type": "string"})),
            (
                "active_goals",
                serde_json::json!({"type": "array", "items": {"type": "string"}}),
            ),
            (
                "arc_objectives",
                serde_json::json!({"type": "array", "items": {"type": "string"}}),
            ),
        ],
        &["arc_phase", "tension_level", "current_arc", "director_notes"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;
    use showrunner_domain::ProfileId;

    #[tokio::test]
    async fn test_startup_briefing_parses() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(serde_json::json!({
            "arc_phase": "exposition",
            "tension_level": 0.3,
            "current_arc": "The Tournament of Ash",
            "active_foreshadowing": ["the cracked mask in the shrine"],
            "director_notes": "Introduce Mia early.",
            "active_goals": ["win the qualifiers"],
            "arc_objectives": ["establish the rival"],
        }));
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");

        let director = DirectorAgent::new(manager);
        let profile = NarrativeProfile::new(ProfileId::from("test"), "Ember Blade");
        let output = director
            .run_startup_briefing("A ronin enters the tournament.", &profile, "Rin", "wandering swordswoman", "Ramen Alley", None)
            .await
            .expect("briefing");
        assert_eq!(output.arc_phase, ArcPhase::Exposition);
        assert_eq!(output.current_arc, "The Tournament of Ash");
        assert_eq!(output.active_foreshadowing.len(), 1);
    }
}
