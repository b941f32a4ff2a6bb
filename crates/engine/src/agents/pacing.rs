//! Pre-turn pacing micro-check: a fast, structured read on how this one
//! scene should be paced. Runs in parallel with outcome judgment; failures
//! are non-fatal.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use showrunner_domain::{ArcPhase, PacingBeat, PacingStrength};

use crate::agents::runtime::{object_schema, Agent};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingDirective {
    pub arc_beat: PacingBeat,
    #[serde(default)]
    pub escalation_target: f64,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub must_reference: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
    #[serde(default)]
    pub foreshadowing_hint: String,
    #[serde(default)]
    pub pacing_note: String,
    #[serde(default = "default_strength")]
    pub strength: PacingStrength,
    #[serde(default)]
    pub phase_transition: String,
}

fn default_strength() -> PacingStrength {
    PacingStrength::Suggestion
}

impl PacingDirective {
    /// Render for the writer's prompt.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Beat: {:?} | Tone: {} | Escalate to {:.0}% | Strength: {:?}",
            self.arc_beat,
            self.tone,
            self.escalation_target * 100.0,
            self.strength,
        );
        if !self.must_reference.is_empty() {
            out.push_str(&format!("\nMust reference: {}", self.must_reference.join(", ")));
        }
        if !self.avoid.is_empty() {
            out.push_str(&format!("\nAvoid: {}", self.avoid.join(", ")));
        }
        if !self.foreshadowing_hint.is_empty() {
            out.push_str(&format!("\nForeshadow subtly: {}", self.foreshadowing_hint));
        }
        if !self.pacing_note.is_empty() {
            out.push_str(&format!("\nNote: {}", self.pacing_note));
        }
        if !self.phase_transition.is_empty() {
            out.push_str(&format!("\nPhase transition: {}", self.phase_transition));
        }
        out
    }
}

pub struct PacingAgent {
    agent: Agent<PacingDirective>,
}

impl PacingAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            // Fast model, short timeout: the pipeline never waits long on pacing
            agent: Agent::new(AgentKey::Pacing, schema(), manager)
                .with_timeout(Duration::from_secs(15)),
        }
    }

    /// Run the micro-check. Returns None on failure; pacing is advisory.
    pub async fn check(
        &self,
        player_input: &str,
        intent_summary: &str,
        director_notes: &str,
        arc_phase: ArcPhase,
        tension_level: f64,
        situation: &str,
        recent_summary: &str,
        turns_in_phase: i64,
    ) -> Option<PacingDirective> {
        let stalled = turns_in_phase > arc_phase.stall_threshold();
        let context = format!(
            "PLAYER INPUT:\n{player_input}\n\nINTENT: {intent_summary}\n\n\
             ARC STATE: phase={}, tension={tension_level:.2}, turns_in_phase={turns_in_phase}\
             {}\n\nSITUATION:\n{situation}\n\nDIRECTOR NOTES:\n{}\n\nRECENT TURNS:\n{}",
            arc_phase,
            if stalled {
                "\nTHE PHASE HAS STALLED past its threshold — escalate directive strength to override."
            } else {
                ""
            },
            if director_notes.is_empty() {
                "(No director notes yet)"
            } else {
                director_notes
            },
            if recent_summary.is_empty() {
                "(First turns)"
            } else {
                recent_summary
            },
        );

        match self.agent.call(context).await {
            Ok(mut directive) => {
                // Stall gate is mechanical: don't trust the model to escalate
                if stalled {
                    directive.strength = PacingStrength::Override;
                }
                Some(directive)
            }
            Err(e) => {
                tracing::error!(error = %e, "pacing micro-check failed (non-fatal)");
                None
            }
        }
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            (
                "arc_beat",
                serde_json::json!({
                    "type": "string",
                    "enum": ["setup", "rising", "escalation", "climax", "falling", "resolution", "transition"],
                }),
            ),
            (
                "escalation_target",
                serde_json::json!({"type": "number", "minimum": 0.0, "maximum": 1.0}),
            ),
            ("tone", serde_json::json!({"type": "string"})),
            ("must_reference", serde_json::json!({"type": "array", "items": {"type": "string"}})),
            ("avoid", serde_json::json!({"type": "array", "items": {"type": "string"}})),
            ("foreshadowing_hint", serde_json::json!({"type": "string"})),
            ("pacing_note", serde_json::json!({"type": "string"})),
            (
                "strength",
                serde_json::json!({"type": "string", "enum": ["suggestion", "strong", "override"]}),
            ),
            ("phase_transition", serde_json::json!({"type": "string"})),
        ],
        &["arc_beat", "escalation_target", "tone"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;

    fn manager(scripted: ScriptedLlm) -> Arc<ProviderManager> {
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");
        manager
    }

    fn directive_json() -> serde_json::Value {
        serde_json::json!({
            "arc_beat": "rising",
            "escalation_target": 0.6,
            "tone": "tense",
            "strength": "suggestion",
        })
    }

    #[tokio::test]
    async fn test_stalled_phase_forces_override_strength() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(directive_json());
        let agent = PacingAgent::new(manager(scripted));

        let directive = agent
            .check(
                "I wait",
                "EXPLORATION: wait",
                "",
                ArcPhase::Climax,
                0.8,
                "standoff",
                "",
                // climax stall threshold is 5
                6,
            )
            .await
            .expect("directive");
        assert_eq!(directive.strength, PacingStrength::Override);
    }

    #[tokio::test]
    async fn test_unstalled_keeps_model_strength() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(directive_json());
        let agent = PacingAgent::new(manager(scripted));

        let directive = agent
            .check("I wait", "EXPLORATION: wait", "", ArcPhase::Climax, 0.8, "standoff", "", 2)
            .await
            .expect("directive");
        assert_eq!(directive.strength, PacingStrength::Suggestion);
    }

    #[test]
    fn test_render_includes_directive_fields() {
        let directive = PacingDirective {
            arc_beat: PacingBeat::Escalation,
            escalation_target: 0.7,
            tone: "tense".into(),
            must_reference: vec!["Mia's promise".into()],
            avoid: vec![],
            foreshadowing_hint: "the cracked mask".into(),
            pacing_note: "end on the drawn blade".into(),
            strength: PacingStrength::Strong,
            phase_transition: String::new(),
        };
        let rendered = directive.render();
        assert!(rendered.contains("Mia's promise"));
        assert!(rendered.contains("cracked mask"));
        assert!(rendered.contains("70%"));
    }
}
