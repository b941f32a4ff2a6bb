//! World-building arbitration: validating player assertions about the world,
//! and mining the writer's narrative for new entities.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Npc,
    Item,
    Location,
    Faction,
    Event,
    Ability,
    Relationship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Accepted,
    NeedsClarification,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldBuildingEntity {
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub details: serde_json::Value,
    #[serde(default)]
    pub implied_backstory: Option<String>,
    #[serde(default = "default_true")]
    pub is_new: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldBuildingOutput {
    #[serde(default)]
    pub entities: Vec<WorldBuildingEntity>,
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub clarification_question: Option<String>,
    #[serde(default)]
    pub power_creep_warning: bool,
    #[serde(default)]
    pub canon_conflict: bool,
    #[serde(default)]
    pub narrative_integration: Option<String>,
}

impl WorldBuildingOutput {
    /// Empty accepted output: extraction found nothing.
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            validation_status: ValidationStatus::Accepted,
            rejection_reason: None,
            clarification_question: None,
            power_creep_warning: false,
            canon_conflict: false,
            narrative_integration: None,
        }
    }
}

pub struct WorldBuilderAgent {
    agent: Agent<WorldBuildingOutput>,
}

impl WorldBuilderAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::WorldBuilder, schema(), manager),
        }
    }

    /// Validate a player assertion against canon modes, tier, and
    /// established facts. `canon_reference` carries wiki lore retrieved for
    /// grounding, when available.
    pub async fn validate(
        &self,
        player_input: &str,
        character_context: &str,
        timeline_mode: &str,
        canon_cast_mode: &str,
        event_fidelity: &str,
        power_tier: &str,
        established_facts: &str,
        canon_reference: &str,
    ) -> Result<WorldBuildingOutput, AgentError> {
        let mut context = format!(
            "MODE: validate\n\n## Player Action\n{player_input}\n\n## Character Context\n{character_context}\n\n\
             ## Canonicality Rules\n- Timeline Mode: {timeline_mode}\n- Canon Cast Mode: {canon_cast_mode}\n\
             - Event Fidelity: {event_fidelity}\n\n## Character Power Tier\n{power_tier}\n\n\
             ## Established World Facts\n{}",
            if established_facts.is_empty() {
                "No specific facts established yet."
            } else {
                established_facts
            },
        );
        if !canon_reference.is_empty() {
            context.push_str(&format!(
                "\n\n## Canon Reference (from wiki)\nUse this to judge consistency with \
                 established lore.\n{canon_reference}"
            ));
        }
        context.push_str("\n\nExtract and validate any world-building assertions in this player action.");
        self.agent.call(context).await
    }

    /// Mine a DM narrative for named entities. The writer is authoritative:
    /// no validation, always accepted.
    pub async fn extract_only(&self, narrative: &str) -> Result<WorldBuildingOutput, AgentError> {
        let context = format!(
            "MODE: extract_only\n\n## DM Narrative (authoritative — do not validate)\n{narrative}\n\n\
             Extract ONLY entities with proper names: NPCs, locations, factions, and items the \
             character actually ACQUIRED this scene. Return accepted."
        );
        let mut output = self.agent.call(context).await?;
        // The writer is authoritative regardless of what the model said
        output.validation_status = ValidationStatus::Accepted;
        output.rejection_reason = None;
        output.clarification_question = None;
        Ok(output)
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            (
                "entities",
                serde_json::json!({
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "entity_type": {
                                "type": "string",
                                "enum": ["npc", "item", "location", "faction", "event", "ability", "relationship"],
                            },
                            "name": {"type": "string"},
                            "details": {"type": "object"},
                            "implied_backstory": {"type": ["string", "null"]},
                            "is_new": {"type": "boolean"},
                        },
                        "required": ["entity_type", "name"],
                    },
                }),
            ),
            (
                "validation_status",
                serde_json::json!({"type": "string", "enum": ["accepted", "needs_clarification", "rejected"]}),
            ),
            ("rejection_reason", serde_json::json!({"type": ["string", "null"]})),
            ("clarification_question", serde_json::json!({"type": ["string", "null"]})),
            ("power_creep_warning", serde_json::json!({"type": "boolean"})),
            ("canon_conflict", serde_json::json!({"type": "boolean"})),
            ("narrative_integration", serde_json::json!({"type": ["string", "null"]})),
        ],
        &["validation_status"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;

    fn builder(scripted: ScriptedLlm) -> WorldBuilderAgent {
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");
        WorldBuilderAgent::new(manager)
    }

    #[tokio::test]
    async fn test_extract_only_forces_accepted() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(serde_json::json!({
            "entities": [
                {"entity_type": "npc", "name": "Doran", "is_new": true},
            ],
            "validation_status": "rejected",
            "rejection_reason": "should be ignored",
        }));
        let builder = builder(scripted);
        let output = builder
            .extract_only("Doran the smith hands you the reforged blade.")
            .await
            .expect("extracts");
        assert_eq!(output.validation_status, ValidationStatus::Accepted);
        assert!(output.rejection_reason.is_none());
        assert_eq!(output.entities[0].name, "Doran");
    }

    #[tokio::test]
    async fn test_validate_passes_canonicality() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(serde_json::json!({
            "entities": [],
            "validation_status": "needs_clarification",
            "clarification_question": "Which uncle?",
        }));
        let seen = scripted.clone();
        let builder = builder(scripted);
        let output = builder
            .validate(
                "My uncle owns this shop",
                "Rin, T10",
                "flexible",
                "canon_adjacent",
                "loose",
                "T10",
                "",
                "",
            )
            .await
            .expect("validates");
        assert_eq!(output.validation_status, ValidationStatus::NeedsClarification);
        let request = seen.seen_requests().pop().expect("request");
        assert!(request.contains("Timeline Mode: flexible"));
    }
}
