//! Intent classification: the first agent on every turn, and the cheapest.
//! Its epicness score gates how much retrieval and judgment the turn buys.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::{IntentKind, SpecialCondition};

use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentOutput {
    pub intent: IntentKind,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub declared_epicness: f64,
    #[serde(default)]
    pub special_conditions: Vec<SpecialCondition>,
}

impl IntentOutput {
    /// Fallback when classification fails outright: treat as a plain action.
    pub fn fallback(player_input: &str) -> Self {
        Self {
            intent: IntentKind::Other,
            action: player_input.to_string(),
            target: None,
            declared_epicness: 0.3,
            special_conditions: Vec::new(),
        }
    }

    /// "COMBAT: strike the goblin", used in downstream prompts.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.intent.as_str(), self.action)
    }
}

pub struct IntentClassifier {
    agent: Agent<IntentOutput>,
}

impl IntentClassifier {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Intent, schema(), manager),
        }
    }

    pub async fn classify(
        &self,
        player_input: &str,
        situation: &str,
        character_state: &str,
        location: &str,
    ) -> Result<IntentOutput, AgentError> {
        let context = format!(
            "PLAYER INPUT:\n{player_input}\n\nCURRENT SITUATION:\n{situation}\n\n\
             CHARACTER STATE:\n{character_state}\n\nLOCATION:\n{location}"
        );
        self.agent.call(context).await
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            (
                "intent",
                serde_json::json!({
                    "type": "string",
                    "enum": [
                        "COMBAT", "SOCIAL", "EXPLORATION", "ABILITY", "INVENTORY",
                        "WORLD_BUILDING", "META_FEEDBACK", "OVERRIDE_COMMAND",
                        "OP_COMMAND", "OTHER"
                    ],
                }),
            ),
            ("action", serde_json::json!({"type": "string"})),
            ("target", serde_json::json!({"type": ["string", "null"]})),
            (
                "declared_epicness",
                serde_json::json!({"type": "number", "minimum": 0.0, "maximum": 1.0}),
            ),
            (
                "special_conditions",
                serde_json::json!({
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": ["named_attack", "first_time_power", "transformation", "emotional_climax"],
                    },
                }),
            ),
        ],
        &["intent", "action", "declared_epicness"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;

    #[tokio::test]
    async fn test_classify_parses_wire_format() {
        let scripted = ScriptedLlm::new();
        scripted.push_json(serde_json::json!({
            "intent": "COMBAT",
            "action": "strike the goblin with my sword",
            "target": "goblin",
            "declared_epicness": 0.5,
            "special_conditions": [],
        }));
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");

        let classifier = IntentClassifier::new(manager);
        let output = classifier
            .classify("I strike the goblin", "ambushed", "Rin, T8", "forest road")
            .await
            .expect("classifies");
        assert_eq!(output.intent, IntentKind::Combat);
        assert_eq!(output.target.as_deref(), Some("goblin"));
        assert_eq!(output.summary(), "COMBAT: strike the goblin with my sword");
    }

    #[test]
    fn test_fallback_is_conservative() {
        let fallback = IntentOutput::fallback("do the thing");
        assert_eq!(fallback.intent, IntentKind::Other);
        assert!(fallback.special_conditions.is_empty());
    }
}
