//! Outcome judgment: should the action succeed, and how dramatically.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::{ConsequenceCategory, NarrativeWeight, SuccessLevel};

use crate::agents::intent::IntentOutput;
use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeOutput {
    pub should_succeed: bool,
    pub difficulty_class: i64,
    #[serde(default)]
    pub modifiers: HashMap<String, i64>,
    pub calculated_roll: i64,
    pub success_level: SuccessLevel,
    pub narrative_weight: NarrativeWeight,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub consequence: Option<String>,
    #[serde(default)]
    pub consequence_category: Option<ConsequenceCategory>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub target_tier: Option<String>,
}

impl OutcomeOutput {
    /// Synthesized auto-success for the trivial-action fast path: no judge
    /// call, no cost, no consequence.
    pub fn trivial_success() -> Self {
        Self {
            should_succeed: true,
            difficulty_class: 5,
            modifiers: HashMap::new(),
            calculated_roll: 15,
            success_level: SuccessLevel::Success,
            narrative_weight: NarrativeWeight::Minor,
            cost: None,
            consequence: None,
            consequence_category: None,
            reasoning: "Trivial action auto-success".to_string(),
            target_tier: None,
        }
    }

    /// Minimal failure outcome used when the writer itself fails.
    pub fn minimal_failure(reason: &str) -> Self {
        Self {
            should_succeed: false,
            difficulty_class: 10,
            modifiers: HashMap::new(),
            calculated_roll: 1,
            success_level: SuccessLevel::Failure,
            narrative_weight: NarrativeWeight::Minor,
            cost: None,
            consequence: None,
            consequence_category: None,
            reasoning: reason.to_string(),
            target_tier: None,
        }
    }
}

pub struct OutcomeJudge {
    agent: Agent<OutcomeOutput>,
}

impl OutcomeJudge {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Outcome, schema(), manager),
        }
    }

    pub async fn judge(
        &self,
        intent: &IntentOutput,
        profile_tropes: &str,
        arc_phase: &str,
        recent_events: &str,
        difficulty_context: &str,
        power_context: &str,
        correction_feedback: Option<&str>,
    ) -> Result<OutcomeOutput, AgentError> {
        let intent_json = serde_json::to_string(intent).unwrap_or_default();
        let mut context = format!(
            "ACTION: {}\nTARGET: {}\n\nINTENT:\n{intent_json}\n\nPROFILE TROPES:\n{profile_tropes}\n\n\
             ARC PHASE: {arc_phase}\n\nRECENT EVENTS:\n{recent_events}\n\n\
             DIFFICULTY CONTEXT:\n{difficulty_context}\n\nPOWER CONTEXT:\n{power_context}",
            intent.action,
            intent.target.as_deref().unwrap_or("N/A"),
        );
        if let Some(correction) = correction_feedback {
            context.push_str(&format!("\n\nVALIDATOR CORRECTION (fix this):\n{correction}"));
        }
        self.agent.call(context).await
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            ("should_succeed", serde_json::json!({"type": "boolean"})),
            ("difficulty_class", serde_json::json!({"type": "integer"})),
            (
                "modifiers",
                serde_json::json!({"type": "object", "additionalProperties": {"type": "integer"}}),
            ),
            ("calculated_roll", serde_json::json!({"type": "integer"})),
            (
                "success_level",
                serde_json::json!({"type": "string", "enum": ["failure", "partial", "success", "critical"]}),
            ),
            (
                "narrative_weight",
                serde_json::json!({"type": "string", "enum": ["minor", "standard", "significant", "climactic"]}),
            ),
            ("cost", serde_json::json!({"type": ["string", "null"]})),
            ("consequence", serde_json::json!({"type": ["string", "null"]})),
            (
                "consequence_category",
                serde_json::json!({
                    "type": ["string", "null"],
                    "enum": ["political", "environmental", "relational", "economic", "magical", null],
                }),
            ),
            ("reasoning", serde_json::json!({"type": "string"})),
            ("target_tier", serde_json::json!({"type": ["string", "null"]})),
        ],
        &[
            "should_succeed",
            "difficulty_class",
            "calculated_roll",
            "success_level",
            "narrative_weight",
            "reasoning",
        ],
    )
}
