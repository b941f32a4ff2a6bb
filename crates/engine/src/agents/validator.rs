//! Turn-coherence validation: a cheap second opinion on the judged outcome
//! before anything reaches the writer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::intent::IntentOutput;
use crate::agents::outcome::OutcomeOutput;
use crate::agents::runtime::{object_schema, Agent, AgentError};
use crate::infrastructure::router::{AgentKey, ProviderManager};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutput {
    pub is_valid: bool,
    #[serde(default)]
    pub correction: Option<String>,
}

impl ValidationOutput {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            correction: None,
        }
    }
}

pub struct ValidatorAgent {
    agent: Agent<ValidationOutput>,
}

impl ValidatorAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Validator, schema(), manager),
        }
    }

    pub async fn validate(
        &self,
        intent: &IntentOutput,
        outcome: &OutcomeOutput,
        rules_summary: &str,
        character_state: &str,
    ) -> Result<ValidationOutput, AgentError> {
        let context = format!(
            "PROPOSED TURN:\nIntent: {}\nOutcome: {}\n\nRULES SUMMARY:\n{}\n\nCHARACTER STATE:\n{}",
            serde_json::to_string(intent).unwrap_or_default(),
            serde_json::to_string(outcome).unwrap_or_default(),
            if rules_summary.is_empty() {
                "Standard physics + anime logic"
            } else {
                rules_summary
            },
            character_state,
        );
        self.agent.call(context).await
    }
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            ("is_valid", serde_json::json!({"type": "boolean"})),
            ("correction", serde_json::json!({"type": ["string", "null"]})),
        ],
        &["is_valid"],
    )
}
