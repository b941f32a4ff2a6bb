//! Immutable per-turn records. Append-only; turn numbers are monotonic.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_number: i64,
    pub player_input: String,
    /// Classifier output, stored as JSON.
    pub intent: serde_json::Value,
    /// Outcome Judge output, stored as JSON (None for command turns).
    pub outcome: Option<serde_json::Value>,
    pub narrative: String,
    pub latency_ms: i64,
    pub portrait_map: HashMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn new(
        turn_number: i64,
        player_input: impl Into<String>,
        intent: serde_json::Value,
        outcome: Option<serde_json::Value>,
        narrative: impl Into<String>,
        latency_ms: i64,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            turn_number,
            player_input: player_input.into(),
            intent,
            outcome,
            narrative: narrative.into(),
            latency_ms,
            portrait_map: HashMap::new(),
            recorded_at,
        }
    }
}
