//! World consequences: lingering effects of significant turns, expired by
//! severity-driven lifetimes.

use serde::{Deserialize, Serialize};

use crate::enums::{ConsequenceCategory, Severity};
use crate::ids::ConsequenceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consequence {
    pub id: ConsequenceId,
    pub severity: Severity,
    pub category: ConsequenceCategory,
    pub description: String,
    pub source_action: String,
    pub turn_number: i64,
    /// None = never expires (catastrophic).
    pub expires_at_turn: Option<i64>,
}

impl Consequence {
    pub fn new(
        severity: Severity,
        category: ConsequenceCategory,
        description: impl Into<String>,
        source_action: impl Into<String>,
        turn_number: i64,
    ) -> Self {
        Self {
            id: ConsequenceId::new(),
            severity,
            category,
            description: description.into(),
            source_action: source_action.into(),
            turn_number,
            expires_at_turn: severity.lifetime_turns().map(|life| turn_number + life),
        }
    }

    pub fn is_expired(&self, current_turn: i64) -> bool {
        match self.expires_at_turn {
            Some(expiry) => expiry < current_turn,
            None => false,
        }
    }
}
