//! Foreshadowing seeds: planted hooks that must eventually pay off.
//!
//! Lifecycle: planted -> callback (payoff window open) -> overdue (past the
//! slack window) -> resolved. Overdue seeds push world tension up each turn
//! until they are paid off.

use serde::{Deserialize, Serialize};

use crate::enums::{SeedStatus, SeedType};
use crate::ids::SeedId;

/// Turns past the expected payoff before a callback seed counts as overdue.
pub const PAYOFF_SLACK_TURNS: i64 = 5;

/// Tension added per overdue seed per turn.
pub const OVERDUE_TENSION_BUMP: f64 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeshadowSeed {
    pub id: SeedId,
    pub description: String,
    pub planted_turn: i64,
    pub expected_payoff: i64,
    pub status: SeedStatus,
    pub seed_type: SeedType,
    pub resolved_turn: Option<i64>,
    pub resolution_narrative: Option<String>,
}

impl ForeshadowSeed {
    pub fn plant(
        description: impl Into<String>,
        planted_turn: i64,
        expected_payoff: i64,
        seed_type: SeedType,
    ) -> Self {
        Self {
            id: SeedId::new(),
            description: description.into(),
            planted_turn,
            expected_payoff,
            status: SeedStatus::Planted,
            seed_type,
            resolved_turn: None,
            resolution_narrative: None,
        }
    }

    /// The payoff window has opened.
    pub fn is_due(&self, current_turn: i64) -> bool {
        self.expected_payoff <= current_turn
    }

    /// Past the payoff plus the slack window.
    pub fn is_past_slack(&self, current_turn: i64) -> bool {
        self.expected_payoff + PAYOFF_SLACK_TURNS < current_turn
    }

    pub fn resolve(&mut self, current_turn: i64, narrative: impl Into<String>) {
        self.status = SeedStatus::Resolved;
        self.resolved_turn = Some(current_turn);
        self.resolution_narrative = Some(narrative.into());
    }

    /// Keyword match against a narrative: at least half of the seed's
    /// significant words (4+ chars) must appear. Substring matching keeps
    /// this cheap; the LLM never sees this check.
    pub fn mentioned_in(&self, narrative: &str) -> bool {
        let haystack = narrative.to_lowercase();
        let words: Vec<String> = self
            .description
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() >= 4)
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return false;
        }
        let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
        hits * 2 >= words.len()
    }
}
