//! World state: where the story is, how tense it is, and the OP-mode dials.

use serde::{Deserialize, Serialize};

use crate::enums::{ArcPhase, StoryScale};

/// A pending OP-mode suggestion produced by behavior analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpSuggestion {
    pub preset: String,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub location: String,
    /// One-line description of what is happening right now.
    pub situation: String,
    pub arc_phase: ArcPhase,
    pub arc_name: String,
    tension_level: f64,
    pub turns_in_phase: i64,
    pub timeline_mode: String,
    pub canon_cast_mode: String,
    pub event_fidelity: String,
    pub narrative_scale: StoryScale,
    pub high_imbalance_encounters: i64,
    pub op_suggestion_dismissed: bool,
    pub pending_op_suggestion: Option<OpSuggestion>,
}

impl WorldState {
    pub fn new(location: impl Into<String>, situation: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            situation: situation.into(),
            arc_phase: ArcPhase::Exposition,
            arc_name: String::new(),
            tension_level: 0.3,
            turns_in_phase: 0,
            timeline_mode: "flexible".to_string(),
            canon_cast_mode: "canon_adjacent".to_string(),
            event_fidelity: "loose".to_string(),
            narrative_scale: StoryScale::Personal,
            high_imbalance_encounters: 0,
            op_suggestion_dismissed: false,
            pending_op_suggestion: None,
        }
    }

    pub fn tension_level(&self) -> f64 {
        self.tension_level
    }

    /// Tension always lives in [0, 1].
    pub fn set_tension(&mut self, value: f64) {
        self.tension_level = value.clamp(0.0, 1.0);
    }

    pub fn bump_tension(&mut self, delta: f64) {
        self.set_tension(self.tension_level + delta);
    }

    /// Move to a new arc phase, resetting the stall counter.
    pub fn transition_phase(&mut self, phase: ArcPhase) {
        if self.arc_phase != phase {
            self.arc_phase = phase;
            self.turns_in_phase = 0;
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new("Unknown", "The story has not begun.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tension_clamps() {
        let mut world = WorldState::default();
        world.set_tension(1.7);
        assert_eq!(world.tension_level(), 1.0);
        world.set_tension(-0.2);
        assert_eq!(world.tension_level(), 0.0);
        world.set_tension(0.4);
        world.bump_tension(0.05);
        assert!((world.tension_level() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_phase_transition_resets_counter() {
        let mut world = WorldState::default();
        world.turns_in_phase = 9;
        world.transition_phase(ArcPhase::RisingAction);
        assert_eq!(world.turns_in_phase, 0);
        // Same phase does not reset
        world.turns_in_phase = 4;
        world.transition_phase(ArcPhase::RisingAction);
        assert_eq!(world.turns_in_phase, 4);
    }
}
