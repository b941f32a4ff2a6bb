//! The Campaign Bible: the Director's planning blob. Mutated only by
//! Director runs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A completed (or superseded) arc kept for recap generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcSummary {
    pub name: String,
    pub summary: String,
    pub concluded_turn: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignBible {
    pub current_arc: String,
    pub arc_history: Vec<ArcSummary>,
    /// Free-form guidance prose for the Writer and Pacing agents.
    pub director_notes: String,
    pub active_goals: Vec<String>,
    pub arc_objectives: Vec<String>,
    /// Descriptions of seeds the Director currently wants alive.
    pub active_foreshadowing: Vec<String>,
    /// NPC name -> owed screen time weight.
    pub spotlight_debt: HashMap<String, i64>,
    pub updated_turn: i64,
}

impl CampaignBible {
    /// Fold a Director review into the bible, archiving the previous arc when
    /// it changed.
    pub fn apply_review(
        &mut self,
        current_arc: String,
        director_notes: String,
        active_goals: Vec<String>,
        arc_objectives: Vec<String>,
        active_foreshadowing: Vec<String>,
        turn_number: i64,
    ) {
        if !self.current_arc.is_empty() && self.current_arc != current_arc {
            self.arc_history.push(ArcSummary {
                name: self.current_arc.clone(),
                summary: self.director_notes.clone(),
                concluded_turn: turn_number,
            });
        }
        self.current_arc = current_arc;
        self.director_notes = director_notes;
        self.active_goals = active_goals;
        self.arc_objectives = arc_objectives;
        self.active_foreshadowing = active_foreshadowing;
        self.updated_turn = turn_number;
    }
}
