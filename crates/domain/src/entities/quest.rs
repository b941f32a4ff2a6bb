//! Quests and their objectives.

use serde::{Deserialize, Serialize};

use crate::enums::{QuestSource, QuestStatus};
use crate::ids::QuestId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestObjective {
    pub description: String,
    pub completed: bool,
    pub turn_completed: Option<i64>,
}

impl QuestObjective {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            completed: false,
            turn_completed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub description: String,
    pub status: QuestStatus,
    pub quest_type: String,
    pub objectives: Vec<QuestObjective>,
    pub source: QuestSource,
    pub related_npcs: Vec<String>,
    pub related_locations: Vec<String>,
    pub created_turn: i64,
    pub completed_turn: Option<i64>,
}

impl Quest {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        source: QuestSource,
        created_turn: i64,
    ) -> Self {
        Self {
            id: QuestId::new(),
            title: title.into(),
            description: description.into(),
            status: QuestStatus::Active,
            quest_type: "side".to_string(),
            objectives: Vec::new(),
            source,
            related_npcs: Vec::new(),
            related_locations: Vec::new(),
            created_turn,
            completed_turn: None,
        }
    }

    /// Mark an objective complete; completes the quest when all are done.
    pub fn complete_objective(&mut self, index: usize, turn: i64) -> bool {
        if let Some(objective) = self.objectives.get_mut(index) {
            objective.completed = true;
            objective.turn_completed = Some(turn);
        }
        if !self.objectives.is_empty() && self.objectives.iter().all(|o| o.completed) {
            self.status = QuestStatus::Completed;
            self.completed_turn = Some(turn);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quest_completes_when_all_objectives_done() {
        let mut quest = Quest::new("Find the smith", "…", QuestSource::Director, 2);
        quest.objectives.push(QuestObjective::new("Reach the forge"));
        quest.objectives.push(QuestObjective::new("Speak to Doran"));

        assert!(!quest.complete_objective(0, 4));
        assert_eq!(quest.status, QuestStatus::Active);

        assert!(quest.complete_objective(1, 5));
        assert_eq!(quest.status, QuestStatus::Completed);
        assert_eq!(quest.completed_turn, Some(5));
    }
}
