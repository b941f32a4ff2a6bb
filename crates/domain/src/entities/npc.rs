//! Non-player characters: relationship state, screen-time bookkeeping, and
//! the intelligence ladder that makes long-running NPCs act smarter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::character::ResourcePool;
use crate::enums::IntelligenceStage;
use crate::ids::NpcId;
use crate::value_objects::{Affinity, Disposition, DispositionMilestone, PowerTier};

/// A recorded emotional beat between the NPC and the protagonist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalMilestone {
    pub name: String,
    pub context: String,
    pub turn_number: i64,
    pub recorded_at: DateTime<Utc>,
}

impl EmotionalMilestone {
    /// Milestones that count as trust for intelligence evolution.
    pub fn is_trust_milestone(name: &str) -> bool {
        matches!(name, "first_sacrifice" | "first_trust_test")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
    pub aliases: Vec<String>,
    pub role: String,
    pub faction: Option<String>,
    pub affinity: Affinity,
    pub interaction_count: i64,
    pub scene_count: i64,
    pub last_appeared_turn: i64,
    pub intelligence: IntelligenceStage,
    pub visual_tags: Vec<String>,
    pub personality: Vec<String>,
    pub goals: Vec<String>,
    pub secrets: Vec<String>,
    pub knowledge_topics: Vec<String>,
    pub milestones: Vec<EmotionalMilestone>,
    pub portrait_url: Option<String>,
    /// Combat-capable NPCs carry hit points; pure social NPCs don't.
    pub hp: Option<ResourcePool>,
    pub power_tier: Option<PowerTier>,
    pub status_effects: Vec<String>,
}

impl Npc {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: NpcId::new(),
            name: name.into(),
            aliases: Vec::new(),
            role: role.into(),
            faction: None,
            affinity: Affinity::default(),
            interaction_count: 0,
            scene_count: 0,
            last_appeared_turn: 0,
            intelligence: IntelligenceStage::Reactive,
            visual_tags: Vec::new(),
            personality: Vec::new(),
            goals: Vec::new(),
            secrets: Vec::new(),
            knowledge_topics: Vec::new(),
            milestones: Vec::new(),
            portrait_url: None,
            hp: None,
            power_tier: None,
            status_effects: Vec::new(),
        }
    }

    /// Subtract combat damage, clamping at zero. No-op for NPCs without HP.
    pub fn take_damage(&mut self, damage: i64) {
        if let Some(hp) = &mut self.hp {
            hp.current = (hp.current - damage).max(0);
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.hp.map(|hp| hp.is_depleted()).unwrap_or(false)
    }

    pub fn disposition(&self) -> Disposition {
        self.affinity.disposition()
    }

    /// Shift affinity, returning a milestone when a disposition boundary is
    /// crossed.
    pub fn shift_affinity(&mut self, delta: i32) -> Option<DispositionMilestone> {
        let (next, milestone) = self.affinity.applying(delta, &self.name);
        self.affinity = next;
        milestone
    }

    /// Advance the intelligence stage when the scene count reaches the next
    /// stage's threshold, or unconditionally on a trust milestone. Stages only
    /// ever move forward.
    pub fn evolve_intelligence(&mut self, trust_milestone: bool) -> Option<IntelligenceStage> {
        let next = self.intelligence.next()?;
        if trust_milestone || self.scene_count >= next.scene_threshold() {
            self.intelligence = next;
            return Some(next);
        }
        None
    }

    pub fn record_milestone(
        &mut self,
        name: impl Into<String>,
        context: impl Into<String>,
        turn_number: i64,
        now: DateTime<Utc>,
    ) -> &EmotionalMilestone {
        self.milestones.push(EmotionalMilestone {
            name: name.into(),
            context: context.into(),
            turn_number,
            recorded_at: now,
        });
        self.milestones
            .last()
            .unwrap_or_else(|| unreachable!("just pushed"))
    }

    /// Case-insensitive match of this NPC's name or any alias inside a text.
    pub fn mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if lower.contains(&self.name.to_lowercase()) {
            return true;
        }
        self.aliases
            .iter()
            .any(|alias| !alias.is_empty() && lower.contains(&alias.to_lowercase()))
    }

    /// Screen-time owed: how far scene presence lags behind familiarity.
    pub fn spotlight_debt(&self) -> i64 {
        (self.interaction_count - self.scene_count).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intelligence_advances_on_scene_threshold() {
        let mut npc = Npc::new("Mia", "rival");
        assert_eq!(npc.intelligence, IntelligenceStage::Reactive);

        npc.scene_count = 2;
        assert_eq!(npc.evolve_intelligence(false), None);

        npc.scene_count = 3;
        assert_eq!(
            npc.evolve_intelligence(false),
            Some(IntelligenceStage::Contextual)
        );
        // Not enough scenes for the next stage yet
        assert_eq!(npc.evolve_intelligence(false), None);
    }

    #[test]
    fn test_trust_milestone_bypasses_threshold() {
        let mut npc = Npc::new("Mia", "rival");
        assert_eq!(
            npc.evolve_intelligence(true),
            Some(IntelligenceStage::Contextual)
        );
        assert_eq!(
            npc.evolve_intelligence(true),
            Some(IntelligenceStage::Anticipatory)
        );
    }

    #[test]
    fn test_intelligence_is_monotonic_and_capped() {
        let mut npc = Npc::new("Mia", "rival");
        npc.intelligence = IntelligenceStage::Autonomous;
        assert_eq!(npc.evolve_intelligence(true), None);
        assert_eq!(npc.intelligence, IntelligenceStage::Autonomous);
    }

    #[test]
    fn test_mentioned_in_matches_aliases() {
        let mut npc = Npc::new("Lady Shirayuki", "noble");
        npc.aliases.push("the White Princess".to_string());
        assert!(npc.mentioned_in("You bow before lady shirayuki."));
        assert!(npc.mentioned_in("Rumors speak of the white princess."));
        assert!(!npc.mentioned_in("A merchant waves at you."));
    }

    #[test]
    fn test_spotlight_debt_never_negative() {
        let mut npc = Npc::new("Mia", "rival");
        npc.interaction_count = 7;
        npc.scene_count = 3;
        assert_eq!(npc.spotlight_debt(), 4);
        npc.scene_count = 10;
        assert_eq!(npc.spotlight_debt(), 0);
    }

    #[test]
    fn test_shift_affinity_reports_milestone() {
        let mut npc = Npc::new("Mia", "rival");
        let milestone = npc.shift_affinity(30).expect("crossed friendly boundary");
        assert_eq!(milestone.to, Disposition::Friendly);
        assert_eq!(npc.affinity.value(), 30);
    }
}
