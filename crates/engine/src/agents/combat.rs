//! Mechanical combat resolution.
//!
//! Combat resolves BEFORE narrative generation so the writer can never
//! contradict the numbers. Resolution is pure dice-and-tiers math over the
//! injected RNG, so the same seed always produces the same fight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::{
    Character, CombatResultId, NarrativeWeight, Npc, PowerTier, SpecialCondition,
};

use crate::agents::intent::IntentOutput;
use crate::infrastructure::ports::RandomPort;

/// MP cost to cast a spell in combat.
pub const SPELL_MP_COST: i64 = 20;
/// SP cost to use a technique in combat.
pub const SKILL_SP_COST: i64 = 15;

const BASE_DEFENSE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    Strike,
    Spell,
    Skill,
}

impl AttackKind {
    pub fn damage_type(&self) -> &'static str {
        match self {
            AttackKind::Strike => "physical",
            AttackKind::Spell => "magical",
            AttackKind::Skill => "technique",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CombatAction {
    pub kind: AttackKind,
    pub technique: Option<String>,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatResolution {
    pub id: CombatResultId,
    pub hit: bool,
    pub damage_dealt: i64,
    pub damage_type: String,
    pub critical: bool,
    pub narrative_weight: NarrativeWeight,
    pub sakuga_moment: bool,
    pub description: String,
    pub target_name: String,
}

pub struct CombatAgent {
    rng: Arc<dyn RandomPort>,
}

impl CombatAgent {
    pub fn new(rng: Arc<dyn RandomPort>) -> Self {
        Self { rng }
    }

    /// Parse the mechanical shape of a combat action out of the classified
    /// intent and raw input. Pure heuristics, no model call.
    pub fn parse_combat_action(&self, intent: &IntentOutput, player_input: &str) -> CombatAction {
        let lower = player_input.to_lowercase();
        let kind = if lower.contains("cast") || lower.contains("spell") || lower.contains("magic")
        {
            AttackKind::Spell
        } else if intent
            .special_conditions
            .iter()
            .any(|c| *c == SpecialCondition::NamedAttack)
            || lower.contains("technique")
        {
            AttackKind::Skill
        } else {
            AttackKind::Strike
        };

        let technique = intent
            .special_conditions
            .iter()
            .any(|c| *c == SpecialCondition::NamedAttack)
            .then(|| intent.action.clone());

        let target = intent
            .target
            .clone()
            .unwrap_or_else(|| guess_target(player_input));

        CombatAction {
            kind,
            technique,
            target,
        }
    }

    /// Resolve one combat action against a target. Deterministic for a given
    /// RNG sequence.
    pub fn resolve_action(
        &self,
        action: &CombatAction,
        attacker: &Character,
        target: &Npc,
    ) -> CombatResolution {
        let target_tier = target.power_tier.unwrap_or(PowerTier::BASELINE);
        let gap = attacker.power_tier.gap_above(target_tier) as i64;

        let attack_roll = self.rng.roll(1, 20) as i64;
        let modifier = gap * 2;
        let critical = attack_roll == 20;
        let hit = critical || attack_roll + modifier >= BASE_DEFENSE;

        let mut damage = 0;
        if hit {
            damage = self.rng.roll(5, 15) as i64 + (gap.max(0) * 5);
            if critical {
                damage *= 2;
            }
        }

        let finishing = target
            .hp
            .map(|hp| hit && damage >= hp.current)
            .unwrap_or(false);
        let sakuga_moment = critical || finishing || action.technique.is_some();

        // An effortless stomp is a minor beat; a finishing blow or an
        // underdog's crit carries the scene
        let narrative_weight = if finishing || (critical && gap < 0) {
            NarrativeWeight::Climactic
        } else if gap >= 4 {
            NarrativeWeight::Minor
        } else {
            NarrativeWeight::Standard
        };

        let description = if hit {
            format!(
                "{} {} the {} for {} {} damage{} (roll {}{:+} vs {})",
                attacker.name,
                if critical { "devastates" } else { "hits" },
                target.name,
                damage,
                action.kind.damage_type(),
                if finishing { ", a finishing blow" } else { "" },
                attack_roll,
                modifier,
                BASE_DEFENSE,
            )
        } else {
            format!(
                "{} misses the {} (roll {}{:+} vs {})",
                attacker.name, target.name, attack_roll, modifier, BASE_DEFENSE,
            )
        };

        CombatResolution {
            id: CombatResultId::new(),
            hit,
            damage_dealt: damage,
            damage_type: action.kind.damage_type().to_string(),
            critical,
            narrative_weight,
            sakuga_moment,
            description,
            target_name: target.name.clone(),
        }
    }
}

/// Fallback target extraction: the word after the last "the"/"at", else the
/// last word.
fn guess_target(input: &str) -> String {
    let words: Vec<&str> = input
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    for window in words.windows(2).rev() {
        if window[0].eq_ignore_ascii_case("the") || window[0].eq_ignore_ascii_case("at") {
            return window[1].to_string();
        }
    }
    words.last().map(|w| w.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SequenceRandom;
    use showrunner_domain::{IntentKind, ResourcePool};

    fn intent(target: Option<&str>) -> IntentOutput {
        IntentOutput {
            intent: IntentKind::Combat,
            action: "strike with my sword".to_string(),
            target: target.map(String::from),
            declared_epicness: 0.5,
            special_conditions: vec![],
        }
    }

    fn goblin() -> Npc {
        let mut npc = Npc::new("Goblin", "monster");
        npc.hp = Some(ResourcePool::full(20));
        npc.power_tier = Some(PowerTier::BASELINE);
        npc
    }

    fn attacker_t8() -> Character {
        let mut c = Character::new("Rin");
        c.power_tier = PowerTier::parse("T8").expect("tier");
        c
    }

    #[test]
    fn test_parse_spell_and_target_guess() {
        let agent = CombatAgent::new(Arc::new(SequenceRandom::new(vec![10])));
        let action =
            agent.parse_combat_action(&intent(None), "I cast a firebolt at the goblin");
        assert_eq!(action.kind, AttackKind::Spell);
        assert_eq!(action.target, "goblin");
    }

    #[test]
    fn test_resolution_is_deterministic_for_seeded_rng() {
        // attack roll 15, damage roll 15; T8 vs T10 gap = 2
        let agent = CombatAgent::new(Arc::new(SequenceRandom::new(vec![15, 15, 15])));
        let action = agent.parse_combat_action(&intent(Some("Goblin")), "I strike the goblin");
        let result = agent.resolve_action(&action, &attacker_t8(), &goblin());

        assert!(result.hit);
        assert!(!result.critical);
        // 15 + max(gap,0)*5 = 25
        assert_eq!(result.damage_dealt, 25);
        assert_eq!(result.damage_type, "physical");
        // 25 damage kills the 20 HP goblin: finishing blow
        assert!(result.sakuga_moment);
        assert_eq!(result.narrative_weight, NarrativeWeight::Climactic);
        assert!(result.description.contains("25"));
    }

    #[test]
    fn test_natural_twenty_crits_and_doubles() {
        let agent = CombatAgent::new(Arc::new(SequenceRandom::new(vec![20, 10, 10])));
        let action = agent.parse_combat_action(&intent(Some("Goblin")), "I strike the goblin");
        let result = agent.resolve_action(&action, &attacker_t8(), &goblin());
        assert!(result.critical);
        // (10 + 2*5) * 2 = 40
        assert_eq!(result.damage_dealt, 40);
    }

    #[test]
    fn test_underdog_can_miss() {
        // T10 attacker vs T6 target: gap = -4, roll 5 + (-8) < 10
        let agent = CombatAgent::new(Arc::new(SequenceRandom::new(vec![5, 5, 5])));
        let mut ogre = goblin();
        ogre.name = "Ogre Lord".to_string();
        ogre.power_tier = Some(PowerTier::parse("T6").expect("tier"));
        let action = agent.parse_combat_action(&intent(Some("Ogre Lord")), "I strike");
        let result = agent.resolve_action(&action, &Character::new("Pip"), &ogre);
        assert!(!result.hit);
        assert_eq!(result.damage_dealt, 0);
    }

    #[test]
    fn test_named_attack_parses_as_skill_with_technique() {
        let agent = CombatAgent::new(Arc::new(SequenceRandom::new(vec![10])));
        let mut i = intent(Some("Goblin"));
        i.action = "Crimson Lotus Slash".to_string();
        i.special_conditions.push(SpecialCondition::NamedAttack);
        let action = agent.parse_combat_action(&i, "Crimson Lotus Slash!");
        assert_eq!(action.kind, AttackKind::Skill);
        assert_eq!(action.technique.as_deref(), Some("Crimson Lotus Slash"));
    }
}
