//! XP, levels, and power-tier ascension.
//!
//! The math is mechanical (profile-selected XP curves); the model is only
//! consulted when a level-up actually fires, to pick stats, abilities, and a
//! growth moment that fit the session.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use showrunner_domain::{Character, GrowthModel, NarrativeProfile, PowerTier};

use crate::agents::runtime::{object_schema, Agent};
use crate::context::rules::RuleLibrary;
use crate::infrastructure::router::{AgentKey, ProviderManager};

/// What the finished turn contributed toward progression.
#[derive(Debug, Clone, Default)]
pub struct TurnAchievements {
    pub combat_occurred: bool,
    pub boss_fight: bool,
    pub sakuga_moment: bool,
    pub quest_completed: bool,
    pub quest_name: Option<String>,
    pub significant_roleplay: bool,
    pub failed_significantly: bool,
    pub discovered_lore: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpAward {
    pub source: String,
    pub amount: i64,
    pub reason: String,
}

/// Model output for a level-up event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LevelUpDetails {
    #[serde(default)]
    abilities_unlocked: Vec<String>,
    #[serde(default)]
    stats_increased: HashMap<String, i64>,
    #[serde(default)]
    level_up_narrative: String,
    #[serde(default)]
    growth_moment: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressionOutput {
    pub xp_awarded: i64,
    pub xp_sources: Vec<XpAward>,
    pub level_up: bool,
    pub old_level: i64,
    pub new_level: i64,
    pub abilities_unlocked: Vec<String>,
    pub stats_increased: HashMap<String, i64>,
    pub tier_changed: bool,
    pub old_tier: Option<PowerTier>,
    pub new_tier: Option<PowerTier>,
    pub tier_ceremony: Option<String>,
    pub level_up_narrative: String,
    pub growth_moment: bool,
}

pub struct ProgressionAgent {
    agent: Agent<LevelUpDetails>,
    rules: Arc<RuleLibrary>,
}

impl ProgressionAgent {
    pub fn new(manager: Arc<ProviderManager>, rules: Arc<RuleLibrary>) -> Self {
        Self {
            agent: Agent::new(AgentKey::Progression, schema(), manager),
            rules,
        }
    }

    pub async fn calculate_progression(
        &self,
        character: &Character,
        achievements: &TurnAchievements,
        profile: &NarrativeProfile,
    ) -> ProgressionOutput {
        let growth = profile.growth_model();
        let awards = xp_awards(achievements, profile, growth);
        let total: i64 = awards.iter().map(|a| a.amount).sum();

        let mut output = ProgressionOutput {
            xp_awarded: total,
            xp_sources: awards,
            old_level: character.level,
            new_level: character.level,
            ..Default::default()
        };

        let new_xp = character.xp_current + total;
        let xp_to_next = growth.xp_for_level(character.level + 1);
        if new_xp < xp_to_next {
            return output;
        }

        output.level_up = true;
        output.new_level = character.level + 1;
        self.fill_level_up(&mut output, character, profile).await;
        output
    }

    async fn fill_level_up(
        &self,
        output: &mut ProgressionOutput,
        character: &Character,
        profile: &NarrativeProfile,
    ) {
        let context = format!(
            "LEVEL UP\n\nCharacter: {}\nConcept: {}\nOld level: {} -> New level: {}\n\n\
             Profile: {} (combat style: {})\nPower system: {}\n\nCurrent stats: {:?}\n\
             Current abilities: {}\n\nDecide stat increases (2-3 points), any new ability, \
             and a short growth narrative.",
            character.name,
            character.concept,
            output.old_level,
            output.new_level,
            profile.name,
            profile.combat_style,
            profile.power_system,
            character.stats,
            character.abilities.join(", "),
        );
        let details = self
            .agent
            .call_or_default(context, LevelUpDetails::default())
            .await;
        output.abilities_unlocked = details.abilities_unlocked;
        output.stats_increased = details.stats_increased;
        output.level_up_narrative = details.level_up_narrative;
        output.growth_moment = details.growth_moment;

        // Tier shift every 5 levels
        let old_tier = PowerTier::from_level(output.old_level);
        let new_tier = PowerTier::from_level(output.new_level);
        if new_tier != old_tier {
            output.tier_changed = true;
            output.old_tier = Some(old_tier);
            output.new_tier = Some(new_tier);
            output.tier_ceremony = self
                .rules
                .get_ceremony_text(old_tier, new_tier)
                .await
                .ok()
                .flatten();
        }
    }

    /// Apply a progression result to the character sheet.
    pub fn apply(character: &mut Character, output: &ProgressionOutput, growth: GrowthModel) {
        character.xp_current += output.xp_awarded;
        if output.level_up {
            character.level = output.new_level;
            for ability in &output.abilities_unlocked {
                character.learn_ability(ability.clone());
            }
            for (stat, delta) in &output.stats_increased {
                *character.stats.entry(stat.clone()).or_insert(0) += delta;
            }
            if let Some(tier) = output.new_tier {
                character.power_tier = tier;
            }
        }
        character.xp_to_next = growth.xp_for_level(character.level + 1);
    }
}

fn xp_awards(
    achievements: &TurnAchievements,
    profile: &NarrativeProfile,
    growth: GrowthModel,
) -> Vec<XpAward> {
    // Per-turn base: a tenth of the session pool
    let base = growth.base_xp_per_session() / 10;
    let mut awards = Vec::new();

    if achievements.combat_occurred {
        if achievements.boss_fight {
            awards.push(XpAward {
                source: "boss".to_string(),
                amount: base * 2,
                reason: "Defeated powerful foe".to_string(),
            });
        } else {
            awards.push(XpAward {
                source: "combat".to_string(),
                amount: base,
                reason: "Combat victory".to_string(),
            });
        }
        if achievements.sakuga_moment {
            awards.push(XpAward {
                source: "sakuga".to_string(),
                amount: base * 3 / 2,
                reason: "Epic moment!".to_string(),
            });
        }
    }

    if achievements.quest_completed {
        awards.push(XpAward {
            source: "quest".to_string(),
            amount: base * 3 / 2,
            reason: format!(
                "Completed: {}",
                achievements.quest_name.as_deref().unwrap_or("quest")
            ),
        });
    }

    if achievements.significant_roleplay {
        awards.push(XpAward {
            source: "roleplay".to_string(),
            amount: base * 4 / 5,
            reason: "Character development".to_string(),
        });
    }

    if achievements.discovered_lore {
        awards.push(XpAward {
            source: "discovery".to_string(),
            amount: base / 2,
            reason: "Uncovered secrets".to_string(),
        });
    }

    // Learning from failure only pays out in struggle-leaning profiles
    let power_fantasy = profile
        .dna
        .get("power_fantasy_vs_struggle")
        .copied()
        .unwrap_or(5);
    if achievements.failed_significantly && power_fantasy >= 7 {
        awards.push(XpAward {
            source: "failure".to_string(),
            amount: base * 3 / 10,
            reason: "Learned from failure".to_string(),
        });
    }

    awards
}

fn schema() -> serde_json::Value {
    object_schema(
        &[
            (
                "abilities_unlocked",
                serde_json::json!({"type": "array", "items": {"type": "string"}}),
            ),
            (
                "stats_increased",
                serde_json::json!({"type": "object", "additionalProperties": {"type": "integer"}}),
            ),
            ("level_up_narrative", serde_json::json!({"type": "string"})),
            ("growth_moment", serde_json::json!({"type": "boolean"})),
        ],
        &["stats_increased", "level_up_narrative"],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;
    use showrunner_domain::ProfileId;

    async fn agent_with(scripted: ScriptedLlm) -> ProgressionAgent {
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let rules = Arc::new(
            RuleLibrary::open(pool, Arc::new(HashEmbedder::default()))
                .await
                .expect("rules"),
        );
        ProgressionAgent::new(manager, rules)
    }

    fn profile() -> NarrativeProfile {
        let mut p = NarrativeProfile::new(ProfileId::from("test"), "Test Show");
        p.dna.insert("fast_vs_slow".into(), 5); // moderate curve
        p
    }

    #[tokio::test]
    async fn test_combat_xp_without_level_up() {
        let agent = agent_with(ScriptedLlm::new()).await;
        let character = Character::new("Rin");
        let achievements = TurnAchievements {
            combat_occurred: true,
            ..Default::default()
        };
        let output = agent
            .calculate_progression(&character, &achievements, &profile())
            .await;
        // moderate base 600/10 = 60 combat XP; level 2 needs 200
        assert_eq!(output.xp_awarded, 60);
        assert!(!output.level_up);
        assert_eq!(output.xp_sources[0].source, "combat");
    }

    #[tokio::test]
    async fn test_level_up_consults_model_and_tiers() {
        let scripted = ScriptedLlm::new();
        scripted.set_for(
            "progression system",
            serde_json::json!({
                "abilities_unlocked": ["Ember Guard"],
                "stats_increased": {"STR": 2, "AGI": 1},
                "level_up_narrative": "Heat answers your breath now.",
                "growth_moment": true,
            }),
        );
        let agent = agent_with(scripted).await;

        let mut character = Character::new("Rin");
        character.level = 5;
        character.xp_current = 1900; // level 6 (moderate) needs 2000
        let achievements = TurnAchievements {
            combat_occurred: true,
            boss_fight: true,
            ..Default::default()
        };
        let output = agent
            .calculate_progression(&character, &achievements, &profile())
            .await;

        assert!(output.level_up);
        assert_eq!(output.new_level, 6);
        assert_eq!(output.abilities_unlocked, vec!["Ember Guard".to_string()]);
        // Level 5 -> 6 crosses a 5-level boundary: T10 -> T9
        assert!(output.tier_changed);
        assert_eq!(output.new_tier.map(|t| t.number()), Some(9));
        assert!(output.tier_ceremony.is_some());
    }

    #[tokio::test]
    async fn test_failure_xp_only_in_struggle_profiles() {
        let agent = agent_with(ScriptedLlm::new()).await;
        let character = Character::new("Rin");
        let achievements = TurnAchievements {
            failed_significantly: true,
            ..Default::default()
        };

        let easygoing = profile();
        let none = agent
            .calculate_progression(&character, &achievements, &easygoing)
            .await;
        assert_eq!(none.xp_awarded, 0);

        let mut gritty = profile();
        gritty.dna.insert("power_fantasy_vs_struggle".into(), 9);
        let some = agent
            .calculate_progression(&character, &achievements, &gritty)
            .await;
        assert!(some.xp_awarded > 0);
        assert_eq!(some.xp_sources[0].source, "failure");
    }

    #[test]
    fn test_apply_updates_sheet() {
        let mut character = Character::new("Rin");
        character.level = 5;
        character.xp_current = 1900;
        let output = ProgressionOutput {
            xp_awarded: 150,
            level_up: true,
            old_level: 5,
            new_level: 6,
            abilities_unlocked: vec!["Ember Guard".to_string()],
            stats_increased: HashMap::from([("STR".to_string(), 2)]),
            tier_changed: true,
            new_tier: PowerTier::parse("T9").ok(),
            ..Default::default()
        };
        ProgressionAgent::apply(&mut character, &output, GrowthModel::Moderate);
        assert_eq!(character.level, 6);
        assert_eq!(character.xp_current, 2050);
        assert_eq!(character.power_tier.number(), 9);
        assert!(character.abilities.contains(&"Ember Guard".to_string()));
        assert_eq!(character.xp_to_next, GrowthModel::Moderate.xp_for_level(7));
    }
}
