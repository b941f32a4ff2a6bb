//! The protagonist. Created once per campaign, mutated by combat,
//! progression, and world-building extraction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::{OpNarrativeFocus, OpPowerExpression, OpPreset, OpTensionSource};
use crate::ids::CharacterId;
use crate::value_objects::PowerTier;

/// A spendable/depletable resource pool (HP, MP, SP).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: i64,
    pub max: i64,
}

impl ResourcePool {
    pub fn full(max: i64) -> Self {
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

/// OP-protagonist configuration on the character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpSettings {
    pub enabled: bool,
    pub preset: Option<OpPreset>,
    pub tension_source: Option<OpTensionSource>,
    pub power_expression: Option<OpPowerExpression>,
    pub narrative_focus: Option<OpNarrativeFocus>,
}

impl OpSettings {
    pub fn enable_preset(&mut self, preset: OpPreset) {
        let (tension, expression, focus) = preset.axes();
        self.enabled = true;
        self.preset = Some(preset);
        self.tension_source = Some(tension);
        self.power_expression = Some(expression);
        self.narrative_focus = Some(focus);
    }
}

/// The player's character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub level: i64,
    pub xp_current: i64,
    pub xp_to_next: i64,
    pub hp: ResourcePool,
    pub mp: ResourcePool,
    pub sp: ResourcePool,
    /// Stat map (STR/INT/AGI/...)
    pub stats: HashMap<String, i64>,
    pub power_tier: PowerTier,
    pub abilities: Vec<String>,
    pub inventory: Vec<String>,
    pub concept: String,
    pub backstory: String,
    pub personality: Vec<String>,
    pub goals_short: Vec<String>,
    pub goals_long: Vec<String>,
    pub appearance: HashMap<String, String>,
    pub op: OpSettings,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            level: 1,
            xp_current: 0,
            xp_to_next: 100,
            hp: ResourcePool::full(100),
            mp: ResourcePool::full(50),
            sp: ResourcePool::full(50),
            stats: HashMap::new(),
            power_tier: PowerTier::BASELINE,
            abilities: Vec::new(),
            inventory: Vec::new(),
            concept: String::new(),
            backstory: String::new(),
            personality: Vec::new(),
            goals_short: Vec::new(),
            goals_long: Vec::new(),
            appearance: HashMap::new(),
            op: OpSettings::default(),
        }
    }

    /// One-line summary for prompt context.
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, Lv{} | HP {}/{} MP {}/{} SP {}/{}",
            self.name,
            self.power_tier,
            self.level,
            self.hp.current,
            self.hp.max,
            self.mp.current,
            self.mp.max,
            self.sp.current,
            self.sp.max,
        )
    }

    pub fn learn_ability(&mut self, ability: impl Into<String>) {
        let ability = ability.into();
        if !self.abilities.contains(&ability) {
            self.abilities.push(ability);
        }
    }

    pub fn acquire_item(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.inventory.contains(&item) {
            self.inventory.push(item);
        }
    }
}
