//! Narrative profiles: the per-IP style record the profile loader hands the
//! engine. The engine treats profiles as read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enums::{CompositionMode, GrowthModel};
use crate::ids::ProfileId;
use crate::value_objects::PowerTier;

/// Current narrative composition, re-derived per scene from tier gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionSettings {
    pub mode: CompositionMode,
    /// Tier gap the mode was derived from.
    pub differential: i32,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            mode: CompositionMode::Standard,
            differential: 0,
        }
    }
}

/// Per-IP narrative style description (DNA scales, tropes, voice).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeProfile {
    pub id: ProfileId,
    pub name: String,
    /// Eleven numeric axes describing the IP's narrative style (0-10).
    pub dna: HashMap<String, i32>,
    pub tropes: Vec<String>,
    pub tone: String,
    pub combat_style: String,
    pub power_system: String,
    pub composition: CompositionSettings,
    pub detected_genres: Vec<String>,
    /// NPC name -> speech/voice card.
    pub voice_cards: HashMap<String, String>,
    pub author_voice: String,
    /// Baseline threat tier of the setting.
    pub world_tier: PowerTier,
    pub pacing: String,
}

impl NarrativeProfile {
    pub fn new(id: ProfileId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            dna: HashMap::new(),
            tropes: Vec::new(),
            tone: String::new(),
            combat_style: String::new(),
            power_system: String::new(),
            composition: CompositionSettings::default(),
            detected_genres: Vec::new(),
            voice_cards: HashMap::new(),
            author_voice: String::new(),
            world_tier: PowerTier::new(8).unwrap_or(PowerTier::BASELINE),
            pacing: String::new(),
        }
    }

    /// XP curve family from the `fast_vs_slow` DNA scale.
    pub fn growth_model(&self) -> GrowthModel {
        let pacing = self.dna.get("fast_vs_slow").copied().unwrap_or(5);
        GrowthModel::from_dna_pacing(pacing)
    }

    /// The DNA scales far enough from the midpoint to deserve explicit
    /// narration guidance (<=3 or >=7), most extreme first, capped at 3.
    pub fn extreme_dna_scales(&self) -> Vec<(String, i32)> {
        let mut scales: Vec<(String, i32)> = self
            .dna
            .iter()
            .filter(|(_, v)| **v <= 3 || **v >= 7)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        scales.sort_by_key(|(_, v)| -(v - 5).abs());
        scales.truncate(3);
        scales
    }
}
