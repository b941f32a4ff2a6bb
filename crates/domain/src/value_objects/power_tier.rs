//! Power tiers and the composition math derived from tier gaps.
//!
//! Tiers are ordinal from T1 (strongest) to T10 (human baseline). A lower
//! number is a stronger combatant, so "gap" is measured as how many tiers the
//! character sits ABOVE a reference tier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::enums::CompositionMode;
use crate::error::DomainError;

/// Ordinal power tier, T1 (strongest) through T10 (human baseline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PowerTier(u8);

impl PowerTier {
    pub const STRONGEST: PowerTier = PowerTier(1);
    pub const BASELINE: PowerTier = PowerTier(10);

    pub fn new(tier: u8) -> Result<Self, DomainError> {
        if (1..=10).contains(&tier) {
            Ok(Self(tier))
        } else {
            Err(DomainError::validation(format!(
                "power tier must be in T1..T10, got T{tier}"
            )))
        }
    }

    /// Parse strings like "T8" or "t8".
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let digits = value.trim().trim_start_matches(['T', 't']);
        let tier: u8 = digits
            .parse()
            .map_err(|_| DomainError::parse(format!("invalid power tier '{value}'")))?;
        Self::new(tier)
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// How many tiers `self` sits above `other` (positive = stronger).
    pub fn gap_above(&self, other: PowerTier) -> i32 {
        other.0 as i32 - self.0 as i32
    }

    /// Tier reached at a character level: a tier step every 5 levels,
    /// starting from the human baseline.
    pub fn from_level(level: i64) -> PowerTier {
        let steps = ((level.max(1) - 1) / 5) as u8;
        PowerTier(10u8.saturating_sub(steps).max(1))
    }

    /// One tier stronger, saturating at T1.
    pub fn ascended(&self) -> PowerTier {
        PowerTier((self.0 - 1).max(1))
    }
}

impl fmt::Display for PowerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl TryFrom<String> for PowerTier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PowerTier::parse(&value)
    }
}

impl From<PowerTier> for String {
    fn from(value: PowerTier) -> Self {
        value.to_string()
    }
}

/// Derive the narrative composition mode from the gap between the character
/// and the current threat (or world baseline when no threat is on screen).
pub fn composition_for_gap(gap: i32) -> CompositionMode {
    if gap >= 4 {
        CompositionMode::OpDominant
    } else if gap >= 2 {
        CompositionMode::Blended
    } else {
        CompositionMode::Standard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let tier = PowerTier::parse("T8").expect("valid");
        assert_eq!(tier.number(), 8);
        assert_eq!(tier.to_string(), "T8");
        assert_eq!(PowerTier::parse("t3").expect("valid").number(), 3);
        assert!(PowerTier::parse("T0").is_err());
        assert!(PowerTier::parse("T11").is_err());
        assert!(PowerTier::parse("goblin").is_err());
    }

    #[test]
    fn test_gap_above() {
        let character = PowerTier::parse("T6").expect("valid");
        let threat = PowerTier::parse("T9").expect("valid");
        assert_eq!(character.gap_above(threat), 3);
        assert_eq!(threat.gap_above(character), -3);
    }

    #[test]
    fn test_from_level() {
        assert_eq!(PowerTier::from_level(1), PowerTier::BASELINE);
        assert_eq!(PowerTier::from_level(5).number(), 10);
        assert_eq!(PowerTier::from_level(6).number(), 9);
        assert_eq!(PowerTier::from_level(11).number(), 8);
        // Saturates at the strongest tier
        assert_eq!(PowerTier::from_level(500), PowerTier::STRONGEST);
    }

    #[test]
    fn test_composition_thresholds() {
        assert_eq!(composition_for_gap(0), CompositionMode::Standard);
        assert_eq!(composition_for_gap(1), CompositionMode::Standard);
        assert_eq!(composition_for_gap(2), CompositionMode::Blended);
        assert_eq!(composition_for_gap(3), CompositionMode::Blended);
        assert_eq!(composition_for_gap(4), CompositionMode::OpDominant);
        assert_eq!(composition_for_gap(-2), CompositionMode::Standard);
    }

    #[test]
    fn test_serde_as_string() {
        let tier = PowerTier::parse("T7").expect("valid");
        let json = serde_json::to_string(&tier).expect("serialize");
        assert_eq!(json, "\"T7\"");
        let back: PowerTier = serde_json::from_str("\"T7\"").expect("deserialize");
        assert_eq!(back, tier);
    }
}
