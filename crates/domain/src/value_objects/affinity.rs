//! NPC affinity toward the protagonist.
//!
//! Affinity is a clamped -100..=100 score. Disposition is derived from it,
//! and crossing a disposition boundary produces a milestone descriptor the
//! background pipeline records as a relationship memory.

use serde::{Deserialize, Serialize};

/// Clamped affinity score (-100..=100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Affinity(i32);

/// Disposition bands derived from affinity. Boundaries sit at +/-25, 50, 75.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Nemesis,
    Enemy,
    Rival,
    Neutral,
    Friendly,
    Allied,
    Devoted,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Nemesis => "nemesis",
            Disposition::Enemy => "enemy",
            Disposition::Rival => "rival",
            Disposition::Neutral => "neutral",
            Disposition::Friendly => "friendly",
            Disposition::Allied => "allied",
            Disposition::Devoted => "devoted",
        }
    }
}

/// Emitted when an affinity change crosses a disposition boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispositionMilestone {
    pub from: Disposition,
    pub to: Disposition,
    pub affinity: i32,
    pub description: String,
}

impl Affinity {
    pub const MIN: i32 = -100;
    pub const MAX: i32 = 100;

    pub fn new(value: i32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn disposition(&self) -> Disposition {
        match self.0 {
            v if v <= -75 => Disposition::Nemesis,
            v if v <= -50 => Disposition::Enemy,
            v if v <= -25 => Disposition::Rival,
            v if v < 25 => Disposition::Neutral,
            v if v < 50 => Disposition::Friendly,
            v if v < 75 => Disposition::Allied,
            _ => Disposition::Devoted,
        }
    }

    /// Apply a delta, clamping to range. Returns the new affinity plus a
    /// milestone descriptor when a disposition boundary was crossed.
    pub fn applying(self, delta: i32, npc_name: &str) -> (Affinity, Option<DispositionMilestone>) {
        let next = Affinity::new(self.0 + delta);
        let before = self.disposition();
        let after = next.disposition();
        if before == after {
            return (next, None);
        }
        let direction = if after > before { "warmed" } else { "soured" };
        let milestone = DispositionMilestone {
            from: before,
            to: after,
            affinity: next.0,
            description: format!(
                "{npc_name} has {direction} toward you: now {} ({})",
                after.as_str(),
                next.0
            ),
        };
        (next, Some(milestone))
    }
}

impl Default for Affinity {
    fn default() -> Self {
        Self(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(Affinity::new(250).value(), 100);
        assert_eq!(Affinity::new(-250).value(), -100);
        let (after, _) = Affinity::new(90).applying(40, "Mia");
        assert_eq!(after.value(), 100);
    }

    #[test]
    fn test_disposition_bands() {
        assert_eq!(Affinity::new(0).disposition(), Disposition::Neutral);
        assert_eq!(Affinity::new(24).disposition(), Disposition::Neutral);
        assert_eq!(Affinity::new(25).disposition(), Disposition::Friendly);
        assert_eq!(Affinity::new(50).disposition(), Disposition::Allied);
        assert_eq!(Affinity::new(75).disposition(), Disposition::Devoted);
        assert_eq!(Affinity::new(-25).disposition(), Disposition::Rival);
        assert_eq!(Affinity::new(-50).disposition(), Disposition::Enemy);
        assert_eq!(Affinity::new(-75).disposition(), Disposition::Nemesis);
    }

    #[test]
    fn test_milestone_on_boundary_cross() {
        let (after, milestone) = Affinity::new(20).applying(10, "Mia");
        assert_eq!(after.value(), 30);
        let milestone = milestone.expect("boundary crossed");
        assert_eq!(milestone.from, Disposition::Neutral);
        assert_eq!(milestone.to, Disposition::Friendly);
        assert!(milestone.description.contains("Mia"));

        // No milestone when staying inside a band
        let (_, none) = Affinity::new(30).applying(5, "Mia");
        assert!(none.is_none());
    }

    #[test]
    fn test_milestone_downward() {
        let (_, milestone) = Affinity::new(-20).applying(-10, "Kaz");
        let milestone = milestone.expect("boundary crossed");
        assert_eq!(milestone.to, Disposition::Rival);
        assert!(milestone.description.contains("soured"));
    }
}
