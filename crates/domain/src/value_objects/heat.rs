//! Memory heat: a 1..=100 relevance score with exponential decay.

use serde::{Deserialize, Serialize};

use crate::enums::DecayRate;

/// Per-memory relevance counter. Lives in [1, 100] while the memory is alive;
/// new memories start hot.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Heat(f64);

impl Heat {
    pub const FLOOR: f64 = 1.0;
    pub const CEILING: f64 = 100.0;
    /// Relationship memories with a milestone (or plot-critical flag) never
    /// cool below this.
    pub const MILESTONE_FLOOR: f64 = 40.0;

    pub fn new(value: f64) -> Self {
        Self(value.clamp(Self::FLOOR, Self::CEILING))
    }

    pub fn hot() -> Self {
        Self(Self::CEILING)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Apply `turns` worth of decay at the given rate, flooring at 1.
    pub fn decayed(self, rate: DecayRate, turns: i64) -> Heat {
        if turns <= 0 || rate == DecayRate::None {
            return self;
        }
        let factor = rate.multiplier().powi(turns as i32);
        Heat::new(self.0 * factor)
    }

    /// Decay with a minimum floor (milestone relationship memories).
    pub fn decayed_with_floor(self, rate: DecayRate, turns: i64, floor: f64) -> Heat {
        Heat::new(self.decayed(rate, turns).0.max(floor))
    }

    /// Boost on retrieval access, clamped to the ceiling.
    pub fn boosted(self, amount: f64) -> Heat {
        Heat::new(self.0 + amount)
    }
}

impl Default for Heat {
    fn default() -> Self {
        Self::hot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_hot_and_clamps() {
        assert_eq!(Heat::hot().value(), 100.0);
        assert_eq!(Heat::new(500.0).value(), 100.0);
        assert_eq!(Heat::new(0.0).value(), 1.0);
    }

    #[test]
    fn test_decay_is_monotonic() {
        let heat = Heat::hot();
        let after_one = heat.decayed(DecayRate::Normal, 1);
        let after_three = heat.decayed(DecayRate::Normal, 3);
        assert!(after_one.value() < heat.value());
        assert!(after_three.value() < after_one.value());
        assert!((after_one.value() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_decay_rate_is_identity() {
        let heat = Heat::hot();
        assert_eq!(heat.decayed(DecayRate::None, 50).value(), 100.0);
    }

    #[test]
    fn test_decay_floors_at_one() {
        let heat = Heat::new(2.0).decayed(DecayRate::VeryFast, 40);
        assert_eq!(heat.value(), Heat::FLOOR);
    }

    #[test]
    fn test_milestone_floor() {
        let heat = Heat::hot().decayed_with_floor(DecayRate::VerySlow, 200, Heat::MILESTONE_FLOOR);
        assert_eq!(heat.value(), Heat::MILESTONE_FLOOR);
    }

    #[test]
    fn test_boost_clamps_to_ceiling() {
        assert_eq!(Heat::new(95.0).boosted(20.0).value(), 100.0);
        assert_eq!(Heat::new(50.0).boosted(30.0).value(), 80.0);
    }
}
