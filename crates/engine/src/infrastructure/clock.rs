//! System clock and RNG adapters, plus fixed test doubles.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::infrastructure::ports::{ClockPort, RandomPort};

pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct SystemRandom;

impl SystemRandom {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPort for SystemRandom {
    fn roll(&self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }
}

/// Fixed clock for deterministic tests.
pub struct FixedClock(pub DateTime<Utc>);

impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// RNG that replays a scripted sequence, then repeats the last value.
pub struct SequenceRandom {
    values: std::sync::Mutex<Vec<i32>>,
}

impl SequenceRandom {
    pub fn new(values: Vec<i32>) -> Self {
        Self {
            values: std::sync::Mutex::new(values),
        }
    }
}

impl RandomPort for SequenceRandom {
    fn roll(&self, min: i32, max: i32) -> i32 {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let value = if values.len() > 1 {
            values.remove(0)
        } else {
            values.first().copied().unwrap_or(min)
        };
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_random_in_range() {
        let rng = SystemRandom::new();
        for _ in 0..100 {
            let roll = rng.roll(1, 20);
            assert!((1..=20).contains(&roll));
        }
    }

    #[test]
    fn test_sequence_random_replays_and_clamps() {
        let rng = SequenceRandom::new(vec![20, 3, 99]);
        assert_eq!(rng.roll(1, 20), 20);
        assert_eq!(rng.roll(1, 20), 3);
        assert_eq!(rng.roll(1, 20), 20); // 99 clamped
        assert_eq!(rng.roll(1, 20), 20); // repeats last
    }
}
