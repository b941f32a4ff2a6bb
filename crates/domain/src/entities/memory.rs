//! Vector-indexed memory units with heat, decay, and flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{DecayRate, MemoryKind};
use crate::ids::MemoryId;
use crate::value_objects::Heat;

/// Flag marking memories that must never decay or be compressed away.
pub const FLAG_PLOT_CRITICAL: &str = "plot_critical";
/// Flag marking relationship memories with an emotional milestone.
pub const FLAG_MILESTONE: &str = "milestone";
/// Flag for memories seeded from Session Zero.
pub const FLAG_SESSION_ZERO: &str = "session_zero";

/// Characters of content compared for duplicate detection.
pub const DEDUP_PREFIX_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: MemoryId,
    pub kind: MemoryKind,
    pub content: String,
    pub heat: Heat,
    pub decay_rate: DecayRate,
    pub flags: Vec<String>,
    pub turn_number: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a memory. The decay rate defaults from the kind; a
    /// plot-critical flag forces it to `None` regardless.
    pub fn new(
        kind: MemoryKind,
        content: impl Into<String>,
        turn_number: i64,
        decay_override: Option<DecayRate>,
        flags: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut decay_rate = decay_override.unwrap_or_else(|| kind.default_decay());
        if flags.iter().any(|f| f == FLAG_PLOT_CRITICAL) {
            decay_rate = DecayRate::None;
        }
        Self {
            id: MemoryId::new(),
            kind,
            content: content.into(),
            heat: Heat::hot(),
            decay_rate,
            flags,
            turn_number,
            metadata: serde_json::Value::Null,
            created_at,
        }
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn is_plot_critical(&self) -> bool {
        self.has_flag(FLAG_PLOT_CRITICAL)
    }

    /// Dedup key: the first 200 chars of trimmed content.
    pub fn fingerprint(&self) -> &str {
        content_fingerprint(&self.content)
    }

    /// Force plot-critical: flag plus zero decay.
    pub fn mark_plot_critical(&mut self) {
        if !self.is_plot_critical() {
            self.flags.push(FLAG_PLOT_CRITICAL.to_string());
        }
        self.decay_rate = DecayRate::None;
    }

    /// Heat floor that applies to this memory during decay.
    pub fn heat_floor(&self) -> f64 {
        if self.kind == MemoryKind::Relationship
            && (self.has_flag(FLAG_MILESTONE) || self.is_plot_critical())
        {
            Heat::MILESTONE_FLOOR
        } else {
            Heat::FLOOR
        }
    }

    /// Apply decay for elapsed turns, honoring this memory's floor.
    pub fn decay(&mut self, turns_elapsed: i64) {
        self.heat = self
            .heat
            .decayed_with_floor(self.decay_rate, turns_elapsed, self.heat_floor());
    }

    /// Heat boost applied when retrieval touches this memory.
    pub fn access_boost(&self) -> f64 {
        if self.kind == MemoryKind::Relationship {
            30.0
        } else {
            20.0
        }
    }
}

/// Shared fingerprint rule for dedup checks before a record exists.
pub fn content_fingerprint(content: &str) -> &str {
    let trimmed = content.trim();
    let end = trimmed
        .char_indices()
        .nth(DEDUP_PREFIX_LEN)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: MemoryKind, flags: Vec<&str>) -> MemoryRecord {
        MemoryRecord::new(
            kind,
            "Aki swore an oath at the burning gate.",
            3,
            None,
            flags.into_iter().map(String::from).collect(),
            Utc::now(),
        )
    }

    #[test]
    fn test_plot_critical_forces_no_decay() {
        let memory = record(MemoryKind::Event, vec![FLAG_PLOT_CRITICAL]);
        assert_eq!(memory.decay_rate, DecayRate::None);
        let mut decayed = memory.clone();
        decayed.decay(50);
        assert_eq!(decayed.heat.value(), 100.0);
    }

    #[test]
    fn test_default_decay_from_kind() {
        assert_eq!(record(MemoryKind::Episode, vec![]).decay_rate, DecayRate::VeryFast);
        assert_eq!(
            record(MemoryKind::Relationship, vec![]).decay_rate,
            DecayRate::VerySlow
        );
    }

    #[test]
    fn test_milestone_relationship_floor() {
        let mut memory = record(MemoryKind::Relationship, vec![FLAG_MILESTONE]);
        memory.decay(500);
        assert_eq!(memory.heat.value(), Heat::MILESTONE_FLOOR);

        let mut plain_event = record(MemoryKind::Event, vec![]);
        plain_event.decay(500);
        assert_eq!(plain_event.heat.value(), Heat::FLOOR);
    }

    #[test]
    fn test_relationship_boost_is_stronger() {
        assert_eq!(record(MemoryKind::Relationship, vec![]).access_boost(), 30.0);
        assert_eq!(record(MemoryKind::Event, vec![]).access_boost(), 20.0);
    }

    #[test]
    fn test_fingerprint_truncates() {
        let long = "x".repeat(500);
        assert_eq!(content_fingerprint(&long).len(), DEDUP_PREFIX_LEN);
        assert_eq!(content_fingerprint("  short  "), "short");
    }

    #[test]
    fn test_mark_plot_critical() {
        let mut memory = record(MemoryKind::Fact, vec![]);
        memory.mark_plot_critical();
        assert!(memory.is_plot_critical());
        assert_eq!(memory.decay_rate, DecayRate::None);
        // Idempotent
        memory.mark_plot_critical();
        assert_eq!(
            memory.flags.iter().filter(|f| *f == FLAG_PLOT_CRITICAL).count(),
            1
        );
    }
}
