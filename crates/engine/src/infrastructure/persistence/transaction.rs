//! Validating mutation windows over the character sheet, and the deferred
//! write batch the background processor commits atomically.

use showrunner_domain::{
    CampaignBible, Character, CombatResultId, Consequence, ForeshadowSeed, Npc, OverrideRule,
    Quest, TurnRecord, WorldState,
};

// =============================================================================
// Validation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: IssueSeverity::Warning,
            field: field.to_string(),
            message: message.into(),
        });
    }
}

/// Character-sheet integrity rules. Negative pools and over-max resources are
/// errors; a depleted pool is only a warning (the fiction decides what that
/// means).
pub fn validate_character(character: &Character) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (name, pool) in [
        ("hp", &character.hp),
        ("mp", &character.mp),
        ("sp", &character.sp),
    ] {
        if pool.current < 0 {
            report.error(name, format!("{name} cannot be negative ({})", pool.current));
        }
        if pool.current > pool.max {
            report.error(
                name,
                format!("{name} current {} exceeds max {}", pool.current, pool.max),
            );
        }
        if pool.max <= 0 {
            report.error(name, format!("{name} max must be positive ({})", pool.max));
        }
        if pool.current == 0 && pool.max > 0 {
            report.warning(name, format!("{name} is depleted"));
        }
    }

    if character.level < 1 {
        report.error("level", format!("level must be >= 1 ({})", character.level));
    }
    if character.xp_current < 0 {
        report.error("xp", "xp cannot be negative");
    }

    report
}

// =============================================================================
// Scoped mutation window (critical-path resource pre-validation)
// =============================================================================

/// A labeled mutation window over the character. Mutations accumulate on a
/// working copy; `validate` checks integrity; the store only persists the
/// copy when the window is committed clean.
#[derive(Debug)]
pub struct StateTransaction {
    pub label: String,
    working: Character,
    rolled_back: bool,
}

impl StateTransaction {
    pub fn new(label: impl Into<String>, character: Character) -> Self {
        Self {
            label: label.into(),
            working: character,
            rolled_back: false,
        }
    }

    pub fn character(&self) -> &Character {
        &self.working
    }

    pub fn subtract_hp(&mut self, amount: i64, reason: &str) {
        tracing::debug!(label = %self.label, amount, reason, "subtract hp");
        self.working.hp.current -= amount;
    }

    pub fn subtract_mp(&mut self, amount: i64, reason: &str) {
        tracing::debug!(label = %self.label, amount, reason, "subtract mp");
        self.working.mp.current -= amount;
    }

    pub fn subtract_sp(&mut self, amount: i64, reason: &str) {
        tracing::debug!(label = %self.label, amount, reason, "subtract sp");
        self.working.sp.current -= amount;
    }

    pub fn validate(&self) -> ValidationReport {
        validate_character(&self.working)
    }

    pub fn rollback(&mut self) {
        self.rolled_back = true;
    }

    /// The character to persist: None when rolled back or invalid.
    pub fn into_commit(self) -> Option<Character> {
        if self.rolled_back || !validate_character(&self.working).is_valid() {
            None
        } else {
            Some(self.working)
        }
    }
}

// =============================================================================
// Deferred commit batch
// =============================================================================

/// One buffered write. Entity variants are upserts; the ledger variants get
/// their own idempotence / monotonicity checks at commit time.
#[derive(Debug, Clone)]
pub enum StateWrite {
    Character(Character),
    Npc(Npc),
    World(WorldState),
    Bible(CampaignBible),
    Turn(TurnRecord),
    Quest(Quest),
    Consequence(Consequence),
    Seed(ForeshadowSeed),
    Override(OverrideRule),
    /// Apply combat damage to a named target exactly once per result id.
    CombatDamage {
        result_id: CombatResultId,
        target_name: String,
        damage: i64,
    },
}

/// Buffered writes that land in one atomic SQL commit.
#[derive(Debug, Default)]
pub struct DeferredCommit {
    pub(crate) writes: Vec<StateWrite>,
}

impl DeferredCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: StateWrite) {
        self.writes.push(write);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_flags_negative_hp() {
        let mut character = Character::new("Rin");
        character.hp.current = -5;
        let report = validate_character(&character);
        assert!(!report.is_valid());
        assert!(report.issues.iter().any(|i| i.field == "hp"));
    }

    #[test]
    fn test_validate_flags_over_max_mp() {
        let mut character = Character::new("Rin");
        character.mp.current = character.mp.max + 10;
        assert!(!validate_character(&character).is_valid());
    }

    #[test]
    fn test_depleted_pool_is_warning_only() {
        let mut character = Character::new("Rin");
        character.sp.current = 0;
        let report = validate_character(&character);
        assert!(report.is_valid());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_transaction_commits_only_when_clean() {
        let character = Character::new("Rin");
        let mut txn = StateTransaction::new("Spell resource cost", character.clone());
        txn.subtract_mp(20, "spell cost");
        assert!(txn.validate().is_valid());
        let committed = txn.into_commit().expect("clean commit");
        assert_eq!(committed.mp.current, 30);

        // Overspending fails validation and yields no commit
        let mut broke = StateTransaction::new("Spell resource cost", character);
        broke.subtract_mp(999, "spell cost");
        assert!(!broke.validate().is_valid());
        assert!(broke.into_commit().is_none());
    }

    #[test]
    fn test_rollback_discards_changes() {
        let mut txn = StateTransaction::new("test", Character::new("Rin"));
        txn.subtract_sp(10, "skill");
        txn.rollback();
        assert!(txn.into_commit().is_none());
    }
}
