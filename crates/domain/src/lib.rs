//! Showrunner domain: game-state entities, value objects, and invariants.
//!
//! No I/O, no async, no randomness. Everything that touches a database, an
//! LLM provider, or a clock lives in the engine crate; this crate only knows
//! the rules of the game world.

pub mod entities;
pub mod enums;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{
    content_fingerprint, ArcSummary, CampaignBible, Character, CompositionSettings, Consequence,
    EmotionalMilestone, ForeshadowSeed, LoreChunk, MemoryRecord, NarrativeProfile, Npc,
    OpSettings, OpSuggestion, OverrideRule, PageType, Quest, QuestObjective, ResourcePool,
    RuleCategory, RuleChunk, TurnRecord, WorldState, DEDUP_PREFIX_LEN, FLAG_MILESTONE,
    FLAG_PLOT_CRITICAL, FLAG_SESSION_ZERO, OVERDUE_TENSION_BUMP, PAYOFF_SLACK_TURNS,
};
pub use enums::{
    ArcPhase, CompositionMode, ConsequenceCategory, DecayRate, GrowthModel, IntelligenceStage,
    IntentKind, MemoryKind, NarrativeWeight, OpNarrativeFocus, OpPowerExpression, OpPreset,
    OpTensionSource, OverrideCategory, PacingBeat, PacingStrength, QuestSource, QuestStatus,
    SeedStatus, SeedType, Severity, SpecialCondition, StoryScale, SuccessLevel,
};
pub use error::DomainError;
pub use ids::{
    CampaignId, CharacterId, CombatResultId, ConsequenceId, MemoryId, NpcId, OverrideId,
    ProfileId, QuestId, SeedId,
};
pub use value_objects::{
    composition_for_gap, Affinity, Disposition, DispositionMilestone, Heat, PowerTier,
};
