pub mod bible;
pub mod character;
pub mod consequence;
pub mod foreshadow;
pub mod memory;
pub mod npc;
pub mod overrides;
pub mod profile;
pub mod quest;
pub mod rules;
pub mod turn;
pub mod world;

pub use bible::{ArcSummary, CampaignBible};
pub use character::{Character, OpSettings, ResourcePool};
pub use consequence::Consequence;
pub use foreshadow::{ForeshadowSeed, OVERDUE_TENSION_BUMP, PAYOFF_SLACK_TURNS};
pub use memory::{
    content_fingerprint, MemoryRecord, DEDUP_PREFIX_LEN, FLAG_MILESTONE, FLAG_PLOT_CRITICAL,
    FLAG_SESSION_ZERO,
};
pub use npc::{EmotionalMilestone, Npc};
pub use overrides::OverrideRule;
pub use profile::{CompositionSettings, NarrativeProfile};
pub use quest::{Quest, QuestObjective};
pub use rules::{LoreChunk, PageType, RuleCategory, RuleChunk};
pub use turn::TurnRecord;
pub use world::{OpSuggestion, WorldState};
