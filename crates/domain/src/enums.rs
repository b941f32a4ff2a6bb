//! Canonical enumerations shared by the state store, agents, and orchestrator.
//!
//! Serialized spellings match the wire values the LLM agents are prompted to
//! produce, so these deserialize straight out of structured agent output as
//! well as database columns.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Intent classification ───────────────────────────────────────────────

/// Player intent categories (uppercase, matching the classifier's output schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    Combat,
    Social,
    Exploration,
    Ability,
    Inventory,
    WorldBuilding,
    MetaFeedback,
    OverrideCommand,
    OpCommand,
    Other,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Combat => "COMBAT",
            IntentKind::Social => "SOCIAL",
            IntentKind::Exploration => "EXPLORATION",
            IntentKind::Ability => "ABILITY",
            IntentKind::Inventory => "INVENTORY",
            IntentKind::WorldBuilding => "WORLD_BUILDING",
            IntentKind::MetaFeedback => "META_FEEDBACK",
            IntentKind::OverrideCommand => "OVERRIDE_COMMAND",
            IntentKind::OpCommand => "OP_COMMAND",
            IntentKind::Other => "OTHER",
        }
    }

    /// System commands skip retrieval and narrative generation entirely.
    pub fn is_system_command(&self) -> bool {
        matches!(
            self,
            IntentKind::MetaFeedback | IntentKind::OverrideCommand | IntentKind::OpCommand
        )
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags the classifier raises for dramatically charged actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCondition {
    /// The player invoked a named signature attack.
    NamedAttack,
    /// First on-screen use of a new power.
    FirstTimePower,
    /// A transformation or form change.
    Transformation,
    /// An emotionally loaded confrontation or confession.
    EmotionalClimax,
}

impl SpecialCondition {
    /// Conditions that force sakuga mode regardless of outcome weight.
    pub fn triggers_sakuga(&self) -> bool {
        matches!(
            self,
            SpecialCondition::NamedAttack | SpecialCondition::FirstTimePower
        )
    }
}

// ─── Outcome judgment ────────────────────────────────────────────────────

/// Degree of success from the Outcome Judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessLevel {
    Failure,
    Partial,
    Success,
    Critical,
}

impl SuccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuccessLevel::Failure => "failure",
            SuccessLevel::Partial => "partial",
            SuccessLevel::Success => "success",
            SuccessLevel::Critical => "critical",
        }
    }
}

/// How much narrative attention a turn deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeWeight {
    Minor,
    Standard,
    Significant,
    Climactic,
}

impl NarrativeWeight {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeWeight::Minor => "minor",
            NarrativeWeight::Standard => "standard",
            NarrativeWeight::Significant => "significant",
            NarrativeWeight::Climactic => "climactic",
        }
    }
}

/// Category of a world consequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsequenceCategory {
    Political,
    Environmental,
    Relational,
    Economic,
    Magical,
}

impl ConsequenceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsequenceCategory::Political => "political",
            ConsequenceCategory::Environmental => "environmental",
            ConsequenceCategory::Relational => "relational",
            ConsequenceCategory::Economic => "economic",
            ConsequenceCategory::Magical => "magical",
        }
    }
}

/// Severity of a world consequence; drives its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Major,
    Catastrophic,
}

impl Severity {
    /// Turns a consequence of this severity stays active. `None` = never expires.
    pub fn lifetime_turns(&self) -> Option<i64> {
        match self {
            Severity::Minor => Some(5),
            Severity::Moderate => Some(15),
            Severity::Major => Some(50),
            Severity::Catastrophic => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Major => "major",
            Severity::Catastrophic => "catastrophic",
        }
    }
}

// ─── Arc / pacing ────────────────────────────────────────────────────────

/// Story arc phases stored on the world state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcPhase {
    Exposition,
    RisingAction,
    Climax,
    FallingAction,
    Resolution,
}

impl ArcPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArcPhase::Exposition => "exposition",
            ArcPhase::RisingAction => "rising_action",
            ArcPhase::Climax => "climax",
            ArcPhase::FallingAction => "falling_action",
            ArcPhase::Resolution => "resolution",
        }
    }

    /// Turns a phase may stall before the pacing directive escalates to
    /// `Override` strength.
    pub fn stall_threshold(&self) -> i64 {
        match self {
            ArcPhase::Exposition => 8,
            ArcPhase::RisingAction => 12,
            ArcPhase::Climax => 5,
            ArcPhase::FallingAction => 6,
            ArcPhase::Resolution => 4,
        }
    }
}

impl fmt::Display for ArcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-turn pacing beats from the pacing micro-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingBeat {
    Setup,
    Rising,
    Escalation,
    Climax,
    Falling,
    Resolution,
    Transition,
}

/// How strongly a pacing directive should be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStrength {
    Suggestion,
    Strong,
    Override,
}

/// Narrative scope scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryScale {
    Personal,
    Local,
    Continental,
    Planetary,
    Cosmic,
    Mythic,
}

impl StoryScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryScale::Personal => "personal",
            StoryScale::Local => "local",
            StoryScale::Continental => "continental",
            StoryScale::Planetary => "planetary",
            StoryScale::Cosmic => "cosmic",
            StoryScale::Mythic => "mythic",
        }
    }
}

// ─── NPC intelligence ────────────────────────────────────────────────────

/// NPC behavior complexity stages, gated on scene count and trust milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntelligenceStage {
    Reactive,
    Contextual,
    Anticipatory,
    Autonomous,
}

impl IntelligenceStage {
    /// Scene count needed to advance INTO this stage.
    pub fn scene_threshold(&self) -> i64 {
        match self {
            IntelligenceStage::Reactive => 0,
            IntelligenceStage::Contextual => 3,
            IntelligenceStage::Anticipatory => 10,
            IntelligenceStage::Autonomous => 25,
        }
    }

    pub fn next(&self) -> Option<IntelligenceStage> {
        match self {
            IntelligenceStage::Reactive => Some(IntelligenceStage::Contextual),
            IntelligenceStage::Contextual => Some(IntelligenceStage::Anticipatory),
            IntelligenceStage::Anticipatory => Some(IntelligenceStage::Autonomous),
            IntelligenceStage::Autonomous => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntelligenceStage::Reactive => "reactive",
            IntelligenceStage::Contextual => "contextual",
            IntelligenceStage::Anticipatory => "anticipatory",
            IntelligenceStage::Autonomous => "autonomous",
        }
    }
}

// ─── Memory ──────────────────────────────────────────────────────────────

/// Per-turn heat multiplier families for memory decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayRate {
    None,
    VerySlow,
    Slow,
    Normal,
    Fast,
    VeryFast,
}

impl DecayRate {
    /// Per-turn heat multiplier.
    pub fn multiplier(&self) -> f64 {
        match self {
            DecayRate::None => 1.00,
            DecayRate::VerySlow => 0.97,
            DecayRate::Slow => 0.95,
            DecayRate::Normal => 0.90,
            DecayRate::Fast => 0.80,
            DecayRate::VeryFast => 0.70,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecayRate::None => "none",
            DecayRate::VerySlow => "very_slow",
            DecayRate::Slow => "slow",
            DecayRate::Normal => "normal",
            DecayRate::Fast => "fast",
            DecayRate::VeryFast => "very_fast",
        }
    }
}

/// Memory categories; each carries a default decay rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Core,
    CharacterState,
    Relationship,
    Quest,
    WorldState,
    Consequence,
    Event,
    Fact,
    NpcState,
    Location,
    Episode,
    NarrativeBeat,
    SessionZero,
    Compressed,
    Calibration,
}

impl MemoryKind {
    pub fn default_decay(&self) -> DecayRate {
        match self {
            MemoryKind::Core => DecayRate::None,
            MemoryKind::CharacterState => DecayRate::Fast,
            MemoryKind::Relationship => DecayRate::VerySlow,
            MemoryKind::Quest => DecayRate::Normal,
            MemoryKind::WorldState => DecayRate::Normal,
            MemoryKind::Consequence => DecayRate::Slow,
            MemoryKind::Event => DecayRate::Normal,
            MemoryKind::Fact => DecayRate::Slow,
            MemoryKind::NpcState => DecayRate::Normal,
            MemoryKind::Location => DecayRate::Slow,
            MemoryKind::Episode => DecayRate::VeryFast,
            MemoryKind::NarrativeBeat => DecayRate::Slow,
            MemoryKind::SessionZero => DecayRate::None,
            MemoryKind::Compressed => DecayRate::Slow,
            MemoryKind::Calibration => DecayRate::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Core => "core",
            MemoryKind::CharacterState => "character_state",
            MemoryKind::Relationship => "relationship",
            MemoryKind::Quest => "quest",
            MemoryKind::WorldState => "world_state",
            MemoryKind::Consequence => "consequence",
            MemoryKind::Event => "event",
            MemoryKind::Fact => "fact",
            MemoryKind::NpcState => "npc_state",
            MemoryKind::Location => "location",
            MemoryKind::Episode => "episode",
            MemoryKind::NarrativeBeat => "narrative_beat",
            MemoryKind::SessionZero => "session_zero",
            MemoryKind::Compressed => "compressed",
            MemoryKind::Calibration => "calibration",
        }
    }

    pub fn parse(value: &str) -> MemoryKind {
        match value {
            "core" => MemoryKind::Core,
            "character_state" => MemoryKind::CharacterState,
            "relationship" => MemoryKind::Relationship,
            "quest" => MemoryKind::Quest,
            "world_state" => MemoryKind::WorldState,
            "consequence" => MemoryKind::Consequence,
            "fact" => MemoryKind::Fact,
            "npc_state" => MemoryKind::NpcState,
            "location" => MemoryKind::Location,
            "episode" => MemoryKind::Episode,
            "narrative_beat" => MemoryKind::NarrativeBeat,
            "session_zero" => MemoryKind::SessionZero,
            "compressed" => MemoryKind::Compressed,
            "calibration" => MemoryKind::Calibration,
            _ => MemoryKind::Event,
        }
    }
}

// ─── OP mode ─────────────────────────────────────────────────────────────

/// Where dramatic tension comes from when the protagonist is overpowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTensionSource {
    Existential,
    Social,
    Structural,
    Ensemble,
    Control,
    Consequence,
    Burden,
    Moral,
    Relational,
    Information,
}

impl OpTensionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpTensionSource::Existential => "existential",
            OpTensionSource::Social => "social",
            OpTensionSource::Structural => "structural",
            OpTensionSource::Ensemble => "ensemble",
            OpTensionSource::Control => "control",
            OpTensionSource::Consequence => "consequence",
            OpTensionSource::Burden => "burden",
            OpTensionSource::Moral => "moral",
            OpTensionSource::Relational => "relational",
            OpTensionSource::Information => "information",
        }
    }
}

/// How overwhelming power manifests on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPowerExpression {
    Instantaneous,
    Delayed,
    Conditional,
    Sealed,
    Derivative,
    Hidden,
    Passive,
}

impl OpPowerExpression {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpPowerExpression::Instantaneous => "instantaneous",
            OpPowerExpression::Delayed => "delayed",
            OpPowerExpression::Conditional => "conditional",
            OpPowerExpression::Sealed => "sealed",
            OpPowerExpression::Derivative => "derivative",
            OpPowerExpression::Hidden => "hidden",
            OpPowerExpression::Passive => "passive",
        }
    }
}

/// Where the narrative camera points in OP mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpNarrativeFocus {
    Personal,
    Faction,
    Ensemble,
    Internal,
    Mundane,
    Competition,
    Episodic,
}

impl OpNarrativeFocus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpNarrativeFocus::Personal => "personal",
            OpNarrativeFocus::Faction => "faction",
            OpNarrativeFocus::Ensemble => "ensemble",
            OpNarrativeFocus::Internal => "internal",
            OpNarrativeFocus::Mundane => "mundane",
            OpNarrativeFocus::Competition => "competition",
            OpNarrativeFocus::Episodic => "episodic",
        }
    }
}

/// Named OP-mode presets mapping to the three-axis system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpPreset {
    BoredGod,
    Restrainer,
    HiddenRuler,
    BurdenBearer,
    MuscleWizard,
    SealedApocalypse,
    WanderingLegend,
    NationBuilder,
    DisguisedGod,
    TimeLooper,
    Immortal,
}

impl OpPreset {
    pub fn axes(&self) -> (OpTensionSource, OpPowerExpression, OpNarrativeFocus) {
        match self {
            OpPreset::BoredGod => (
                OpTensionSource::Existential,
                OpPowerExpression::Instantaneous,
                OpNarrativeFocus::Internal,
            ),
            OpPreset::Restrainer => (
                OpTensionSource::Control,
                OpPowerExpression::Sealed,
                OpNarrativeFocus::Ensemble,
            ),
            OpPreset::HiddenRuler => (
                OpTensionSource::Consequence,
                OpPowerExpression::Derivative,
                OpNarrativeFocus::Faction,
            ),
            OpPreset::BurdenBearer => (
                OpTensionSource::Burden,
                OpPowerExpression::Hidden,
                OpNarrativeFocus::Mundane,
            ),
            OpPreset::MuscleWizard => (
                OpTensionSource::Moral,
                OpPowerExpression::Instantaneous,
                OpNarrativeFocus::Competition,
            ),
            OpPreset::SealedApocalypse => (
                OpTensionSource::Control,
                OpPowerExpression::Sealed,
                OpNarrativeFocus::Mundane,
            ),
            OpPreset::WanderingLegend => (
                OpTensionSource::Relational,
                OpPowerExpression::Passive,
                OpNarrativeFocus::Episodic,
            ),
            OpPreset::NationBuilder => (
                OpTensionSource::Consequence,
                OpPowerExpression::Derivative,
                OpNarrativeFocus::Faction,
            ),
            OpPreset::DisguisedGod => (
                OpTensionSource::Relational,
                OpPowerExpression::Hidden,
                OpNarrativeFocus::Mundane,
            ),
            OpPreset::TimeLooper => (
                OpTensionSource::Information,
                OpPowerExpression::Conditional,
                OpNarrativeFocus::Internal,
            ),
            OpPreset::Immortal => (
                OpTensionSource::Burden,
                OpPowerExpression::Passive,
                OpNarrativeFocus::Internal,
            ),
        }
    }

    pub fn parse(value: &str) -> Option<OpPreset> {
        match value.trim().to_lowercase().as_str() {
            "bored_god" => Some(OpPreset::BoredGod),
            "restrainer" => Some(OpPreset::Restrainer),
            "hidden_ruler" => Some(OpPreset::HiddenRuler),
            "burden_bearer" => Some(OpPreset::BurdenBearer),
            "muscle_wizard" => Some(OpPreset::MuscleWizard),
            "sealed_apocalypse" => Some(OpPreset::SealedApocalypse),
            "wandering_legend" => Some(OpPreset::WanderingLegend),
            "nation_builder" => Some(OpPreset::NationBuilder),
            "disguised_god" => Some(OpPreset::DisguisedGod),
            "time_looper" => Some(OpPreset::TimeLooper),
            "immortal" => Some(OpPreset::Immortal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpPreset::BoredGod => "bored_god",
            OpPreset::Restrainer => "restrainer",
            OpPreset::HiddenRuler => "hidden_ruler",
            OpPreset::BurdenBearer => "burden_bearer",
            OpPreset::MuscleWizard => "muscle_wizard",
            OpPreset::SealedApocalypse => "sealed_apocalypse",
            OpPreset::WanderingLegend => "wandering_legend",
            OpPreset::NationBuilder => "nation_builder",
            OpPreset::DisguisedGod => "disguised_god",
            OpPreset::TimeLooper => "time_looper",
            OpPreset::Immortal => "immortal",
        }
    }

    pub const ALL: [OpPreset; 11] = [
        OpPreset::BoredGod,
        OpPreset::Restrainer,
        OpPreset::HiddenRuler,
        OpPreset::BurdenBearer,
        OpPreset::MuscleWizard,
        OpPreset::SealedApocalypse,
        OpPreset::WanderingLegend,
        OpPreset::NationBuilder,
        OpPreset::DisguisedGod,
        OpPreset::TimeLooper,
        OpPreset::Immortal,
    ];
}

/// Narrative composition derived from the power-tier gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    Standard,
    Blended,
    OpDominant,
}

impl CompositionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionMode::Standard => "standard",
            CompositionMode::Blended => "blended",
            CompositionMode::OpDominant => "op_dominant",
        }
    }
}

// ─── Quests / foreshadowing / overrides ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Active,
    Completed,
    Failed,
}

impl QuestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestStatus::Active => "active",
            QuestStatus::Completed => "completed",
            QuestStatus::Failed => "failed",
        }
    }
}

/// Who planted a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestSource {
    Player,
    Director,
}

/// Lifecycle of a foreshadowing seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStatus {
    Planted,
    Callback,
    Overdue,
    Resolved,
}

impl SeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedStatus::Planted => "planted",
            SeedStatus::Callback => "callback",
            SeedStatus::Overdue => "overdue",
            SeedStatus::Resolved => "resolved",
        }
    }

    /// A seed still awaiting payoff (anything not resolved).
    pub fn is_open(&self) -> bool {
        !matches!(self, SeedStatus::Resolved)
    }
}

/// What kind of narrative hook a seed is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedType {
    Mystery,
    Threat,
    Promise,
    Revelation,
    Relationship,
}

impl SeedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeedType::Mystery => "mystery",
            SeedType::Threat => "threat",
            SeedType::Promise => "promise",
            SeedType::Revelation => "revelation",
            SeedType::Relationship => "relationship",
        }
    }
}

/// Categories of player-issued hard constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideCategory {
    NpcProtection,
    ContentConstraint,
    NarrativeDemand,
    ToneRequirement,
}

impl OverrideCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideCategory::NpcProtection => "NPC_PROTECTION",
            OverrideCategory::ContentConstraint => "CONTENT_CONSTRAINT",
            OverrideCategory::NarrativeDemand => "NARRATIVE_DEMAND",
            OverrideCategory::ToneRequirement => "TONE_REQUIREMENT",
        }
    }

    /// Keyword patterns used to classify a raw override command.
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            OverrideCategory::NpcProtection => {
                &["cannot die", "must survive", "protected", "immortal", "unkillable"]
            }
            OverrideCategory::ContentConstraint => {
                &["no torture", "no gore", "no sexual", "skip", "avoid", "don't include"]
            }
            OverrideCategory::NarrativeDemand => {
                &["must happen", "needs to", "i want", "story must", "plot needs"]
            }
            OverrideCategory::ToneRequirement => &[
                "more comedy",
                "less dark",
                "lighter",
                "darker",
                "more serious",
                "less grim",
            ],
        }
    }

    /// Warning shown to the player when the override is registered.
    pub fn warning(&self) -> &'static str {
        match self {
            OverrideCategory::NpcProtection => {
                "This character cannot be meaningfully threatened. Narrative tension involving them will be limited."
            }
            OverrideCategory::ContentConstraint => {
                "Content constraint active. This topic will be avoided."
            }
            OverrideCategory::NarrativeDemand => {
                "Forcing narrative outcomes may reduce story coherence. Consider a /meta suggestion first."
            }
            OverrideCategory::ToneRequirement => {
                "Tone override active. This may conflict with genre expectations."
            }
        }
    }

    /// Classify a raw override command by its keyword patterns.
    pub fn detect(content: &str) -> OverrideCategory {
        let lower = content.to_lowercase();
        for category in [
            OverrideCategory::NpcProtection,
            OverrideCategory::ContentConstraint,
            OverrideCategory::NarrativeDemand,
            OverrideCategory::ToneRequirement,
        ] {
            if category.patterns().iter().any(|p| lower.contains(p)) {
                return category;
            }
        }
        OverrideCategory::NarrativeDemand
    }
}

/// XP curve family derived from profile DNA pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthModel {
    Fast,
    Moderate,
    Slow,
}

impl GrowthModel {
    /// Derive from the profile's `fast_vs_slow` DNA scale (0-10).
    pub fn from_dna_pacing(pacing: i32) -> GrowthModel {
        if pacing <= 3 {
            GrowthModel::Fast
        } else if pacing >= 7 {
            GrowthModel::Slow
        } else {
            GrowthModel::Moderate
        }
    }

    /// Base XP pool per session for this growth model.
    pub fn base_xp_per_session(&self) -> i64 {
        match self {
            GrowthModel::Fast => 1000,
            GrowthModel::Moderate => 600,
            GrowthModel::Slow => 300,
        }
    }

    /// Cumulative XP required to reach a level (1-indexed).
    pub fn xp_for_level(&self, level: i64) -> i64 {
        const FAST: [i64; 10] = [0, 100, 300, 600, 1000, 1500, 2100, 2800, 3600, 4500];
        const MODERATE: [i64; 10] = [0, 200, 500, 900, 1400, 2000, 2700, 3500, 4400, 5400];
        const SLOW: [i64; 10] = [0, 300, 700, 1200, 1800, 2500, 3300, 4200, 5200, 6300];
        let table = match self {
            GrowthModel::Fast => &FAST,
            GrowthModel::Moderate => &MODERATE,
            GrowthModel::Slow => &SLOW,
        };
        if level <= 0 {
            0
        } else if (level as usize) <= table.len() {
            table[level as usize - 1]
        } else {
            // Extrapolate beyond the table
            table[table.len() - 1] + (level - table.len() as i64) * 1000
        }
    }
}
