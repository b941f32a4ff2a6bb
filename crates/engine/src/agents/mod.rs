pub mod combat;
pub mod compactor;
pub mod director;
pub mod intent;
pub mod memory_ranker;
pub mod outcome;
pub mod overrides;
pub mod pacing;
pub mod progression;
pub mod recap;
pub mod relationship;
pub mod runtime;
pub mod tools;
pub mod validator;
pub mod world_builder;
pub mod writer;

pub use combat::{CombatAction, CombatAgent, CombatResolution, SKILL_SP_COST, SPELL_MP_COST};
pub use compactor::{CompactionBuffer, CompactorAgent};
pub use director::{DirectorAgent, DirectorOutput};
pub use intent::{IntentClassifier, IntentOutput};
pub use memory_ranker::MemoryRanker;
pub use outcome::{OutcomeJudge, OutcomeOutput};
pub use overrides::OverrideHandler;
pub use pacing::{PacingAgent, PacingDirective};
pub use progression::{ProgressionAgent, ProgressionOutput, TurnAchievements};
pub use recap::{RecapAgent, RecapOutput};
pub use relationship::{RelationshipAnalyzer, RelationshipDelta};
pub use runtime::{Agent, AgentError};
pub use tools::{ResearchToolbox, MAX_TOOL_CALLS};
pub use validator::{ValidationOutput, ValidatorAgent};
pub use world_builder::{ValidationStatus, WorldBuilderAgent, WorldBuildingOutput};
pub use writer::{NarrativeWriter, WriterInputs};
