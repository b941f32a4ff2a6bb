//! The narrative writer: turns the assembled turn context into prose.
//!
//! The prompt is assembled in blocks ordered for provider prompt caching:
//! block 1 (profile DNA + session-stable rule guidance) is computed once per
//! session and prepended to the system prompt so the cacheable prefix never
//! changes; memories, lore, and per-turn scene state follow in the user
//! message.

use std::sync::Arc;

use showrunner_domain::NarrativeProfile;

use crate::agents::combat::CombatResolution;
use crate::agents::intent::IntentOutput;
use crate::agents::outcome::OutcomeOutput;
use crate::agents::pacing::PacingDirective;
use crate::agents::tools::{run_with_tools, ResearchToolbox};
use crate::infrastructure::persistence::GameContext;
use crate::infrastructure::ports::{LlmError, LlmRequest};
use crate::infrastructure::router::{AgentKey, ProviderManager};
use crate::prompts;

pub struct WriterInputs<'a> {
    pub player_input: &'a str,
    pub intent: &'a IntentOutput,
    pub outcome: &'a OutcomeOutput,
    pub context: &'a GameContext,
    pub memories: &'a str,
    pub lore: &'a str,
    pub npc_cards: Option<&'a str>,
    pub pacing: Option<&'a PacingDirective>,
    pub overrides: &'a str,
    pub combat: Option<&'a CombatResolution>,
    pub foreshadowing_callbacks: &'a str,
    pub active_consequences: &'a str,
    pub dynamic_guidance: &'a str,
    pub world_building: &'a str,
    pub sakuga: bool,
    pub recent_messages: &'a [String],
    pub compaction_text: &'a str,
}

pub struct NarrativeWriter {
    manager: Arc<ProviderManager>,
    profile: NarrativeProfile,
    /// Block 1: session-stable guidance, computed once.
    static_block: std::sync::RwLock<Option<String>>,
}

impl NarrativeWriter {
    pub fn new(manager: Arc<ProviderManager>, profile: NarrativeProfile) -> Self {
        Self {
            manager,
            profile,
            static_block: std::sync::RwLock::new(None),
        }
    }

    pub fn has_static_guidance(&self) -> bool {
        self.static_block
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Install the session-stable rule guidance (DNA narration, genre,
    /// OP-axis, tension). First caller wins; later calls append.
    pub fn set_static_rule_guidance(&self, guidance: &str) {
        let mut block = self.static_block.write().unwrap_or_else(|e| e.into_inner());
        match block.as_mut() {
            Some(existing) if !guidance.is_empty() => {
                existing.push_str("\n\n");
                existing.push_str(guidance);
            }
            _ => *block = Some(self.build_static_block(guidance)),
        }
    }

    /// Block 1: everything about the profile that holds for the whole session.
    fn build_static_block(&self, rule_guidance: &str) -> String {
        let p = &self.profile;
        let mut block = format!(
            "## Narrative Profile: {}\nTone: {}\nCombat style: {}\nPower system: {}\n\
             Composition: {} (tier differential {})\nPacing: {}",
            p.name,
            p.tone,
            p.combat_style,
            p.power_system,
            p.composition.mode.as_str(),
            p.composition.differential,
            p.pacing,
        );
        if !p.dna.is_empty() {
            let mut scales: Vec<String> =
                p.dna.iter().map(|(k, v)| format!("{k}={v}")).collect();
            scales.sort();
            block.push_str(&format!("\nDNA scales: {}", scales.join(", ")));
        }
        if !p.tropes.is_empty() {
            block.push_str(&format!("\nTropes in play: {}", p.tropes.join(", ")));
        }
        if !p.detected_genres.is_empty() {
            block.push_str(&format!("\nGenres: {}", p.detected_genres.join(", ")));
        }
        if !p.author_voice.is_empty() {
            block.push_str(&format!("\n\n## Author Voice\n{}", p.author_voice));
        }
        if !p.voice_cards.is_empty() {
            let mut cards: Vec<String> = p
                .voice_cards
                .iter()
                .map(|(name, voice)| format!("- {name}: {voice}"))
                .collect();
            cards.sort();
            block.push_str(&format!("\n\n## Voice Cards\n{}", cards.join("\n")));
        }
        if !rule_guidance.is_empty() {
            block.push_str(&format!("\n\n## Session Guidance\n{rule_guidance}"));
        }
        block
    }

    /// Generate the turn's narrative. Research tools are optional and
    /// bounded; any provider failure surfaces to the orchestrator, which owns
    /// the minimal-narrative fallback.
    pub async fn generate(
        &self,
        inputs: WriterInputs<'_>,
        toolbox: Option<&ResearchToolbox>,
    ) -> Result<String, LlmError> {
        let static_block = {
            let guard = self.static_block.read().unwrap_or_else(|e| e.into_inner());
            guard.clone().unwrap_or_else(|| self.build_static_block(""))
        };
        let system = format!("{}\n\n{static_block}", prompts::get(AgentKey::Writer).content);
        let user = self.build_user_message(&inputs);

        let mut request = LlmRequest::new(system, user);
        request.temperature = Some(if inputs.sakuga { 0.9 } else { 0.7 });

        let response = match toolbox {
            Some(toolbox) => {
                run_with_tools(&self.manager, AgentKey::Writer, request, toolbox).await?
            }
            None => self.manager.complete(AgentKey::Writer, request).await?,
        };

        let narrative = response.content.trim().to_string();
        if narrative.is_empty() {
            return Err(LlmError::InvalidResponse(
                "writer produced empty narrative".to_string(),
            ));
        }
        Ok(narrative)
    }

    fn build_user_message(&self, inputs: &WriterInputs<'_>) -> String {
        let ctx = inputs.context;
        let mut message = String::new();

        // Block 2: memories
        message.push_str(&format!("## Relevant Memories\n{}\n", inputs.memories));

        // Block 3: profile lore
        if !inputs.lore.is_empty() {
            message.push_str(&format!("\n## Canon Lore\n{}\n", inputs.lore));
        }

        // Block 4: dynamic per-turn context
        message.push_str(&format!(
            "\n## Scene\nLocation: {}\nSituation: {}\nCharacter: {}\nArc: {} ({}), tension {:.2}\n",
            ctx.location,
            ctx.situation,
            ctx.character_summary,
            ctx.arc_name,
            ctx.arc_phase,
            ctx.tension_level,
        ));
        if ctx.op.enabled {
            message.push_str("OP protagonist mode is ACTIVE.\n");
        }
        if !ctx.present_npcs.is_empty() {
            message.push_str(&format!("Present NPCs: {}\n", ctx.present_npcs.join(", ")));
        }
        if !ctx.director_notes.is_empty() {
            message.push_str(&format!("\n## Director's Notes\n{}\n", ctx.director_notes));
        }
        if let Some(cards) = inputs.npc_cards {
            message.push_str(&format!("\n## NPC Context\n{cards}\n"));
        }

        message.push_str(&format!(
            "\n## Judged Outcome\nIntent: {}\nEpicness: {:.2}\nSuccess: {} | Weight: {}\nReasoning: {}\n",
            inputs.intent.summary(),
            inputs.intent.declared_epicness,
            inputs.outcome.success_level.as_str(),
            inputs.outcome.narrative_weight.as_str(),
            inputs.outcome.reasoning,
        ));
        if !inputs.intent.special_conditions.is_empty() {
            message.push_str(&format!(
                "Special conditions: {:?}\n",
                inputs.intent.special_conditions
            ));
        }
        if let Some(cost) = &inputs.outcome.cost {
            message.push_str(&format!("Cost to apply: {cost}\n"));
        }
        if let Some(consequence) = &inputs.outcome.consequence {
            message.push_str(&format!("Consequence to seed: {consequence}\n"));
        }

        if let Some(combat) = inputs.combat {
            message.push_str(&format!(
                "\n## Combat Resolution (pre-computed)\nHit: {}\nDamage dealt: {}\nDamage type: {}\n{}{}Mechanical detail: {}\n\
                 Narrate these exact numbers. Do NOT contradict them.\n",
                if combat.hit { "Yes" } else { "Miss" },
                combat.damage_dealt,
                combat.damage_type,
                if combat.critical { "CRITICAL HIT!\n" } else { "" },
                if combat.sakuga_moment { "Sakuga moment.\n" } else { "" },
                combat.description,
            ));
        }

        if !inputs.overrides.is_empty() {
            message.push_str(&format!(
                "\n## PLAYER OVERRIDES (MUST BE ENFORCED)\n{}\n",
                inputs.overrides
            ));
        }
        if let Some(pacing) = inputs.pacing {
            message.push_str(&format!("\n## Pacing Directive\n{}\n", pacing.render()));
        }
        if !inputs.foreshadowing_callbacks.is_empty() {
            message.push_str(&format!(
                "\n## Callback Opportunities\nThese threads are READY for payoff. Weave them in if \
                 the situation permits — don't force them.\n{}\n",
                inputs.foreshadowing_callbacks
            ));
        }
        if !inputs.active_consequences.is_empty() {
            message.push_str(&format!(
                "\n## Active World Consequences\n{}\n",
                inputs.active_consequences
            ));
        }
        if !inputs.dynamic_guidance.is_empty() {
            message.push_str(&format!("\n## Guidance\n{}\n", inputs.dynamic_guidance));
        }
        if !inputs.world_building.is_empty() {
            message.push_str(&format!("\n{}\n", inputs.world_building));
        }
        if !inputs.compaction_text.is_empty() {
            message.push_str(&format!(
                "\n## Earlier This Session (compacted)\n{}\n",
                inputs.compaction_text
            ));
        }
        if !inputs.recent_messages.is_empty() {
            message.push_str(&format!(
                "\n## Recent Messages\n{}\n",
                inputs.recent_messages.join("\n")
            ));
        }

        if inputs.sakuga {
            message.push_str("\nSAKUGA MODE: this is a climactic beat — spend the ink.\n");
        }
        message.push_str(&format!("\n## Player Input\n{}\n", inputs.player_input));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::persistence::StateStore;
    use crate::infrastructure::router::ProviderKind;
    use crate::test_fixtures::ScriptedLlm;
    use showrunner_domain::{CampaignId, Character, ProfileId, WorldState};

    async fn game_context() -> GameContext {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let store = StateStore::new(pool, CampaignId::new(), Arc::new(SystemClock::new()));
        store
            .save_character(&Character::new("Rin"))
            .await
            .expect("save");
        store
            .save_world(&WorldState::new("Ramen Alley", "A standoff over the last bowl"))
            .await
            .expect("save");
        store.get_context().await.expect("context")
    }

    fn writer(scripted: ScriptedLlm) -> NarrativeWriter {
        let manager = Arc::new(ProviderManager::new());
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 2);
        manager.set_default_route(ProviderKind::Ollama, "m");
        let mut profile = NarrativeProfile::new(ProfileId::from("test"), "Ember Blade");
        profile.tone = "warm, fierce".to_string();
        NarrativeWriter::new(manager, profile)
    }

    #[tokio::test]
    async fn test_generate_includes_blocks_in_request() {
        let scripted = ScriptedLlm::new();
        scripted.set_text_for("narrative writer", "The alley holds its breath.");
        let seen = scripted.clone();
        let writer = writer(scripted);
        let context = game_context().await;

        let intent = IntentOutput::fallback("I stare her down");
        let outcome = OutcomeOutput::trivial_success();
        let narrative = writer
            .generate(
                WriterInputs {
                    player_input: "I stare her down",
                    intent: &intent,
                    outcome: &outcome,
                    context: &context,
                    memories: "- [EVENT] Mia lost the last duel.",
                    lore: "Mia is a rival swordswoman.",
                    npc_cards: None,
                    pacing: None,
                    overrides: "[NPC_PROTECTION] Mia cannot die",
                    combat: None,
                    foreshadowing_callbacks: "",
                    active_consequences: "",
                    dynamic_guidance: "",
                    world_building: "",
                    sakuga: false,
                    recent_messages: &[],
                    compaction_text: "",
                },
                None,
            )
            .await
            .expect("generates");

        assert_eq!(narrative, "The alley holds its breath.");
        let request = seen.seen_requests().pop().expect("request");
        assert!(request.contains("Mia lost the last duel"));
        assert!(request.contains("PLAYER OVERRIDES"));
        assert!(request.contains("Mia cannot die"));
        assert!(request.contains("Ramen Alley"));
    }

    #[tokio::test]
    async fn test_static_block_set_once_then_appended() {
        let writer = writer(ScriptedLlm::new());
        assert!(!writer.has_static_guidance());
        writer.set_static_rule_guidance("## OP Axis\nExistential tension.");
        assert!(writer.has_static_guidance());
        writer.set_static_rule_guidance("## Genre\nShonen escalation.");

        let block = writer
            .static_block
            .read()
            .expect("lock")
            .clone()
            .expect("set");
        assert!(block.contains("Existential tension"));
        assert!(block.contains("Shonen escalation"));
        assert!(block.contains("Ember Blade"));
    }

    #[tokio::test]
    async fn test_empty_narrative_is_an_error() {
        let scripted = ScriptedLlm::new();
        scripted.set_text_for("narrative writer", "   ");
        let writer = writer(scripted);
        let context = game_context().await;
        let intent = IntentOutput::fallback("look");
        let outcome = OutcomeOutput::trivial_success();

        let result = writer
            .generate(
                WriterInputs {
                    player_input: "look",
                    intent: &intent,
                    outcome: &outcome,
                    context: &context,
                    memories: "",
                    lore: "",
                    npc_cards: None,
                    pacing: None,
                    overrides: "",
                    combat: None,
                    foreshadowing_callbacks: "",
                    active_consequences: "",
                    dynamic_guidance: "",
                    world_building: "",
                    sakuga: false,
                    recent_messages: &[],
                    compaction_text: "",
                },
                None,
            )
            .await;
        assert!(result.is_err());
    }
}
