//! The turn orchestrator: one player utterance in, one coherent narrative
//! response out, with every agent coordinated in between.

pub mod background;
pub mod composition;
pub mod foreshadow;
pub mod portraits;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use showrunner_domain::{
    CampaignId, CompositionMode, IntentKind, NarrativeProfile, NarrativeWeight, OpPreset,
    OpSuggestion, PowerTier, ProfileId, SpecialCondition, SuccessLevel,
};

use crate::agents::combat::{CombatAgent, CombatResolution, SKILL_SP_COST, SPELL_MP_COST};
use crate::agents::director::DirectorAgent;
use crate::agents::intent::{IntentClassifier, IntentOutput};
use crate::agents::outcome::{OutcomeJudge, OutcomeOutput};
use crate::agents::overrides::OverrideHandler;
use crate::agents::pacing::PacingAgent;
use crate::agents::progression::ProgressionAgent;
use crate::agents::recap::{RecapAgent, RecapOutput};
use crate::agents::relationship::RelationshipAnalyzer;
use crate::agents::runtime::AgentError;
use crate::agents::tools::ResearchToolbox;
use crate::agents::validator::ValidatorAgent;
use crate::agents::world_builder::{ValidationStatus, WorldBuilderAgent};
use crate::agents::writer::{NarrativeWriter, WriterInputs};
use crate::context::lore::ProfileLibrary;
use crate::context::memory::MemoryStore;
use crate::context::rules::RuleLibrary;
use crate::context::selector::ContextSelector;
use crate::infrastructure::persistence::{GameContext, StateStore};
use crate::infrastructure::ports::{ClockPort, LlmError, PortraitPort, RepoError};
use crate::infrastructure::router::ProviderManager;
use crate::infrastructure::vector::VectorError;
use crate::orchestrator::composition::effective_composition;
use crate::orchestrator::foreshadow::ForeshadowingLedger;

/// Foreshadowing callbacks surfaced to the writer per turn.
const CALLBACK_CAP: usize = 3;
/// High-imbalance encounters before the OP-mode suggestion fires.
const OP_SUGGESTION_THRESHOLD: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// The per-turn result handed back to the HTTP collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub narrative: String,
    pub intent: IntentOutput,
    pub outcome: Option<OutcomeOutput>,
    pub latency_ms: i64,
    pub portrait_map: HashMap<String, String>,
    pub turn_number: i64,
    pub campaign_id: CampaignId,
}

pub(crate) struct Parts {
    pub profile: NarrativeProfile,
    pub profile_id: ProfileId,
    pub store: Arc<StateStore>,
    pub memory: Arc<MemoryStore>,
    pub rules: Arc<RuleLibrary>,
    pub lore: Arc<ProfileLibrary>,
    pub selector: ContextSelector,
    pub manager: Arc<ProviderManager>,
    pub intent: IntentClassifier,
    pub outcome: OutcomeJudge,
    pub pacing: PacingAgent,
    pub validator: ValidatorAgent,
    pub writer: NarrativeWriter,
    pub combat: CombatAgent,
    pub progression: ProgressionAgent,
    pub director: DirectorAgent,
    pub relationship: RelationshipAnalyzer,
    pub world_builder: WorldBuilderAgent,
    pub recap: RecapAgent,
    pub overrides: OverrideHandler,
    pub foreshadowing: ForeshadowingLedger,
    pub portraits: Arc<dyn PortraitPort>,
    pub clock: Arc<dyn ClockPort>,
    /// Serializes each turn's background bookkeeping against the next
    /// turn's reads.
    pub bg_lock: Arc<Mutex<()>>,
    pub recap_generated: std::sync::atomic::AtomicBool,
    pub last_composition: std::sync::Mutex<CompositionMode>,
}

#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) parts: Arc<Parts>,
}

impl Orchestrator {
    pub(crate) fn from_parts(parts: Parts) -> Self {
        Self {
            parts: Arc::new(parts),
        }
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.parts.store.campaign_id()
    }

    /// Seed the campaign bible and world state from Session Zero output.
    /// Called once at gameplay handoff, before the first turn. `op` carries
    /// the three-axis OP-mode configuration when Session Zero enabled it.
    pub async fn run_startup(
        &self,
        session_zero_summary: &str,
        character: showrunner_domain::Character,
        starting_location: &str,
        op: Option<showrunner_domain::OpSettings>,
    ) -> Result<(), EngineError> {
        let p = &self.parts;

        let mut character = character;
        if let Some(op) = op {
            character.op = op;
        }
        p.store.save_character(&character).await?;

        let mut world = p.store.get_world().await?;
        world.location = starting_location.to_string();
        world.situation = format!("{} arrives at {starting_location}.", character.name);
        p.store.save_world(&world).await?;

        let op_guidance = self.op_axis_guidance(&character.op).await;
        let briefing = p
            .director
            .run_startup_briefing(
                session_zero_summary,
                &p.profile,
                &character.name,
                &character.concept,
                starting_location,
                op_guidance.as_deref(),
            )
            .await?;

        let mut bible = p.store.get_bible().await?;
        bible.apply_review(
            briefing.current_arc.clone(),
            briefing.director_notes.clone(),
            briefing.active_goals.clone(),
            briefing.arc_objectives.clone(),
            briefing.active_foreshadowing.clone(),
            0,
        );
        p.store.save_bible(&bible).await?;

        world = p.store.get_world().await?;
        world.transition_phase(briefing.arc_phase);
        world.arc_name = briefing.current_arc.clone();
        world.set_tension(briefing.tension_level);
        p.store.save_world(&world).await?;

        // The director's opening seeds go into the ledger with a default
        // payoff horizon
        for seed in &briefing.active_foreshadowing {
            p.foreshadowing
                .plant(seed, 0, 6, showrunner_domain::SeedType::Mystery)
                .await?;
        }

        // Session Zero context is permanent memory
        p.memory
            .add_memory(
                showrunner_domain::MemoryKind::SessionZero,
                session_zero_summary,
                0,
                None,
                vec![
                    showrunner_domain::FLAG_SESSION_ZERO.to_string(),
                    showrunner_domain::FLAG_PLOT_CRITICAL.to_string(),
                ],
                None,
            )
            .await?;

        background::reset_director_trigger(&p.store, 0).await?;
        tracing::info!(
            arc = %briefing.current_arc,
            phase = briefing.arc_phase.as_str(),
            tension = briefing.tension_level,
            "director startup briefing complete"
        );
        Ok(())
    }

    /// Process a single turn. See the module docs for the step-by-step
    /// pipeline; the only fatal failure here is the writer, and even that
    /// degrades to a minimal narrative.
    pub async fn process_turn(
        &self,
        player_input: &str,
        recent_messages: &[String],
        compaction_text: &str,
    ) -> Result<TurnResult, EngineError> {
        let start = std::time::Instant::now();
        let p = &self.parts;

        // 1. Wait for the previous turn's background processing
        // (almost never blocks: users take seconds between turns)
        {
            let _released = p.bg_lock.lock().await;
        }

        // 2. Snapshot state; expire lapsed consequences
        let mut context = p.store.get_context().await?;
        p.store.expire_consequences(context.turn_number).await?;

        // 3. Intent classification
        let intent = match p
            .intent
            .classify(
                player_input,
                &context.situation,
                &context.character_summary,
                &context.location,
            )
            .await
        {
            Ok(intent) => intent,
            Err(e) => {
                tracing::error!(error = %e, "intent classification failed, using fallback");
                IntentOutput::fallback(player_input)
            }
        };

        // 4. Early-exit system commands
        if intent.intent.is_system_command() {
            let narrative = self.handle_system_command(&intent).await?;
            return Ok(TurnResult {
                narrative,
                intent,
                outcome: None,
                latency_ms: start.elapsed().as_millis() as i64,
                portrait_map: HashMap::new(),
                turn_number: context.turn_number,
                campaign_id: p.store.campaign_id(),
            });
        }

        // 5. World-building validation
        let mut world_building_context = String::new();
        if intent.intent == IntentKind::WorldBuilding {
            match self.handle_world_building(player_input, &context).await? {
                WorldBuildingBranch::EarlyReturn(narrative) => {
                    return Ok(TurnResult {
                        narrative,
                        intent,
                        outcome: None,
                        latency_ms: start.elapsed().as_millis() as i64,
                        portrait_map: HashMap::new(),
                        turn_number: context.turn_number,
                        campaign_id: p.store.campaign_id(),
                    });
                }
                WorldBuildingBranch::Accepted(block) => world_building_context = block,
            }
        }

        // 6. Intent-tiered base retrieval
        let rag = p
            .selector
            .get_base_context(player_input, &context, &p.profile_id, &intent)
            .await?;

        // 7/8. Trivial fast path, or outcome + rank + pacing (+ recap) in parallel
        let is_trivial = p.selector.is_trivial_action(&intent);
        let (mut outcome, memories_block, pacing_directive, recap_result) = if is_trivial {
            tracing::info!("trivial action fast path: skipping outcome, ranking, pacing");
            (
                OutcomeOutput::trivial_success(),
                "No relevant past memories found.".to_string(),
                None,
                None,
            )
        } else {
            self.run_judgment_phase(player_input, &intent, &context, &rag)
                .await
        };

        // 9. Pre-narrative combat resolution
        let combat_result = if intent.intent == IntentKind::Combat
            || intent.action.to_lowercase().contains("attack")
        {
            self.resolve_combat(&intent, player_input).await?
        } else {
            None
        };

        // 10. Outcome validation loop (one retry with correction feedback)
        if !is_trivial {
            outcome = self
                .validate_outcome(&intent, outcome, &rag.rules, &context)
                .await;
        }

        // 11. Sakuga decision
        let use_sakuga = outcome.narrative_weight == NarrativeWeight::Climactic
            || intent.intent == IntentKind::Combat
            || outcome.calculated_roll >= 20
            || intent
                .special_conditions
                .iter()
                .any(SpecialCondition::triggers_sakuga);

        // 12. Effective composition + power imbalance bookkeeping
        let threat_tier = outcome
            .target_tier
            .as_deref()
            .and_then(|t| PowerTier::parse(t).ok());
        let comp = effective_composition(
            p.profile.world_tier,
            context.power_tier,
            &context.op,
            threat_tier,
        );
        {
            let mut last = p.last_composition.lock().unwrap_or_else(|e| e.into_inner());
            if *last != comp.mode {
                tracing::info!(
                    from = last.as_str(),
                    to = comp.mode.as_str(),
                    differential = comp.differential,
                    "composition mode transition"
                );
                *last = comp.mode;
            }
        }
        let power_imbalance = 2f64.powi(comp.differential);
        if intent.intent == IntentKind::Combat && threat_tier.is_some() {
            self.track_high_imbalance(&mut context, power_imbalance)
                .await?;
        }

        // Session-stable writer guidance (block 1) is computed exactly once
        if !p.writer.has_static_guidance() {
            let guidance = self.static_rule_guidance(&context).await;
            p.writer.set_static_rule_guidance(&guidance);
        }

        // 13. NPC context cards + spotlight hints
        let npc_cards = self
            .build_npc_cards(player_input, &context)
            .await
            .unwrap_or_default();

        // 14. Foreshadowing callback opportunities (capped)
        let callbacks = p
            .foreshadowing
            .get_callback_opportunities(context.turn_number)
            .await?;
        let callback_block = callbacks
            .iter()
            .take(CALLBACK_CAP)
            .map(|seed| {
                format!(
                    "- **{}**: {} (planted turn {}, payoff: {})",
                    seed.seed_type.as_str(),
                    seed.description,
                    seed.planted_turn,
                    seed.expected_payoff
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        // Per-turn dynamic guidance (scale, tier x scale, lopsided-fight tension)
        let dynamic_guidance = self
            .dynamic_guidance(&context, power_imbalance)
            .await;
        let overrides_block = p.overrides.format_for_context().await?;
        let consequences_block = self.consequences_block(&context).await?;

        // 15. Narrative generation, with bounded research tools
        let toolbox = ResearchToolbox::new(
            p.memory.clone(),
            p.lore.clone(),
            p.profile_id.clone(),
            recent_messages.to_vec(),
        );
        let writer_inputs = WriterInputs {
            player_input,
            intent: &intent,
            outcome: &outcome,
            context: &context,
            memories: &memories_block,
            lore: &rag.lore,
            npc_cards: if npc_cards.is_empty() {
                None
            } else {
                Some(&npc_cards)
            },
            pacing: pacing_directive.as_ref(),
            overrides: &overrides_block,
            combat: combat_result.as_ref(),
            foreshadowing_callbacks: &callback_block,
            active_consequences: &consequences_block,
            dynamic_guidance: &dynamic_guidance,
            world_building: &world_building_context,
            sakuga: use_sakuga,
            recent_messages,
            compaction_text,
        };
        let writer_result = p.writer.generate(writer_inputs, Some(&toolbox)).await;
        let mut narrative = match writer_result {
            Ok(narrative) => narrative,
            Err(e) => {
                // The one fatal kind on the critical path, degraded to a
                // minimal narrative with a failure outcome
                tracing::error!(error = %e, "writer failed, returning minimal narrative");
                outcome = OutcomeOutput::minimal_failure("narrative generation failed");
                outcome.success_level = SuccessLevel::Failure;
                format!(
                    "The moment slips past before the story can take shape. ({} tries to act, \
                     but the scene refuses to resolve — try again.)",
                    context.character_name
                )
            }
        };

        // 16. Recap prepend (first gameplay turn of a resumed session)
        if let Some(recap) = recap_result {
            narrative = format!("{}{narrative}", recap.render());
        }

        // 17. OP suggestion append
        if let Some(suggestion) = &context.pending_op_suggestion {
            narrative.push_str(&render_op_suggestion(suggestion));
        }

        // 18. Portrait resolution
        let (narrative, portrait_map) = portraits::resolve_portraits(
            &narrative,
            p.store.campaign_id(),
            p.portraits.as_ref(),
        )
        .await;

        let latency_ms = start.elapsed().as_millis() as i64;
        tracing::info!(
            turn = context.turn_number,
            latency_ms,
            narrative_len = narrative.len(),
            "turn pipeline complete"
        );

        // 19/20. Return, then fire-and-forget bookkeeping
        let result = TurnResult {
            narrative: narrative.clone(),
            intent: intent.clone(),
            outcome: Some(outcome.clone()),
            latency_ms,
            portrait_map,
            turn_number: context.turn_number,
            campaign_id: p.store.campaign_id(),
        };

        self.spawn_background(background::BackgroundInputs {
            narrative,
            player_input: player_input.to_string(),
            intent,
            outcome,
            context,
            combat_result,
            use_sakuga,
            recent_messages: recent_messages.to_vec(),
            compaction_text: compaction_text.to_string(),
            latency_ms,
        });

        Ok(result)
    }

    // =========================================================================
    // Pipeline pieces
    // =========================================================================

    /// Phase 8: outcome judgment, memory reranking, pacing, and (on resumed
    /// sessions) the recap, all in parallel with each failure isolated.
    async fn run_judgment_phase(
        &self,
        player_input: &str,
        intent: &IntentOutput,
        context: &GameContext,
        rag: &crate::context::selector::RetrievedContext,
    ) -> (
        OutcomeOutput,
        String,
        Option<crate::agents::pacing::PacingDirective>,
        Option<RecapOutput>,
    ) {
        let p = &self.parts;

        let mut power_context = format!("Character Power Tier: {}. ", context.power_tier);
        if context.op.enabled {
            power_context.push_str(
                "OP MODE IS ACTIVE — this character is intentionally overpowered. Routine \
                 power use should be trivial (DC 5, no cost, no consequence). ",
            );
        }
        power_context.push_str(&format!("World Tier: {}.", p.profile.world_tier));

        let outcome_future = async {
            match p
                .outcome
                .judge(
                    intent,
                    &p.profile.tropes.join(", "),
                    context.arc_phase.as_str(),
                    &context.recent_summary,
                    &format!(
                        "Situation: {}. Location: {}",
                        context.situation, context.location
                    ),
                    &power_context,
                    None,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "outcome judgment failed, substituting neutral outcome");
                    let mut fallback = OutcomeOutput::trivial_success();
                    fallback.reasoning = "outcome judgment unavailable".to_string();
                    fallback
                }
            }
        };

        let rank_future = p.selector.rank_memories(&rag.raw_memories, &context.situation, intent);

        let intent_summary = intent.summary();
        let pacing_future = p.pacing.check(
            player_input,
            &intent_summary,
            &context.director_notes,
            context.arc_phase,
            context.tension_level,
            &context.situation,
            &context.recent_summary,
            context.turns_in_phase,
        );

        let recap_future = async {
            if self
                .parts
                .recap_generated
                .load(std::sync::atomic::Ordering::Relaxed)
                || context.turn_number > 2
            {
                return None;
            }
            let bible = p.store.get_bible().await.ok()?;
            if bible.arc_history.is_empty() && context.director_notes.is_empty() {
                return None;
            }
            let beats = p
                .memory
                .search(
                    "important emotional narrative moment",
                    crate::context::memory::SearchOptions {
                        limit: 5,
                        min_heat: 20.0,
                        boost_on_access: false,
                        kind: Some(showrunner_domain::MemoryKind::NarrativeBeat),
                        keyword: None,
                    },
                )
                .await
                .map(|hits| hits.into_iter().map(|h| h.record.content).collect::<Vec<_>>())
                .unwrap_or_default();
            match p
                .recap
                .generate_recap(
                    &bible.arc_history,
                    &beats,
                    &context.director_notes,
                    &context.situation,
                    &context.character_name,
                    context.arc_phase.as_str(),
                )
                .await
            {
                Ok(recap) => {
                    self.parts
                        .recap_generated
                        .store(true, std::sync::atomic::Ordering::Relaxed);
                    Some(recap)
                }
                Err(e) => {
                    tracing::error!(error = %e, "recap generation failed (non-fatal)");
                    None
                }
            }
        };

        let (outcome, memories_block, pacing_directive, recap_result) =
            tokio::join!(outcome_future, rank_future, pacing_future, recap_future);
        (outcome, memories_block, pacing_directive, recap_result)
    }

    /// Step 9: parse + resolve combat before the writer runs. Resource costs
    /// are pre-validated in a scoped transaction; failed validation cancels
    /// the combat (the writer narrates the fizzle via the outcome instead).
    async fn resolve_combat(
        &self,
        intent: &IntentOutput,
        player_input: &str,
    ) -> Result<Option<CombatResolution>, EngineError> {
        let p = &self.parts;
        let action = p.combat.parse_combat_action(intent, player_input);
        let Some(character) = p.store.get_character().await? else {
            return Ok(None);
        };
        let Some(target) = p.store.get_npc_by_name(&action.target).await? else {
            tracing::warn!(target = %action.target, "combat target unknown, skipping pre-resolution");
            return Ok(None);
        };

        // Spell/skill costs are validated (and spent) before resolution
        let cost = match action.kind {
            crate::agents::combat::AttackKind::Spell => Some(("mp", SPELL_MP_COST)),
            crate::agents::combat::AttackKind::Skill => Some(("sp", SKILL_SP_COST)),
            crate::agents::combat::AttackKind::Strike => None,
        };
        if let Some((resource, amount)) = cost {
            let label = format!("{} resource cost", action.kind.damage_type());
            let mut txn = p.store.begin_transaction(&label).await?;
            match resource {
                "mp" => txn.subtract_mp(amount, &label),
                _ => txn.subtract_sp(amount, &label),
            }
            let validation = txn.validate();
            if !validation.is_valid() {
                for issue in &validation.issues {
                    tracing::error!(field = %issue.field, message = %issue.message, "combat pre-validation failed");
                }
                txn.rollback();
                p.store.commit_transaction(txn).await?;
                return Ok(None);
            }
            p.store.commit_transaction(txn).await?;
        }

        let resolution = p.combat.resolve_action(&action, &character, &target);
        tracing::info!(
            hit = resolution.hit,
            damage = resolution.damage_dealt,
            critical = resolution.critical,
            target = %resolution.target_name,
            "pre-narrative combat resolution"
        );
        Ok(Some(resolution))
    }

    /// Step 10: ask the validator; on failure re-judge once with the
    /// correction as feedback.
    async fn validate_outcome(
        &self,
        intent: &IntentOutput,
        outcome: OutcomeOutput,
        rules_summary: &str,
        context: &GameContext,
    ) -> OutcomeOutput {
        let p = &self.parts;
        let validation = match p
            .validator
            .validate(intent, &outcome, rules_summary, &context.character_summary)
            .await
        {
            Ok(validation) => validation,
            Err(e) => {
                tracing::error!(error = %e, "validator failed, accepting outcome as-is");
                return outcome;
            }
        };
        if validation.is_valid {
            return outcome;
        }

        let correction = validation.correction.unwrap_or_default();
        tracing::warn!(correction = %correction, "outcome failed validation, re-judging once");
        match p
            .outcome
            .judge(
                intent,
                &p.profile.tropes.join(", "),
                context.arc_phase.as_str(),
                &context.recent_summary,
                &format!("Situation: {}", context.situation),
                &format!("Character Power Tier: {}.", context.power_tier),
                Some(&correction),
            )
            .await
        {
            Ok(corrected) => corrected,
            Err(e) => {
                tracing::error!(error = %e, "re-judgment failed, keeping original outcome");
                outcome
            }
        }
    }

    async fn handle_system_command(&self, intent: &IntentOutput) -> Result<String, EngineError> {
        let p = &self.parts;
        match intent.intent {
            IntentKind::MetaFeedback => Ok(p.overrides.process_meta(&intent.action).await?),
            IntentKind::OverrideCommand => {
                let action_lower = intent.action.to_lowercase();
                if action_lower == "list" {
                    Ok(p.overrides.list_overrides().await?)
                } else if let Some(id_text) = action_lower.strip_prefix("remove ") {
                    Ok(p.overrides.remove_override(id_text).await?)
                } else {
                    Ok(p
                        .overrides
                        .process_override(&intent.action, intent.target.clone())
                        .await?)
                }
            }
            IntentKind::OpCommand => self.handle_op_command(intent).await,
            _ => unreachable!("handle_system_command called for non-command intent"),
        }
    }

    async fn handle_op_command(&self, intent: &IntentOutput) -> Result<String, EngineError> {
        let p = &self.parts;
        let action_lower = intent.action.to_lowercase();

        if let Some(rest) = action_lower.strip_prefix("accept") {
            let preset_text = intent
                .target
                .clone()
                .unwrap_or_else(|| rest.trim().to_string());
            let Some(preset) = OpPreset::parse(&preset_text) else {
                let valid = OpPreset::ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Ok(format!(
                    "Unknown preset: {}\n\nValid presets: {valid}",
                    if preset_text.is_empty() {
                        "none specified"
                    } else {
                        &preset_text
                    }
                ));
            };

            let Some(mut character) = p.store.get_character().await? else {
                return Ok("No character yet — OP mode needs a protagonist.".to_string());
            };
            character.op.enable_preset(preset);
            p.store.save_character(&character).await?;

            let mut world = p.store.get_world().await?;
            world.pending_op_suggestion = None;
            p.store.save_world(&world).await?;

            let (tension, expression, focus) = preset.axes();
            Ok(format!(
                "**OP Protagonist Mode Activated!**\n\n**Preset**: {}\n- Tension: {}\n- \
                 Expression: {}\n- Focus: {}\n\nYour adventure style will now be tuned for \
                 overwhelming power done right.",
                preset.as_str().replace('_', " "),
                tension.as_str(),
                expression.as_str(),
                focus.as_str(),
            ))
        } else if action_lower.starts_with("dismiss") {
            let mut world = p.store.get_world().await?;
            world.op_suggestion_dismissed = true;
            world.pending_op_suggestion = None;
            p.store.save_world(&world).await?;
            Ok("OP mode suggestion dismissed. We won't ask again.".to_string())
        } else {
            Ok(format!(
                "Unknown /op command: {}\n\nUsage:\n  `/op accept [preset]` - Enable OP mode\n  \
                 `/op dismiss` - Dismiss suggestion",
                intent.action
            ))
        }
    }

    async fn handle_world_building(
        &self,
        player_input: &str,
        context: &GameContext,
    ) -> Result<WorldBuildingBranch, EngineError> {
        let p = &self.parts;

        // Established facts + wiki canon ground the validation
        let fact_hits = p
            .memory
            .search(
                "established world facts npcs items locations",
                crate::context::memory::SearchOptions {
                    limit: 5,
                    kind: Some(showrunner_domain::MemoryKind::Fact),
                    ..Default::default()
                },
            )
            .await
            .unwrap_or_default();
        let established_facts = fact_hits
            .iter()
            .map(|h| h.record.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let canon_reference = p
            .lore
            .search_lore(&p.profile_id, player_input, 3, None)
            .await
            .map(|chunks| chunks.join("\n\n"))
            .unwrap_or_default();

        let result = p
            .world_builder
            .validate(
                player_input,
                &context.character_summary,
                &context.timeline_mode,
                &context.canon_cast_mode,
                &context.event_fidelity,
                &context.power_tier.to_string(),
                &established_facts,
                &canon_reference,
            )
            .await?;

        tracing::info!(
            entities = result.entities.len(),
            status = ?result.validation_status,
            "world building validated"
        );

        match result.validation_status {
            ValidationStatus::Rejected => Ok(WorldBuildingBranch::EarlyReturn(
                result
                    .rejection_reason
                    .unwrap_or_else(|| "That doesn't quite fit the story as established...".to_string()),
            )),
            ValidationStatus::NeedsClarification => Ok(WorldBuildingBranch::EarlyReturn(
                result
                    .clarification_question
                    .unwrap_or_else(|| "Tell me more about that...".to_string()),
            )),
            ValidationStatus::Accepted => {
                background::apply_world_building_entities(
                    &p.store,
                    &p.memory,
                    &result.entities,
                    context.turn_number,
                )
                .await?;
                let mut block = String::new();
                if !result.entities.is_empty() {
                    let listing = result
                        .entities
                        .iter()
                        .map(|e| format!("- {:?}: {}", e.entity_type, e.name))
                        .collect::<Vec<_>>()
                        .join("\n");
                    block = format!("[World Building] Player established:\n{listing}");
                    if let Some(integration) = &result.narrative_integration {
                        block.push_str(&format!("\nIntegration note: {integration}"));
                    }
                }
                Ok(WorldBuildingBranch::Accepted(block))
            }
        }
    }

    async fn track_high_imbalance(
        &self,
        context: &mut GameContext,
        power_imbalance: f64,
    ) -> Result<(), EngineError> {
        if power_imbalance <= 10.0 || context.op.enabled {
            return Ok(());
        }
        let p = &self.parts;
        let mut world = p.store.get_world().await?;
        world.high_imbalance_encounters += 1;
        let count = world.high_imbalance_encounters;
        tracing::info!(count, power_imbalance, "high-imbalance encounter");

        if count >= OP_SUGGESTION_THRESHOLD
            && !world.op_suggestion_dismissed
            && world.pending_op_suggestion.is_none()
        {
            let suggestion = OpSuggestion {
                preset: OpPreset::BoredGod.as_str().to_string(),
                confidence: 0.7,
                reasoning: format!(
                    "{count} encounters in a row resolved without real resistance — your \
                     playstyle fits an overwhelming-power fantasy."
                ),
            };
            tracing::info!(preset = %suggestion.preset, "suggesting OP mode");
            context.pending_op_suggestion = Some(suggestion.clone());
            world.pending_op_suggestion = Some(suggestion);
        }
        p.store.save_world(&world).await?;
        context.high_imbalance_encounters = count;
        Ok(())
    }

    async fn build_npc_cards(
        &self,
        player_input: &str,
        context: &GameContext,
    ) -> Result<String, EngineError> {
        let p = &self.parts;
        let scene_text = format!("{player_input} {}", context.situation);
        let present = p.store.detect_npcs_in_text(&scene_text).await?;
        if present.is_empty() {
            return Ok(String::new());
        }
        let mut cards = StateStore::npc_context_cards(&present, &p.profile.voice_cards);

        let spotlight = p.store.compute_spotlight_debt().await?;
        let underserved: Vec<String> = spotlight
            .iter()
            .map(|(name, debt)| format!("{name} (+{debt})"))
            .collect();
        if !underserved.is_empty() {
            cards.push_str(&format!(
                "\n\n[Spotlight Hint] These NPCs need more screen time: {}",
                underserved.join(", ")
            ));
        }
        tracing::info!(count = present.len(), "npc context cards built");
        Ok(cards)
    }

    /// Session-stable rule guidance for the writer's cache-stable block:
    /// extreme DNA scales, detected genres, and active OP axes.
    async fn static_rule_guidance(&self, context: &GameContext) -> String {
        let p = &self.parts;
        let mut parts = Vec::new();

        let mut dna_parts = Vec::new();
        for (scale, value) in p.profile.extreme_dna_scales() {
            if let Ok(Some(guidance)) = p.rules.get_dna_guidance(&scale, value).await {
                let level = if value >= 7 { "HIGH" } else { "LOW" };
                dna_parts.push(format!("**{scale} ({level}, {value}/10):** {guidance}"));
            }
        }
        if !dna_parts.is_empty() {
            parts.push(format!("## DNA Narration Style\n{}", dna_parts.join("\n\n")));
        }

        let mut genre_parts = Vec::new();
        for genre in p.profile.detected_genres.iter().take(2) {
            if let Ok(Some(guidance)) = p.rules.get_genre_guidance(genre).await {
                genre_parts.push(format!("**{genre}:** {guidance}"));
            }
        }
        if !genre_parts.is_empty() {
            parts.push(format!("## Genre Framework\n{}", genre_parts.join("\n\n")));
        }

        if context.op.enabled {
            if let Some(op_guidance) = self.op_axis_guidance(&context.op).await {
                parts.push(op_guidance);
            }
        }

        parts.join("\n\n")
    }

    async fn op_axis_guidance(&self, op: &showrunner_domain::OpSettings) -> Option<String> {
        if !op.enabled {
            return None;
        }
        let p = &self.parts;
        let mut parts = Vec::new();
        if let Some(tension) = op.tension_source {
            if let Ok(Some(guidance)) = p.rules.get_op_axis_guidance("tension", tension.as_str()).await {
                parts.push(format!("## Tension Source: {}\n{guidance}", tension.as_str()));
            }
        }
        if let Some(expression) = op.power_expression {
            if let Ok(Some(guidance)) = p
                .rules
                .get_op_axis_guidance("expression", expression.as_str())
                .await
            {
                parts.push(format!(
                    "## Power Expression: {}\n{guidance}",
                    expression.as_str()
                ));
            }
        }
        if let Some(focus) = op.narrative_focus {
            if let Ok(Some(guidance)) = p.rules.get_op_axis_guidance("focus", focus.as_str()).await {
                parts.push(format!("## Narrative Focus: {}\n{guidance}", focus.as_str()));
            }
        }
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    async fn dynamic_guidance(&self, context: &GameContext, power_imbalance: f64) -> String {
        let p = &self.parts;
        let mut parts = Vec::new();

        if let Ok(Some(scale)) = p.rules.get_scale_guidance(context.narrative_scale).await {
            parts.push(format!(
                "## Narrative Scale: {}\n{scale}",
                context.narrative_scale.as_str()
            ));
        }
        if let Ok(Some(compat)) = p
            .rules
            .get_compatibility_guidance(context.power_tier, context.narrative_scale)
            .await
        {
            parts.push(format!(
                "## Power x Scale: {} at {}\n{compat}",
                context.power_tier,
                context.narrative_scale.as_str()
            ));
        }
        let tension_source = context
            .op
            .tension_source
            .map(|t| t.as_str())
            .unwrap_or("structural");
        if let Ok(Some(tension)) = p
            .rules
            .get_tension_guidance(tension_source, power_imbalance)
            .await
        {
            parts.push(format!("## Tension Beyond Combat\n{tension}"));
        }
        parts.join("\n\n")
    }

    async fn consequences_block(&self, _context: &GameContext) -> Result<String, EngineError> {
        let consequences = self.parts.store.active_consequences(8).await?;
        Ok(consequences
            .iter()
            .map(|c| {
                format!(
                    "- [{}/{}] {} (turn {})",
                    c.severity.as_str(),
                    c.category.as_str(),
                    c.description,
                    c.turn_number
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

enum WorldBuildingBranch {
    EarlyReturn(String),
    Accepted(String),
}

fn render_op_suggestion(suggestion: &OpSuggestion) -> String {
    format!(
        "\n\n---\n**OP MODE SUGGESTION**\n\nBased on your recent commanding victories, you might \
         enjoy **OP Protagonist Mode!**\n\nSuggested Preset: **{}** (confidence: {:.0}%)\n\n\
         *\"{}\"*\n\nType `/op accept {}` to enable, or `/op dismiss` to ignore.\n---",
        suggestion.preset.replace('_', " "),
        suggestion.confidence * 100.0,
        suggestion.reasoning,
        suggestion.preset,
    )
}
