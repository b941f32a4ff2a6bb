//! Campaign-scoped, transactional game state over SQLite.
//!
//! Entities serialize as JSON documents with the columns the store actually
//! filters on (status, expiry, names) lifted out. Cross-references stay
//! id-valued; the store composes views like [`GameContext`] on demand.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use showrunner_domain::{
    CampaignBible, CampaignId, Character, Consequence, DispositionMilestone, ForeshadowSeed,
    IntelligenceStage, Npc, NpcId, OpSuggestion, OverrideRule, PowerTier, ProfileId, Quest,
    QuestStatus, SeedStatus, TurnRecord, WorldState,
};

use crate::infrastructure::ports::{ClockPort, RepoError};
use crate::infrastructure::persistence::transaction::{
    validate_character, DeferredCommit, StateTransaction, StateWrite,
};

/// Snapshot view assembled for each turn. Everything the agents need to see,
/// nothing they can mutate.
#[derive(Debug, Clone)]
pub struct GameContext {
    pub campaign_id: CampaignId,
    /// The turn now being played (last recorded + 1).
    pub turn_number: i64,
    pub location: String,
    pub situation: String,
    pub character_name: String,
    pub character_summary: String,
    pub power_tier: PowerTier,
    pub arc_phase: showrunner_domain::ArcPhase,
    pub arc_name: String,
    pub tension_level: f64,
    pub turns_in_phase: i64,
    pub narrative_scale: showrunner_domain::StoryScale,
    pub timeline_mode: String,
    pub canon_cast_mode: String,
    pub event_fidelity: String,
    pub director_notes: String,
    pub recent_summary: String,
    pub present_npcs: Vec<String>,
    pub op: showrunner_domain::OpSettings,
    pub high_imbalance_encounters: i64,
    pub op_suggestion_dismissed: bool,
    pub pending_op_suggestion: Option<OpSuggestion>,
}

pub struct StateStore {
    pool: SqlitePool,
    campaign_id: CampaignId,
    clock: Arc<dyn ClockPort>,
}

impl StateStore {
    pub fn new(pool: SqlitePool, campaign_id: CampaignId, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            pool,
            campaign_id,
            clock,
        }
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Find the campaign for a profile, creating it on first use.
    pub async fn get_or_create_campaign(
        pool: &SqlitePool,
        profile_id: &ProfileId,
        name: &str,
        clock: &dyn ClockPort,
    ) -> Result<CampaignId, RepoError> {
        let existing = sqlx::query("SELECT id FROM campaigns WHERE profile_id = ?")
            .bind(profile_id.as_str())
            .fetch_optional(pool)
            .await?;

        if let Some(row) = existing {
            let id: String = row.get("id");
            let uuid = uuid::Uuid::parse_str(&id)
                .map_err(|e| RepoError::Serialization(e.to_string()))?;
            return Ok(CampaignId::from_uuid(uuid));
        }

        let id = CampaignId::new();
        sqlx::query("INSERT INTO campaigns (id, profile_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(profile_id.as_str())
            .bind(name)
            .bind(clock.now().to_rfc3339())
            .execute(pool)
            .await?;
        tracing::info!(campaign_id = %id, profile_id = %profile_id, "created campaign");
        Ok(id)
    }

    // =========================================================================
    // Character
    // =========================================================================

    pub async fn get_character(&self) -> Result<Option<Character>, RepoError> {
        let row = sqlx::query("SELECT data FROM characters WHERE campaign_id = ?")
            .bind(self.campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let data: String = r.get("data");
            serde_json::from_str(&data).map_err(RepoError::from)
        })
        .transpose()
    }

    pub async fn save_character(&self, character: &Character) -> Result<(), RepoError> {
        let data = serde_json::to_string(character)?;
        sqlx::query(
            "INSERT INTO characters (campaign_id, data) VALUES (?, ?) \
             ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
        )
        .bind(self.campaign_id.to_string())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Open a labeled, validating mutation window over the character.
    pub async fn begin_transaction(&self, label: &str) -> Result<StateTransaction, RepoError> {
        let character = self.get_character().await?.ok_or(RepoError::NotFound)?;
        Ok(StateTransaction::new(label, character))
    }

    /// Persist a mutation window iff it validated clean and wasn't rolled
    /// back. Returns whether anything was written.
    pub async fn commit_transaction(&self, txn: StateTransaction) -> Result<bool, RepoError> {
        match txn.into_commit() {
            Some(character) => {
                self.save_character(&character).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // NPCs
    // =========================================================================

    pub async fn save_npc(&self, npc: &Npc) -> Result<(), RepoError> {
        let data = serde_json::to_string(npc)?;
        sqlx::query(
            "INSERT INTO npcs (id, campaign_id, name, data) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET name = excluded.name, data = excluded.data",
        )
        .bind(npc.id.to_string())
        .bind(self.campaign_id.to_string())
        .bind(&npc.name)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_npc(&self, id: NpcId) -> Result<Option<Npc>, RepoError> {
        let row = sqlx::query("SELECT data FROM npcs WHERE id = ? AND campaign_id = ?")
            .bind(id.to_string())
            .bind(self.campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let data: String = r.get("data");
            serde_json::from_str(&data).map_err(RepoError::from)
        })
        .transpose()
    }

    pub async fn get_npc_by_name(&self, name: &str) -> Result<Option<Npc>, RepoError> {
        // Exact (case-insensitive) name match first, then alias scan
        let row =
            sqlx::query("SELECT data FROM npcs WHERE campaign_id = ? AND name = ? COLLATE NOCASE")
                .bind(self.campaign_id.to_string())
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(r) = row {
            let data: String = r.get("data");
            return Ok(Some(serde_json::from_str(&data)?));
        }
        let all = self.list_npcs().await?;
        Ok(all.into_iter().find(|n| n.mentioned_in(name)))
    }

    pub async fn list_npcs(&self) -> Result<Vec<Npc>, RepoError> {
        let rows = sqlx::query("SELECT data FROM npcs WHERE campaign_id = ? ORDER BY name")
            .bind(self.campaign_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                let data: String = r.get("data");
                serde_json::from_str(&data).map_err(RepoError::from)
            })
            .collect()
    }

    /// Clamp-and-save affinity shift; emits the crossed-boundary milestone.
    pub async fn update_npc_affinity(
        &self,
        id: NpcId,
        delta: i32,
        reason: &str,
    ) -> Result<Option<DispositionMilestone>, RepoError> {
        let mut npc = self.get_npc(id).await?.ok_or(RepoError::NotFound)?;
        let milestone = npc.shift_affinity(delta);
        self.save_npc(&npc).await?;
        if let Some(m) = &milestone {
            tracing::info!(npc = %npc.name, affinity = m.affinity, to = m.to.as_str(), reason, "disposition threshold crossed");
        }
        Ok(milestone)
    }

    pub async fn evolve_npc_intelligence(
        &self,
        id: NpcId,
        trust_milestone: bool,
    ) -> Result<Option<IntelligenceStage>, RepoError> {
        let mut npc = self.get_npc(id).await?.ok_or(RepoError::NotFound)?;
        let advanced = npc.evolve_intelligence(trust_milestone);
        if let Some(stage) = advanced {
            self.save_npc(&npc).await?;
            tracing::info!(npc = %npc.name, stage = stage.as_str(), "npc intelligence advanced");
        }
        Ok(advanced)
    }

    /// NPCs whose screen time lags their familiarity, heaviest debt first.
    pub async fn compute_spotlight_debt(&self) -> Result<HashMap<String, i64>, RepoError> {
        let npcs = self.list_npcs().await?;
        Ok(npcs
            .into_iter()
            .filter(|n| n.spotlight_debt() > 0)
            .map(|n| (n.name.clone(), n.spotlight_debt()))
            .collect())
    }

    /// Substring/alias match of known NPC names against free text.
    pub async fn detect_npcs_in_text(&self, text: &str) -> Result<Vec<Npc>, RepoError> {
        let npcs = self.list_npcs().await?;
        Ok(npcs.into_iter().filter(|n| n.mentioned_in(text)).collect())
    }

    /// Disposition-aware context cards for the Writer.
    pub fn npc_context_cards(npcs: &[Npc], voice_cards: &HashMap<String, String>) -> String {
        let mut cards = Vec::new();
        for npc in npcs {
            let mut card = format!(
                "### {} ({}) — {} ({:+}), {} stage",
                npc.name,
                npc.role,
                npc.disposition().as_str(),
                npc.affinity.value(),
                npc.intelligence.as_str(),
            );
            if !npc.personality.is_empty() {
                card.push_str(&format!("\nPersonality: {}", npc.personality.join(", ")));
            }
            if !npc.goals.is_empty() {
                card.push_str(&format!("\nGoals: {}", npc.goals.join("; ")));
            }
            if let Some(voice) = voice_cards.get(&npc.name) {
                card.push_str(&format!("\nVoice: {voice}"));
            }
            if let Some(milestone) = npc.milestones.last() {
                card.push_str(&format!("\nRecent milestone: {}", milestone.name));
            }
            cards.push(card);
        }
        cards.join("\n\n")
    }

    // =========================================================================
    // World state / bible
    // =========================================================================

    pub async fn get_world(&self) -> Result<WorldState, RepoError> {
        let row = sqlx::query("SELECT data FROM world_states WHERE campaign_id = ?")
            .bind(self.campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let data: String = r.get("data");
                Ok(serde_json::from_str(&data)?)
            }
            None => Ok(WorldState::default()),
        }
    }

    pub async fn save_world(&self, world: &WorldState) -> Result<(), RepoError> {
        let data = serde_json::to_string(world)?;
        sqlx::query(
            "INSERT INTO world_states (campaign_id, data) VALUES (?, ?) \
             ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
        )
        .bind(self.campaign_id.to_string())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_bible(&self) -> Result<CampaignBible, RepoError> {
        let row = sqlx::query("SELECT data FROM campaign_bibles WHERE campaign_id = ?")
            .bind(self.campaign_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let data: String = r.get("data");
                Ok(serde_json::from_str(&data)?)
            }
            None => Ok(CampaignBible::default()),
        }
    }

    pub async fn save_bible(&self, bible: &CampaignBible) -> Result<(), RepoError> {
        let data = serde_json::to_string(bible)?;
        sqlx::query(
            "INSERT INTO campaign_bibles (campaign_id, data) VALUES (?, ?) \
             ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
        )
        .bind(self.campaign_id.to_string())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Turns
    // =========================================================================

    pub async fn last_turn_number(&self) -> Result<i64, RepoError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(turn_number), 0) AS n FROM turns WHERE campaign_id = ?",
        )
        .bind(self.campaign_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    /// Append a turn row. Turn numbers must be exactly monotonic.
    pub async fn record_turn(&self, record: &TurnRecord) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;
        insert_turn(&mut tx, &self.campaign_id, record).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn latest_turns(&self, limit: i64) -> Result<Vec<TurnRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT turn_number, player_input, intent, outcome, narrative, latency_ms, \
                    portrait_map, recorded_at \
             FROM turns WHERE campaign_id = ? ORDER BY turn_number DESC LIMIT ?",
        )
        .bind(self.campaign_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut turns: Vec<TurnRecord> = rows
            .into_iter()
            .map(|r| row_to_turn(&r))
            .collect::<Result<_, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    // =========================================================================
    // Quests
    // =========================================================================

    pub async fn save_quest(&self, quest: &Quest) -> Result<(), RepoError> {
        let data = serde_json::to_string(quest)?;
        sqlx::query(
            "INSERT INTO quests (id, campaign_id, status, data) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET status = excluded.status, data = excluded.data",
        )
        .bind(quest.id.to_string())
        .bind(self.campaign_id.to_string())
        .bind(quest.status.as_str())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, RepoError> {
        let rows = match status {
            Some(s) => {
                sqlx::query("SELECT data FROM quests WHERE campaign_id = ? AND status = ?")
                    .bind(self.campaign_id.to_string())
                    .bind(s.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT data FROM quests WHERE campaign_id = ?")
                    .bind(self.campaign_id.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.into_iter()
            .map(|r| {
                let data: String = r.get("data");
                serde_json::from_str(&data).map_err(RepoError::from)
            })
            .collect()
    }

    // =========================================================================
    // Consequences
    // =========================================================================

    pub async fn apply_consequence(&self, consequence: &Consequence) -> Result<(), RepoError> {
        let data = serde_json::to_string(consequence)?;
        sqlx::query(
            "INSERT INTO consequences (id, campaign_id, active, expires_at_turn, data) \
             VALUES (?, ?, 1, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET data = excluded.data",
        )
        .bind(consequence.id.to_string())
        .bind(self.campaign_id.to_string())
        .bind(consequence.expires_at_turn)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn active_consequences(&self, limit: i64) -> Result<Vec<Consequence>, RepoError> {
        let rows = sqlx::query(
            "SELECT data FROM consequences WHERE campaign_id = ? AND active = 1 LIMIT ?",
        )
        .bind(self.campaign_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let data: String = r.get("data");
                serde_json::from_str(&data).map_err(RepoError::from)
            })
            .collect()
    }

    /// Deactivate consequences whose lifetime has lapsed. Re-running with the
    /// same turn number is a no-op.
    pub async fn expire_consequences(&self, current_turn: i64) -> Result<u64, RepoError> {
        let result = sqlx::query(
            "UPDATE consequences SET active = 0 \
             WHERE campaign_id = ? AND active = 1 \
               AND expires_at_turn IS NOT NULL AND expires_at_turn < ?",
        )
        .bind(self.campaign_id.to_string())
        .bind(current_turn)
        .execute(&self.pool)
        .await?;
        let expired = result.rows_affected();
        if expired > 0 {
            tracing::info!(expired, current_turn, "consequences expired");
        }
        Ok(expired)
    }

    // =========================================================================
    // Foreshadowing seeds
    // =========================================================================

    pub async fn save_seed(&self, seed: &ForeshadowSeed) -> Result<(), RepoError> {
        let data = serde_json::to_string(seed)?;
        sqlx::query(
            "INSERT INTO foreshadow_seeds (id, campaign_id, status, data) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET status = excluded.status, data = excluded.data",
        )
        .bind(seed.id.to_string())
        .bind(self.campaign_id.to_string())
        .bind(seed.status.as_str())
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn open_seeds(&self) -> Result<Vec<ForeshadowSeed>, RepoError> {
        let rows = sqlx::query(
            "SELECT data FROM foreshadow_seeds WHERE campaign_id = ? AND status != ?",
        )
        .bind(self.campaign_id.to_string())
        .bind(SeedStatus::Resolved.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let data: String = r.get("data");
                serde_json::from_str(&data).map_err(RepoError::from)
            })
            .collect()
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    pub async fn save_override(&self, rule: &OverrideRule) -> Result<(), RepoError> {
        let data = serde_json::to_string(rule)?;
        sqlx::query(
            "INSERT INTO override_rules (id, campaign_id, active, data) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET active = excluded.active, data = excluded.data",
        )
        .bind(rule.id.to_string())
        .bind(self.campaign_id.to_string())
        .bind(rule.active as i64)
        .bind(data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_overrides(&self, active_only: bool) -> Result<Vec<OverrideRule>, RepoError> {
        let sql = if active_only {
            "SELECT data FROM override_rules WHERE campaign_id = ? AND active = 1"
        } else {
            "SELECT data FROM override_rules WHERE campaign_id = ?"
        };
        let rows = sqlx::query(sql)
            .bind(self.campaign_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                let data: String = r.get("data");
                serde_json::from_str(&data).map_err(RepoError::from)
            })
            .collect()
    }

    // =========================================================================
    // KV state (decay bookkeeping, director trigger accumulator)
    // =========================================================================

    pub async fn get_kv(&self, key: &str) -> Result<Option<serde_json::Value>, RepoError> {
        let row = sqlx::query("SELECT value FROM kv_state WHERE campaign_id = ? AND key = ?")
            .bind(self.campaign_id.to_string())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let value: String = r.get("value");
            serde_json::from_str(&value).map_err(RepoError::from)
        })
        .transpose()
    }

    pub async fn set_kv(&self, key: &str, value: &serde_json::Value) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO kv_state (campaign_id, key, value) VALUES (?, ?, ?) \
             ON CONFLICT (campaign_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(self.campaign_id.to_string())
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Deferred commit
    // =========================================================================

    pub fn deferred_commit(&self) -> DeferredCommit {
        DeferredCommit::new()
    }

    /// Land every buffered write in one SQL transaction. Combat damage is
    /// idempotent by result id; turn rows must stay monotonic. A failed batch
    /// leaves the previous turn's state untouched.
    pub async fn commit_deferred(&self, batch: DeferredCommit) -> Result<(), RepoError> {
        if batch.is_empty() {
            return Ok(());
        }
        let campaign = self.campaign_id.to_string();
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        for write in batch.writes {
            match write {
                StateWrite::Character(character) => {
                    let report = validate_character(&character);
                    if !report.is_valid() {
                        let details: Vec<String> = report
                            .issues
                            .iter()
                            .map(|i| format!("{}: {}", i.field, i.message))
                            .collect();
                        return Err(RepoError::Database(format!(
                            "character failed validation: {}",
                            details.join("; ")
                        )));
                    }
                    let data = serde_json::to_string(&character)?;
                    sqlx::query(
                        "INSERT INTO characters (campaign_id, data) VALUES (?, ?) \
                         ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
                    )
                    .bind(&campaign)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Npc(npc) => {
                    let data = serde_json::to_string(&npc)?;
                    sqlx::query(
                        "INSERT INTO npcs (id, campaign_id, name, data) VALUES (?, ?, ?, ?) \
                         ON CONFLICT (id) DO UPDATE SET name = excluded.name, data = excluded.data",
                    )
                    .bind(npc.id.to_string())
                    .bind(&campaign)
                    .bind(&npc.name)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::World(world) => {
                    let data = serde_json::to_string(&world)?;
                    sqlx::query(
                        "INSERT INTO world_states (campaign_id, data) VALUES (?, ?) \
                         ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
                    )
                    .bind(&campaign)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Bible(bible) => {
                    let data = serde_json::to_string(&bible)?;
                    sqlx::query(
                        "INSERT INTO campaign_bibles (campaign_id, data) VALUES (?, ?) \
                         ON CONFLICT (campaign_id) DO UPDATE SET data = excluded.data",
                    )
                    .bind(&campaign)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Turn(record) => {
                    insert_turn(&mut tx, &self.campaign_id, &record).await?;
                }
                StateWrite::Quest(quest) => {
                    let data = serde_json::to_string(&quest)?;
                    sqlx::query(
                        "INSERT INTO quests (id, campaign_id, status, data) VALUES (?, ?, ?, ?) \
                         ON CONFLICT (id) DO UPDATE SET status = excluded.status, data = excluded.data",
                    )
                    .bind(quest.id.to_string())
                    .bind(&campaign)
                    .bind(quest.status.as_str())
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Consequence(consequence) => {
                    let data = serde_json::to_string(&consequence)?;
                    sqlx::query(
                        "INSERT INTO consequences (id, campaign_id, active, expires_at_turn, data) \
                         VALUES (?, ?, 1, ?, ?) \
                         ON CONFLICT (id) DO UPDATE SET data = excluded.data",
                    )
                    .bind(consequence.id.to_string())
                    .bind(&campaign)
                    .bind(consequence.expires_at_turn)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Seed(seed) => {
                    let data = serde_json::to_string(&seed)?;
                    sqlx::query(
                        "INSERT INTO foreshadow_seeds (id, campaign_id, status, data) \
                         VALUES (?, ?, ?, ?) \
                         ON CONFLICT (id) DO UPDATE SET status = excluded.status, data = excluded.data",
                    )
                    .bind(seed.id.to_string())
                    .bind(&campaign)
                    .bind(seed.status.as_str())
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::Override(rule) => {
                    let data = serde_json::to_string(&rule)?;
                    sqlx::query(
                        "INSERT INTO override_rules (id, campaign_id, active, data) \
                         VALUES (?, ?, ?, ?) \
                         ON CONFLICT (id) DO UPDATE SET active = excluded.active, data = excluded.data",
                    )
                    .bind(rule.id.to_string())
                    .bind(&campaign)
                    .bind(rule.active as i64)
                    .bind(data)
                    .execute(&mut *tx)
                    .await?;
                }
                StateWrite::CombatDamage {
                    result_id,
                    target_name,
                    damage,
                } => {
                    // Idempotence: the ledger row wins races with replays
                    let inserted = sqlx::query(
                        "INSERT OR IGNORE INTO applied_combat_results \
                         (campaign_id, result_id, applied_at) VALUES (?, ?, ?)",
                    )
                    .bind(&campaign)
                    .bind(result_id.to_string())
                    .bind(now.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
                    if inserted.rows_affected() == 0 {
                        tracing::warn!(
                            result_id = %result_id,
                            "combat result already applied, skipping"
                        );
                        continue;
                    }

                    let row = sqlx::query(
                        "SELECT id, data FROM npcs WHERE campaign_id = ? AND name = ? COLLATE NOCASE",
                    )
                    .bind(&campaign)
                    .bind(&target_name)
                    .fetch_optional(&mut *tx)
                    .await?;
                    if let Some(r) = row {
                        let id: String = r.get("id");
                        let data: String = r.get("data");
                        let mut npc: Npc = serde_json::from_str(&data)?;
                        npc.take_damage(damage);
                        sqlx::query("UPDATE npcs SET data = ? WHERE id = ?")
                            .bind(serde_json::to_string(&npc)?)
                            .bind(id)
                            .execute(&mut *tx)
                            .await?;
                    } else {
                        tracing::warn!(target = %target_name, "combat target not found for damage apply");
                    }
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Apply a combat resolution's damage to a named target. Idempotent by
    /// result id: replaying the same result is a no-op.
    pub async fn apply_combat_result(
        &self,
        result_id: showrunner_domain::CombatResultId,
        target_name: &str,
        damage: i64,
    ) -> Result<(), RepoError> {
        let mut batch = self.deferred_commit();
        batch.push(StateWrite::CombatDamage {
            result_id,
            target_name: target_name.to_string(),
            damage,
        });
        self.commit_deferred(batch).await
    }

    // =========================================================================
    // Context snapshot
    // =========================================================================

    pub async fn get_context(&self) -> Result<GameContext, RepoError> {
        let character = self.get_character().await?;
        let world = self.get_world().await?;
        let bible = self.get_bible().await?;
        let last_turn = self.last_turn_number().await?;

        let recent = self.latest_turns(3).await?;
        let recent_summary = recent
            .iter()
            .map(|t| {
                let outcome = crate::util::clip(&t.narrative.replace('\n', " "), 160);
                format!("T{}: {} → {}", t.turn_number, t.player_input, outcome)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let scene_text = format!("{} {}", world.situation, world.location);
        let present_npcs = self
            .detect_npcs_in_text(&scene_text)
            .await?
            .into_iter()
            .map(|n| n.name)
            .collect();

        let (character_name, character_summary, power_tier, op) = match &character {
            Some(c) => (c.name.clone(), c.summary(), c.power_tier, c.op.clone()),
            None => (
                "Unknown".to_string(),
                "No character yet".to_string(),
                PowerTier::BASELINE,
                Default::default(),
            ),
        };

        Ok(GameContext {
            campaign_id: self.campaign_id,
            turn_number: last_turn + 1,
            location: world.location.clone(),
            situation: world.situation.clone(),
            character_name,
            character_summary,
            power_tier,
            arc_phase: world.arc_phase,
            arc_name: world.arc_name.clone(),
            tension_level: world.tension_level(),
            turns_in_phase: world.turns_in_phase,
            narrative_scale: world.narrative_scale,
            timeline_mode: world.timeline_mode.clone(),
            canon_cast_mode: world.canon_cast_mode.clone(),
            event_fidelity: world.event_fidelity.clone(),
            director_notes: bible.director_notes.clone(),
            recent_summary,
            present_npcs,
            op,
            high_imbalance_encounters: world.high_imbalance_encounters,
            op_suggestion_dismissed: world.op_suggestion_dismissed,
            pending_op_suggestion: world.pending_op_suggestion.clone(),
        })
    }
}

async fn insert_turn(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    campaign_id: &CampaignId,
    record: &TurnRecord,
) -> Result<(), RepoError> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(turn_number), 0) AS n FROM turns WHERE campaign_id = ?",
    )
    .bind(campaign_id.to_string())
    .fetch_one(&mut **tx)
    .await?;
    let last: i64 = row.get("n");
    if record.turn_number != last + 1 {
        return Err(RepoError::Database(format!(
            "turn numbers must be monotonic: expected {}, got {}",
            last + 1,
            record.turn_number
        )));
    }

    sqlx::query(
        "INSERT INTO turns (campaign_id, turn_number, player_input, intent, outcome, narrative, \
                            latency_ms, portrait_map, recorded_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(campaign_id.to_string())
    .bind(record.turn_number)
    .bind(&record.player_input)
    .bind(serde_json::to_string(&record.intent)?)
    .bind(
        record
            .outcome
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
    )
    .bind(&record.narrative)
    .bind(record.latency_ms)
    .bind(serde_json::to_string(&record.portrait_map)?)
    .bind(record.recorded_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<TurnRecord, RepoError> {
    let intent: String = row.get("intent");
    let outcome: Option<String> = row.get("outcome");
    let portrait_map: String = row.get("portrait_map");
    let recorded_at: String = row.get("recorded_at");
    Ok(TurnRecord {
        turn_number: row.get("turn_number"),
        player_input: row.get("player_input"),
        intent: serde_json::from_str(&intent)?,
        outcome: outcome.map(|o| serde_json::from_str(&o)).transpose()?,
        narrative: row.get("narrative"),
        latency_ms: row.get("latency_ms"),
        portrait_map: serde_json::from_str(&portrait_map)?,
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|e| RepoError::Serialization(e.to_string()))?
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use showrunner_domain::{
        ConsequenceCategory, ResourcePool, Severity,
    };

    async fn store() -> StateStore {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        StateStore::new(pool, CampaignId::new(), Arc::new(SystemClock::new()))
    }

    fn turn(n: i64) -> TurnRecord {
        TurnRecord::new(
            n,
            format!("input {n}"),
            serde_json::json!({"intent": "EXPLORATION"}),
            None,
            format!("narrative {n}"),
            100,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_character_roundtrip() {
        let store = store().await;
        assert!(store.get_character().await.expect("query").is_none());

        let character = Character::new("Rin");
        store.save_character(&character).await.expect("save");
        let loaded = store.get_character().await.expect("query").expect("found");
        assert_eq!(loaded.name, "Rin");
        assert_eq!(loaded.id, character.id);
    }

    #[tokio::test]
    async fn test_turn_monotonicity_enforced() {
        let store = store().await;
        store.record_turn(&turn(1)).await.expect("turn 1");
        store.record_turn(&turn(2)).await.expect("turn 2");
        // Gap and duplicate both rejected
        assert!(store.record_turn(&turn(2)).await.is_err());
        assert!(store.record_turn(&turn(5)).await.is_err());
        assert_eq!(store.last_turn_number().await.expect("n"), 2);
    }

    #[tokio::test]
    async fn test_consequence_expiry_is_idempotent() {
        let store = store().await;
        let minor = Consequence::new(
            Severity::Minor,
            ConsequenceCategory::Political,
            "angry baron",
            "insult",
            1,
        );
        let forever = Consequence::new(
            Severity::Catastrophic,
            ConsequenceCategory::Magical,
            "the seal is broken",
            "ritual",
            1,
        );
        store.apply_consequence(&minor).await.expect("insert");
        store.apply_consequence(&forever).await.expect("insert");

        // Minor expires at turn 6, so turn 7 removes it
        let expired = store.expire_consequences(7).await.expect("expire");
        assert_eq!(expired, 1);
        let again = store.expire_consequences(7).await.expect("expire again");
        assert_eq!(again, 0);

        let active = store.active_consequences(10).await.expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].severity, Severity::Catastrophic);
    }

    #[tokio::test]
    async fn test_affinity_update_clamps_and_reports() {
        let store = store().await;
        let mut npc = Npc::new("Mia", "rival");
        npc.affinity = showrunner_domain::Affinity::new(90);
        store.save_npc(&npc).await.expect("save");

        let milestone = store
            .update_npc_affinity(npc.id, 50, "saved her life")
            .await
            .expect("update");
        assert!(milestone.is_some());
        let reloaded = store.get_npc(npc.id).await.expect("get").expect("found");
        assert_eq!(reloaded.affinity.value(), 100);
    }

    #[tokio::test]
    async fn test_combat_damage_is_idempotent_by_result_id() {
        let store = store().await;
        let mut goblin = Npc::new("Goblin", "monster");
        goblin.hp = Some(ResourcePool::full(20));
        store.save_npc(&goblin).await.expect("save");

        let result_id = showrunner_domain::CombatResultId::new();
        for _ in 0..2 {
            let mut batch = store.deferred_commit();
            batch.push(StateWrite::CombatDamage {
                result_id,
                target_name: "Goblin".to_string(),
                damage: 15,
            });
            store.commit_deferred(batch).await.expect("commit");
        }

        let reloaded = store.get_npc(goblin.id).await.expect("get").expect("found");
        assert_eq!(reloaded.hp.expect("hp").current, 5, "damage applied exactly once");
    }

    #[tokio::test]
    async fn test_deferred_commit_is_atomic() {
        let store = store().await;
        store.record_turn(&turn(1)).await.expect("turn 1");

        // A batch with a bad turn number must not land its NPC either
        let mut batch = store.deferred_commit();
        batch.push(StateWrite::Npc(Npc::new("Kaz", "merchant")));
        batch.push(StateWrite::Turn(turn(9)));
        assert!(store.commit_deferred(batch).await.is_err());
        assert!(store
            .get_npc_by_name("Kaz")
            .await
            .expect("query")
            .is_none());
    }

    #[tokio::test]
    async fn test_get_context_turn_number_and_npcs() {
        let store = store().await;
        store.save_character(&Character::new("Rin")).await.expect("save");
        let mut world = WorldState::new("Ramen Alley", "Mia waits under the awning");
        world.set_tension(0.4);
        store.save_world(&world).await.expect("save world");
        store.save_npc(&Npc::new("Mia", "rival")).await.expect("save npc");
        store.record_turn(&turn(1)).await.expect("turn");

        let context = store.get_context().await.expect("context");
        assert_eq!(context.turn_number, 2);
        assert_eq!(context.present_npcs, vec!["Mia".to_string()]);
        assert!(context.recent_summary.contains("T1"));
        assert!(context.character_summary.contains("Rin"));
    }

    #[tokio::test]
    async fn test_transaction_rollback_on_overspend() {
        let store = store().await;
        let mut character = Character::new("Rin");
        character.mp.current = 10;
        store.save_character(&character).await.expect("save");

        let mut txn = store.begin_transaction("Spell resource cost").await.expect("txn");
        txn.subtract_mp(20, "Spell cost");
        let validation = txn.validate();
        assert!(!validation.is_valid());
        txn.rollback();
        let written = store.commit_transaction(txn).await.expect("commit");
        assert!(!written);

        let unchanged = store.get_character().await.expect("get").expect("found");
        assert_eq!(unchanged.mp.current, 10);
    }

    #[tokio::test]
    async fn test_spotlight_debt() {
        let store = store().await;
        let mut mia = Npc::new("Mia", "rival");
        mia.interaction_count = 9;
        mia.scene_count = 4;
        let mut kaz = Npc::new("Kaz", "merchant");
        kaz.interaction_count = 2;
        kaz.scene_count = 2;
        store.save_npc(&mia).await.expect("save");
        store.save_npc(&kaz).await.expect("save");

        let debt = store.compute_spotlight_debt().await.expect("debt");
        assert_eq!(debt.get("Mia"), Some(&5));
        assert!(!debt.contains_key("Kaz"));
    }
}
