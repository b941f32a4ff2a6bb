//! Long-term narrative memory with heat-based decay.
//!
//! Memories start hot and cool per-turn at category-specific rates; retrieval
//! re-heats what the story keeps touching. Cold memories get compressed into
//! summaries every few turns so the store never grows without bound.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use showrunner_domain::{
    content_fingerprint, DecayRate, Heat, MemoryId, MemoryKind, MemoryRecord, FLAG_PLOT_CRITICAL,
    FLAG_SESSION_ZERO,
};

use crate::infrastructure::ports::{ClockPort, LlmRequest, RepoError};
use crate::infrastructure::providers::embeddings::{
    bytes_to_vector, cosine_similarity, vector_to_bytes,
};
use crate::infrastructure::ports::EmbeddingPort;
use crate::infrastructure::router::{AgentKey, ProviderManager};

/// Retrieval boost for Session Zero / plot-critical memories.
const BOOST_CRITICAL: f32 = 0.30;
/// Retrieval boost for episodic memories (recent by construction).
const BOOST_EPISODE: f32 = 0.15;
/// Score bias for exact keyword hits in hybrid search.
const BOOST_KEYWORD: f32 = 0.25;

/// Compression knobs (heat threshold, minimum cold count, per-category batch).
const COMPRESS_HEAT_THRESHOLD: f64 = 30.0;
const COMPRESS_MIN_MEMORIES: usize = 5;
const COMPRESS_MAX_PER_CATEGORY: usize = 10;

#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub record: MemoryRecord,
    pub base_score: f32,
    pub boost: f32,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub min_heat: f64,
    pub boost_on_access: bool,
    pub kind: Option<MemoryKind>,
    pub keyword: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            min_heat: 0.0,
            boost_on_access: true,
            kind: None,
            keyword: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct CompressionReport {
    pub compressed: bool,
    pub memories_removed: usize,
    pub summaries_created: usize,
    pub reason: Option<String>,
}

pub struct MemoryStore {
    pool: SqlitePool,
    /// Collection key: one vector collection per campaign session.
    collection: String,
    embedder: Arc<dyn EmbeddingPort>,
    manager: Arc<ProviderManager>,
    clock: Arc<dyn ClockPort>,
}

impl MemoryStore {
    pub fn new(
        pool: SqlitePool,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingPort>,
        manager: Arc<ProviderManager>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            embedder,
            manager,
            clock,
        }
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Add a memory. Duplicate content (first 200 chars) returns the existing
    /// id and leaves the store unchanged. A plot-critical flag forces zero
    /// decay.
    pub async fn add_memory(
        &self,
        kind: MemoryKind,
        content: &str,
        turn_number: i64,
        decay_override: Option<DecayRate>,
        flags: Vec<String>,
        metadata: Option<serde_json::Value>,
    ) -> Result<MemoryId, RepoError> {
        let fingerprint = content_fingerprint(content);
        if let Some(existing) = self.find_by_fingerprint(fingerprint).await? {
            tracing::warn!(existing = %existing, "dedup: skipping duplicate memory content");
            return Ok(existing);
        }

        let mut record = MemoryRecord::new(
            kind,
            content,
            turn_number,
            decay_override,
            flags,
            self.clock.now(),
        );
        if let Some(meta) = metadata {
            record.metadata = meta;
        }

        let embedding = self
            .embedder
            .embed(&[record.content.clone()])
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();

        sqlx::query(
            "INSERT INTO memories \
             (id, collection, kind, content, fingerprint, heat, decay_rate, flags, turn_number, \
              metadata, created_at, embedding) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&self.collection)
        .bind(record.kind.as_str())
        .bind(&record.content)
        .bind(fingerprint)
        .bind(record.heat.value())
        .bind(record.decay_rate.as_str())
        .bind(record.flags.join(","))
        .bind(record.turn_number)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at.to_rfc3339())
        .bind(vector_to_bytes(&embedding))
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }

    /// Per-turn episodic memory: bridges working memory and long-term recall,
    /// fading in roughly six turns.
    pub async fn add_episode(
        &self,
        turn: i64,
        location: &str,
        summary: &str,
    ) -> Result<MemoryId, RepoError> {
        let content = format!("[Turn {turn}] {location}: {summary}");
        self.add_memory(
            MemoryKind::Episode,
            &content,
            turn,
            Some(DecayRate::VeryFast),
            vec!["recent_event".to_string()],
            None,
        )
        .await
    }

    async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<MemoryId>, RepoError> {
        let row = sqlx::query("SELECT id FROM memories WHERE collection = ? AND fingerprint = ?")
            .bind(&self.collection)
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let id: String = r.get("id");
            uuid::Uuid::parse_str(&id)
                .map(MemoryId::from_uuid)
                .map_err(|e| RepoError::Serialization(e.to_string()))
        })
        .transpose()
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Vector search with heat filtering and retrieval boosts. Returned
    /// memories optionally get an access heat boost.
    pub async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<MemoryHit>, RepoError> {
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut sql =
            String::from("SELECT * FROM memories WHERE collection = ? AND heat >= ?");
        if options.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if options.keyword.is_some() {
            sql.push_str(" AND content LIKE ?");
        }

        let mut q = sqlx::query(&sql)
            .bind(&self.collection)
            .bind(options.min_heat);
        if let Some(kind) = options.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(keyword) = &options.keyword {
            q = q.bind(format!("%{keyword}%"));
        }

        let rows = q.fetch_all(&self.pool).await?;
        let mut hits: Vec<MemoryHit> = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding: Vec<u8> = row.get("embedding");
            let record = row_to_record(&row)?;
            let base_score = cosine_similarity(&query_vec, &bytes_to_vector(&embedding));

            let mut boost = 0.0f32;
            if record.has_flag(FLAG_SESSION_ZERO) || record.is_plot_critical() {
                boost += BOOST_CRITICAL;
            }
            if record.kind == MemoryKind::Episode {
                boost += BOOST_EPISODE;
            }

            hits.push(MemoryHit {
                score: (base_score + boost).min(1.0),
                base_score,
                boost,
                record,
            });
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(options.limit);

        if options.boost_on_access {
            for hit in &hits {
                self.boost_heat(&hit.record).await?;
            }
        }

        Ok(hits)
    }

    /// Hybrid search: keyword-filtered and pure-semantic passes merged, with
    /// keyword hits biased upward so exact-name matches outrank fuzzy ones.
    pub async fn search_hybrid(
        &self,
        query: &str,
        keyword: &str,
        options: SearchOptions,
    ) -> Result<Vec<MemoryHit>, RepoError> {
        let keyword_hits = self
            .search(
                query,
                SearchOptions {
                    keyword: Some(keyword.to_string()),
                    ..options.clone()
                },
            )
            .await?;

        let semantic_hits = self
            .search(
                query,
                SearchOptions {
                    boost_on_access: false, // already boosted in the keyword pass
                    keyword: None,
                    ..options.clone()
                },
            )
            .await?;

        let mut seen: Vec<MemoryId> = Vec::new();
        let mut merged: Vec<MemoryHit> = Vec::new();
        for mut hit in keyword_hits {
            hit.score = (hit.score + BOOST_KEYWORD).min(1.0);
            hit.boost += BOOST_KEYWORD;
            seen.push(hit.record.id);
            merged.push(hit);
        }
        for hit in semantic_hits {
            if !seen.contains(&hit.record.id) {
                seen.push(hit.record.id);
                merged.push(hit);
            }
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(options.limit);
        Ok(merged)
    }

    /// Guaranteed-include memories for the context selector.
    pub async fn plot_critical_memories(&self, limit: usize) -> Result<Vec<MemoryRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE collection = ? AND flags LIKE ? LIMIT ?",
        )
        .bind(&self.collection)
        .bind(format!("%{FLAG_PLOT_CRITICAL}%"))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    /// The hottest memories (most relevant/recent), hottest first.
    pub async fn hot_memories(
        &self,
        min_heat: f64,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE collection = ? AND heat >= ? \
             ORDER BY heat DESC LIMIT ?",
        )
        .bind(&self.collection)
        .bind(min_heat)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    pub async fn count(&self) -> Result<i64, RepoError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM memories WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn boost_heat(&self, record: &MemoryRecord) -> Result<(), RepoError> {
        let boosted = record.heat.boosted(record.access_boost());
        sqlx::query("UPDATE memories SET heat = ? WHERE id = ?")
            .bind(boosted.value())
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Force a memory plot-critical: flag plus zero decay and full heat.
    pub async fn mark_plot_critical(&self, id: MemoryId) -> Result<(), RepoError> {
        let row = sqlx::query("SELECT * FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)?;
        let mut record = row_to_record(&row)?;
        record.mark_plot_critical();
        sqlx::query("UPDATE memories SET flags = ?, decay_rate = ?, heat = ? WHERE id = ?")
            .bind(record.flags.join(","))
            .bind(record.decay_rate.as_str())
            .bind(Heat::CEILING)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Decay
    // =========================================================================

    /// Apply decay for turns elapsed since the last decay pass. Calling twice
    /// with the same turn number is a no-op.
    pub async fn decay_heat(&self, current_turn: i64) -> Result<(), RepoError> {
        let last = self.last_decay_turn().await?;
        if current_turn <= last {
            return Ok(());
        }
        let turns_elapsed = current_turn - last;
        self.set_last_decay_turn(current_turn).await?;

        let rows = sqlx::query("SELECT * FROM memories WHERE collection = ? AND decay_rate != ?")
            .bind(&self.collection)
            .bind(DecayRate::None.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut tx = self.pool.begin().await?;
        for row in rows {
            let mut record = row_to_record(&row)?;
            let before = record.heat.value();
            record.decay(turns_elapsed);
            if (before - record.heat.value()).abs() > 0.1 {
                sqlx::query("UPDATE memories SET heat = ? WHERE id = ?")
                    .bind(record.heat.value())
                    .bind(record.id.to_string())
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn last_decay_turn(&self) -> Result<i64, RepoError> {
        let row = sqlx::query("SELECT value FROM kv_state WHERE campaign_id = ? AND key = 'last_decay_turn'")
            .bind(&self.collection)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| {
                let value: String = r.get("value");
                value.parse().unwrap_or(0)
            })
            .unwrap_or(0))
    }

    async fn set_last_decay_turn(&self, turn: i64) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO kv_state (campaign_id, key, value) VALUES (?, 'last_decay_turn', ?) \
             ON CONFLICT (campaign_id, key) DO UPDATE SET value = excluded.value",
        )
        .bind(&self.collection)
        .bind(turn.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // =========================================================================
    // Compression
    // =========================================================================

    /// Compress cold memories into per-category summaries. Plot-critical
    /// (no-decay) groups are skipped; originals are deleted after the summary
    /// lands.
    pub async fn compress_cold_memories(&self) -> Result<CompressionReport, RepoError> {
        let rows = sqlx::query("SELECT * FROM memories WHERE collection = ? AND heat < ?")
            .bind(&self.collection)
            .bind(COMPRESS_HEAT_THRESHOLD)
            .fetch_all(&self.pool)
            .await?;
        let cold: Vec<MemoryRecord> = rows.iter().map(row_to_record).collect::<Result<_, _>>()?;

        if cold.len() < COMPRESS_MIN_MEMORIES {
            return Ok(CompressionReport {
                compressed: false,
                reason: Some(format!(
                    "only {} cold memories, need {COMPRESS_MIN_MEMORIES}",
                    cold.len()
                )),
                ..Default::default()
            });
        }

        let mut by_kind: HashMap<MemoryKind, Vec<MemoryRecord>> = HashMap::new();
        for record in cold {
            by_kind.entry(record.kind).or_default().push(record);
        }
        // Skip groups where nothing decays (plot-critical clusters)
        by_kind.retain(|_, records| records.iter().any(|r| r.decay_rate != DecayRate::None));

        if by_kind.is_empty() {
            return Ok(CompressionReport {
                compressed: false,
                reason: Some("all cold memories are plot-critical".to_string()),
                ..Default::default()
            });
        }

        let mut report = CompressionReport {
            compressed: true,
            ..Default::default()
        };

        for (kind, records) in by_kind {
            if records.len() < 2 {
                continue;
            }
            // One summary per group per cycle, batch capped at the
            // per-category limit; anything beyond the cap stays cold and is
            // picked up on a later pass
            let batch: Vec<&MemoryRecord> = records
                .iter()
                .take(COMPRESS_MAX_PER_CATEGORY)
                .collect();

            let Some(summary) = self.summarize_batch(kind, &batch).await else {
                continue;
            };

            let source_ids: Vec<String> = batch.iter().map(|r| r.id.to_string()).collect();
            self.add_memory(
                kind,
                &format!(
                    "[COMPRESSED MEMORIES - {}]\n{summary}",
                    kind.as_str().to_uppercase()
                ),
                batch[0].turn_number,
                Some(DecayRate::Slow),
                vec!["compressed".to_string()],
                Some(serde_json::json!({
                    "is_compressed": true,
                    "source_count": batch.len(),
                    "source_ids": source_ids,
                })),
            )
            .await?;
            report.summaries_created += 1;

            for id in &source_ids {
                sqlx::query("DELETE FROM memories WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            report.memories_removed += source_ids.len();
        }

        Ok(report)
    }

    async fn summarize_batch(&self, kind: MemoryKind, batch: &[&MemoryRecord]) -> Option<String> {
        let listing = batch
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.content))
            .collect::<Vec<_>>()
            .join("\n");
        let request = LlmRequest::new(
            "You are a memory compression assistant. Create concise summaries that preserve \
             essential information.",
            format!(
                "Summarize these {} old memories from the \"{}\" category into a single concise \
                 paragraph. Preserve key facts, names, and important details. Remove redundancy. \
                 Keep the summary under 200 words.\n\nMEMORIES:\n{listing}\n\nSUMMARY:",
                batch.len(),
                kind.as_str()
            ),
        );
        match self.manager.complete(AgentKey::Compactor, request).await {
            Ok(response) => Some(response.content.trim().to_string()),
            Err(e) => {
                tracing::error!(kind = kind.as_str(), error = %e, "memory compression summarization failed");
                None
            }
        }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<MemoryRecord, RepoError> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let decay: String = row.get("decay_rate");
    let flags: String = row.get("flags");
    let metadata: Option<String> = row.get("metadata");
    let created_at: String = row.get("created_at");
    let heat: f64 = row.get("heat");

    Ok(MemoryRecord {
        id: MemoryId::from_uuid(
            uuid::Uuid::parse_str(&id).map_err(|e| RepoError::Serialization(e.to_string()))?,
        ),
        kind: MemoryKind::parse(&kind),
        content: row.get("content"),
        heat: Heat::new(heat),
        decay_rate: parse_decay(&decay),
        flags: flags
            .split(',')
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect(),
        turn_number: row.get("turn_number"),
        metadata: metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()?
            .unwrap_or(serde_json::Value::Null),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| RepoError::Serialization(e.to_string()))?
            .with_timezone(&Utc),
    })
}

fn parse_decay(value: &str) -> DecayRate {
    match value {
        "none" => DecayRate::None,
        "very_slow" => DecayRate::VerySlow,
        "slow" => DecayRate::Slow,
        "fast" => DecayRate::Fast,
        "very_fast" => DecayRate::VeryFast,
        _ => DecayRate::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;
    use crate::test_fixtures::ScriptedLlm;
    use crate::infrastructure::router::ProviderKind;

    async fn memory_store() -> MemoryStore {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let manager = Arc::new(ProviderManager::new());
        let scripted = ScriptedLlm::new();
        scripted.push_text("A condensed history of recent events.");
        scripted.push_text("A condensed history of recent events.");
        manager.register_provider(ProviderKind::Ollama, Arc::new(scripted), 4);
        manager.set_default_route(ProviderKind::Ollama, "test-model");
        MemoryStore::new(
            pool,
            "campaign_test",
            Arc::new(HashEmbedder::default()),
            manager,
            Arc::new(SystemClock::new()),
        )
    }

    #[tokio::test]
    async fn test_dedup_returns_existing_id() {
        let store = memory_store().await;
        let first = store
            .add_memory(MemoryKind::Event, "The gate fell at dawn.", 1, None, vec![], None)
            .await
            .expect("insert");
        let second = store
            .add_memory(MemoryKind::Event, "The gate fell at dawn.", 2, None, vec![], None)
            .await
            .expect("dedup");
        assert_eq!(first, second);
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_and_boosts() {
        let store = memory_store().await;
        store
            .add_memory(MemoryKind::Event, "Mia challenged you at the ramen stand.", 1, None, vec![], None)
            .await
            .expect("insert");
        store
            .add_memory(
                MemoryKind::Fact,
                "The eastern bridge was destroyed in the flood.",
                1,
                None,
                vec![FLAG_PLOT_CRITICAL.to_string()],
                None,
            )
            .await
            .expect("insert");

        let hits = store
            .search("bridge destroyed flood", SearchOptions::default())
            .await
            .expect("search");
        assert_eq!(hits[0].record.kind, MemoryKind::Fact);
        assert!(hits[0].boost >= BOOST_CRITICAL);

        // Access boost re-heated the returned memories
        let hot = store.hot_memories(99.0, 10).await.expect("hot");
        assert!(!hot.is_empty());
    }

    #[tokio::test]
    async fn test_heat_decays_and_is_monotonic() {
        let store = memory_store().await;
        let id = store
            .add_memory(MemoryKind::Event, "A quiet walk home.", 1, None, vec![], None)
            .await
            .expect("insert");

        store.decay_heat(2).await.expect("decay");
        let after_one: f64 = sqlx::query("SELECT heat FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&store.pool)
            .await
            .expect("row")
            .get("heat");
        assert!((after_one - 90.0).abs() < 1e-6);

        // Same turn: no double decay
        store.decay_heat(2).await.expect("decay");
        let unchanged: f64 = sqlx::query("SELECT heat FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&store.pool)
            .await
            .expect("row")
            .get("heat");
        assert!((unchanged - after_one).abs() < 1e-6);

        // Three more turns elapse at once
        store.decay_heat(5).await.expect("decay");
        let after_four: f64 = sqlx::query("SELECT heat FROM memories WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&store.pool)
            .await
            .expect("row")
            .get("heat");
        assert!(after_four < after_one);
    }

    #[tokio::test]
    async fn test_plot_critical_never_decays() {
        let store = memory_store().await;
        store
            .add_memory(
                MemoryKind::Core,
                "You carry the last ember of the fallen shrine.",
                1,
                None,
                vec![FLAG_PLOT_CRITICAL.to_string()],
                None,
            )
            .await
            .expect("insert");
        store.decay_heat(50).await.expect("decay");

        let records = store.plot_critical_memories(3).await.expect("list");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].heat.value(), 100.0);
        assert_eq!(records[0].decay_rate, DecayRate::None);
    }

    #[tokio::test]
    async fn test_hybrid_search_biases_keyword_hits() {
        let store = memory_store().await;
        store
            .add_memory(MemoryKind::Event, "Doran forged a blade of meteor iron.", 1, None, vec![], None)
            .await
            .expect("insert");
        store
            .add_memory(MemoryKind::Event, "A smith somewhere made a weapon once.", 1, None, vec![], None)
            .await
            .expect("insert");

        let hits = store
            .search_hybrid("blade forging", "Doran", SearchOptions::default())
            .await
            .expect("hybrid");
        assert!(hits[0].record.content.contains("Doran"));
        assert!(hits[0].boost >= BOOST_KEYWORD);
    }

    #[tokio::test]
    async fn test_compression_replaces_cold_memories() {
        let store = memory_store().await;
        for i in 0..6 {
            store
                .add_memory(
                    MemoryKind::Event,
                    &format!("Forgettable errand number {i} in the market."),
                    1,
                    None,
                    vec![],
                    None,
                )
                .await
                .expect("insert");
        }
        // Cool everything below the compression threshold
        sqlx::query("UPDATE memories SET heat = 10.0 WHERE collection = ?")
            .bind("campaign_test")
            .execute(&store.pool)
            .await
            .expect("cool");

        let report = store.compress_cold_memories().await.expect("compress");
        assert!(report.compressed);
        assert_eq!(report.summaries_created, 1);
        assert_eq!(report.memories_removed, 6);
        assert_eq!(store.count().await.expect("count"), 1);

        let remaining = store.hot_memories(0.0, 10).await.expect("list");
        assert!(remaining[0].content.starts_with("[COMPRESSED MEMORIES - EVENT]"));
        assert_eq!(remaining[0].decay_rate, DecayRate::Slow);
    }

    #[tokio::test]
    async fn test_compression_takes_one_batch_per_group_per_cycle() {
        let store = memory_store().await;
        for i in 0..12 {
            store
                .add_memory(
                    MemoryKind::Event,
                    &format!("Cold errand number {i} in the market."),
                    1,
                    None,
                    vec![],
                    None,
                )
                .await
                .expect("insert");
        }
        sqlx::query("UPDATE memories SET heat = 10.0 WHERE collection = ?")
            .bind("campaign_test")
            .execute(&store.pool)
            .await
            .expect("cool");

        // A 12-memory group yields exactly one summary of the first 10;
        // the remaining 2 wait for the next cycle
        let report = store.compress_cold_memories().await.expect("compress");
        assert!(report.compressed);
        assert_eq!(report.summaries_created, 1);
        assert_eq!(report.memories_removed, 10);
        assert_eq!(store.count().await.expect("count"), 3);
    }

    #[tokio::test]
    async fn test_compression_skips_small_and_critical_sets() {
        let store = memory_store().await;
        store
            .add_memory(MemoryKind::Event, "One lonely cold memory.", 1, None, vec![], None)
            .await
            .expect("insert");
        sqlx::query("UPDATE memories SET heat = 5.0")
            .execute(&store.pool)
            .await
            .expect("cool");

        let report = store.compress_cold_memories().await.expect("compress");
        assert!(!report.compressed);
        assert!(report.reason.is_some());
    }

    #[tokio::test]
    async fn test_episode_format_and_decay() {
        let store = memory_store().await;
        store
            .add_episode(4, "Ramen Alley", "Tried to bribe the guard — it went poorly")
            .await
            .expect("episode");
        let hits = store
            .search(
                "guard bribe",
                SearchOptions {
                    kind: Some(MemoryKind::Episode),
                    ..Default::default()
                },
            )
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].record.content.starts_with("[Turn 4] Ramen Alley:"));
        assert_eq!(hits[0].record.decay_rate, DecayRate::VeryFast);
    }
}
