//! The rule library: semantic retrieval plus typed accessors over the static
//! narrative-guidance corpus.

use std::sync::Arc;

use sqlx::SqlitePool;

use showrunner_domain::{PowerTier, RuleCategory, StoryScale};

use crate::context::corpus::builtin_chunks;
use crate::infrastructure::ports::EmbeddingPort;
use crate::infrastructure::vector::{ChunkHit, VectorCollection, VectorError};

const COLLECTION: &str = "narrative_rules";

pub struct RuleLibrary {
    chunks: VectorCollection,
}

impl RuleLibrary {
    /// Open the library and index the built-in corpus if the collection is
    /// empty (first run or fresh database).
    pub async fn open(
        pool: SqlitePool,
        embedder: Arc<dyn EmbeddingPort>,
    ) -> Result<Self, VectorError> {
        let chunks = VectorCollection::new(pool, COLLECTION, embedder);
        let library = Self { chunks };
        if library.chunks.count(None).await? == 0 {
            library.initialize().await?;
        }
        Ok(library)
    }

    async fn initialize(&self) -> Result<(), VectorError> {
        let corpus = builtin_chunks();
        let items: Vec<(String, String, Vec<String>, String, String)> = corpus
            .iter()
            .map(|c| {
                (
                    c.id.clone(),
                    c.category.as_str().to_string(),
                    c.tags.clone(),
                    String::new(),
                    c.content.clone(),
                )
            })
            .collect();
        self.chunks.upsert_many("", &items).await?;
        tracing::info!(chunks = items.len(), "rule library indexed");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, VectorError> {
        self.chunks.count(None).await
    }

    /// Semantic top-K with optional category and tag filters.
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        category: Option<RuleCategory>,
        tags: Option<&[&str]>,
    ) -> Result<Vec<ChunkHit>, VectorError> {
        let hits = self
            .chunks
            .search(None, query, limit.max(1) * 2, category.map(|c| c.as_str()))
            .await?;
        let mut filtered: Vec<ChunkHit> = match tags {
            Some(wanted) => hits
                .into_iter()
                .filter(|h| wanted.iter().any(|t| h.tags.iter().any(|ht| ht == t)))
                .collect(),
            None => hits,
        };
        filtered.truncate(limit);
        Ok(filtered)
    }

    /// Retrieve relevant rules as one formatted context block.
    pub async fn relevant_rules(&self, query: &str, limit: usize) -> Result<String, VectorError> {
        let hits = self.retrieve(query, limit, None, None).await?;
        Ok(hits
            .iter()
            .map(|h| format!("--- {} Guidance ---\n{}", h.category.to_uppercase(), h.content))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<String>, VectorError> {
        self.chunks.get_by_id("", id).await
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    async fn first_content(
        &self,
        query: &str,
        category: RuleCategory,
    ) -> Result<Option<String>, VectorError> {
        Ok(self
            .retrieve(query, 1, Some(category), None)
            .await?
            .into_iter()
            .next()
            .map(|h| h.content))
    }

    /// Narration guidance for a DNA scale sitting at `value` (0-10).
    pub async fn get_dna_guidance(
        &self,
        scale_name: &str,
        value: i32,
    ) -> Result<Option<String>, VectorError> {
        let level = if value <= 3 {
            "low"
        } else if value >= 7 {
            "high"
        } else {
            "mid"
        };
        self.first_content(
            &format!("{scale_name} {level} narration style"),
            RuleCategory::Dna,
        )
        .await
    }

    pub async fn get_genre_guidance(&self, genre: &str) -> Result<Option<String>, VectorError> {
        self.first_content(&format!("{genre} genre structure"), RuleCategory::Genre)
            .await
    }

    pub async fn get_scale_guidance(
        &self,
        scale: StoryScale,
    ) -> Result<Option<String>, VectorError> {
        self.first_content(
            &format!("{} narrative scale", scale.as_str()),
            RuleCategory::Scale,
        )
        .await
    }

    /// Director guidance for a tier × scale combination.
    pub async fn get_compatibility_guidance(
        &self,
        tier: PowerTier,
        scale: StoryScale,
    ) -> Result<Option<String>, VectorError> {
        let tier_label = match tier.number() {
            8..=10 => "low tier",
            4..=7 => "mid tier",
            _ => "high tier",
        };
        self.first_content(
            &format!("{tier_label} at {} scale compatibility", scale.as_str()),
            RuleCategory::Compatibility,
        )
        .await
    }

    /// Guidance for one OP-mode axis value.
    /// `axis` is "tension", "expression", or "focus".
    pub async fn get_op_axis_guidance(
        &self,
        axis: &str,
        value: &str,
    ) -> Result<Option<String>, VectorError> {
        if value.is_empty() {
            return Ok(None);
        }
        let category = match axis {
            "tension" => RuleCategory::OpTension,
            "expression" => RuleCategory::OpExpression,
            "focus" => RuleCategory::OpFocus,
            _ => return Ok(None),
        };
        self.first_content(&format!("{value} {axis} overpowered protagonist"), category)
            .await
    }

    /// Tier transition ceremony text by exact id (`ceremony_t8_t7`), falling
    /// back to the destination tier's general guidance.
    pub async fn get_ceremony_text(
        &self,
        old_tier: PowerTier,
        new_tier: PowerTier,
    ) -> Result<Option<String>, VectorError> {
        let id = format!("ceremony_t{}_t{}", old_tier.number(), new_tier.number());
        if let Some(content) = self.get_by_id(&id).await? {
            return Ok(Some(content));
        }
        self.get_power_tier_guidance(new_tier).await
    }

    pub async fn get_power_tier_guidance(
        &self,
        tier: PowerTier,
    ) -> Result<Option<String>, VectorError> {
        if let Some(content) = self
            .get_by_id(&format!("power_tier_t{}", tier.number()))
            .await?
        {
            return Ok(Some(content));
        }
        self.first_content(
            &format!("power tier {tier} narrative guidance"),
            RuleCategory::PowerTier,
        )
        .await
    }

    /// Non-combat tension guidance once a fight is too lopsided to carry
    /// stakes. Returns None at imbalance <= 3 (standard combat is fine).
    pub async fn get_tension_guidance(
        &self,
        tension_source: &str,
        power_imbalance: f64,
    ) -> Result<Option<String>, VectorError> {
        if power_imbalance <= 3.0 {
            return Ok(None);
        }
        let source = if tension_source.is_empty() {
            "structural"
        } else {
            tension_source
        };
        self.first_content(
            &format!("{source} tension overwhelming protagonist"),
            RuleCategory::Tension,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;

    async fn library() -> RuleLibrary {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        RuleLibrary::open(pool, Arc::new(HashEmbedder::default()))
            .await
            .expect("library")
    }

    #[tokio::test]
    async fn test_corpus_indexed_once() {
        let lib = library().await;
        let count = lib.count().await.expect("count");
        assert!(count > 40, "corpus should be indexed, got {count}");
    }

    #[tokio::test]
    async fn test_ceremony_exact_id_lookup() {
        let lib = library().await;
        let t8 = PowerTier::parse("T8").expect("tier");
        let t7 = PowerTier::parse("T7").expect("tier");
        let ceremony = lib.get_ceremony_text(t8, t7).await.expect("lookup");
        assert!(ceremony.expect("found").contains("restrained"));
    }

    #[tokio::test]
    async fn test_ceremony_falls_back_to_tier_guidance() {
        let lib = library().await;
        // No ceremony chunk for T3 -> T2; falls back to T2 guidance
        let t3 = PowerTier::parse("T3").expect("tier");
        let t2 = PowerTier::parse("T2").expect("tier");
        let text = lib.get_ceremony_text(t3, t2).await.expect("lookup");
        assert!(text.expect("fallback").contains("Physics"));
    }

    #[tokio::test]
    async fn test_op_axis_guidance() {
        let lib = library().await;
        let guidance = lib
            .get_op_axis_guidance("tension", "existential")
            .await
            .expect("lookup")
            .expect("found");
        assert!(guidance.to_lowercase().contains("existential") || guidance.contains("strength"));

        assert!(lib
            .get_op_axis_guidance("tension", "")
            .await
            .expect("lookup")
            .is_none());
        assert!(lib
            .get_op_axis_guidance("sideways", "existential")
            .await
            .expect("lookup")
            .is_none());
    }

    #[tokio::test]
    async fn test_tension_guidance_gated_on_imbalance() {
        let lib = library().await;
        assert!(lib
            .get_tension_guidance("social", 2.0)
            .await
            .expect("lookup")
            .is_none());
        assert!(lib
            .get_tension_guidance("social", 11.0)
            .await
            .expect("lookup")
            .is_some());
    }

    #[tokio::test]
    async fn test_dna_guidance_levels() {
        let lib = library().await;
        let low = lib
            .get_dna_guidance("comedy_vs_drama", 1)
            .await
            .expect("lookup");
        let high = lib
            .get_dna_guidance("comedy_vs_drama", 9)
            .await
            .expect("lookup");
        assert!(low.is_some());
        assert!(high.is_some());
        assert_ne!(low, high);
    }
}
