//! SQLite-backed vector collections for read-mostly chunk corpora (rule
//! library, profile lore).
//!
//! Embeddings are stored as little-endian f32 BLOBs; search loads the
//! candidate rows and ranks by brute-force cosine similarity, which is
//! reliable and plenty fast at corpus sizes measured in thousands.

use std::sync::Arc;

use sqlx::{Row, SqlitePool};

use crate::infrastructure::ports::{EmbedError, EmbeddingPort, RepoError};
use crate::infrastructure::providers::embeddings::{
    bytes_to_vector, cosine_similarity, vector_to_bytes,
};

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

impl From<sqlx::Error> for VectorError {
    fn from(err: sqlx::Error) -> Self {
        VectorError::Repo(err.into())
    }
}

/// One retrieval hit with its similarity score.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub id: String,
    pub category: String,
    pub tags: Vec<String>,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// A named collection in the shared `vector_chunks` table, optionally
/// partitioned (profile lore partitions by profile id; the rule library
/// uses a single empty partition).
pub struct VectorCollection {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn EmbeddingPort>,
}

impl VectorCollection {
    pub fn new(
        pool: SqlitePool,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingPort>,
    ) -> Self {
        Self {
            pool,
            collection: collection.into(),
            embedder,
        }
    }

    pub async fn count(&self, partition: Option<&str>) -> Result<i64, VectorError> {
        let row = match partition {
            Some(p) => {
                sqlx::query(
                    "SELECT COUNT(*) AS n FROM vector_chunks WHERE collection = ? AND partition_key = ?",
                )
                .bind(&self.collection)
                .bind(p)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) AS n FROM vector_chunks WHERE collection = ?")
                    .bind(&self.collection)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.get("n"))
    }

    /// Embed and upsert a batch of chunks into one partition.
    /// Items: (id, category, tags, title, content).
    pub async fn upsert_many(
        &self,
        partition: &str,
        items: &[(String, String, Vec<String>, String, String)],
    ) -> Result<(), VectorError> {
        if items.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = items.iter().map(|(_, _, _, _, content)| content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut tx = self.pool.begin().await.map_err(RepoError::from)?;
        for ((id, category, tags, title, content), embedding) in items.iter().zip(embeddings) {
            sqlx::query(
                "INSERT INTO vector_chunks \
                 (collection, partition_key, id, category, tags, title, content, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT (collection, partition_key, id) DO UPDATE SET \
                   category = excluded.category, tags = excluded.tags, \
                   title = excluded.title, content = excluded.content, \
                   embedding = excluded.embedding",
            )
            .bind(&self.collection)
            .bind(partition)
            .bind(id)
            .bind(category)
            .bind(tags.join(","))
            .bind(title)
            .bind(content)
            .bind(vector_to_bytes(&embedding))
            .execute(&mut *tx)
            .await
            .map_err(RepoError::from)?;
        }
        tx.commit().await.map_err(RepoError::from)?;
        Ok(())
    }

    /// Semantic top-K with optional partition and category filters.
    pub async fn search(
        &self,
        partition: Option<&str>,
        query: &str,
        limit: usize,
        category: Option<&str>,
    ) -> Result<Vec<ChunkHit>, VectorError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut sql = String::from(
            "SELECT id, category, tags, title, content, embedding \
             FROM vector_chunks WHERE collection = ?",
        );
        if partition.is_some() {
            sql.push_str(" AND partition_key = ?");
        }
        if category.is_some() {
            sql.push_str(" AND category = ?");
        }

        let mut q = sqlx::query(&sql).bind(&self.collection);
        if let Some(p) = partition {
            q = q.bind(p);
        }
        if let Some(c) = category {
            q = q.bind(c);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(RepoError::from)?;
        let mut hits: Vec<ChunkHit> = rows
            .into_iter()
            .map(|row| {
                let embedding: Vec<u8> = row.get("embedding");
                let tags: String = row.get("tags");
                ChunkHit {
                    id: row.get("id"),
                    category: row.get("category"),
                    tags: tags
                        .split(',')
                        .filter(|t| !t.is_empty())
                        .map(String::from)
                        .collect(),
                    title: row.get("title"),
                    content: row.get("content"),
                    score: cosine_similarity(&query_vec, &bytes_to_vector(&embedding)),
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Exact-id lookup (ceremonies, archetype chunks).
    pub async fn get_by_id(
        &self,
        partition: &str,
        id: &str,
    ) -> Result<Option<String>, VectorError> {
        let row = sqlx::query(
            "SELECT content FROM vector_chunks \
             WHERE collection = ? AND partition_key = ? AND id = ?",
        )
        .bind(&self.collection)
        .bind(partition)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from)?;
        Ok(row.map(|r| r.get("content")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;

    async fn collection() -> VectorCollection {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        VectorCollection::new(pool, "test_chunks", Arc::new(HashEmbedder::default()))
    }

    fn chunk(id: &str, category: &str, content: &str) -> (String, String, Vec<String>, String, String) {
        (
            id.to_string(),
            category.to_string(),
            vec![],
            String::new(),
            content.to_string(),
        )
    }

    #[tokio::test]
    async fn test_upsert_and_count() {
        let c = collection().await;
        c.upsert_many(
            "",
            &[
                chunk("a", "genre", "shonen tournament arcs escalate rivals"),
                chunk("b", "genre", "mystery investigations reward careful clue tracking"),
            ],
        )
        .await
        .expect("upsert");
        assert_eq!(c.count(None).await.expect("count"), 2);

        // Upsert same id replaces, not duplicates
        c.upsert_many("", &[chunk("a", "genre", "updated content")])
            .await
            .expect("upsert");
        assert_eq!(c.count(None).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity() {
        let c = collection().await;
        c.upsert_many(
            "",
            &[
                chunk("combat", "scale", "tactical combat narration with weighty blows"),
                chunk("cooking", "scale", "gentle slice of life cooking scenes"),
            ],
        )
        .await
        .expect("upsert");

        let hits = c
            .search(None, "how to narrate tactical combat", 2, None)
            .await
            .expect("search");
        assert_eq!(hits[0].id, "combat");
    }

    #[tokio::test]
    async fn test_category_and_partition_filters() {
        let c = collection().await;
        c.upsert_many("profile_a", &[chunk("x", "characters", "Mia the rival swordswoman")])
            .await
            .expect("upsert");
        c.upsert_many("profile_b", &[chunk("y", "locations", "The ramen alley at dusk")])
            .await
            .expect("upsert");

        let hits = c
            .search(Some("profile_a"), "rival", 5, None)
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "x");

        let none = c
            .search(Some("profile_a"), "rival", 5, Some("locations"))
            .await
            .expect("search");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let c = collection().await;
        c.upsert_many("", &[chunk("ceremony_t8_t7", "ceremony", "The air changes around you.")])
            .await
            .expect("upsert");
        let content = c.get_by_id("", "ceremony_t8_t7").await.expect("lookup");
        assert_eq!(content.as_deref(), Some("The air changes around you."));
        assert!(c.get_by_id("", "missing").await.expect("lookup").is_none());
    }
}
