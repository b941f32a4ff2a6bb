//! Per-profile lore: wiki snippets installed alongside a narrative profile,
//! partitioned by profile id in a shared vector collection.

use std::sync::Arc;

use sqlx::SqlitePool;

use showrunner_domain::{LoreChunk, PageType, ProfileId};

use crate::infrastructure::ports::EmbeddingPort;
use crate::infrastructure::vector::{VectorCollection, VectorError};

const COLLECTION: &str = "profile_lore";

pub struct ProfileLibrary {
    chunks: VectorCollection,
}

impl ProfileLibrary {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingPort>) -> Self {
        Self {
            chunks: VectorCollection::new(pool, COLLECTION, embedder),
        }
    }

    /// Bulk-index a profile's lore. Called once on profile install; upserts
    /// make re-installs safe.
    pub async fn install_profile(
        &self,
        profile_id: &ProfileId,
        lore: &[LoreChunk],
    ) -> Result<usize, VectorError> {
        let items: Vec<(String, String, Vec<String>, String, String)> = lore
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                (
                    format!("{}_{}", chunk.page_type.as_str(), i),
                    chunk.page_type.as_str().to_string(),
                    vec![],
                    chunk.title.clone(),
                    chunk.content.clone(),
                )
            })
            .collect();
        self.chunks.upsert_many(profile_id.as_str(), &items).await?;
        tracing::info!(profile = %profile_id, chunks = items.len(), "profile lore installed");
        Ok(items.len())
    }

    pub async fn count(&self, profile_id: &ProfileId) -> Result<i64, VectorError> {
        self.chunks.count(Some(profile_id.as_str())).await
    }

    /// Partitioned semantic search with an optional page-type filter.
    pub async fn search_lore(
        &self,
        profile_id: &ProfileId,
        query: &str,
        limit: usize,
        page_type: Option<PageType>,
    ) -> Result<Vec<String>, VectorError> {
        let hits = self
            .chunks
            .search(
                Some(profile_id.as_str()),
                query,
                limit,
                page_type.map(|p| p.as_str()),
            )
            .await?;
        Ok(hits.into_iter().map(|h| h.content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;

    fn lore(profile: &ProfileId, page_type: PageType, title: &str, content: &str) -> LoreChunk {
        LoreChunk {
            profile_id: profile.clone(),
            page_type,
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    async fn library() -> ProfileLibrary {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        ProfileLibrary::new(pool, Arc::new(HashEmbedder::default()))
    }

    #[tokio::test]
    async fn test_install_and_partitioned_search() {
        let lib = library().await;
        let ember = ProfileId::from("ember_blade");
        let other = ProfileId::from("other_show");

        lib.install_profile(
            &ember,
            &[
                lore(&ember, PageType::Characters, "Mia", "Mia is a rival swordswoman of the Ember school."),
                lore(&ember, PageType::Techniques, "Flame Step", "Flame Step is a burst movement technique leaving scorch marks."),
            ],
        )
        .await
        .expect("install");
        lib.install_profile(
            &other,
            &[lore(&other, PageType::Characters, "Mia", "A different Mia entirely, a starship captain.")],
        )
        .await
        .expect("install");

        assert_eq!(lib.count(&ember).await.expect("count"), 2);

        let results = lib
            .search_lore(&ember, "rival swordswoman Mia", 2, None)
            .await
            .expect("search");
        assert!(results[0].contains("Ember school"));
        assert!(results.iter().all(|r| !r.contains("starship")));
    }

    #[tokio::test]
    async fn test_page_type_filter() {
        let lib = library().await;
        let ember = ProfileId::from("ember_blade");
        lib.install_profile(
            &ember,
            &[
                lore(&ember, PageType::Characters, "Mia", "Mia the rival."),
                lore(&ember, PageType::Techniques, "Flame Step", "Flame Step movement technique."),
            ],
        )
        .await
        .expect("install");

        let techniques = lib
            .search_lore(&ember, "movement technique", 5, Some(PageType::Techniques))
            .await
            .expect("search");
        assert_eq!(techniques.len(), 1);
        assert!(techniques[0].contains("Flame Step"));
    }

    #[tokio::test]
    async fn test_reinstall_is_idempotent() {
        let lib = library().await;
        let ember = ProfileId::from("ember_blade");
        let chunks = vec![lore(&ember, PageType::Locations, "Ramen Alley", "A narrow street of lantern-lit stalls.")];
        lib.install_profile(&ember, &chunks).await.expect("install");
        lib.install_profile(&ember, &chunks).await.expect("reinstall");
        assert_eq!(lib.count(&ember).await.expect("count"), 1);
    }
}
