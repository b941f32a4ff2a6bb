//! The foreshadowing ledger: planted seeds, payoff windows, and the tension
//! pressure overdue seeds exert until the story pays them off.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use showrunner_domain::{ForeshadowSeed, SeedId, SeedStatus, SeedType};

use crate::infrastructure::persistence::StateStore;
use crate::infrastructure::ports::RepoError;

pub struct ForeshadowingLedger {
    store: Arc<StateStore>,
    seeds: RwLock<HashMap<SeedId, ForeshadowSeed>>,
}

impl ForeshadowingLedger {
    /// Load open seeds from the store.
    pub async fn load(store: Arc<StateStore>) -> Result<Self, RepoError> {
        let open = store.open_seeds().await?;
        let seeds = open.into_iter().map(|s| (s.id, s)).collect();
        Ok(Self {
            store,
            seeds: RwLock::new(seeds),
        })
    }

    pub async fn plant(
        &self,
        description: &str,
        planted_turn: i64,
        expected_payoff: i64,
        seed_type: SeedType,
    ) -> Result<SeedId, RepoError> {
        let seed = ForeshadowSeed::plant(description, planted_turn, expected_payoff, seed_type);
        let id = seed.id;
        self.store.save_seed(&seed).await?;
        self.seeds.write().await.insert(id, seed);
        tracing::info!(seed = %id, expected_payoff, "foreshadowing seed planted");
        Ok(id)
    }

    /// Seeds whose payoff window has opened. Planted seeds transition to
    /// callback status (persisted); already-callback seeds are included.
    pub async fn get_callback_opportunities(
        &self,
        current_turn: i64,
    ) -> Result<Vec<ForeshadowSeed>, RepoError> {
        let mut seeds = self.seeds.write().await;
        let mut due = Vec::new();
        for seed in seeds.values_mut() {
            if seed.status == SeedStatus::Planted && seed.is_due(current_turn) {
                seed.status = SeedStatus::Callback;
                self.store.save_seed(seed).await?;
            }
            if matches!(seed.status, SeedStatus::Callback | SeedStatus::Overdue) {
                due.push(seed.clone());
            }
        }
        due.sort_by_key(|s| s.expected_payoff);
        Ok(due)
    }

    /// Seeds past payoff plus the slack window. Callback seeds transition to
    /// overdue (persisted); each one bumps world tension per turn elsewhere.
    pub async fn get_overdue_seeds(
        &self,
        current_turn: i64,
    ) -> Result<Vec<ForeshadowSeed>, RepoError> {
        let mut seeds = self.seeds.write().await;
        let mut overdue = Vec::new();
        for seed in seeds.values_mut() {
            if seed.status == SeedStatus::Callback && seed.is_past_slack(current_turn) {
                seed.status = SeedStatus::Overdue;
                self.store.save_seed(seed).await?;
                tracing::warn!(seed = %seed.id, "foreshadowing seed is overdue");
            }
            if seed.status == SeedStatus::Overdue {
                overdue.push(seed.clone());
            }
        }
        Ok(overdue)
    }

    /// Keyword-match open seeds against a narrative.
    pub async fn detect_seed_in_narrative(&self, narrative: &str) -> Vec<SeedId> {
        let seeds = self.seeds.read().await;
        seeds
            .values()
            .filter(|s| s.status.is_open() && s.mentioned_in(narrative))
            .map(|s| s.id)
            .collect()
    }

    pub async fn status_of(&self, id: SeedId) -> Option<SeedStatus> {
        self.seeds.read().await.get(&id).map(|s| s.status)
    }

    pub async fn resolve_seed(
        &self,
        id: SeedId,
        current_turn: i64,
        resolution_narrative: &str,
    ) -> Result<(), RepoError> {
        let mut seeds = self.seeds.write().await;
        let Some(seed) = seeds.get_mut(&id) else {
            return Err(RepoError::NotFound);
        };
        seed.resolve(current_turn, resolution_narrative);
        self.store.save_seed(seed).await?;
        tracing::info!(seed = %id, turn = current_turn, "foreshadowing seed resolved");
        // Resolved seeds leave the working set
        seeds.remove(&id);
        Ok(())
    }

    /// One-line-per-seed summary for the Director's review context.
    pub async fn open_summary(&self) -> String {
        let seeds = self.seeds.read().await;
        if seeds.is_empty() {
            return "(no open seeds)".to_string();
        }
        let mut lines: Vec<String> = seeds
            .values()
            .map(|s| {
                format!(
                    "- [{}] {} (planted turn {}, payoff {})",
                    s.status.as_str(),
                    s.description,
                    s.planted_turn,
                    s.expected_payoff
                )
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use showrunner_domain::CampaignId;

    async fn ledger() -> ForeshadowingLedger {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let store = Arc::new(StateStore::new(
            pool,
            CampaignId::new(),
            Arc::new(SystemClock::new()),
        ));
        ForeshadowingLedger::load(store).await.expect("ledger")
    }

    #[tokio::test]
    async fn test_callback_transition_at_payoff() {
        let ledger = ledger().await;
        let id = ledger
            .plant("the cracked mask in the shrine", 2, 8, SeedType::Mystery)
            .await
            .expect("plant");

        // Before payoff: nothing due
        assert!(ledger.get_callback_opportunities(7).await.expect("due").is_empty());
        assert_eq!(ledger.status_of(id).await, Some(SeedStatus::Planted));

        // At payoff turn: transitions to callback and is returned
        let due = ledger.get_callback_opportunities(9).await.expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);
        assert_eq!(ledger.status_of(id).await, Some(SeedStatus::Callback));
    }

    #[tokio::test]
    async fn test_overdue_after_slack_window() {
        let ledger = ledger().await;
        let id = ledger
            .plant("the debt to the river clan", 1, 4, SeedType::Promise)
            .await
            .expect("plant");
        ledger.get_callback_opportunities(4).await.expect("due");

        // Inside the slack window: still just a callback
        assert!(ledger.get_overdue_seeds(9).await.expect("overdue").is_empty());
        // Past payoff + slack (4 + 5 = 9 < 10): overdue
        let overdue = ledger.get_overdue_seeds(10).await.expect("overdue");
        assert_eq!(overdue.len(), 1);
        assert_eq!(ledger.status_of(id).await, Some(SeedStatus::Overdue));
    }

    #[tokio::test]
    async fn test_detect_and_resolve() {
        let ledger = ledger().await;
        let id = ledger
            .plant("the cracked mask in the shrine", 2, 8, SeedType::Mystery)
            .await
            .expect("plant");
        ledger.get_callback_opportunities(9).await.expect("due");

        let mentioned = ledger
            .detect_seed_in_narrative("You lift the cracked mask from the shrine altar.")
            .await;
        assert_eq!(mentioned, vec![id]);

        ledger
            .resolve_seed(id, 9, "Paid off in turn 9 narrative")
            .await
            .expect("resolve");
        // Resolved seeds leave the ledger and future callbacks
        assert!(ledger.get_callback_opportunities(10).await.expect("due").is_empty());
        assert!(ledger.detect_seed_in_narrative("the cracked mask").await.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_reloads_open_seeds() {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let store = Arc::new(StateStore::new(
            pool,
            CampaignId::new(),
            Arc::new(SystemClock::new()),
        ));
        {
            let ledger = ForeshadowingLedger::load(store.clone()).await.expect("ledger");
            ledger
                .plant("a rival's unpaid debt", 1, 6, SeedType::Promise)
                .await
                .expect("plant");
        }
        let reloaded = ForeshadowingLedger::load(store).await.expect("ledger");
        assert!(reloaded.open_summary().await.contains("unpaid debt"));
    }
}
