//! META and OVERRIDE command handling. No model involved: /meta lands as a
//! high-heat calibration memory, /override becomes a hard constraint injected
//! verbatim into every Writer prompt.

use std::sync::Arc;

use showrunner_domain::{MemoryKind, OverrideId, OverrideRule};

use crate::context::memory::MemoryStore;
use crate::infrastructure::persistence::StateStore;
use crate::infrastructure::ports::{ClockPort, RepoError};

pub struct OverrideHandler {
    store: Arc<StateStore>,
    memory: Arc<MemoryStore>,
    clock: Arc<dyn ClockPort>,
}

impl OverrideHandler {
    pub fn new(store: Arc<StateStore>, memory: Arc<MemoryStore>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            store,
            memory,
            clock,
        }
    }

    /// /meta feedback: stored as a calibration memory so it surfaces through
    /// normal retrieval when relevant.
    pub async fn process_meta(&self, content: &str) -> Result<String, RepoError> {
        self.memory
            .add_memory(
                MemoryKind::Calibration,
                &format!("Player feedback: {content}"),
                0, // session-level, not tied to a turn
                None,
                vec![
                    "player_feedback".to_string(),
                    "meta_command".to_string(),
                    "calibration".to_string(),
                ],
                Some(serde_json::json!({"type": "meta", "category": "STYLE_CALIBRATION"})),
            )
            .await?;
        Ok(format!(
            "Feedback noted: \"{content}\"\nThis will influence future narration."
        ))
    }

    /// /override: a categorized hard constraint with its canned warning.
    pub async fn process_override(
        &self,
        content: &str,
        target: Option<String>,
    ) -> Result<String, RepoError> {
        let rule = OverrideRule::new(content, target, self.clock.now());
        self.store.save_override(&rule).await?;
        tracing::info!(
            id = %rule.id,
            category = rule.category.as_str(),
            "override registered"
        );
        Ok(format!(
            "Override active: {content}\n{}\nUse '/override remove {}' to remove.",
            rule.category.warning(),
            rule.id,
        ))
    }

    pub async fn list_overrides(&self) -> Result<String, RepoError> {
        let rules = self.store.list_overrides(false).await?;
        if rules.is_empty() {
            return Ok("No overrides active.".to_string());
        }
        let mut lines = vec!["**Active Overrides:**".to_string()];
        for rule in rules {
            let status = if rule.active { "✓" } else { "✗" };
            lines.push(format!(
                "  {status} [{}] {}: {}",
                rule.id,
                rule.category.as_str(),
                rule.description
            ));
        }
        Ok(lines.join("\n"))
    }

    pub async fn remove_override(&self, id_text: &str) -> Result<String, RepoError> {
        let Ok(uuid) = uuid::Uuid::parse_str(id_text.trim()) else {
            return Ok(format!("Invalid override ID: {id_text}"));
        };
        let id = OverrideId::from_uuid(uuid);
        let rules = self.store.list_overrides(false).await?;
        match rules.into_iter().find(|r| r.id == id) {
            Some(mut rule) => {
                rule.active = false;
                self.store.save_override(&rule).await?;
                Ok(format!("Override {id} removed."))
            }
            None => Ok(format!("Override {id_text} not found.")),
        }
    }

    /// The hard-constraint block injected into every Writer prompt. Empty
    /// string when nothing is active.
    pub async fn format_for_context(&self) -> Result<String, RepoError> {
        let rules = self.store.list_overrides(true).await?;
        Ok(rules
            .iter()
            .map(|r| r.context_line())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;
    use crate::infrastructure::router::ProviderManager;
    use showrunner_domain::CampaignId;

    async fn handler() -> OverrideHandler {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let clock: Arc<dyn ClockPort> = Arc::new(SystemClock::new());
        let store = Arc::new(StateStore::new(pool.clone(), CampaignId::new(), clock.clone()));
        let memory = Arc::new(MemoryStore::new(
            pool,
            "test",
            Arc::new(HashEmbedder::default()),
            Arc::new(ProviderManager::new()),
            clock.clone(),
        ));
        OverrideHandler::new(store, memory, clock)
    }

    #[tokio::test]
    async fn test_override_lifecycle() {
        let handler = handler().await;
        let message = handler
            .process_override("Mia cannot die", None)
            .await
            .expect("register");
        assert!(message.contains("Override active"));
        assert!(message.contains("cannot be meaningfully threatened"));

        let context = handler.format_for_context().await.expect("context");
        assert!(context.contains("[NPC_PROTECTION] Mia cannot die"));

        let listing = handler.list_overrides().await.expect("list");
        assert!(listing.contains("NPC_PROTECTION"));

        // Remove it by the id embedded in the listing
        let rules = handler.store.list_overrides(true).await.expect("rules");
        let removed = handler
            .remove_override(&rules[0].id.to_string())
            .await
            .expect("remove");
        assert!(removed.contains("removed"));
        assert!(handler.format_for_context().await.expect("context").is_empty());
    }

    #[tokio::test]
    async fn test_meta_lands_as_calibration_memory() {
        let handler = handler().await;
        handler
            .process_meta("less gore please")
            .await
            .expect("meta");
        let hits = handler
            .memory
            .search("gore feedback", Default::default())
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.kind, MemoryKind::Calibration);
        assert!(hits[0].record.has_flag("meta_command"));
    }

    #[tokio::test]
    async fn test_remove_invalid_id_is_graceful() {
        let handler = handler().await;
        let message = handler.remove_override("42").await.expect("attempt");
        assert!(message.contains("Invalid override ID"));
    }
}
