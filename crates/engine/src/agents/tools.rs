//! Bounded research tools for the writer and director: memory search,
//! profile lore search, and session transcript search.

use std::sync::Arc;

use showrunner_domain::ProfileId;

use crate::context::lore::ProfileLibrary;
use crate::context::memory::{MemoryStore, SearchOptions};
use crate::infrastructure::ports::{
    ChatMessage, LlmError, LlmRequest, LlmResponse, ToolDefinition,
};
use crate::infrastructure::router::{AgentKey, ProviderManager};

/// Max tool calls an agent may spend before it must produce output.
pub const MAX_TOOL_CALLS: usize = 3;

pub struct ResearchToolbox {
    memory: Arc<MemoryStore>,
    lore: Arc<ProfileLibrary>,
    profile_id: ProfileId,
    transcript: Vec<String>,
}

impl ResearchToolbox {
    pub fn new(
        memory: Arc<MemoryStore>,
        lore: Arc<ProfileLibrary>,
        profile_id: ProfileId,
        transcript: Vec<String>,
    ) -> Self {
        Self {
            memory,
            lore,
            profile_id,
            transcript,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let query_schema = serde_json::json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"],
        });
        vec![
            ToolDefinition {
                name: "memory_search".to_string(),
                description: "Search long-term campaign memories for past events, promises, and facts."
                    .to_string(),
                parameters: query_schema.clone(),
            },
            ToolDefinition {
                name: "lore_search".to_string(),
                description: "Search the series wiki for canon characters, locations, and techniques."
                    .to_string(),
                parameters: query_schema.clone(),
            },
            ToolDefinition {
                name: "transcript_search".to_string(),
                description: "Search the current session's messages for recent exact wording."
                    .to_string(),
                parameters: query_schema,
            },
        ]
    }

    pub async fn execute(&self, name: &str, arguments: &serde_json::Value) -> String {
        let query = arguments
            .get("query")
            .and_then(|q| q.as_str())
            .unwrap_or_default();
        match name {
            "memory_search" => {
                let hits = self
                    .memory
                    .search(
                        query,
                        SearchOptions {
                            limit: 3,
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap_or_default();
                if hits.is_empty() {
                    "No matching memories.".to_string()
                } else {
                    hits.iter()
                        .map(|h| format!("- {}", h.record.content))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "lore_search" => {
                let chunks = self
                    .lore
                    .search_lore(&self.profile_id, query, 3, None)
                    .await
                    .unwrap_or_default();
                if chunks.is_empty() {
                    "No matching lore.".to_string()
                } else {
                    chunks
                        .iter()
                        .map(|c| format!("- {c}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            "transcript_search" => {
                let lower = query.to_lowercase();
                let matches: Vec<&String> = self
                    .transcript
                    .iter()
                    .filter(|m| m.to_lowercase().contains(&lower))
                    .take(3)
                    .collect();
                if matches.is_empty() {
                    "No matching messages.".to_string()
                } else {
                    matches
                        .iter()
                        .map(|m| format!("- {m}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            other => format!("Unknown tool: {other}"),
        }
    }
}

/// Run a completion with opportunistic tool use, bounded at
/// [`MAX_TOOL_CALLS`]. Tool results are folded back into the conversation as
/// user messages; after the cap, the request goes out without tools so the
/// model must answer.
pub async fn run_with_tools(
    manager: &ProviderManager,
    key: AgentKey,
    mut request: LlmRequest,
    toolbox: &ResearchToolbox,
) -> Result<LlmResponse, LlmError> {
    let definitions = toolbox.definitions();
    let mut calls_used = 0usize;

    loop {
        if calls_used >= MAX_TOOL_CALLS {
            return manager.complete(key, request).await;
        }

        let response = manager
            .complete_with_tools(key, request.clone(), definitions.clone())
            .await?;
        if response.tool_calls.is_empty() {
            return Ok(response);
        }

        for call in &response.tool_calls {
            if calls_used >= MAX_TOOL_CALLS {
                break;
            }
            calls_used += 1;
            let result = toolbox.execute(&call.name, &call.arguments).await;
            tracing::debug!(agent = key.as_str(), tool = %call.name, "research tool call");
            request
                .messages
                .push(ChatMessage::assistant(format!("[tool call] {}", call.name)));
            request.messages.push(ChatMessage::user(format!(
                "[{} result]\n{}",
                call.name, result
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::persistence::schema::open_pool;
    use crate::infrastructure::providers::HashEmbedder;
    use showrunner_domain::MemoryKind;

    async fn toolbox() -> ResearchToolbox {
        let pool = open_pool("sqlite::memory:").await.expect("pool");
        let manager = Arc::new(ProviderManager::new());
        let memory = Arc::new(MemoryStore::new(
            pool.clone(),
            "test",
            Arc::new(HashEmbedder::default()),
            manager,
            Arc::new(SystemClock::new()),
        ));
        memory
            .add_memory(MemoryKind::Event, "Mia swore to repay the debt.", 1, None, vec![], None)
            .await
            .expect("insert");
        let lore = Arc::new(ProfileLibrary::new(pool, Arc::new(HashEmbedder::default())));
        ResearchToolbox::new(
            memory,
            lore,
            ProfileId::from("test"),
            vec!["Player: I trust Mia.".to_string()],
        )
    }

    #[tokio::test]
    async fn test_memory_tool_returns_content() {
        let toolbox = toolbox().await;
        let result = toolbox
            .execute("memory_search", &serde_json::json!({"query": "Mia debt"}))
            .await;
        assert!(result.contains("repay the debt"));
    }

    #[tokio::test]
    async fn test_transcript_tool_filters() {
        let toolbox = toolbox().await;
        let hit = toolbox
            .execute("transcript_search", &serde_json::json!({"query": "trust"}))
            .await;
        assert!(hit.contains("I trust Mia"));
        let miss = toolbox
            .execute("transcript_search", &serde_json::json!({"query": "dragon"}))
            .await;
        assert_eq!(miss, "No matching messages.");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported() {
        let toolbox = toolbox().await;
        let result = toolbox.execute("teleport", &serde_json::json!({})).await;
        assert!(result.contains("Unknown tool"));
    }
}
