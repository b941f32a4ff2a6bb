//! Sliding-window compaction: messages that fall off the working-memory
//! window become one narrative beat.

use std::sync::Arc;

use crate::infrastructure::ports::LlmRequest;
use crate::infrastructure::router::{AgentKey, ProviderManager};

/// Token budget for the compaction buffer before FIFO eviction.
pub const COMPACTION_TOKEN_BUDGET: usize = 10_000;

/// Rough token estimate: word count x 1.3. An approximation, not a hard
/// guarantee.
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f64 * 1.3) as usize
}

pub struct CompactorAgent {
    manager: Arc<ProviderManager>,
}

impl CompactorAgent {
    pub fn new(manager: Arc<ProviderManager>) -> Self {
        Self { manager }
    }

    /// Summarize dropped messages into a <=200-word narrative beat. Failures
    /// degrade to a plain-text joining so nothing is silently lost.
    pub async fn compact(&self, dropped_messages: &[String], prior_context: &str) -> String {
        if dropped_messages.is_empty() {
            return String::new();
        }
        let context = format!(
            "PRIOR COMPACTED CONTEXT:\n{}\n\nMESSAGES FALLING OFF THE WINDOW:\n{}",
            if prior_context.is_empty() {
                "(none)"
            } else {
                prior_context
            },
            dropped_messages.join("\n"),
        );
        let request = LlmRequest::new(
            crate::prompts::get(AgentKey::Compactor).content,
            context,
        );
        match self.manager.complete(AgentKey::Compactor, request).await {
            Ok(response) => response.content.trim().to_string(),
            Err(e) => {
                tracing::error!(error = %e, "compaction failed, joining raw messages");
                crate::util::clip(&dropped_messages.join(" / "), 800)
            }
        }
    }
}

/// FIFO compaction buffer under a token budget.
#[derive(Debug, Default)]
pub struct CompactionBuffer {
    beats: Vec<String>,
}

impl CompactionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, beat: String) {
        if !beat.is_empty() {
            self.beats.push(beat);
        }
        while self.total_tokens() > COMPACTION_TOKEN_BUDGET && self.beats.len() > 1 {
            self.beats.remove(0);
        }
    }

    pub fn total_tokens(&self) -> usize {
        self.beats.iter().map(|b| estimate_tokens(b)).sum()
    }

    /// The flattened compaction text handed to the writer each turn.
    pub fn flattened(&self) -> String {
        self.beats.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one two three four"), 5); // 4 * 1.3 = 5.2 -> 5
    }

    #[test]
    fn test_buffer_evicts_fifo_past_budget() {
        let mut buffer = CompactionBuffer::new();
        let big_beat = "word ".repeat(4000); // ~5200 tokens
        buffer.push(format!("first {big_beat}"));
        buffer.push(format!("second {big_beat}"));
        buffer.push(format!("third {big_beat}"));

        assert!(buffer.total_tokens() <= COMPACTION_TOKEN_BUDGET + 6000);
        let flattened = buffer.flattened();
        assert!(!flattened.contains("first"));
        assert!(flattened.contains("third"));
    }
}
