//! Player-issued hard constraints registered with /override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::OverrideCategory;
use crate::ids::OverrideId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRule {
    pub id: OverrideId,
    pub category: OverrideCategory,
    pub description: String,
    pub target: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl OverrideRule {
    pub fn new(content: impl Into<String>, target: Option<String>, now: DateTime<Utc>) -> Self {
        let description: String = content.into();
        let category = OverrideCategory::detect(&description);
        let target = target.or_else(|| extract_target(&description));
        Self {
            id: OverrideId::new(),
            category,
            description,
            target,
            active: true,
            created_at: now,
        }
    }

    /// Single line injected verbatim into the Writer's prompt.
    pub fn context_line(&self) -> String {
        match &self.target {
            Some(target) => format!(
                "[{}] {} (target: {})",
                self.category.as_str(),
                self.description,
                target
            ),
            None => format!("[{}] {}", self.category.as_str(), self.description),
        }
    }
}

/// Best-effort target extraction: the first capitalized word that isn't a
/// sentence-start stopword.
fn extract_target(content: &str) -> Option<String> {
    content
        .split_whitespace()
        .filter(|w| {
            w.chars().next().is_some_and(|c| c.is_uppercase())
                && !matches!(*w, "I" | "The" | "My" | "No" | "A" | "An")
        })
        .map(|w| w.trim_matches(|c: char| ".,!?".contains(c)).to_string())
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npc_protection_with_target() {
        let rule = OverrideRule::new("Mia cannot die", None, Utc::now());
        assert_eq!(rule.category, OverrideCategory::NpcProtection);
        assert_eq!(rule.target.as_deref(), Some("Mia"));
        assert_eq!(rule.context_line(), "[NPC_PROTECTION] Mia cannot die (target: Mia)");
    }

    #[test]
    fn test_stopwords_are_not_targets() {
        let rule = OverrideRule::new("The story must avoid the capital", None, Utc::now());
        assert_eq!(rule.target, None);
    }
}
