//! Retrieval corpus chunk types: static narrative-guidance rules and
//! per-profile lore snippets.

use serde::{Deserialize, Serialize};

use crate::ids::ProfileId;

/// Category of a narrative-guidance chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Scale,
    Archetype,
    Ceremony,
    Dna,
    Genre,
    Compatibility,
    OpTension,
    OpExpression,
    OpFocus,
    PowerTier,
    Tension,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Scale => "scale",
            RuleCategory::Archetype => "archetype",
            RuleCategory::Ceremony => "ceremony",
            RuleCategory::Dna => "dna",
            RuleCategory::Genre => "genre",
            RuleCategory::Compatibility => "compatibility",
            RuleCategory::OpTension => "op_tension",
            RuleCategory::OpExpression => "op_expression",
            RuleCategory::OpFocus => "op_focus",
            RuleCategory::PowerTier => "power_tier",
            RuleCategory::Tension => "tension",
        }
    }
}

/// A single retrievable guidance chunk. Loaded from versioned config at
/// startup, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleChunk {
    pub id: String,
    pub category: RuleCategory,
    pub tags: Vec<String>,
    pub content: String,
}

/// Wiki page families for profile lore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Characters,
    Locations,
    Techniques,
    Factions,
    Events,
    Other,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Characters => "characters",
            PageType::Locations => "locations",
            PageType::Techniques => "techniques",
            PageType::Factions => "factions",
            PageType::Events => "events",
            PageType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> PageType {
        match value {
            "characters" => PageType::Characters,
            "locations" => PageType::Locations,
            "techniques" => PageType::Techniques,
            "factions" => PageType::Factions,
            "events" => PageType::Events,
            _ => PageType::Other,
        }
    }
}

/// A per-profile wiki snippet, installed in bulk when a profile is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoreChunk {
    pub profile_id: ProfileId,
    pub page_type: PageType,
    pub title: String,
    pub content: String,
}
