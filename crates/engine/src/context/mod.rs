pub mod corpus;
pub mod lore;
pub mod memory;
pub mod rules;
pub mod selector;

pub use lore::ProfileLibrary;
pub use memory::{CompressionReport, MemoryHit, MemoryStore, SearchOptions};
pub use rules::RuleLibrary;
pub use selector::{ContextSelector, MemoryCandidate, RetrievedContext};
