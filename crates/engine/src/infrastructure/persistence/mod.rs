pub mod schema;
pub mod store;
pub mod transaction;

pub use schema::{ensure_schema, open_pool};
pub use store::{GameContext, StateStore};
pub use transaction::{
    validate_character, DeferredCommit, IssueSeverity, StateTransaction, StateWrite,
    ValidationIssue, ValidationReport,
};
