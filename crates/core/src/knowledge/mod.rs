//! Knowledge aggregation and access evaluation.

pub mod index;
pub mod permission;

pub use index::{KnowledgeIndex, RelationTypeSummary};
pub use permission::{Disclosure, PermissionEvaluator, RelationView};
