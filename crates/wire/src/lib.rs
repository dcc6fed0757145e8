//! Boundary encoding for the collaborative-diagnosis workflow.
//!
//! The remote knowledge service stores fragments as encoded text payloads, and share
//! submissions carry an encoded list of triples. This crate owns both encodings:
//! - domain-level types shared with the core ([`RelationType`], [`KnowledgeTriple`], [`RawRecord`])
//! - private wire structs that mirror the textual payloads exactly
//! - translation helpers between the two
//!
//! Two decoding regimes apply:
//! - **Stored payloads** are decoded leniently. Unknown fields are ignored and a payload that
//!   cannot be decoded yields [`RecordDecode::Skipped`] instead of an error.
//! - **Submissions** (encoded triple lists, seed files) are decoded strictly and report the
//!   failing field path via `serde_path_to_error`.

pub mod knowledge;
pub mod relation;

// Re-export facades
pub use knowledge::{KnowledgePayload, KnowledgeSeed, TripleList};

// Re-export public domain-level types
pub use knowledge::{
    DecodedFragment, KnowledgeTriple, RawRecord, RecordDecode, SeedEntry, SkipReason,
    TripleSubmission,
};
pub use relation::RelationType;

/// Errors returned by the boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown relation type: {0}")]
    UnknownRelation(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Type alias for Results that can fail with a [`WireError`].
pub type WireResult<T> = Result<T, WireError>;
