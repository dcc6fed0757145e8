//! Identifier utilities for collaboration records.
//!
//! Every record the consultation workflow creates (requests, shared knowledge bundles and
//! diagnosis opinions) carries an identifier minted here. Two forms are used:
//!
//! - [`UuidService`]: a *canonical* UUID, **32 lowercase hexadecimal characters** (no hyphens).
//!   Used for share and opinion ids.
//! - [`TimestampId`]: a time-prefixed identifier, `YYYYMMDDTHHMMSS.mmmZ-<canonical_uuid>`.
//!   Used for request ids so that lexical order follows creation order.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Canonical form is *required* for externally supplied identifiers (for example, path
//! parameters on the REST API). Non-canonical values (uppercase, hyphenated, wrong length,
//! non-hex) are rejected rather than normalised.

mod service;

// Re-export public types
pub use service::{TimestampId, TimestampIdGenerator, Uuid, UuidService};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
