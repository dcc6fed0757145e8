//! Identity correlation.
//!
//! Sensitive identifying values (a patient's national ID number, or a free-text disease
//! concept) never leave the caller in raw form. They are replaced by a [`CorrelationId`]: the
//! SM3 digest of the value, rendered as 64 lowercase hexadecimal characters.
//!
//! Properties:
//! - Deterministic across processes and sessions (no salt, no randomness, no network)
//! - One-way: the only supported operation on two ids is equality
//! - Empty or whitespace-only input produces the *empty sentinel*, which is never a valid
//!   correlation key. Callers must check [`CorrelationId::is_empty`] (or use
//!   [`IdentityCorrelator::try_hash`]) before using a key.
//!
//! ```
//! use consult_correlation::IdentityCorrelator;
//!
//! let k1 = IdentityCorrelator::hash("110101199003074477");
//! let k2 = IdentityCorrelator::hash("110101199003074477");
//! assert_eq!(k1, k2);
//! assert!(IdentityCorrelator::hash("").is_empty());
//! ```

mod correlator;

pub use correlator::{CorrelationId, IdentityCorrelator, CORRELATION_HEX_LEN};

/// Errors raised when producing or parsing correlation keys.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// The input was empty, so only the empty sentinel could be produced.
    #[error("cannot correlate an empty value")]
    EmptyInput,

    /// An externally supplied key was not 64 lowercase hex characters.
    #[error("invalid correlation id: {0}")]
    InvalidFormat(String),
}

/// Result type for correlation operations.
pub type CorrelationResult<T> = Result<T, CorrelationError>;
