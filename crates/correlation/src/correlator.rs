use crate::{CorrelationError, CorrelationResult};
use sm3::{Digest, Sm3};
use std::fmt;

/// Length of a rendered correlation key (SM3 produces 32 bytes).
pub const CORRELATION_HEX_LEN: usize = 64;

/// Opaque one-way correlation key.
///
/// Either 64 lowercase hex characters, or the empty sentinel. The sentinel is representable so
/// that "no subject" can flow through the same types as a real key, but every consumer that
/// links records must refuse it.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// The empty sentinel.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Returns true for the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parses an externally supplied key.
    ///
    /// The empty sentinel is not accepted here: a caller handing over a key is claiming it
    /// is usable.
    pub fn parse(input: &str) -> CorrelationResult<Self> {
        if input.is_empty() {
            return Err(CorrelationError::EmptyInput);
        }
        let well_formed = input.len() == CORRELATION_HEX_LEN
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(CorrelationError::InvalidFormat(format!(
                "expected {CORRELATION_HEX_LEN} lowercase hex characters, got '{input}'"
            )));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Debug shortens the key: logs only need enough of it to tell subjects apart.
impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("CorrelationId(<empty>)");
        }
        write!(f, "CorrelationId({}…)", &self.0[..12])
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for CorrelationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for CorrelationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Ok(Self::empty());
        }
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Converts sensitive values into correlation keys.
///
/// This is a zero-sized type used for namespacing; all methods are associated functions.
pub struct IdentityCorrelator;

impl IdentityCorrelator {
    /// Hashes `value` with SM3.
    ///
    /// The exact bytes are hashed (no trimming or case folding) so distinct inputs stay
    /// distinct. Empty or whitespace-only input yields [`CorrelationId::empty`].
    pub fn hash(value: &str) -> CorrelationId {
        if value.trim().is_empty() {
            return CorrelationId::empty();
        }
        let mut hasher = Sm3::new();
        hasher.update(value.as_bytes());
        CorrelationId(hex::encode(hasher.finalize()))
    }

    /// Hashes an optional value; `None` yields the empty sentinel.
    pub fn hash_opt(value: Option<&str>) -> CorrelationId {
        value.map(Self::hash).unwrap_or_else(CorrelationId::empty)
    }

    /// Like [`IdentityCorrelator::hash`], but refuses to produce the empty sentinel.
    pub fn try_hash(value: &str) -> CorrelationResult<CorrelationId> {
        let id = Self::hash(value);
        if id.is_empty() {
            return Err(CorrelationError::EmptyInput);
        }
        Ok(id)
    }
}
