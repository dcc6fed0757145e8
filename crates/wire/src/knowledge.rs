//! Knowledge payload wire models and translation helpers.
//!
//! Responsibilities:
//! - Define the domain-level knowledge types used by the core
//! - Decode stored record payloads with a decode-or-skip contract
//! - Parse the encoded triple lists carried by share submissions
//! - Parse seed files of raw records keyed by subject text
//!
//! Notes:
//! - Stored payloads come from several generations of the knowledge service. The wire struct
//!   accepts both `organization` and `organisation`, and ignores any other field.
//! - Resolution of the owning organisation (placeholders, fallbacks) is a core concern; this
//!   module only reports what the payload says.

use crate::{RelationType, WireError, WireResult};
use chrono::{DateTime, Utc};
use consult_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Public domain-level types
// ============================================================================

/// A record as returned by the knowledge service: an id, an encoded payload and a timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub record_id: String,
    pub payload: String,
    pub created_time: DateTime<Utc>,
}

/// A (head, relation, tail) fact fragment with its owning organisation.
///
/// Immutable once recorded: the core never mutates a triple, it only filters them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeTriple {
    pub head: NonEmptyText,
    pub relation: RelationType,
    pub tail: NonEmptyText,
    pub organisation: NonEmptyText,
    pub created_time: DateTime<Utc>,
}

/// A payload that decoded into a usable fragment.
///
/// `section` and `organisation` are reported verbatim (trimmed, blank treated as absent).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFragment {
    pub head: NonEmptyText,
    pub relation: RelationType,
    pub tail: NonEmptyText,
    pub section: Option<String>,
    pub organisation: Option<String>,
}

/// Why a stored record was skipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The payload was not a decodable object.
    Malformed(String),
    /// One of `head`, `relation` or `tail` was absent or blank.
    MissingField(&'static str),
    /// The relation is not in the closed [`RelationType`] set.
    UnknownRelation(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed(e) => write!(f, "malformed payload: {e}"),
            SkipReason::MissingField(field) => write!(f, "missing field '{field}'"),
            SkipReason::UnknownRelation(r) => write!(f, "unknown relation '{r}'"),
        }
    }
}

/// Outcome of decoding one stored payload. Never an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordDecode {
    Fragment(DecodedFragment),
    Skipped(SkipReason),
}

/// One entry of a share submission.
///
/// `organisation` is optional on the wire; the broker fills in the sharing actor's
/// organisation when it is absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TripleSubmission {
    pub head: NonEmptyText,
    pub relation: RelationType,
    pub tail: NonEmptyText,
    pub organisation: Option<NonEmptyText>,
}

/// Raw records for one subject, as found in a seed file.
///
/// `subject` is the *raw* subject text; it is hashed before it reaches any store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SeedEntry {
    pub subject: String,
    pub records: Vec<RawRecord>,
}

// ============================================================================
// Public facades
// ============================================================================

/// Stored knowledge payload operations.
pub struct KnowledgePayload;

impl KnowledgePayload {
    /// Decodes one stored payload.
    ///
    /// Never fails: anything unusable comes back as [`RecordDecode::Skipped`] with a reason.
    pub fn decode(payload: &str) -> RecordDecode {
        let wire = match serde_json::from_str::<KnowledgePayloadWire>(payload) {
            Ok(wire) => wire,
            Err(e) => return RecordDecode::Skipped(SkipReason::Malformed(e.to_string())),
        };

        let Some(head) = non_empty(wire.head) else {
            return RecordDecode::Skipped(SkipReason::MissingField("head"));
        };
        let Some(relation_text) = non_blank(wire.relation) else {
            return RecordDecode::Skipped(SkipReason::MissingField("relation"));
        };
        let Some(tail) = non_empty(wire.tail) else {
            return RecordDecode::Skipped(SkipReason::MissingField("tail"));
        };
        let Ok(relation) = RelationType::parse(&relation_text) else {
            return RecordDecode::Skipped(SkipReason::UnknownRelation(relation_text));
        };

        RecordDecode::Fragment(DecodedFragment {
            head,
            relation,
            tail,
            section: non_blank(wire.section),
            organisation: non_blank(wire.organization),
        })
    }

    /// Renders a fragment in the stored payload form.
    pub fn render(fragment: &DecodedFragment) -> WireResult<String> {
        let wire = KnowledgePayloadWire {
            head: Some(fragment.head.to_string()),
            relation: Some(fragment.relation.tag().to_string()),
            tail: Some(fragment.tail.to_string()),
            section: fragment.section.clone(),
            organization: fragment.organisation.clone(),
        };
        serde_json::to_string(&wire)
            .map_err(|e| WireError::Translation(format!("Failed to render payload: {e}")))
    }
}

/// Encoded triple list operations (share submissions).
pub struct TripleList;

impl TripleList {
    /// Parses an encoded list of `{head, relation, tail, organization?}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Translation`] naming the failing path when the text does not match
    /// the schema, [`WireError::UnknownRelation`] for a relation outside the closed set, and
    /// [`WireError::InvalidInput`] for blank fields.
    pub fn parse(text: &str) -> WireResult<Vec<TripleSubmission>> {
        let wire: Vec<TripleWire> = strict_json("Triple list", text)?;

        wire.into_iter()
            .enumerate()
            .map(|(i, t)| {
                let head = NonEmptyText::new(&t.head).map_err(|_| {
                    WireError::InvalidInput(format!("[{i}].head must not be empty"))
                })?;
                let tail = NonEmptyText::new(&t.tail).map_err(|_| {
                    WireError::InvalidInput(format!("[{i}].tail must not be empty"))
                })?;
                let relation = RelationType::parse(&t.relation)?;
                let organisation = t
                    .organization
                    .as_deref()
                    .and_then(|o| NonEmptyText::new(o).ok());
                Ok(TripleSubmission {
                    head,
                    relation,
                    tail,
                    organisation,
                })
            })
            .collect()
    }
}

/// Seed file operations.
pub struct KnowledgeSeed;

impl KnowledgeSeed {
    /// Parses a JSON array of [`SeedEntry`] values.
    pub fn parse(text: &str) -> WireResult<Vec<SeedEntry>> {
        strict_json("Knowledge seed", text)
    }

    /// Parses a JSON array of [`RawRecord`] values.
    pub fn parse_records(text: &str) -> WireResult<Vec<RawRecord>> {
        strict_json("Raw record list", text)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Stored payload. Every field is optional so that absence is reported per field.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
struct KnowledgePayloadWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    head: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    #[serde(default, alias = "organisation", skip_serializing_if = "Option::is_none")]
    organization: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct TripleWire {
    head: String,
    relation: String,
    tail: String,
    #[serde(default, alias = "organisation")]
    organization: Option<String>,
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn strict_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> WireResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        WireError::Translation(format!("{what} schema mismatch at {path}: {source}"))
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<String>) -> Option<NonEmptyText> {
    value.and_then(|v| NonEmptyText::new(v).ok())
}
