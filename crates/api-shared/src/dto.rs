//! Request and response bodies.
//!
//! Field names are snake_case on the wire. Identifiers travel as strings: request ids in
//! `YYYYMMDDTHHMMSS.mmmZ-<uuid>` form, share and opinion ids as 32 lowercase hex characters,
//! subjects as 64-character correlation keys. Raw subject text only ever appears in request
//! bodies and query strings, never in a response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// The acting clinician.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActorDto {
    pub actor_id: String,
    pub organisation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

// ============================================================================
// KNOWLEDGE
// ============================================================================

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectQuery {
    /// Raw subject text (patient identifier or disease concept). Hashed on arrival.
    pub subject: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EvaluateReq {
    pub actor: ActorDto,
    pub subject: String,
}

/// Ask to see one relation type's triples.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ViewReq {
    pub actor: ActorDto,
    pub subject: String,
    /// Relation tag or display name.
    pub relation: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TripleDto {
    pub head: String,
    pub relation: String,
    pub tail: String,
    pub organisation: String,
    pub created_time: String,
}

/// One relation type's aggregate.
///
/// `records` holds only triples the caller may see; it is empty when access is denied and for
/// unevaluated summaries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SummaryRes {
    pub relation: String,
    pub display_name: String,
    pub count: usize,
    pub organisations: Vec<String>,
    pub accessible_organisations: Vec<String>,
    pub inaccessible_organisations: Vec<String>,
    pub has_permission: bool,
    pub share_count: u64,
    pub records: Vec<TripleDto>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeRes {
    /// Correlation key the subject hashed to.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_for: Option<String>,
    pub skipped_records: usize,
    pub summaries: Vec<SummaryRes>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShareCountsRes {
    pub subject: String,
    /// Keyed by relation tag.
    pub counts: BTreeMap<String, u64>,
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateRequestReq {
    pub initiator: ActorDto,
    /// Raw subject text. Hashed on arrival.
    pub subject: String,
    #[serde(default)]
    pub subject_label: Option<String>,
    #[serde(default)]
    pub target_organisations: Vec<String>,
    pub target_actor_ids: Vec<String>,
    /// Relation tags; empty means the whole record.
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequestRes {
    pub request_id: String,
    pub initiator_actor_id: String,
    pub initiator_organisation: String,
    pub subject: String,
    pub subject_label: Option<String>,
    pub target_organisations: Vec<String>,
    pub target_actor_ids: Vec<String>,
    pub scope: Vec<String>,
    pub description: Option<String>,
    pub attachment: Option<String>,
    pub status: String,
    pub version: u64,
    pub created_time: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListRequestsRes {
    pub requests: Vec<RequestRes>,
}

#[derive(Clone, Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrganisationQuery {
    /// Hide requests initiated by this actor.
    #[serde(default)]
    pub exclude_actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CancelReq {
    pub actor: ActorDto,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CloseReq {
    pub actor: ActorDto,
    pub opinion_text: String,
    #[serde(default)]
    pub diagnosis_text: Option<String>,
    #[serde(default)]
    pub treatment_suggestion: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CloseRes {
    pub request: RequestRes,
    pub opinion: OpinionRes,
}

// ============================================================================
// SHARES
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShareReq {
    pub actor: ActorDto,
    /// Encoded list of `{head, relation, tail, organization?}` objects.
    pub triples: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BundleRes {
    pub share_id: String,
    pub request_id: String,
    pub sharing_actor_id: String,
    pub sharing_organisation: String,
    pub triples: Vec<TripleDto>,
    pub created_time: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListBundlesRes {
    pub bundles: Vec<BundleRes>,
}

// ============================================================================
// OPINIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OpinionReq {
    pub actor: ActorDto,
    pub opinion_text: String,
    #[serde(default)]
    pub diagnosis_text: Option<String>,
    #[serde(default)]
    pub treatment_suggestion: Option<String>,
    /// A final opinion closes the request and is only accepted from the initiator.
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OpinionRes {
    pub opinion_id: String,
    pub request_id: String,
    pub actor_id: String,
    pub organisation: String,
    pub department: Option<String>,
    pub opinion_text: String,
    pub diagnosis_text: Option<String>,
    pub treatment_suggestion: Option<String>,
    pub created_time: String,
    pub is_final: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListOpinionsRes {
    pub opinions: Vec<OpinionRes>,
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error body returned with every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// One of `validation`, `permission`, `illegal_state`, `not_found`, `conflict`, `transport`.
    pub kind: String,
    pub message: String,
    /// Organisations whose disclosure would lift a permission error.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_organisations: Vec<String>,
    /// Whether the same call may be retried unchanged.
    pub retryable: bool,
}
