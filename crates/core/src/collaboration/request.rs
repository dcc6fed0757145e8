//! Collaboration request lifecycle.
//!
//! A request asks actors at other organisations to disclose knowledge about one subject, or to
//! give a diagnostic opinion on it. Its status follows a closed transition table:
//!
//! ```text
//! Active ──close──▶ Completed
//!   │
//!   └────cancel───▶ Cancelled
//! ```
//!
//! Completed and Cancelled are terminal. Every refused transition is reported as
//! [`ConsultError::RequestClosed`] at this API boundary rather than left to the caller.

use crate::actor::Actor;
use crate::collaboration::opinion::{DiagnosisOpinion, OpinionDraft};
use crate::constants::{INITIAL_REQUEST_VERSION, MAX_DESCRIPTION_CHARS};
use crate::error::{ConsultError, ConsultResult};
use crate::store::CollaborationStore;
use chrono::{DateTime, Utc};
use consult_correlation::CorrelationId;
use consult_types::NonEmptyText;
use consult_uuid::{TimestampId, TimestampIdGenerator};
use consult_wire::RelationType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};

// ============================================================================
// STATUS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Open for shares and opinions. The only non-terminal state.
    Active,
    /// Closed by the initiator with a final opinion.
    Completed,
    /// Abandoned without a final opinion. Existing shares and opinions stay queryable.
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Active)
    }

    /// The transition table.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Active, RequestStatus::Completed)
                | (RequestStatus::Active, RequestStatus::Cancelled)
        )
    }

    /// Applies the transition table, returning the new status.
    ///
    /// # Errors
    ///
    /// [`ConsultError::RequestClosed`] when `self` is terminal, and
    /// [`ConsultError::InvalidInput`] for the remaining illegal pair (`Active -> Active`).
    pub fn transition(
        self,
        request_id: &TimestampId,
        next: RequestStatus,
    ) -> ConsultResult<RequestStatus> {
        if self.can_transition_to(next) {
            return Ok(next);
        }
        self.ensure_active(request_id)?;
        Err(ConsultError::InvalidInput(format!(
            "request {request_id} cannot move from {self} to {next}"
        )))
    }

    /// Refuses any action on a terminal request.
    pub fn ensure_active(self, request_id: &TimestampId) -> ConsultResult<()> {
        if self.is_terminal() {
            return Err(ConsultError::RequestClosed {
                request_id: request_id.clone(),
                status: self,
            });
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCOPE
// ============================================================================

/// Which relation types a request asks about.
///
/// On the wire this is a list of relation tags; the empty list means the whole record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RelationType>", into = "Vec<RelationType>")]
pub enum RelationScope {
    WholeRecord,
    Relations(BTreeSet<RelationType>),
}

impl RelationScope {
    pub fn includes(&self, relation: RelationType) -> bool {
        match self {
            RelationScope::WholeRecord => true,
            RelationScope::Relations(relations) => relations.contains(&relation),
        }
    }

    pub fn is_whole_record(&self) -> bool {
        matches!(self, RelationScope::WholeRecord)
    }
}

impl From<Vec<RelationType>> for RelationScope {
    fn from(relations: Vec<RelationType>) -> Self {
        if relations.is_empty() {
            RelationScope::WholeRecord
        } else {
            RelationScope::Relations(relations.into_iter().collect())
        }
    }
}

impl From<RelationScope> for Vec<RelationType> {
    fn from(scope: RelationScope) -> Self {
        match scope {
            RelationScope::WholeRecord => Vec::new(),
            RelationScope::Relations(relations) => relations.into_iter().collect(),
        }
    }
}

// ============================================================================
// REQUEST
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationRequest {
    pub request_id: TimestampId,
    pub initiator_actor_id: NonEmptyText,
    pub initiator_organisation: NonEmptyText,
    pub subject: CorrelationId,
    /// Non-identifying label shown to targets (for example a disease name).
    pub subject_label: Option<NonEmptyText>,
    pub target_organisations: Vec<NonEmptyText>,
    pub target_actor_ids: Vec<NonEmptyText>,
    pub scope: RelationScope,
    pub description: Option<NonEmptyText>,
    /// Reference to an attached PDF held by the document service.
    pub attachment: Option<NonEmptyText>,
    pub status: RequestStatus,
    /// Bumped on every status transition; writers must present the version they read.
    pub version: u64,
    pub created_time: DateTime<Utc>,
}

impl CollaborationRequest {
    pub fn is_initiated_by(&self, actor_id: &str) -> bool {
        self.initiator_actor_id == actor_id
    }

    pub fn targets_actor(&self, actor_id: &str) -> bool {
        self.target_actor_ids.iter().any(|a| a == actor_id)
    }

    pub fn targets_organisation(&self, organisation: &str) -> bool {
        self.target_organisations.iter().any(|o| o == organisation)
    }

    /// Targeted explicitly, or through their organisation.
    pub fn is_target(&self, actor: &Actor) -> bool {
        self.targets_actor(actor.actor_id()) || self.targets_organisation(actor.organisation())
    }

    pub fn is_participant(&self, actor: &Actor) -> bool {
        self.is_initiated_by(actor.actor_id()) || self.is_target(actor)
    }
}

/// Who a new request is addressed to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTargets {
    #[serde(default)]
    pub organisations: Vec<String>,
    #[serde(default)]
    pub actor_ids: Vec<String>,
}

/// Input for [`CollaborationRequestManager::create`].
#[derive(Clone, Debug)]
pub struct NewRequest {
    pub subject: CorrelationId,
    pub subject_label: Option<String>,
    pub targets: RequestTargets,
    pub scope: RelationScope,
    pub description: Option<String>,
    pub attachment: Option<String>,
}

impl NewRequest {
    /// A whole-record request with no description or attachment.
    pub fn new(subject: CorrelationId, targets: RequestTargets) -> Self {
        Self {
            subject,
            subject_label: None,
            targets,
            scope: RelationScope::WholeRecord,
            description: None,
            attachment: None,
        }
    }

    pub fn with_scope(mut self, relations: Vec<RelationType>) -> Self {
        self.scope = relations.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Pure predicates over the request set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestFilter {
    All,
    Initiator(String),
    /// Requests addressed to an organisation, optionally hiding one actor's own requests.
    TargetOrganisation {
        organisation: String,
        exclude_actor_id: Option<String>,
    },
    TargetActor(String),
    /// Requests one actor raised about one subject.
    InitiatorSubject {
        actor_id: String,
        subject: CorrelationId,
    },
}

impl RequestFilter {
    pub fn matches(&self, request: &CollaborationRequest) -> bool {
        match self {
            RequestFilter::All => true,
            RequestFilter::Initiator(actor_id) => request.is_initiated_by(actor_id),
            RequestFilter::TargetOrganisation {
                organisation,
                exclude_actor_id,
            } => {
                request.targets_organisation(organisation)
                    && !exclude_actor_id
                        .as_deref()
                        .is_some_and(|a| request.is_initiated_by(a))
            }
            RequestFilter::TargetActor(actor_id) => request.targets_actor(actor_id),
            RequestFilter::InitiatorSubject { actor_id, subject } => {
                request.is_initiated_by(actor_id) && &request.subject == subject
            }
        }
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Owns request creation, retrieval and termination.
#[derive(Clone)]
pub struct CollaborationRequestManager {
    store: Arc<dyn CollaborationStore>,
    /// Last minted id, so ids created by this manager sort in creation order.
    last_id: Arc<Mutex<Option<TimestampId>>>,
}

impl CollaborationRequestManager {
    pub fn new(store: Arc<dyn CollaborationStore>) -> Self {
        Self {
            store,
            last_id: Arc::new(Mutex::new(None)),
        }
    }

    fn next_request_id(&self) -> TimestampId {
        let mut last = self
            .last_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = TimestampIdGenerator::generate(last.as_ref());
        *last = Some(id.clone());
        id
    }

    /// Creates a new Active request.
    ///
    /// All validation happens before the store is contacted.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::EmptySubject`] if the subject is the empty correlation sentinel
    /// - [`ConsultError::InvalidInput`] if there is no target actor, or a text field is too long
    /// - [`ConsultError::SelfTarget`] if the initiator lists themselves as a target
    pub fn create(
        &self,
        initiator: &Actor,
        new_request: NewRequest,
    ) -> ConsultResult<CollaborationRequest> {
        if new_request.subject.is_empty() {
            return Err(ConsultError::EmptySubject);
        }

        let target_actor_ids = dedup_texts(&new_request.targets.actor_ids);
        if target_actor_ids.is_empty() {
            return Err(ConsultError::InvalidInput(
                "at least one target actor is required".into(),
            ));
        }
        if target_actor_ids.iter().any(|a| a == initiator.actor_id()) {
            return Err(ConsultError::SelfTarget(initiator.actor_id().to_string()));
        }
        let target_organisations = dedup_texts(&new_request.targets.organisations);

        let description = optional_text(
            "description",
            new_request.description.as_deref(),
            MAX_DESCRIPTION_CHARS,
        )?;
        let subject_label = optional_text(
            "subject_label",
            new_request.subject_label.as_deref(),
            MAX_DESCRIPTION_CHARS,
        )?;
        let attachment = optional_text(
            "attachment",
            new_request.attachment.as_deref(),
            MAX_DESCRIPTION_CHARS,
        )?;

        let request_id = self.next_request_id();
        let request = CollaborationRequest {
            created_time: request_id.timestamp(),
            request_id,
            initiator_actor_id: initiator.actor_id.clone(),
            initiator_organisation: initiator.organisation.clone(),
            subject: new_request.subject,
            subject_label,
            target_organisations,
            target_actor_ids,
            scope: new_request.scope,
            description,
            attachment,
            status: RequestStatus::Active,
            version: INITIAL_REQUEST_VERSION,
        };

        self.store.insert_request(request.clone())?;

        tracing::info!(
            request_id = %request.request_id,
            initiator = %request.initiator_actor_id,
            subject = ?request.subject,
            targets = request.target_actor_ids.len(),
            whole_record = request.scope.is_whole_record(),
            "created collaboration request"
        );

        Ok(request)
    }

    /// Fetches one request.
    pub fn get(&self, request_id: &TimestampId) -> ConsultResult<CollaborationRequest> {
        self.store
            .request(request_id)?
            .ok_or_else(|| ConsultError::RequestNotFound(request_id.clone()))
    }

    pub fn list_by_initiator(&self, actor_id: &str) -> ConsultResult<Vec<CollaborationRequest>> {
        self.list(&RequestFilter::Initiator(actor_id.to_string()))
    }

    /// Requests addressed to `organisation`. `exclude_actor_id` hides that actor's own
    /// requests so they are not listed twice alongside [`Self::list_by_initiator`].
    pub fn list_by_target_organisation(
        &self,
        organisation: &str,
        exclude_actor_id: Option<&str>,
    ) -> ConsultResult<Vec<CollaborationRequest>> {
        self.list(&RequestFilter::TargetOrganisation {
            organisation: organisation.to_string(),
            exclude_actor_id: exclude_actor_id.map(str::to_string),
        })
    }

    pub fn list_by_target_actor(&self, actor_id: &str) -> ConsultResult<Vec<CollaborationRequest>> {
        self.list(&RequestFilter::TargetActor(actor_id.to_string()))
    }

    /// Newest first.
    pub fn list(&self, filter: &RequestFilter) -> ConsultResult<Vec<CollaborationRequest>> {
        let mut requests = self.store.requests(filter)?;
        requests.sort_by(|a, b| b.request_id.cmp(&a.request_id));
        Ok(requests)
    }

    /// Closes a request with a final opinion.
    ///
    /// The opinion append and the transition to Completed are one store operation: either both
    /// are recorded or neither is.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::NotInitiator`] unless `actor` raised the request
    /// - [`ConsultError::RequestClosed`] if the request is already terminal
    /// - [`ConsultError::VersionConflict`] if another writer changed the request meanwhile
    pub fn close(
        &self,
        request_id: &TimestampId,
        actor: &Actor,
        final_opinion: OpinionDraft,
    ) -> ConsultResult<(CollaborationRequest, DiagnosisOpinion)> {
        let opinion = DiagnosisOpinion::record(request_id, actor, final_opinion, true)?;

        let request = self.get(request_id)?;
        if !request.is_initiated_by(actor.actor_id()) {
            return Err(ConsultError::NotInitiator {
                action: "close",
                request_id: request_id.clone(),
            });
        }
        request
            .status
            .transition(request_id, RequestStatus::Completed)?;

        let updated =
            self.store
                .complete_with_opinion(request_id, request.version, opinion.clone())?;

        tracing::info!(
            request_id = %request_id,
            opinion_id = %opinion.opinion_id,
            version = updated.version,
            "completed collaboration request"
        );

        Ok((updated, opinion))
    }

    /// Cancels an Active request. Irreversible; shares and opinions are kept.
    pub fn cancel(
        &self,
        request_id: &TimestampId,
        actor: &Actor,
    ) -> ConsultResult<CollaborationRequest> {
        let request = self.get(request_id)?;
        if !request.is_initiated_by(actor.actor_id()) {
            return Err(ConsultError::NotInitiator {
                action: "cancel",
                request_id: request_id.clone(),
            });
        }
        let next = request
            .status
            .transition(request_id, RequestStatus::Cancelled)?;

        let updated = self
            .store
            .update_status(request_id, request.version, next)?;

        tracing::info!(
            request_id = %request_id,
            version = updated.version,
            "cancelled collaboration request"
        );

        Ok(updated)
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Trims, drops blanks and removes duplicates while keeping first-seen order.
fn dedup_texts(values: &[String]) -> Vec<NonEmptyText> {
    let mut seen = BTreeSet::new();
    values
        .iter()
        .filter_map(|v| NonEmptyText::new(v).ok())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

pub(crate) fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ConsultResult<Option<NonEmptyText>> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    NonEmptyText::bounded(value, max)
        .map(Some)
        .map_err(|e| ConsultError::InvalidInput(format!("{field}: {e}")))
}

// ============================================================================
// TESTS
// ============================================================================
