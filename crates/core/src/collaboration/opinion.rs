//! Diagnosis opinions attached to collaboration requests.
//!
//! Opinions are append-only. Non-final opinions go through [`DiagnosisOpinionLedger::submit`];
//! the single final opinion is only ever recorded by
//! [`CollaborationRequestManager::close`](crate::CollaborationRequestManager::close), together
//! with the transition to Completed.

use crate::actor::Actor;
use crate::collaboration::request::optional_text;
use crate::constants::{MAX_DESCRIPTION_CHARS, MAX_OPINION_TEXT_CHARS};
use crate::error::{ConsultError, ConsultResult};
use crate::store::CollaborationStore;
use chrono::{DateTime, Utc};
use consult_types::NonEmptyText;
use consult_uuid::{TimestampId, UuidService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unvalidated opinion content as supplied by a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionDraft {
    pub opinion_text: String,
    #[serde(default)]
    pub diagnosis_text: Option<String>,
    #[serde(default)]
    pub treatment_suggestion: Option<String>,
}

impl OpinionDraft {
    pub fn new(opinion_text: impl Into<String>) -> Self {
        Self {
            opinion_text: opinion_text.into(),
            ..Self::default()
        }
    }

    pub fn with_diagnosis(mut self, diagnosis: impl Into<String>) -> Self {
        self.diagnosis_text = Some(diagnosis.into());
        self
    }

    pub fn with_treatment(mut self, treatment: impl Into<String>) -> Self {
        self.treatment_suggestion = Some(treatment.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisOpinion {
    pub opinion_id: UuidService,
    pub request_id: TimestampId,
    pub actor_id: NonEmptyText,
    pub organisation: NonEmptyText,
    pub department: Option<NonEmptyText>,
    pub opinion_text: NonEmptyText,
    pub diagnosis_text: Option<NonEmptyText>,
    pub treatment_suggestion: Option<NonEmptyText>,
    pub created_time: DateTime<Utc>,
    /// At most one opinion per request is final, and it is the initiator's closing opinion.
    pub is_final: bool,
}

impl DiagnosisOpinion {
    /// Validates a draft and stamps it with the author's identity.
    pub(crate) fn record(
        request_id: &TimestampId,
        actor: &Actor,
        draft: OpinionDraft,
        is_final: bool,
    ) -> ConsultResult<Self> {
        let opinion_text = NonEmptyText::bounded(&draft.opinion_text, MAX_OPINION_TEXT_CHARS)
            .map_err(|e| ConsultError::InvalidInput(format!("opinion_text: {e}")))?;
        let diagnosis_text = optional_text(
            "diagnosis_text",
            draft.diagnosis_text.as_deref(),
            MAX_DESCRIPTION_CHARS,
        )?;
        let treatment_suggestion = optional_text(
            "treatment_suggestion",
            draft.treatment_suggestion.as_deref(),
            MAX_OPINION_TEXT_CHARS,
        )?;

        Ok(Self {
            opinion_id: UuidService::new(),
            request_id: request_id.clone(),
            actor_id: actor.actor_id.clone(),
            organisation: actor.organisation.clone(),
            department: actor.department.clone(),
            opinion_text,
            diagnosis_text,
            treatment_suggestion,
            created_time: Utc::now(),
            is_final,
        })
    }
}

/// Records non-final opinions from request participants.
#[derive(Clone)]
pub struct DiagnosisOpinionLedger {
    store: Arc<dyn CollaborationStore>,
}

impl DiagnosisOpinionLedger {
    pub fn new(store: Arc<dyn CollaborationStore>) -> Self {
        Self { store }
    }

    /// Appends a non-final opinion.
    ///
    /// Participants are the initiator, the target actors, and members of a target organisation.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::InvalidInput`] for blank or oversized text
    /// - [`ConsultError::RequestNotFound`] for an unknown request
    /// - [`ConsultError::RequestClosed`] if the request is no longer Active
    /// - [`ConsultError::NotParticipant`] if `actor` has no role in the request
    pub fn submit(
        &self,
        request_id: &TimestampId,
        actor: &Actor,
        draft: OpinionDraft,
    ) -> ConsultResult<DiagnosisOpinion> {
        let opinion = DiagnosisOpinion::record(request_id, actor, draft, false)?;

        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| ConsultError::RequestNotFound(request_id.clone()))?;
        request.status.ensure_active(request_id)?;
        if !request.is_participant(actor) {
            return Err(ConsultError::NotParticipant {
                actor_id: actor.actor_id().to_string(),
                request_id: request_id.clone(),
            });
        }

        self.store.append_opinion(opinion.clone())?;

        tracing::info!(
            request_id = %request_id,
            opinion_id = %opinion.opinion_id,
            actor = %opinion.actor_id,
            "recorded diagnosis opinion"
        );

        Ok(opinion)
    }

    /// All opinions on a request, oldest first.
    pub fn list(&self, request_id: &TimestampId) -> ConsultResult<Vec<DiagnosisOpinion>> {
        if self.store.request(request_id)?.is_none() {
            return Err(ConsultError::RequestNotFound(request_id.clone()));
        }
        self.store.opinions(request_id)
    }
}
