//! Backing-store boundary.
//!
//! The collaboration services talk to the remote knowledge service only through
//! [`CollaborationStore`]. Each call is one self-contained unit of work; there is no cross-call
//! transaction. The two writes that must land together (final opinion plus transition to
//! Completed) are therefore a single store operation.
//!
//! Raw subject text never reaches this layer: knowledge and share counts are keyed by
//! [`CorrelationId`].

use crate::collaboration::{
    CollaborationRequest, DiagnosisOpinion, RequestFilter, RequestStatus, SharedKnowledgeBundle,
};
use crate::error::{ConsultError, ConsultResult};
use consult_correlation::CorrelationId;
use consult_uuid::TimestampId;
use consult_wire::{RawRecord, RelationType};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Persistence operations used by the collaboration services.
///
/// Implementations must check status and version inside the same critical section as the write
/// they guard, so that a stale writer gets [`ConsultError::VersionConflict`] or
/// [`ConsultError::RequestClosed`] instead of overwriting a newer state.
pub trait CollaborationStore: Send + Sync {
    fn insert_request(&self, request: CollaborationRequest) -> ConsultResult<()>;

    fn request(&self, request_id: &TimestampId) -> ConsultResult<Option<CollaborationRequest>>;

    fn requests(&self, filter: &RequestFilter) -> ConsultResult<Vec<CollaborationRequest>>;

    /// Moves a request to `status`, bumping its version.
    fn update_status(
        &self,
        request_id: &TimestampId,
        expected_version: u64,
        status: RequestStatus,
    ) -> ConsultResult<CollaborationRequest>;

    /// Appends a bundle and increments the subject's share count for each relation it carries.
    fn append_bundle(&self, bundle: SharedKnowledgeBundle) -> ConsultResult<()>;

    fn bundles(&self, request_id: &TimestampId) -> ConsultResult<Vec<SharedKnowledgeBundle>>;

    fn append_opinion(&self, opinion: DiagnosisOpinion) -> ConsultResult<()>;

    /// Appends the final opinion and completes the request, or does neither.
    fn complete_with_opinion(
        &self,
        request_id: &TimestampId,
        expected_version: u64,
        opinion: DiagnosisOpinion,
    ) -> ConsultResult<CollaborationRequest>;

    fn opinions(&self, request_id: &TimestampId) -> ConsultResult<Vec<DiagnosisOpinion>>;

    fn knowledge_records(&self, subject: &CorrelationId) -> ConsultResult<Vec<RawRecord>>;

    fn share_counts(&self, subject: &CorrelationId) -> ConsultResult<BTreeMap<RelationType, u64>>;
}

#[derive(Default)]
struct MemoryState {
    requests: BTreeMap<TimestampId, CollaborationRequest>,
    bundles: HashMap<TimestampId, Vec<SharedKnowledgeBundle>>,
    opinions: HashMap<TimestampId, Vec<DiagnosisOpinion>>,
    knowledge: HashMap<CorrelationId, Vec<RawRecord>>,
    share_counts: HashMap<CorrelationId, BTreeMap<RelationType, u64>>,
}

impl MemoryState {
    /// Looks up a request and checks it is still Active.
    fn active_request(&self, request_id: &TimestampId) -> ConsultResult<&CollaborationRequest> {
        let request = self
            .requests
            .get(request_id)
            .ok_or_else(|| ConsultError::RequestNotFound(request_id.clone()))?;
        request.status.ensure_active(request_id)?;
        Ok(request)
    }

    fn transition(
        &mut self,
        request_id: &TimestampId,
        expected_version: u64,
        status: RequestStatus,
    ) -> ConsultResult<CollaborationRequest> {
        let request = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| ConsultError::RequestNotFound(request_id.clone()))?;

        if request.version != expected_version {
            return Err(ConsultError::VersionConflict {
                request_id: request_id.clone(),
                expected: expected_version,
                found: request.version,
            });
        }
        request.status = request.status.transition(request_id, status)?;
        request.version += 1;
        Ok(request.clone())
    }
}

/// In-process [`CollaborationStore`].
///
/// Used by the REST binary and by tests. All state lives behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads raw knowledge records for a subject, appending to any already held.
    pub fn insert_knowledge(
        &self,
        subject: CorrelationId,
        records: Vec<RawRecord>,
    ) -> ConsultResult<()> {
        if subject.is_empty() {
            return Err(ConsultError::EmptySubject);
        }
        self.write()?
            .knowledge
            .entry(subject)
            .or_default()
            .extend(records);
        Ok(())
    }

    fn read(&self) -> ConsultResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| ConsultError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> ConsultResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| ConsultError::Unavailable("memory store lock poisoned".into()))
    }
}

impl CollaborationStore for MemoryStore {
    fn insert_request(&self, request: CollaborationRequest) -> ConsultResult<()> {
        let mut state = self.write()?;
        if state.requests.contains_key(&request.request_id) {
            return Err(ConsultError::InvalidInput(format!(
                "request {} already exists",
                request.request_id
            )));
        }
        state.requests.insert(request.request_id.clone(), request);
        Ok(())
    }

    fn request(&self, request_id: &TimestampId) -> ConsultResult<Option<CollaborationRequest>> {
        Ok(self.read()?.requests.get(request_id).cloned())
    }

    fn requests(&self, filter: &RequestFilter) -> ConsultResult<Vec<CollaborationRequest>> {
        Ok(self
            .read()?
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn update_status(
        &self,
        request_id: &TimestampId,
        expected_version: u64,
        status: RequestStatus,
    ) -> ConsultResult<CollaborationRequest> {
        self.write()?.transition(request_id, expected_version, status)
    }

    fn append_bundle(&self, bundle: SharedKnowledgeBundle) -> ConsultResult<()> {
        let mut state = self.write()?;
        let subject = state.active_request(&bundle.request_id)?.subject.clone();

        let counts = state.share_counts.entry(subject).or_default();
        for relation in bundle.relations() {
            *counts.entry(relation).or_default() += 1;
        }
        state
            .bundles
            .entry(bundle.request_id.clone())
            .or_default()
            .push(bundle);
        Ok(())
    }

    fn bundles(&self, request_id: &TimestampId) -> ConsultResult<Vec<SharedKnowledgeBundle>> {
        Ok(self
            .read()?
            .bundles
            .get(request_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_opinion(&self, opinion: DiagnosisOpinion) -> ConsultResult<()> {
        let mut state = self.write()?;
        state.active_request(&opinion.request_id)?;
        if opinion.is_final {
            return Err(ConsultError::InvalidInput(
                "a final opinion can only be recorded by closing the request".into(),
            ));
        }
        state
            .opinions
            .entry(opinion.request_id.clone())
            .or_default()
            .push(opinion);
        Ok(())
    }

    fn complete_with_opinion(
        &self,
        request_id: &TimestampId,
        expected_version: u64,
        opinion: DiagnosisOpinion,
    ) -> ConsultResult<CollaborationRequest> {
        if &opinion.request_id != request_id || !opinion.is_final {
            return Err(ConsultError::InvalidInput(format!(
                "closing opinion does not belong to request {request_id}"
            )));
        }

        let mut state = self.write()?;
        let updated = state.transition(request_id, expected_version, RequestStatus::Completed)?;
        state
            .opinions
            .entry(request_id.clone())
            .or_default()
            .push(opinion);
        Ok(updated)
    }

    fn opinions(&self, request_id: &TimestampId) -> ConsultResult<Vec<DiagnosisOpinion>> {
        Ok(self
            .read()?
            .opinions
            .get(request_id)
            .cloned()
            .unwrap_or_default())
    }

    fn knowledge_records(&self, subject: &CorrelationId) -> ConsultResult<Vec<RawRecord>> {
        Ok(self
            .read()?
            .knowledge
            .get(subject)
            .cloned()
            .unwrap_or_default())
    }

    fn share_counts(&self, subject: &CorrelationId) -> ConsultResult<BTreeMap<RelationType, u64>> {
        Ok(self
            .read()?
            .share_counts
            .get(subject)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::test_support::{actor, open_request, setup};
    use crate::collaboration::{DiagnosisOpinion, OpinionDraft};
    use consult_correlation::IdentityCorrelator;

    fn final_opinion(request_id: &TimestampId) -> DiagnosisOpinion {
        DiagnosisOpinion::record(
            request_id,
            &actor("A", "Hosp1"),
            OpinionDraft::new("final"),
            true,
        )
        .unwrap()
    }

    #[test]
    fn stale_version_is_rejected() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);

        let err = env
            .store
            .update_status(&request.request_id, request.version + 7, RequestStatus::Cancelled)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsultError::VersionConflict { expected, found, .. }
                if expected == request.version + 7 && found == request.version
        ));
        assert_eq!(
            env.store.request(&request.request_id).unwrap().unwrap().status,
            RequestStatus::Active
        );
    }

    #[test]
    fn concurrent_close_and_cancel_only_one_wins() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);

        env.store
            .update_status(&request.request_id, request.version, RequestStatus::Cancelled)
            .unwrap();

        let err = env
            .store
            .complete_with_opinion(
                &request.request_id,
                request.version,
                final_opinion(&request.request_id),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
        assert!(env.store.opinions(&request.request_id).unwrap().is_empty());
    }

    #[test]
    fn complete_with_opinion_commits_both_writes() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);

        let updated = env
            .store
            .complete_with_opinion(
                &request.request_id,
                request.version,
                final_opinion(&request.request_id),
            )
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Completed);
        assert_eq!(env.store.opinions(&request.request_id).unwrap().len(), 1);
    }

    #[test]
    fn standalone_final_opinion_is_refused() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);

        let err = env
            .store
            .append_opinion(final_opinion(&request.request_id))
            .unwrap_err();
        assert!(matches!(err, ConsultError::InvalidInput(_)));
    }

    #[test]
    fn knowledge_is_keyed_by_correlation() {
        let store = MemoryStore::new();
        let key = IdentityCorrelator::hash("张三的身份证号");
        let record = RawRecord {
            record_id: "r1".into(),
            payload: "{}".into(),
            created_time: chrono::Utc::now(),
        };

        store.insert_knowledge(key.clone(), vec![record.clone()]).unwrap();
        assert_eq!(store.knowledge_records(&key).unwrap(), vec![record]);
        assert!(store
            .knowledge_records(&IdentityCorrelator::hash("李四"))
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.insert_knowledge(CorrelationId::empty(), vec![]),
            Err(ConsultError::EmptySubject)
        ));
    }
}
