//! Entry point tying the workflow components to one store and configuration.

use crate::actor::Actor;
use crate::collaboration::{
    CollaborationRequestManager, DiagnosisOpinion, DiagnosisOpinionLedger, KnowledgeShareBroker,
    OpinionDraft, RequestFilter,
};
use crate::config::CoreConfig;
use crate::error::{ConsultError, ConsultResult};
use crate::knowledge::{Disclosure, KnowledgeIndex, PermissionEvaluator};
use crate::store::CollaborationStore;
use consult_correlation::{CorrelationId, IdentityCorrelator};
use consult_uuid::TimestampId;
use consult_wire::RelationType;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The collaborative-diagnosis workflow over one backing store.
///
/// Subject text passed in here is hashed immediately; only the correlation key travels further.
#[derive(Clone)]
pub struct CollaborationService {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn CollaborationStore>,
    requests: CollaborationRequestManager,
    shares: KnowledgeShareBroker,
    opinions: DiagnosisOpinionLedger,
}

impl CollaborationService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CollaborationStore>) -> Self {
        Self {
            requests: CollaborationRequestManager::new(store.clone()),
            shares: KnowledgeShareBroker::new(cfg.clone(), store.clone()),
            opinions: DiagnosisOpinionLedger::new(store.clone()),
            cfg,
            store,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn requests(&self) -> &CollaborationRequestManager {
        &self.requests
    }

    pub fn shares(&self) -> &KnowledgeShareBroker {
        &self.shares
    }

    pub fn opinions(&self) -> &DiagnosisOpinionLedger {
        &self.opinions
    }

    /// Hashes subject text, refusing input that maps to the empty sentinel.
    pub fn correlate(subject_text: &str) -> ConsultResult<CorrelationId> {
        let subject = IdentityCorrelator::hash(subject_text);
        if subject.is_empty() {
            return Err(ConsultError::EmptySubject);
        }
        Ok(subject)
    }

    /// Unevaluated index of everything recorded about a subject, with share counts.
    pub fn search_knowledge(&self, subject_text: &str) -> ConsultResult<KnowledgeIndex> {
        let subject = Self::correlate(subject_text)?;
        let records = self.store.knowledge_records(&subject)?;
        let mut index = KnowledgeIndex::build(&records, &self.cfg);
        index.apply_share_counts(&self.store.share_counts(&subject)?);

        tracing::debug!(
            subject = ?subject,
            records = records.len(),
            relations = index.relations().count(),
            skipped = index.skipped(),
            "built knowledge index"
        );

        Ok(index)
    }

    pub fn share_counts(&self, subject_text: &str) -> ConsultResult<BTreeMap<RelationType, u64>> {
        let subject = Self::correlate(subject_text)?;
        self.store.share_counts(&subject)
    }

    /// Evaluates a subject's knowledge for `actor`.
    ///
    /// Disclosures come from every request the actor initiated about this subject, whatever
    /// its status. Call again after a share to pick up widened access.
    pub fn evaluate_for(&self, actor: &Actor, subject_text: &str) -> ConsultResult<KnowledgeIndex> {
        let subject = Self::correlate(subject_text)?;
        let records = self.store.knowledge_records(&subject)?;
        let index = KnowledgeIndex::build(&records, &self.cfg);

        let initiated = self.store.requests(&RequestFilter::InitiatorSubject {
            actor_id: actor.actor_id().to_string(),
            subject: subject.clone(),
        })?;

        let mut disclosures = Vec::new();
        for request in &initiated {
            for bundle in self.store.bundles(&request.request_id)? {
                disclosures.push(Disclosure::new(request, bundle));
            }
        }

        let mut evaluated = PermissionEvaluator::evaluate(&index, actor.organisation(), &disclosures);
        evaluated.apply_share_counts(&self.store.share_counts(&subject)?);

        tracing::debug!(
            actor = actor.actor_id(),
            subject = ?subject,
            requests = initiated.len(),
            disclosures = disclosures.len(),
            "evaluated knowledge access"
        );

        Ok(evaluated)
    }

    /// Records an opinion. A final opinion closes the request and may only come from the
    /// initiator; anything else goes to the ledger.
    pub fn submit_opinion(
        &self,
        request_id: &TimestampId,
        actor: &Actor,
        draft: OpinionDraft,
        is_final: bool,
    ) -> ConsultResult<DiagnosisOpinion> {
        if is_final {
            let (_, opinion) = self.requests.close(request_id, actor, draft)?;
            return Ok(opinion);
        }
        self.opinions.submit(request_id, actor, draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::test_support::{actor, submission};
    use crate::collaboration::{NewRequest, RequestStatus, RequestTargets};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use consult_wire::RawRecord;

    const SUBJECT: &str = "张三的身份证号";

    fn record(id: &str, relation: &str, tail: &str, section: &str) -> RawRecord {
        RawRecord {
            record_id: id.into(),
            payload: format!(
                r#"{{"head":"舌下腺肿瘤","relation":"{relation}","tail":"{tail}","section":"{section}"}}"#
            ),
            created_time: Utc::now(),
        }
    }

    fn service() -> CollaborationService {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_knowledge(
                IdentityCorrelator::hash(SUBJECT),
                vec![
                    record("1", "diagnostic-sign", "肿块", "Hosp1"),
                    record("2", "diagnostic-sign", "疼痛", "Hosp2"),
                    record("3", "associated-procedure", "舌下腺切除术", "Hosp2"),
                ],
            )
            .unwrap();
        CollaborationService::new(Arc::new(CoreConfig::default()), store)
    }

    fn request_to_b(svc: &CollaborationService, scope: Vec<RelationType>) -> TimestampId {
        let targets = RequestTargets {
            organisations: vec!["Hosp2".into()],
            actor_ids: vec!["B".into()],
        };
        svc.requests()
            .create(
                &actor("A", "Hosp1"),
                NewRequest::new(CollaborationService::correlate(SUBJECT).unwrap(), targets)
                    .with_scope(scope),
            )
            .unwrap()
            .request_id
    }

    #[test]
    fn correlate_is_stable_and_refuses_blank() {
        assert_eq!(
            CollaborationService::correlate(SUBJECT).unwrap(),
            CollaborationService::correlate(SUBJECT).unwrap()
        );
        assert!(matches!(
            CollaborationService::correlate("  "),
            Err(ConsultError::EmptySubject)
        ));
    }

    #[test]
    fn search_finds_records_by_subject_only() {
        let svc = service();
        let index = svc.search_knowledge(SUBJECT).unwrap();
        assert_eq!(index.get(RelationType::DiagnosticSign).unwrap().count, 2);
        assert!(svc.search_knowledge("李四").unwrap().is_empty());
    }

    #[test]
    fn share_widens_initiator_access_on_next_evaluation() {
        let svc = service();
        let a = actor("A", "Hosp1");
        let request_id = request_to_b(&svc, vec![RelationType::DiagnosticSign]);

        let before = svc.evaluate_for(&a, SUBJECT).unwrap();
        let signs = before.get(RelationType::DiagnosticSign).unwrap();
        assert!(!signs.accessible_organisations.contains("Hosp2"));

        svc.shares()
            .share(
                &request_id,
                &actor("B", "Hosp2"),
                vec![submission(
                    "舌下腺肿瘤",
                    RelationType::DiagnosticSign,
                    "肿块",
                    Some("Hosp2"),
                )],
            )
            .unwrap();

        let after = svc.evaluate_for(&a, SUBJECT).unwrap();
        let signs = after.get(RelationType::DiagnosticSign).unwrap();
        assert!(signs.accessible_organisations.contains("Hosp1"));
        assert!(signs.accessible_organisations.contains("Hosp2"));
        assert_eq!(signs.share_count, 1);
        assert_eq!(
            svc.share_counts(SUBJECT).unwrap(),
            BTreeMap::from([(RelationType::DiagnosticSign, 1)])
        );

        // Another actor at Hosp1 did not initiate the request and gains nothing.
        let colleague = svc.evaluate_for(&actor("C", "Hosp1"), SUBJECT).unwrap();
        assert!(!colleague
            .get(RelationType::DiagnosticSign)
            .unwrap()
            .accessible_organisations
            .contains("Hosp2"));
    }

    #[test]
    fn unrelated_organisation_has_no_permission() {
        let svc = service();
        let evaluated = svc.evaluate_for(&actor("E", "Hosp3"), SUBJECT).unwrap();
        let procedures = evaluated.get(RelationType::AssociatedProcedure).unwrap();
        assert!(!procedures.has_permission);
        assert!(!procedures.inaccessible_organisations.is_empty());
    }

    #[test]
    fn cancelled_request_disclosures_still_count() {
        let svc = service();
        let a = actor("A", "Hosp1");
        let request_id = request_to_b(&svc, vec![]);
        svc.shares()
            .share(
                &request_id,
                &actor("B", "Hosp2"),
                vec![submission("舌下腺肿瘤", RelationType::AssociatedProcedure, "舌下腺切除术", None)],
            )
            .unwrap();
        svc.requests().cancel(&request_id, &a).unwrap();

        let evaluated = svc.evaluate_for(&a, SUBJECT).unwrap();
        assert!(evaluated
            .get(RelationType::AssociatedProcedure)
            .unwrap()
            .has_permission);
        assert_eq!(svc.shares().list(&request_id).unwrap().len(), 1);
    }

    #[test]
    fn final_opinion_closes_the_request() {
        let svc = service();
        let a = actor("A", "Hosp1");
        let request_id = request_to_b(&svc, vec![]);

        let err = svc
            .submit_opinion(&request_id, &actor("B", "Hosp2"), OpinionDraft::new("mine"), true)
            .unwrap_err();
        assert!(matches!(err, ConsultError::NotInitiator { .. }));

        let opinion = svc
            .submit_opinion(&request_id, &a, OpinionDraft::new("Final diagnosis"), true)
            .unwrap();
        assert!(opinion.is_final);
        assert_eq!(
            svc.requests().get(&request_id).unwrap().status,
            RequestStatus::Completed
        );

        let err = svc
            .submit_opinion(&request_id, &actor("B", "Hosp2"), OpinionDraft::new("late"), false)
            .unwrap_err();
        assert!(matches!(err, ConsultError::RequestClosed { .. }));
    }
}
