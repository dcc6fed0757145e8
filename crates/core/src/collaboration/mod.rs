//! The collaboration workflow: requests, disclosures and opinions.

pub mod opinion;
pub mod request;
pub mod share;

pub use opinion::{DiagnosisOpinion, DiagnosisOpinionLedger, OpinionDraft};
pub use request::{
    CollaborationRequest, CollaborationRequestManager, NewRequest, RelationScope, RequestFilter,
    RequestStatus, RequestTargets,
};
pub use share::{KnowledgeShareBroker, SharedKnowledgeBundle};

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::actor::Actor;
    use crate::config::CoreConfig;
    use crate::store::MemoryStore;
    use consult_correlation::{CorrelationId, IdentityCorrelator};
    use consult_types::NonEmptyText;
    use consult_wire::{RelationType, TripleSubmission};
    use std::sync::Arc;

    pub(crate) struct TestEnv {
        pub cfg: Arc<CoreConfig>,
        pub store: Arc<MemoryStore>,
        pub requests: CollaborationRequestManager,
        pub shares: KnowledgeShareBroker,
        pub opinions: DiagnosisOpinionLedger,
    }

    pub(crate) fn setup() -> TestEnv {
        let cfg = Arc::new(CoreConfig::new(vec!["无".into()], "unknown".into(), 5).unwrap());
        let store = Arc::new(MemoryStore::new());
        TestEnv {
            requests: CollaborationRequestManager::new(store.clone()),
            shares: KnowledgeShareBroker::new(cfg.clone(), store.clone()),
            opinions: DiagnosisOpinionLedger::new(store.clone()),
            cfg,
            store,
        }
    }

    pub(crate) fn actor(actor_id: &str, organisation: &str) -> Actor {
        Actor::new(actor_id, organisation).unwrap()
    }

    pub(crate) fn subject() -> CorrelationId {
        IdentityCorrelator::hash("张三的身份证号")
    }

    pub(crate) fn open_request(
        env: &TestEnv,
        initiator: &str,
        organisation: &str,
        target_actors: &[&str],
        target_organisations: &[&str],
        scope: Vec<RelationType>,
    ) -> CollaborationRequest {
        let targets = RequestTargets {
            organisations: target_organisations.iter().map(|s| s.to_string()).collect(),
            actor_ids: target_actors.iter().map(|s| s.to_string()).collect(),
        };
        env.requests
            .create(
                &actor(initiator, organisation),
                NewRequest::new(subject(), targets).with_scope(scope),
            )
            .unwrap()
    }

    pub(crate) fn submission(
        head: &str,
        relation: RelationType,
        tail: &str,
        organisation: Option<&str>,
    ) -> TripleSubmission {
        TripleSubmission {
            head: NonEmptyText::new(head).unwrap(),
            relation,
            tail: NonEmptyText::new(tail).unwrap(),
            organisation: organisation.map(|o| NonEmptyText::new(o).unwrap()),
        }
    }
}
