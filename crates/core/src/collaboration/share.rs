//! Knowledge disclosure against a collaboration request.

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::error::{ConsultError, ConsultResult};
use crate::store::CollaborationStore;
use chrono::{DateTime, Utc};
use consult_types::NonEmptyText;
use consult_uuid::{TimestampId, UuidService};
use consult_wire::{KnowledgeTriple, RelationType, TripleSubmission};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// An immutable disclosure of triples by one target actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedKnowledgeBundle {
    pub share_id: UuidService,
    pub request_id: TimestampId,
    pub sharing_actor_id: NonEmptyText,
    pub sharing_organisation: NonEmptyText,
    pub triples: Vec<KnowledgeTriple>,
    pub created_time: DateTime<Utc>,
}

impl SharedKnowledgeBundle {
    /// Distinct relation types present in the bundle.
    pub fn relations(&self) -> BTreeSet<RelationType> {
        self.triples.iter().map(|t| t.relation).collect()
    }
}

/// Accepts disclosures from request targets.
#[derive(Clone)]
pub struct KnowledgeShareBroker {
    cfg: Arc<CoreConfig>,
    store: Arc<dyn CollaborationStore>,
}

impl KnowledgeShareBroker {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<dyn CollaborationStore>) -> Self {
        Self { cfg, store }
    }

    /// Discloses `triples` against an Active request.
    ///
    /// A submission without an organisation is recorded under the sharer's own organisation.
    /// Duplicate triples within one submission are collapsed. The request stays Active.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::InvalidInput`] if `triples` is empty or exceeds the configured bound
    /// - [`ConsultError::ForeignDisclosure`] for a triple owned by another organisation
    /// - [`ConsultError::RequestNotFound`] / [`ConsultError::RequestClosed`]
    /// - [`ConsultError::NotParticipant`] unless `actor` is a target of the request; the
    ///   initiator never is, even when their organisation is targeted
    /// - [`ConsultError::OutOfScope`] for a relation outside the request scope
    pub fn share(
        &self,
        request_id: &TimestampId,
        actor: &Actor,
        triples: Vec<TripleSubmission>,
    ) -> ConsultResult<SharedKnowledgeBundle> {
        if triples.is_empty() {
            return Err(ConsultError::InvalidInput(
                "a share must contain at least one triple".into(),
            ));
        }
        let max = self.cfg.max_triples_per_share();
        if triples.len() > max {
            return Err(ConsultError::InvalidInput(format!(
                "a share may contain at most {max} triples, got {}",
                triples.len()
            )));
        }

        let foreign: BTreeSet<String> = triples
            .iter()
            .filter_map(|t| t.organisation.as_ref())
            .filter(|o| *o != actor.organisation())
            .map(|o| o.to_string())
            .collect();
        if !foreign.is_empty() {
            return Err(ConsultError::ForeignDisclosure {
                organisations: foreign.into_iter().collect(),
            });
        }

        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| ConsultError::RequestNotFound(request_id.clone()))?;
        request.status.ensure_active(request_id)?;
        if request.is_initiated_by(actor.actor_id()) || !request.is_target(actor) {
            return Err(ConsultError::NotParticipant {
                actor_id: actor.actor_id().to_string(),
                request_id: request_id.clone(),
            });
        }

        if let Some(outside) = triples.iter().find(|t| !request.scope.includes(t.relation)) {
            return Err(ConsultError::OutOfScope {
                relation: outside.relation,
            });
        }

        let created_time = Utc::now();
        let mut seen = BTreeSet::new();
        let triples: Vec<KnowledgeTriple> = triples
            .into_iter()
            .filter(|t| seen.insert((t.head.clone(), t.relation, t.tail.clone())))
            .map(|t| KnowledgeTriple {
                head: t.head,
                relation: t.relation,
                tail: t.tail,
                organisation: actor.organisation.clone(),
                created_time,
            })
            .collect();

        let bundle = SharedKnowledgeBundle {
            share_id: UuidService::new(),
            request_id: request_id.clone(),
            sharing_actor_id: actor.actor_id.clone(),
            sharing_organisation: actor.organisation.clone(),
            triples,
            created_time,
        };

        self.store.append_bundle(bundle.clone())?;

        tracing::info!(
            request_id = %request_id,
            share_id = %bundle.share_id,
            organisation = %bundle.sharing_organisation,
            triples = bundle.triples.len(),
            "recorded knowledge share"
        );

        Ok(bundle)
    }

    /// Every bundle disclosed against a request, oldest first.
    pub fn list(&self, request_id: &TimestampId) -> ConsultResult<Vec<SharedKnowledgeBundle>> {
        if self.store.request(request_id)?.is_none() {
            return Err(ConsultError::RequestNotFound(request_id.clone()));
        }
        self.store.bundles(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaboration::test_support::{actor, open_request, setup, subject, submission};
    use crate::collaboration::{OpinionDraft, RequestStatus};

    #[test]
    fn target_shares_own_data_in_scope() {
        let env = setup();
        let request = open_request(
            &env,
            "A",
            "Hosp1",
            &["B"],
            &[],
            vec![RelationType::DiagnosticSign],
        );

        let bundle = env
            .shares
            .share(
                &request.request_id,
                &actor("B", "Hosp2"),
                vec![
                    submission("舌下腺肿瘤", RelationType::DiagnosticSign, "肿块", Some("Hosp2")),
                    submission("舌下腺肿瘤", RelationType::DiagnosticSign, "疼痛", None),
                ],
            )
            .unwrap();

        assert_eq!(bundle.triples.len(), 2);
        assert!(bundle.triples.iter().all(|t| t.organisation == "Hosp2"));
        assert_eq!(
            env.requests.get(&request.request_id).unwrap().status,
            RequestStatus::Active
        );
        assert_eq!(env.shares.list(&request.request_id).unwrap(), vec![bundle]);

        let counts = env.store.share_counts(&subject()).unwrap();
        assert_eq!(counts.get(&RelationType::DiagnosticSign), Some(&1));
    }

    #[test]
    fn members_of_a_target_organisation_may_share() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &["Hosp3"], vec![]);

        env.shares
            .share(
                &request.request_id,
                &actor("D", "Hosp3"),
                vec![submission("a", RelationType::Treatment, "b", None)],
            )
            .unwrap();
    }

    #[test]
    fn relation_outside_scope_is_rejected() {
        let env = setup();
        let request = open_request(
            &env,
            "A",
            "Hosp1",
            &["B"],
            &[],
            vec![RelationType::DiagnosticSign],
        );

        let err = env
            .shares
            .share(
                &request.request_id,
                &actor("B", "Hosp2"),
                vec![submission("a", RelationType::AssociatedProcedure, "b", None)],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ConsultError::OutOfScope { relation: RelationType::AssociatedProcedure }
        ));
        assert!(env.shares.list(&request.request_id).unwrap().is_empty());
    }

    #[test]
    fn foreign_organisation_data_is_rejected() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);

        let err = env
            .shares
            .share(
                &request.request_id,
                &actor("B", "Hosp2"),
                vec![
                    submission("a", RelationType::Treatment, "b", Some("Hosp2")),
                    submission("a", RelationType::Treatment, "c", Some("Hosp3")),
                ],
            )
            .unwrap_err();
        assert_eq!(err.required_organisations(), ["Hosp3".to_string()]);
        assert!(matches!(err, ConsultError::ForeignDisclosure { .. }));
    }

    #[test]
    fn initiator_and_outsiders_may_not_share() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);
        let triples = vec![submission("a", RelationType::Treatment, "b", None)];

        for who in [actor("A", "Hosp1"), actor("X", "Hosp9")] {
            let err = env
                .shares
                .share(&request.request_id, &who, triples.clone())
                .unwrap_err();
            assert!(matches!(err, ConsultError::NotParticipant { .. }));
        }
    }

    #[test]
    fn initiator_may_not_share_through_own_organisation() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &["Hosp1", "Hosp2"], vec![]);

        let err = env
            .shares
            .share(
                &request.request_id,
                &actor("A", "Hosp1"),
                vec![submission("a", RelationType::Treatment, "b", None)],
            )
            .unwrap_err();
        assert!(matches!(err, ConsultError::NotParticipant { actor_id, .. } if actor_id == "A"));
        assert!(env.shares.list(&request.request_id).unwrap().is_empty());
        assert!(env.store.share_counts(&subject()).unwrap().is_empty());

        // A colleague at the same organisation is still a target.
        env.shares
            .share(
                &request.request_id,
                &actor("C", "Hosp1"),
                vec![submission("a", RelationType::Treatment, "b", None)],
            )
            .unwrap();
    }

    #[test]
    fn foreign_data_is_rejected_before_the_request_is_read() {
        let env = setup();
        let unknown = consult_uuid::TimestampIdGenerator::generate(None);

        let err = env
            .shares
            .share(
                &unknown,
                &actor("B", "Hosp2"),
                vec![submission("a", RelationType::Treatment, "b", Some("Hosp3"))],
            )
            .unwrap_err();
        assert!(matches!(err, ConsultError::ForeignDisclosure { .. }));
    }

    #[test]
    fn empty_or_oversized_shares_are_invalid() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);
        let b = actor("B", "Hosp2");

        assert!(matches!(
            env.shares.share(&request.request_id, &b, vec![]),
            Err(ConsultError::InvalidInput(_))
        ));

        let too_many = (0..=env.cfg.max_triples_per_share())
            .map(|i| submission("a", RelationType::Treatment, &format!("t{i}"), None))
            .collect();
        assert!(matches!(
            env.shares.share(&request.request_id, &b, too_many),
            Err(ConsultError::InvalidInput(msg)) if msg.contains("at most")
        ));
    }

    #[test]
    fn duplicate_triples_are_collapsed() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);
        let t = submission("a", RelationType::Treatment, "b", None);

        let bundle = env
            .shares
            .share(&request.request_id, &actor("B", "Hosp2"), vec![t.clone(), t])
            .unwrap();
        assert_eq!(bundle.triples.len(), 1);
    }

    #[test]
    fn share_after_close_reports_request_closed() {
        let env = setup();
        let request = open_request(
            &env,
            "A",
            "Hosp1",
            &["B"],
            &[],
            vec![RelationType::DiagnosticSign],
        );
        env.requests
            .close(
                &request.request_id,
                &actor("A", "Hosp1"),
                OpinionDraft::new("Sublingual gland tumour"),
            )
            .unwrap();

        let err = env
            .shares
            .share(
                &request.request_id,
                &actor("B", "Hosp2"),
                vec![submission("a", RelationType::DiagnosticSign, "b", None)],
            )
            .unwrap_err();
        assert!(err.to_string().contains("is closed"));
        assert!(matches!(
            err,
            ConsultError::RequestClosed { status: RequestStatus::Completed, .. }
        ));
    }

    #[test]
    fn share_after_cancel_reports_request_closed() {
        let env = setup();
        let request = open_request(&env, "A", "Hosp1", &["B"], &[], vec![]);
        env.requests
            .cancel(&request.request_id, &actor("A", "Hosp1"))
            .unwrap();

        let err = env
            .shares
            .share(
                &request.request_id,
                &actor("B", "Hosp2"),
                vec![submission("a", RelationType::Treatment, "b", None)],
            )
            .unwrap_err();
        assert!(err.to_string().contains("is closed (cancelled)"));
        assert!(matches!(
            err,
            ConsultError::RequestClosed { status: RequestStatus::Cancelled, .. }
        ));
        assert!(env.shares.list(&request.request_id).unwrap().is_empty());
    }
}
