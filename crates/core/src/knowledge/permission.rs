//! Per-organisation access evaluation over a [`KnowledgeIndex`].
//!
//! Access is recomputed from scratch on every call: the evaluator takes an index and the
//! disclosures known so far and returns a new index. Nothing is pushed; callers re-run
//! [`PermissionEvaluator::evaluate`] after a share to see widened access.
//!
//! Rules:
//! - an actor's own organisation is accessible wherever it owns fragments
//! - a disclosure whose request scope covers a relation makes each disclosed triple's
//!   organisation accessible for that relation
//! - a relation with no accessible organisation cannot be viewed; the error names the
//!   organisations that would have to disclose

use super::index::{KnowledgeIndex, RelationTypeSummary};
use crate::collaboration::{CollaborationRequest, RelationScope, SharedKnowledgeBundle};
use crate::error::{ConsultError, ConsultResult};
use consult_wire::{KnowledgeTriple, RelationType};
use serde::Serialize;
use std::collections::BTreeSet;

/// A bundle together with the scope of the request it was shared against.
#[derive(Clone, Debug)]
pub struct Disclosure {
    pub scope: RelationScope,
    pub bundle: SharedKnowledgeBundle,
}

impl Disclosure {
    pub fn new(request: &CollaborationRequest, bundle: SharedKnowledgeBundle) -> Self {
        Self {
            scope: request.scope.clone(),
            bundle,
        }
    }
}

/// The visible part of one relation summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationView {
    pub relation: RelationType,
    pub accessible_organisations: BTreeSet<String>,
    pub inaccessible_organisations: BTreeSet<String>,
    pub records: Vec<KnowledgeTriple>,
}

pub struct PermissionEvaluator;

impl PermissionEvaluator {
    /// Computes access sets for `actor_organisation`.
    ///
    /// Idempotent: applying the same disclosure twice changes nothing. Relations that appear
    /// only in disclosures are added to the result.
    pub fn evaluate(
        index: &KnowledgeIndex,
        actor_organisation: &str,
        disclosures: &[Disclosure],
    ) -> KnowledgeIndex {
        let mut evaluated = index.clone();

        for summary in evaluated.summaries.values_mut() {
            summary.accessible_organisations = summary
                .organisations
                .iter()
                .filter(|o| *o == actor_organisation)
                .cloned()
                .collect();
        }

        for disclosure in disclosures {
            for triple in &disclosure.bundle.triples {
                if !disclosure.scope.includes(triple.relation) {
                    continue;
                }
                let summary = evaluated
                    .summaries
                    .entry(triple.relation)
                    .or_insert_with(|| RelationTypeSummary::empty(triple.relation));

                let organisation = triple.organisation.to_string();
                summary.organisations.insert(organisation.clone());
                summary.accessible_organisations.insert(organisation);

                if !summary.records.iter().any(|r| same_fact(r, triple)) {
                    summary.records.push(triple.clone());
                }
            }
        }

        for summary in evaluated.summaries.values_mut() {
            summary.count = summary.records.len();
            summary.inaccessible_organisations = summary
                .organisations
                .difference(&summary.accessible_organisations)
                .cloned()
                .collect();
            summary.has_permission = !summary.accessible_organisations.is_empty();
            summary.evaluated_for = Some(actor_organisation.to_string());
        }

        evaluated
    }

    /// Reveals the triples of accessible organisations only.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::InvalidInput`] if `summary` was not evaluated for `actor_organisation`
    /// - [`ConsultError::AccessDenied`] if no organisation is accessible, listing the
    ///   organisations whose disclosure would grant access
    pub fn view(
        summary: &RelationTypeSummary,
        actor_organisation: &str,
    ) -> ConsultResult<RelationView> {
        if summary.evaluated_for.as_deref() != Some(actor_organisation) {
            return Err(ConsultError::InvalidInput(format!(
                "summary for {} was not evaluated for {actor_organisation}",
                summary.relation
            )));
        }
        if summary.accessible_organisations.is_empty() {
            return Err(ConsultError::AccessDenied {
                relation: summary.relation,
                required_organisations: summary.inaccessible_organisations.iter().cloned().collect(),
            });
        }

        let records = summary
            .records
            .iter()
            .filter(|t| summary.accessible_organisations.contains(t.organisation.as_str()))
            .cloned()
            .collect();

        Ok(RelationView {
            relation: summary.relation,
            accessible_organisations: summary.accessible_organisations.clone(),
            inaccessible_organisations: summary.inaccessible_organisations.clone(),
            records,
        })
    }
}

impl KnowledgeIndex {
    /// Views one relation of an evaluated index.
    ///
    /// # Errors
    ///
    /// [`ConsultError::NoKnowledge`] when the relation has no fragments at all, otherwise as
    /// [`PermissionEvaluator::view`].
    pub fn view(
        &self,
        relation: RelationType,
        actor_organisation: &str,
    ) -> ConsultResult<RelationView> {
        let summary = self
            .get(relation)
            .ok_or(ConsultError::NoKnowledge(relation))?;
        PermissionEvaluator::view(summary, actor_organisation)
    }
}

/// Same fact from the same owner; the timestamp does not matter.
fn same_fact(a: &KnowledgeTriple, b: &KnowledgeTriple) -> bool {
    a.relation == b.relation
        && a.head == b.head
        && a.tail == b.tail
        && a.organisation == b.organisation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use chrono::{TimeZone, Utc};
    use consult_types::NonEmptyText;
    use consult_uuid::{TimestampIdGenerator, UuidService};
    use consult_wire::RawRecord;

    fn record(payload: &str) -> RawRecord {
        RawRecord {
            record_id: "r".into(),
            payload: payload.into(),
            created_time: Utc.with_ymd_and_hms(2026, 1, 11, 9, 0, 0).unwrap(),
        }
    }

    fn index() -> KnowledgeIndex {
        KnowledgeIndex::build(
            &[
                record(r#"{"head":"舌下腺肿瘤","relation":"diagnostic-sign","tail":"肿块","section":"Hosp1"}"#),
                record(r#"{"head":"舌下腺肿瘤","relation":"diagnostic-sign","tail":"疼痛","section":"Hosp2"}"#),
                record(r#"{"head":"舌下腺肿瘤","relation":"associated-procedure","tail":"舌下腺切除术","section":"Hosp2"}"#),
            ],
            &CoreConfig::default(),
        )
    }

    fn triple(relation: RelationType, tail: &str, organisation: &str) -> KnowledgeTriple {
        KnowledgeTriple {
            head: NonEmptyText::new("舌下腺肿瘤").unwrap(),
            relation,
            tail: NonEmptyText::new(tail).unwrap(),
            organisation: NonEmptyText::new(organisation).unwrap(),
            created_time: Utc::now(),
        }
    }

    fn disclosure(scope: Vec<RelationType>, triples: Vec<KnowledgeTriple>) -> Disclosure {
        let organisation = triples[0].organisation.clone();
        Disclosure {
            scope: scope.into(),
            bundle: SharedKnowledgeBundle {
                share_id: UuidService::new(),
                request_id: TimestampIdGenerator::generate(None),
                sharing_actor_id: NonEmptyText::new("B").unwrap(),
                sharing_organisation: organisation,
                triples,
                created_time: Utc::now(),
            },
        }
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn baseline_grants_only_own_organisation() {
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp1", &[]);

        let signs = evaluated.get(RelationType::DiagnosticSign).unwrap();
        assert_eq!(signs.accessible_organisations, set(&["Hosp1"]));
        assert_eq!(signs.inaccessible_organisations, set(&["Hosp2"]));
        assert!(signs.has_permission);

        let procedures = evaluated.get(RelationType::AssociatedProcedure).unwrap();
        assert!(!procedures.has_permission);
        assert_eq!(procedures.inaccessible_organisations, set(&["Hosp2"]));
    }

    #[test]
    fn view_hides_inaccessible_triples() {
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp1", &[]);
        let view = evaluated.view(RelationType::DiagnosticSign, "Hosp1").unwrap();
        assert_eq!(view.records.len(), 1);
        assert!(view.records.iter().all(|t| t.organisation == "Hosp1"));
    }

    #[test]
    fn view_without_access_names_required_organisations() {
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp3", &[]);
        let err = evaluated
            .view(RelationType::AssociatedProcedure, "Hosp3")
            .unwrap_err();
        assert!(matches!(err, ConsultError::AccessDenied { .. }));
        assert_eq!(err.required_organisations(), ["Hosp2".to_string()]);
    }

    #[test]
    fn view_requires_matching_evaluation() {
        let built = index();
        let summary = built.get(RelationType::DiagnosticSign).unwrap();
        assert!(matches!(
            PermissionEvaluator::view(summary, "Hosp1"),
            Err(ConsultError::InvalidInput(_))
        ));

        let evaluated = PermissionEvaluator::evaluate(&built, "Hosp1", &[]);
        assert!(matches!(
            evaluated.view(RelationType::DiagnosticSign, "Hosp2"),
            Err(ConsultError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluated.view(RelationType::Medication, "Hosp1"),
            Err(ConsultError::NoKnowledge(RelationType::Medication))
        ));
    }

    #[test]
    fn disclosure_widens_access_within_scope() {
        let shared = disclosure(
            vec![RelationType::DiagnosticSign],
            vec![triple(RelationType::DiagnosticSign, "疼痛", "Hosp2")],
        );
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp1", &[shared]);

        let signs = evaluated.get(RelationType::DiagnosticSign).unwrap();
        assert!(signs.accessible_organisations.is_superset(&set(&["Hosp1", "Hosp2"])));
        assert!(signs.inaccessible_organisations.is_empty());

        let view = evaluated.view(RelationType::DiagnosticSign, "Hosp1").unwrap();
        assert_eq!(view.records.len(), 2);

        assert!(!evaluated
            .get(RelationType::AssociatedProcedure)
            .unwrap()
            .has_permission);
    }

    #[test]
    fn out_of_scope_triples_do_not_widen() {
        let shared = disclosure(
            vec![RelationType::DiagnosticSign],
            vec![triple(RelationType::AssociatedProcedure, "舌下腺切除术", "Hosp2")],
        );
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp1", &[shared]);
        assert!(!evaluated
            .get(RelationType::AssociatedProcedure)
            .unwrap()
            .has_permission);
    }

    #[test]
    fn reapplying_a_disclosure_is_idempotent() {
        let shared = disclosure(
            vec![],
            vec![triple(RelationType::DiagnosticSign, "疼痛", "Hosp2")],
        );
        let once = PermissionEvaluator::evaluate(&index(), "Hosp1", &[shared.clone()]);
        let twice = PermissionEvaluator::evaluate(&index(), "Hosp1", &[shared.clone(), shared]);
        assert_eq!(once, twice);
        assert_eq!(
            once.get(RelationType::DiagnosticSign).unwrap().accessible_organisations,
            set(&["Hosp1", "Hosp2"])
        );
    }

    #[test]
    fn disclosure_only_relations_are_added() {
        let shared = disclosure(
            vec![],
            vec![triple(RelationType::Medication, "阿莫西林", "Hosp4")],
        );
        let evaluated = PermissionEvaluator::evaluate(&index(), "Hosp1", &[shared]);
        let medication = evaluated.get(RelationType::Medication).unwrap();
        assert_eq!(medication.count, 1);
        assert!(medication.has_permission);
        assert_eq!(medication.accessible_organisations, set(&["Hosp4"]));
    }

    #[test]
    fn access_only_grows_with_more_disclosures() {
        let first = disclosure(
            vec![],
            vec![triple(RelationType::AssociatedProcedure, "舌下腺切除术", "Hosp2")],
        );
        let second = disclosure(
            vec![],
            vec![triple(RelationType::DiagnosticSign, "麻木", "Hosp5")],
        );
        let before = PermissionEvaluator::evaluate(&index(), "Hosp3", &[first.clone()]);
        let after = PermissionEvaluator::evaluate(&index(), "Hosp3", &[first, second]);

        for summary in before.summaries() {
            let later = after.get(summary.relation).unwrap();
            assert!(later
                .accessible_organisations
                .is_superset(&summary.accessible_organisations));
        }
    }
}
