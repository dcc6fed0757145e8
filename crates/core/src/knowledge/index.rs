//! Aggregation of raw knowledge records into per-relation summaries.

use crate::config::CoreConfig;
use consult_types::NonEmptyText;
use consult_wire::{
    DecodedFragment, KnowledgePayload, KnowledgeTriple, RawRecord, RecordDecode, RelationType,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate over one relation type for one subject.
///
/// Produced by [`KnowledgeIndex::build`] with empty access sets; the access fields are only
/// meaningful once [`PermissionEvaluator::evaluate`](super::PermissionEvaluator::evaluate) has
/// filled them in for a specific organisation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationTypeSummary {
    pub relation: RelationType,
    pub count: usize,
    pub organisations: BTreeSet<String>,
    pub accessible_organisations: BTreeSet<String>,
    pub inaccessible_organisations: BTreeSet<String>,
    pub has_permission: bool,
    pub share_count: u64,
    /// Backing triples. Never hand these out directly: go through a permission view.
    #[serde(skip)]
    pub records: Vec<KnowledgeTriple>,
    /// Organisation the access sets were computed for.
    pub evaluated_for: Option<String>,
}

impl RelationTypeSummary {
    pub(crate) fn empty(relation: RelationType) -> Self {
        Self {
            relation,
            count: 0,
            organisations: BTreeSet::new(),
            accessible_organisations: BTreeSet::new(),
            inaccessible_organisations: BTreeSet::new(),
            has_permission: false,
            share_count: 0,
            records: Vec::new(),
            evaluated_for: None,
        }
    }

    fn push(&mut self, triple: KnowledgeTriple) {
        self.organisations.insert(triple.organisation.to_string());
        self.records.push(triple);
        self.count = self.records.len();
    }
}

/// Knowledge about one subject, grouped by relation type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnowledgeIndex {
    pub(crate) summaries: BTreeMap<RelationType, RelationTypeSummary>,
    skipped: usize,
}

impl KnowledgeIndex {
    /// Builds the index from raw records.
    ///
    /// Pure: the same records and configuration always yield the same index. Records that do
    /// not decode, or that lack a head, relation or tail, are skipped and counted.
    pub fn build(records: &[RawRecord], cfg: &CoreConfig) -> Self {
        let mut index = KnowledgeIndex::default();

        for record in records {
            let fragment = match KnowledgePayload::decode(&record.payload) {
                RecordDecode::Fragment(fragment) => fragment,
                RecordDecode::Skipped(reason) => {
                    tracing::debug!(record_id = %record.record_id, %reason, "skipping record");
                    index.skipped += 1;
                    continue;
                }
            };

            let Some(organisation) = resolve_organisation(&fragment, cfg) else {
                index.skipped += 1;
                continue;
            };

            index
                .summaries
                .entry(fragment.relation)
                .or_insert_with(|| RelationTypeSummary::empty(fragment.relation))
                .push(KnowledgeTriple {
                    head: fragment.head,
                    relation: fragment.relation,
                    tail: fragment.tail,
                    organisation,
                    created_time: record.created_time,
                });
        }

        index
    }

    pub fn get(&self, relation: RelationType) -> Option<&RelationTypeSummary> {
        self.summaries.get(&relation)
    }

    /// Summaries in [`RelationType`] order.
    pub fn summaries(&self) -> impl Iterator<Item = &RelationTypeSummary> {
        self.summaries.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = RelationType> + '_ {
        self.summaries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    /// Number of records dropped during [`KnowledgeIndex::build`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Groups the same triples by owning organisation, oldest first within each group.
    ///
    /// This is the per-visit view: each organisation corresponds to one hospital's records.
    pub fn by_organisation(&self) -> BTreeMap<String, Vec<KnowledgeTriple>> {
        let mut groups: BTreeMap<String, Vec<KnowledgeTriple>> = BTreeMap::new();
        for triple in self.summaries.values().flat_map(|s| s.records.iter()) {
            groups
                .entry(triple.organisation.to_string())
                .or_default()
                .push(triple.clone());
        }
        for triples in groups.values_mut() {
            triples.sort_by_key(|t| t.created_time);
        }
        groups
    }

    /// Overwrites each summary's share count from a subject-wide tally.
    pub fn apply_share_counts(&mut self, counts: &BTreeMap<RelationType, u64>) {
        for summary in self.summaries.values_mut() {
            summary.share_count = counts.get(&summary.relation).copied().unwrap_or(0);
        }
    }
}

/// Section first, then organisation, then the unknown label. Placeholders count as absent.
fn resolve_organisation(fragment: &DecodedFragment, cfg: &CoreConfig) -> Option<NonEmptyText> {
    [fragment.section.as_deref(), fragment.organisation.as_deref()]
        .into_iter()
        .flatten()
        .find(|value| !cfg.is_no_organisation(value))
        .or(Some(cfg.unknown_organisation_label()))
        .and_then(|value| NonEmptyText::new(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, payload: &str) -> RawRecord {
        RawRecord {
            record_id: id.into(),
            payload: payload.into(),
            created_time: Utc.with_ymd_and_hms(2026, 1, 11, 14, 35, 22).unwrap(),
        }
    }

    fn cfg() -> CoreConfig {
        CoreConfig::default()
    }

    #[test]
    fn groups_by_relation_and_counts_organisations() {
        let records = vec![
            record("1", r#"{"head":"舌下腺肿瘤","relation":"diagnostic-sign","tail":"肿块","section":"Hosp1"}"#),
            record("2", r#"{"head":"舌下腺肿瘤","relation":"diagnostic-sign","tail":"疼痛","section":"Hosp2"}"#),
            record("3", r#"{"head":"舌下腺肿瘤","relation":"diagnostic-sign","tail":"麻木","section":"Hosp2"}"#),
            record("4", r#"{"head":"舌下腺肿瘤","relation":"相关手术","tail":"舌下腺切除术","organization":"Hosp3"}"#),
        ];
        let index = KnowledgeIndex::build(&records, &cfg());

        let signs = index.get(RelationType::DiagnosticSign).unwrap();
        assert_eq!(signs.count, 3);
        assert_eq!(
            signs.organisations,
            BTreeSet::from(["Hosp1".to_string(), "Hosp2".to_string()])
        );
        assert!(signs.accessible_organisations.is_empty());
        assert!(!signs.has_permission);
        assert!(signs.evaluated_for.is_none());

        let procedures = index.get(RelationType::AssociatedProcedure).unwrap();
        assert_eq!(procedures.count, 1);
        assert_eq!(index.relations().count(), 2);
        assert_eq!(index.skipped(), 0);
    }

    #[test]
    fn skips_undecodable_and_incomplete_records() {
        let records = vec![
            record("bad", "not json at all"),
            record("partial", r#"{"head":"a","relation":"treatment"}"#),
            record("unknown", r#"{"head":"a","relation":"cures","tail":"b"}"#),
            record("ok", r#"{"head":"a","relation":"treatment","tail":"b","section":"Hosp1"}"#),
        ];
        let index = KnowledgeIndex::build(&records, &cfg());
        assert_eq!(index.skipped(), 3);
        assert_eq!(index.get(RelationType::Treatment).unwrap().count, 1);
    }

    #[test]
    fn organisation_fallback_chain() {
        let records = vec![
            record("s", r#"{"head":"a","relation":"treatment","tail":"1","section":"Hosp1","organization":"Hosp9"}"#),
            record("p", r#"{"head":"a","relation":"treatment","tail":"2","section":"无","organization":"Hosp2"}"#),
            record("o", r#"{"head":"a","relation":"treatment","tail":"3","organisation":"Hosp3"}"#),
            record("u", r#"{"head":"a","relation":"treatment","tail":"4","section":"null","organization":"无"}"#),
            record("n", r#"{"head":"a","relation":"treatment","tail":"5"}"#),
        ];
        let index = KnowledgeIndex::build(&records, &cfg());
        let owners: Vec<&str> = index
            .get(RelationType::Treatment)
            .unwrap()
            .records
            .iter()
            .map(|t| t.organisation.as_str())
            .collect();
        assert_eq!(
            owners,
            vec![
                "Hosp1",
                "Hosp2",
                "Hosp3",
                "unknown organisation",
                "unknown organisation"
            ]
        );
    }

    #[test]
    fn build_is_deterministic() {
        let records = vec![
            record("1", r#"{"head":"a","relation":"medication","tail":"x","section":"Hosp1"}"#),
            record("2", r#"{"head":"a","relation":"examination","tail":"y","section":"Hosp2"}"#),
        ];
        assert_eq!(
            KnowledgeIndex::build(&records, &cfg()),
            KnowledgeIndex::build(&records, &cfg())
        );
    }

    #[test]
    fn by_organisation_regroups_the_same_triples() {
        let records = vec![
            record("1", r#"{"head":"a","relation":"medication","tail":"x","section":"Hosp1"}"#),
            record("2", r#"{"head":"a","relation":"examination","tail":"y","section":"Hosp1"}"#),
            record("3", r#"{"head":"a","relation":"examination","tail":"z","section":"Hosp2"}"#),
        ];
        let groups = KnowledgeIndex::build(&records, &cfg()).by_organisation();
        assert_eq!(groups["Hosp1"].len(), 2);
        assert_eq!(groups["Hosp2"].len(), 1);
    }

    #[test]
    fn share_counts_default_to_zero() {
        let records = vec![
            record("1", r#"{"head":"a","relation":"medication","tail":"x","section":"Hosp1"}"#),
            record("2", r#"{"head":"a","relation":"examination","tail":"y","section":"Hosp2"}"#),
        ];
        let mut index = KnowledgeIndex::build(&records, &cfg());
        index.apply_share_counts(&BTreeMap::from([(RelationType::Medication, 2)]));
        assert_eq!(index.get(RelationType::Medication).unwrap().share_count, 2);
        assert_eq!(index.get(RelationType::Examination).unwrap().share_count, 0);
    }
}
