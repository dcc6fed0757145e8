//! Core types to response bodies, and request bodies to core inputs.

use crate::error::ApiError;
use api_shared::{
    ActorDto, BundleRes, KnowledgeRes, OpinionRes, RequestRes, SummaryRes, TripleDto,
};
use consult_core::{
    Actor, CollaborationRequest, ConsultError, CorrelationId, DiagnosisOpinion, KnowledgeIndex,
    KnowledgeTriple, RelationType, RelationTypeSummary, SharedKnowledgeBundle, TimestampId,
};
use std::collections::BTreeSet;

pub fn actor(dto: ActorDto) -> Result<Actor, ApiError> {
    let actor = Actor::new(&dto.actor_id, &dto.organisation)?;
    Ok(match dto.department {
        Some(department) => actor.with_department(department),
        None => actor,
    })
}

pub fn request_id(raw: &str) -> Result<TimestampId, ApiError> {
    raw.parse::<TimestampId>()
        .map_err(|e| ApiError(ConsultError::from(e)))
}

pub fn relations(tags: &[String]) -> Result<Vec<RelationType>, ApiError> {
    tags.iter()
        .map(|tag| RelationType::parse(tag).map_err(|e| ApiError(ConsultError::from(e))))
        .collect()
}

pub fn triple(t: &KnowledgeTriple) -> TripleDto {
    TripleDto {
        head: t.head.to_string(),
        relation: t.relation.tag().to_string(),
        tail: t.tail.to_string(),
        organisation: t.organisation.to_string(),
        created_time: t.created_time.to_rfc3339(),
    }
}

pub fn request(r: &CollaborationRequest) -> RequestRes {
    RequestRes {
        request_id: r.request_id.to_string(),
        initiator_actor_id: r.initiator_actor_id.to_string(),
        initiator_organisation: r.initiator_organisation.to_string(),
        subject: r.subject.to_string(),
        subject_label: r.subject_label.as_ref().map(|v| v.to_string()),
        target_organisations: r.target_organisations.iter().map(|v| v.to_string()).collect(),
        target_actor_ids: r.target_actor_ids.iter().map(|v| v.to_string()).collect(),
        scope: Vec::<RelationType>::from(r.scope.clone())
            .into_iter()
            .map(|rel| rel.tag().to_string())
            .collect(),
        description: r.description.as_ref().map(|v| v.to_string()),
        attachment: r.attachment.as_ref().map(|v| v.to_string()),
        status: r.status.to_string(),
        version: r.version,
        created_time: r.created_time.to_rfc3339(),
    }
}

pub fn bundle(b: &SharedKnowledgeBundle) -> BundleRes {
    BundleRes {
        share_id: b.share_id.to_string(),
        request_id: b.request_id.to_string(),
        sharing_actor_id: b.sharing_actor_id.to_string(),
        sharing_organisation: b.sharing_organisation.to_string(),
        triples: b.triples.iter().map(triple).collect(),
        created_time: b.created_time.to_rfc3339(),
    }
}

pub fn opinion(o: &DiagnosisOpinion) -> OpinionRes {
    OpinionRes {
        opinion_id: o.opinion_id.to_string(),
        request_id: o.request_id.to_string(),
        actor_id: o.actor_id.to_string(),
        organisation: o.organisation.to_string(),
        department: o.department.as_ref().map(|v| v.to_string()),
        opinion_text: o.opinion_text.to_string(),
        diagnosis_text: o.diagnosis_text.as_ref().map(|v| v.to_string()),
        treatment_suggestion: o.treatment_suggestion.as_ref().map(|v| v.to_string()),
        created_time: o.created_time.to_rfc3339(),
        is_final: o.is_final,
    }
}

pub fn summary(s: &RelationTypeSummary, records: Vec<TripleDto>) -> SummaryRes {
    let list = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>();
    SummaryRes {
        relation: s.relation.tag().to_string(),
        display_name: s.relation.display_name().to_string(),
        count: s.count,
        organisations: list(&s.organisations),
        accessible_organisations: list(&s.accessible_organisations),
        inaccessible_organisations: list(&s.inaccessible_organisations),
        has_permission: s.has_permission,
        share_count: s.share_count,
        records,
    }
}

/// Summaries without any triples, for callers that have not been evaluated.
pub fn knowledge_overview(subject: &CorrelationId, index: &KnowledgeIndex) -> KnowledgeRes {
    KnowledgeRes {
        subject: subject.to_string(),
        evaluated_for: None,
        skipped_records: index.skipped(),
        summaries: index.summaries().map(|s| summary(s, Vec::new())).collect(),
    }
}

/// Summaries evaluated for `organisation`, carrying only the triples it may see.
pub fn knowledge_for(
    subject: &CorrelationId,
    index: &KnowledgeIndex,
    organisation: &str,
) -> KnowledgeRes {
    let summaries = index
        .summaries()
        .map(|s| {
            let records = index
                .view(s.relation, organisation)
                .map(|view| view.records.iter().map(triple).collect())
                .unwrap_or_default();
            summary(s, records)
        })
        .collect();

    KnowledgeRes {
        subject: subject.to_string(),
        evaluated_for: Some(organisation.to_string()),
        skipped_records: index.skipped(),
        summaries,
    }
}
