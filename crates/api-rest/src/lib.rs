//! # API REST
//!
//! REST API for the collaborative-diagnosis workflow.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! Uses `api-shared` for request and response bodies. All workflow rules live in `consult-core`;
//! handlers only translate.

#![warn(rust_2018_idioms)]

pub mod convert;
pub mod error;

use api_shared::{
    ActorDto, BundleRes, CancelReq, CloseReq, CloseRes, CreateRequestReq, ErrorRes, EvaluateReq,
    HealthRes, HealthService, KnowledgeRes, ListBundlesRes, ListOpinionsRes, ListRequestsRes,
    OpinionReq, OpinionRes, OrganisationQuery, RequestRes, ShareCountsRes, ShareReq,
    SubjectQuery, SummaryRes, TripleDto, ViewReq,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use consult_core::config::{
    max_triples_from_env_value, placeholders_from_env_value, unknown_label_from_env_value,
};
use consult_core::{
    CollaborationService, ConsultError, CoreConfig, IdentityCorrelator, MemoryStore, NewRequest,
    OpinionDraft, RelationType, RequestTargets,
};
use consult_wire::{KnowledgeSeed, TripleList};
use error::ApiError;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: CollaborationService,
}

impl AppState {
    pub fn new(service: CollaborationService) -> Self {
        Self { service }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        search_knowledge,
        share_counts,
        evaluate_knowledge,
        view_relation,
        create_request,
        list_initiated,
        list_for_organisation,
        list_targeted,
        list_shares,
        submit_share,
        list_opinions,
        submit_opinion,
        close_request,
        cancel_request,
    ),
    components(schemas(
        HealthRes,
        ActorDto,
        EvaluateReq,
        ViewReq,
        TripleDto,
        SummaryRes,
        KnowledgeRes,
        ShareCountsRes,
        CreateRequestReq,
        RequestRes,
        ListRequestsRes,
        CancelReq,
        CloseReq,
        CloseRes,
        ShareReq,
        BundleRes,
        ListBundlesRes,
        OpinionReq,
        OpinionRes,
        ListOpinionsRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router, Swagger UI included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/knowledge", get(search_knowledge))
        .route("/knowledge/share-counts", get(share_counts))
        .route("/knowledge/evaluate", post(evaluate_knowledge))
        .route("/knowledge/view", post(view_relation))
        .route("/requests", post(create_request))
        .route("/requests/initiated/:actor_id", get(list_initiated))
        .route("/requests/organisation/:organisation", get(list_for_organisation))
        .route("/requests/targeted/:actor_id", get(list_targeted))
        .route("/requests/:id/shares", get(list_shares).post(submit_share))
        .route("/requests/:id/opinions", get(list_opinions).post(submit_opinion))
        .route("/requests/:id/close", post(close_request))
        .route("/requests/:id/cancel", post(cancel_request))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves [`CoreConfig`] from the process environment.
///
/// # Environment Variables
/// - `CONSULT_NO_ORG_PLACEHOLDERS`: comma-separated "no organisation" markers
/// - `CONSULT_UNKNOWN_ORG_LABEL`: label for fragments with no resolvable owner
/// - `CONSULT_MAX_SHARE_TRIPLES`: upper bound on triples per share
pub fn config_from_env() -> anyhow::Result<CoreConfig> {
    let placeholders =
        placeholders_from_env_value(std::env::var("CONSULT_NO_ORG_PLACEHOLDERS").ok());
    let unknown_label = unknown_label_from_env_value(std::env::var("CONSULT_UNKNOWN_ORG_LABEL").ok());
    let max_triples = max_triples_from_env_value(std::env::var("CONSULT_MAX_SHARE_TRIPLES").ok())?;
    Ok(CoreConfig::new(placeholders, unknown_label, max_triples)?)
}

/// Loads a seed file of raw knowledge records into `store`. Returns the number of records.
///
/// Subjects are hashed before storage; entries whose subject is blank are skipped.
pub fn seed_store(store: &MemoryStore, text: &str) -> anyhow::Result<usize> {
    let mut loaded = 0;
    for entry in KnowledgeSeed::parse(text)? {
        let subject = IdentityCorrelator::hash(&entry.subject);
        if subject.is_empty() {
            tracing::warn!("Skipping seed entry with a blank subject");
            continue;
        }
        loaded += entry.records.len();
        store.insert_knowledge(subject, entry.records)?;
    }
    Ok(loaded)
}

/// Builds the application state from the environment, seeding from `CONSULT_SEED_FILE` if set.
pub fn state_from_env() -> anyhow::Result<AppState> {
    let cfg = Arc::new(config_from_env()?);
    let store = Arc::new(MemoryStore::new());

    if let Ok(path) = std::env::var("CONSULT_SEED_FILE") {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Failed to read seed file {path}: {e}"))?;
        let loaded = seed_store(&store, &text)?;
        tracing::info!("-- Seeded {} knowledge records from {}", loaded, path);
    }

    Ok(AppState::new(CollaborationService::new(cfg, store)))
}

// ============================================================================
// HEALTH
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

// ============================================================================
// KNOWLEDGE
// ============================================================================

#[utoipa::path(
    get,
    path = "/knowledge",
    params(SubjectQuery),
    responses(
        (status = 200, description = "Per-relation overview without triples", body = KnowledgeRes),
        (status = 400, description = "Blank subject", body = ErrorRes)
    )
)]
/// Overview of what is recorded about a subject: counts and owning organisations only.
#[axum::debug_handler]
async fn search_knowledge(
    State(state): State<AppState>,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<KnowledgeRes>, ApiError> {
    let subject = CollaborationService::correlate(&query.subject)?;
    let index = state.service.search_knowledge(&query.subject)?;
    Ok(Json(convert::knowledge_overview(&subject, &index)))
}

#[utoipa::path(
    get,
    path = "/knowledge/share-counts",
    params(SubjectQuery),
    responses(
        (status = 200, description = "Share events per relation type", body = ShareCountsRes),
        (status = 400, description = "Blank subject", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn share_counts(
    State(state): State<AppState>,
    Query(query): Query<SubjectQuery>,
) -> Result<Json<ShareCountsRes>, ApiError> {
    let subject = CollaborationService::correlate(&query.subject)?;
    let counts = state.service.share_counts(&query.subject)?;
    Ok(Json(ShareCountsRes {
        subject: subject.to_string(),
        counts: counts
            .into_iter()
            .map(|(relation, count)| (relation.tag().to_string(), count))
            .collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/knowledge/evaluate",
    request_body = EvaluateReq,
    responses(
        (status = 200, description = "Summaries evaluated for the actor", body = KnowledgeRes),
        (status = 400, description = "Bad request", body = ErrorRes)
    )
)]
/// Evaluates a subject's knowledge for an actor. Triples appear only for accessible
/// organisations.
#[axum::debug_handler]
async fn evaluate_knowledge(
    State(state): State<AppState>,
    Json(req): Json<EvaluateReq>,
) -> Result<Json<KnowledgeRes>, ApiError> {
    let actor = convert::actor(req.actor)?;
    let subject = CollaborationService::correlate(&req.subject)?;
    let index = state.service.evaluate_for(&actor, &req.subject)?;
    Ok(Json(convert::knowledge_for(
        &subject,
        &index,
        actor.organisation(),
    )))
}

#[utoipa::path(
    post,
    path = "/knowledge/view",
    request_body = ViewReq,
    responses(
        (status = 200, description = "Visible triples of one relation type", body = SummaryRes),
        (status = 403, description = "No accessible organisation", body = ErrorRes),
        (status = 404, description = "Nothing recorded for the relation", body = ErrorRes)
    )
)]
/// Views one relation type. Refuses explicitly, naming the organisations that would need to
/// disclose, instead of returning an empty list.
#[axum::debug_handler]
async fn view_relation(
    State(state): State<AppState>,
    Json(req): Json<ViewReq>,
) -> Result<Json<SummaryRes>, ApiError> {
    let actor = convert::actor(req.actor)?;
    let relation = RelationType::parse(&req.relation).map_err(ConsultError::from)?;
    let index = state.service.evaluate_for(&actor, &req.subject)?;

    let view = index.view(relation, actor.organisation())?;
    let summary = index
        .get(relation)
        .ok_or(ConsultError::NoKnowledge(relation))?;
    Ok(Json(convert::summary(
        summary,
        view.records.iter().map(convert::triple).collect(),
    )))
}

// ============================================================================
// REQUESTS
// ============================================================================

#[utoipa::path(
    post,
    path = "/requests",
    request_body = CreateRequestReq,
    responses(
        (status = 201, description = "Request created", body = RequestRes),
        (status = 400, description = "Bad request", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn create_request(
    State(state): State<AppState>,
    Json(req): Json<CreateRequestReq>,
) -> Result<(StatusCode, Json<RequestRes>), ApiError> {
    let initiator = convert::actor(req.initiator)?;
    let subject = CollaborationService::correlate(&req.subject)?;
    let scope = convert::relations(&req.scope)?;

    let mut new_request = NewRequest::new(
        subject,
        RequestTargets {
            organisations: req.target_organisations,
            actor_ids: req.target_actor_ids,
        },
    )
    .with_scope(scope);
    new_request.subject_label = req.subject_label;
    new_request.description = req.description;
    new_request.attachment = req.attachment;

    let request = state.service.requests().create(&initiator, new_request)?;
    Ok((StatusCode::CREATED, Json(convert::request(&request))))
}

#[utoipa::path(
    get,
    path = "/requests/initiated/{actor_id}",
    params(("actor_id" = String, Path, description = "Initiating actor")),
    responses(
        (status = 200, description = "Requests raised by the actor, newest first", body = ListRequestsRes)
    )
)]
#[axum::debug_handler]
async fn list_initiated(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> Result<Json<ListRequestsRes>, ApiError> {
    let requests = state.service.requests().list_by_initiator(&actor_id)?;
    Ok(Json(ListRequestsRes {
        requests: requests.iter().map(convert::request).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/requests/organisation/{organisation}",
    params(
        ("organisation" = String, Path, description = "Target organisation"),
        OrganisationQuery
    ),
    responses(
        (status = 200, description = "Requests addressed to the organisation, newest first", body = ListRequestsRes)
    )
)]
#[axum::debug_handler]
async fn list_for_organisation(
    State(state): State<AppState>,
    Path(organisation): Path<String>,
    Query(query): Query<OrganisationQuery>,
) -> Result<Json<ListRequestsRes>, ApiError> {
    let requests = state
        .service
        .requests()
        .list_by_target_organisation(&organisation, query.exclude_actor.as_deref())?;
    Ok(Json(ListRequestsRes {
        requests: requests.iter().map(convert::request).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/requests/targeted/{actor_id}",
    params(("actor_id" = String, Path, description = "Target actor")),
    responses(
        (status = 200, description = "Requests naming the actor, newest first", body = ListRequestsRes)
    )
)]
#[axum::debug_handler]
async fn list_targeted(
    State(state): State<AppState>,
    Path(actor_id): Path<String>,
) -> Result<Json<ListRequestsRes>, ApiError> {
    let requests = state.service.requests().list_by_target_actor(&actor_id)?;
    Ok(Json(ListRequestsRes {
        requests: requests.iter().map(convert::request).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/close",
    params(("id" = String, Path, description = "Request id")),
    request_body = CloseReq,
    responses(
        (status = 200, description = "Request completed with a final opinion", body = CloseRes),
        (status = 403, description = "Not the initiator", body = ErrorRes),
        (status = 409, description = "Request already closed or changed concurrently", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn close_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CloseReq>,
) -> Result<Json<CloseRes>, ApiError> {
    let request_id = convert::request_id(&id)?;
    let actor = convert::actor(req.actor)?;
    let draft = OpinionDraft {
        opinion_text: req.opinion_text,
        diagnosis_text: req.diagnosis_text,
        treatment_suggestion: req.treatment_suggestion,
    };

    let (request, opinion) = state.service.requests().close(&request_id, &actor, draft)?;
    Ok(Json(CloseRes {
        request: convert::request(&request),
        opinion: convert::opinion(&opinion),
    }))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/cancel",
    params(("id" = String, Path, description = "Request id")),
    request_body = CancelReq,
    responses(
        (status = 200, description = "Request cancelled", body = RequestRes),
        (status = 403, description = "Not the initiator", body = ErrorRes),
        (status = 409, description = "Request already closed or changed concurrently", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn cancel_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CancelReq>,
) -> Result<Json<RequestRes>, ApiError> {
    let request_id = convert::request_id(&id)?;
    let actor = convert::actor(req.actor)?;
    let request = state.service.requests().cancel(&request_id, &actor)?;
    Ok(Json(convert::request(&request)))
}

// ============================================================================
// SHARES
// ============================================================================

#[utoipa::path(
    get,
    path = "/requests/{id}/shares",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Bundles disclosed against the request", body = ListBundlesRes),
        (status = 404, description = "Unknown request", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_shares(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListBundlesRes>, ApiError> {
    let request_id = convert::request_id(&id)?;
    let bundles = state.service.shares().list(&request_id)?;
    Ok(Json(ListBundlesRes {
        bundles: bundles.iter().map(convert::bundle).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/shares",
    params(("id" = String, Path, description = "Request id")),
    request_body = ShareReq,
    responses(
        (status = 201, description = "Bundle recorded", body = BundleRes),
        (status = 400, description = "Malformed triples or relation out of scope", body = ErrorRes),
        (status = 403, description = "Not a target, or foreign organisation data", body = ErrorRes),
        (status = 409, description = "Request closed", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn submit_share(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ShareReq>,
) -> Result<(StatusCode, Json<BundleRes>), ApiError> {
    let request_id = convert::request_id(&id)?;
    let actor = convert::actor(req.actor)?;
    let triples = TripleList::parse(&req.triples).map_err(ConsultError::from)?;

    let bundle = state.service.shares().share(&request_id, &actor, triples)?;
    Ok((StatusCode::CREATED, Json(convert::bundle(&bundle))))
}

// ============================================================================
// OPINIONS
// ============================================================================

#[utoipa::path(
    get,
    path = "/requests/{id}/opinions",
    params(("id" = String, Path, description = "Request id")),
    responses(
        (status = 200, description = "Opinions in submission order", body = ListOpinionsRes),
        (status = 404, description = "Unknown request", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn list_opinions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListOpinionsRes>, ApiError> {
    let request_id = convert::request_id(&id)?;
    let opinions = state.service.opinions().list(&request_id)?;
    Ok(Json(ListOpinionsRes {
        opinions: opinions.iter().map(convert::opinion).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/requests/{id}/opinions",
    params(("id" = String, Path, description = "Request id")),
    request_body = OpinionReq,
    responses(
        (status = 201, description = "Opinion recorded", body = OpinionRes),
        (status = 403, description = "Not a participant", body = ErrorRes),
        (status = 409, description = "Request closed", body = ErrorRes)
    )
)]
/// Records an opinion. `is_final` routes to the close operation.
#[axum::debug_handler]
async fn submit_opinion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<OpinionReq>,
) -> Result<(StatusCode, Json<OpinionRes>), ApiError> {
    let request_id = convert::request_id(&id)?;
    let actor = convert::actor(req.actor)?;
    let draft = OpinionDraft {
        opinion_text: req.opinion_text,
        diagnosis_text: req.diagnosis_text,
        treatment_suggestion: req.treatment_suggestion,
    };

    let opinion = state
        .service
        .submit_opinion(&request_id, &actor, draft, req.is_final)?;
    Ok((StatusCode::CREATED, Json(convert::opinion(&opinion))))
}
