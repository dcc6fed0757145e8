//! # Consult Core
//!
//! Core logic of the cross-organisation collaborative-diagnosis workflow.
//!
//! Data flows through the components in this order:
//! - [`IdentityCorrelator`](consult_correlation::IdentityCorrelator) hashes subject text into a
//!   correlation key
//! - [`KnowledgeIndex`] groups the subject's knowledge fragments by relation type
//! - [`PermissionEvaluator`] decides which owning organisations an actor may see
//! - [`CollaborationRequestManager`] raises and terminates requests for disclosure
//! - [`KnowledgeShareBroker`] and [`DiagnosisOpinionLedger`] record disclosures and opinions,
//!   which feed back into the next evaluation
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.
//! Remote persistence sits behind [`CollaborationStore`].

pub mod actor;
pub mod collaboration;
pub mod config;
pub mod constants;
pub mod error;
pub mod knowledge;
pub mod service;
pub mod store;

pub use actor::Actor;
pub use collaboration::{
    CollaborationRequest, CollaborationRequestManager, DiagnosisOpinion, DiagnosisOpinionLedger,
    KnowledgeShareBroker, NewRequest, OpinionDraft, RelationScope, RequestFilter, RequestStatus,
    RequestTargets, SharedKnowledgeBundle,
};
pub use config::CoreConfig;
pub use error::{ConsultError, ConsultResult, ErrorKind};
pub use knowledge::{
    Disclosure, KnowledgeIndex, PermissionEvaluator, RelationTypeSummary, RelationView,
};
pub use service::CollaborationService;
pub use store::{CollaborationStore, MemoryStore};

pub use consult_correlation::{CorrelationId, IdentityCorrelator};
pub use consult_uuid::{TimestampId, UuidService};
pub use consult_wire::{KnowledgeTriple, RawRecord, RelationType, TripleSubmission};
