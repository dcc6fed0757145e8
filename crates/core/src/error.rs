use crate::collaboration::RequestStatus;
use consult_uuid::TimestampId;
use consult_wire::RelationType;

/// Broad category of a [`ConsultError`].
///
/// API layers map these to status codes; callers use them to decide what to show the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The backing service could not be reached. The only retryable kind.
    Transport,
    /// Input rejected before any store call.
    Validation,
    /// The actor may not see or disclose the data in question.
    Permission,
    /// The request is in a terminal state.
    IllegalState,
    NotFound,
    /// A concurrent writer changed the request first.
    Conflict,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("subject is empty: no correlation key can be derived from it")]
    EmptySubject,
    #[error("cannot target self: actor {0} is the initiator")]
    SelfTarget(String),
    #[error("relation {relation} is outside the request scope")]
    OutOfScope { relation: RelationType },

    #[error(
        "access denied for {relation}: requires disclosure from {}",
        .required_organisations.join(", ")
    )]
    AccessDenied {
        relation: RelationType,
        required_organisations: Vec<String>,
    },
    #[error(
        "cannot disclose data owned by {}: an actor may only share their own organisation's data",
        .organisations.join(", ")
    )]
    ForeignDisclosure { organisations: Vec<String> },
    #[error("actor {actor_id} is not a participant of request {request_id}")]
    NotParticipant {
        actor_id: String,
        request_id: TimestampId,
    },
    #[error("only the initiator may {action} request {request_id}")]
    NotInitiator {
        action: &'static str,
        request_id: TimestampId,
    },

    #[error("request {request_id} is closed ({status})")]
    RequestClosed {
        request_id: TimestampId,
        status: RequestStatus,
    },

    #[error("request not found: {0}")]
    RequestNotFound(TimestampId),
    #[error("no knowledge recorded for relation {0}")]
    NoKnowledge(RelationType),

    #[error("version conflict on request {request_id}: expected {expected}, found {found}")]
    VersionConflict {
        request_id: TimestampId,
        expected: u64,
        found: u64,
    },

    #[error("backing service unavailable: {0}")]
    Unavailable(String),

    #[error("wire error: {0}")]
    Wire(#[from] consult_wire::WireError),
    #[error("identifier error: {0}")]
    Uuid(#[from] consult_uuid::UuidError),
}

impl ConsultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsultError::InvalidInput(_)
            | ConsultError::EmptySubject
            | ConsultError::SelfTarget(_)
            | ConsultError::OutOfScope { .. }
            | ConsultError::Wire(_)
            | ConsultError::Uuid(_) => ErrorKind::Validation,
            ConsultError::AccessDenied { .. }
            | ConsultError::ForeignDisclosure { .. }
            | ConsultError::NotParticipant { .. }
            | ConsultError::NotInitiator { .. } => ErrorKind::Permission,
            ConsultError::RequestClosed { .. } => ErrorKind::IllegalState,
            ConsultError::RequestNotFound(_) | ConsultError::NoKnowledge(_) => {
                ErrorKind::NotFound
            }
            ConsultError::VersionConflict { .. } => ErrorKind::Conflict,
            ConsultError::Unavailable(_) => ErrorKind::Transport,
        }
    }

    /// Whether the caller may retry the same operation unchanged. Nothing retries automatically.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Organisations whose disclosure would lift a permission error, if any.
    pub fn required_organisations(&self) -> &[String] {
        match self {
            ConsultError::AccessDenied {
                required_organisations,
                ..
            } => required_organisations,
            ConsultError::ForeignDisclosure { organisations } => organisations,
            _ => &[],
        }
    }
}

pub type ConsultResult<T> = std::result::Result<T, ConsultError>;
