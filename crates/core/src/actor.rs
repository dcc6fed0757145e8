//! The acting user of a collaboration operation.

use crate::error::{ConsultError, ConsultResult};
use consult_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// A clinician acting on behalf of an organisation (hospital).
///
/// Every permission decision keys on `organisation`; every ownership decision (who initiated,
/// who was targeted) keys on `actor_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier of the clinician.
    pub actor_id: NonEmptyText,

    /// Name of the organisation the clinician acts for.
    pub organisation: NonEmptyText,

    /// Department within the organisation, recorded on opinions.
    #[serde(default)]
    pub department: Option<NonEmptyText>,
}

impl Actor {
    /// Build an actor from raw strings, rejecting blank ids and organisations.
    pub fn new(actor_id: impl AsRef<str>, organisation: impl AsRef<str>) -> ConsultResult<Self> {
        let actor_id = NonEmptyText::new(actor_id)
            .map_err(|_| ConsultError::InvalidInput("actor_id must not be empty".into()))?;
        let organisation = NonEmptyText::new(organisation)
            .map_err(|_| ConsultError::InvalidInput("organisation must not be empty".into()))?;

        Ok(Self {
            actor_id,
            organisation,
            department: None,
        })
    }

    /// Attach a department. Blank input leaves the department unset.
    pub fn with_department(mut self, department: impl AsRef<str>) -> Self {
        self.department = NonEmptyText::new(department).ok();
        self
    }

    pub fn actor_id(&self) -> &str {
        self.actor_id.as_str()
    }

    pub fn organisation(&self) -> &str {
        self.organisation.as_str()
    }
}
