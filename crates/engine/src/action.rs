//! Domain work performed by each action kind once its gates are open.

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use collaborators::CollaboratorError;
use db::models::WorkflowInstanceRow;

use crate::{models::ActionKind, registry::Collaborators};

/// Why domain work failed.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// The validator checked the document and refused it.
    #[error("generated document failed validation")]
    Rejected { document: String },

    #[error("lookback of {0} hours does not fit the calendar")]
    LookbackOutOfRange(u32),

    #[error("action asks for validation but no validator is configured")]
    NoValidator,

    #[error("domain work timed out after {0:?}")]
    TimedOut(std::time::Duration),
}

/// A document produced by domain work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedReport {
    pub document: String,
    /// `None` when the action did not ask for validation.
    pub valid: Option<bool>,
}

/// Run the work for `kind` on behalf of `instance`.
pub async fn perform(
    kind: &ActionKind,
    instance: &WorkflowInstanceRow,
    collaborators: &Collaborators,
) -> Result<Option<GeneratedReport>, DomainError> {
    match kind {
        ActionKind::Checkpoint => Ok(None),
        ActionKind::CreateReport { lookback_hours, validate } => {
            let end = Utc::now();
            let start = Duration::try_hours(i64::from(*lookback_hours))
                .and_then(|lookback| end.checked_sub_signed(lookback))
                .ok_or(DomainError::LookbackOutOfRange(*lookback_hours))?;

            debug!(%start, %end, "fetching clinical data");
            let data = collaborators.retrieval.fetch(&instance.context, start, end).await?;
            debug!(resources = data.resources.len(), fhir_version = %data.fhir_version, "clinical data fetched");

            let document = collaborators.generator.generate(&data, &instance.context).await?;
            info!(bytes = document.len(), "report generated");

            let valid = if *validate {
                let validator = collaborators.validator.as_ref().ok_or(DomainError::NoValidator)?;
                if !validator.validate(&document).await? {
                    return Err(DomainError::Rejected { document });
                }
                Some(true)
            } else {
                None
            };

            Ok(Some(GeneratedReport { document, valid }))
        }
    }
}
