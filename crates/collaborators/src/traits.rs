//! Collaborator contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CollaboratorError;

/// Clinical resources gathered for one reporting window.
///
/// The engine never looks inside `resources`; it only hands the bundle from
/// the retrieval collaborator to the document generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalData {
    pub fhir_version: String,
    pub resources: Vec<Value>,
}

/// Pulls clinical resources for the launch context in `context`.
#[async_trait]
pub trait DataRetrieval: Send + Sync {
    async fn fetch(
        &self,
        context: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ClinicalData, CollaboratorError>;
}

/// Renders a clinical document from gathered data.
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(&self, data: &ClinicalData, context: &Value) -> Result<String, CollaboratorError>;
}

/// Schema and rule-set validation of a generated document.
///
/// `Ok(false)` means the document was checked and rejected; `Err` means the
/// check itself could not run.
#[async_trait]
pub trait DocumentValidator: Send + Sync {
    async fn validate(&self, document: &str) -> Result<bool, CollaboratorError>;
}
