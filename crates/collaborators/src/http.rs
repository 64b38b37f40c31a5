//! JSON-over-HTTP adapters for deployments where retrieval, generation and
//! validation run as separate services.
//!
//! | adapter           | request                                              | response          |
//! |-------------------|------------------------------------------------------|-------------------|
//! | [`HttpRetrieval`] | `POST {base}/fetch` `{context, start, end}`          | [`ClinicalData`]  |
//! | [`HttpGenerator`] | `POST {base}/generate` `{data, context}`             | `{document}`      |
//! | [`HttpValidator`] | `POST {base}/validate` `{document}`                  | `{valid}`         |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{ClinicalData, CollaboratorError, DataRetrieval, DocumentGenerator, DocumentValidator};

/// Shared request plumbing for the three adapters.
#[derive(Debug, Clone)]
struct JsonEndpoint {
    client: reqwest::Client,
    url: String,
}

impl JsonEndpoint {
    fn new(base_url: &str, path: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: format!("{}/{path}", base_url.trim_end_matches('/')),
        }
    }

    async fn post<T: DeserializeOwned>(&self, body: &Value) -> Result<T, CollaboratorError> {
        debug!(url = %self.url, "calling collaborator");
        let response = self.client.post(&self.url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("status {status}: {text}");
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                CollaboratorError::Transient(message)
            } else {
                CollaboratorError::Fatal(message)
            });
        }

        Ok(response.json().await?)
    }
}

/// Remote [`DataRetrieval`].
#[derive(Debug, Clone)]
pub struct HttpRetrieval {
    endpoint: JsonEndpoint,
}

impl HttpRetrieval {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self { endpoint: JsonEndpoint::new(base_url, "fetch", timeout) }
    }
}

#[async_trait]
impl DataRetrieval for HttpRetrieval {
    async fn fetch(
        &self,
        context: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ClinicalData, CollaboratorError> {
        self.endpoint
            .post(&json!({ "context": context, "start": start, "end": end }))
            .await
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    document: String,
}

/// Remote [`DocumentGenerator`].
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    endpoint: JsonEndpoint,
}

impl HttpGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self { endpoint: JsonEndpoint::new(base_url, "generate", timeout) }
    }
}

#[async_trait]
impl DocumentGenerator for HttpGenerator {
    async fn generate(&self, data: &ClinicalData, context: &Value) -> Result<String, CollaboratorError> {
        let response: GenerateResponse = self
            .endpoint
            .post(&json!({ "data": data, "context": context }))
            .await?;
        Ok(response.document)
    }
}

#[derive(Deserialize)]
struct ValidateResponse {
    valid: bool,
}

/// Remote [`DocumentValidator`].
#[derive(Debug, Clone)]
pub struct HttpValidator {
    endpoint: JsonEndpoint,
}

impl HttpValidator {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self { endpoint: JsonEndpoint::new(base_url, "validate", timeout) }
    }
}

#[async_trait]
impl DocumentValidator for HttpValidator {
    async fn validate(&self, document: &str) -> Result<bool, CollaboratorError> {
        let response: ValidateResponse = self.endpoint.post(&json!({ "document": document })).await?;
        Ok(response.valid)
    }
}
