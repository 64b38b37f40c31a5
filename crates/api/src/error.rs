//! Mapping engine failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use engine::EngineError;

/// An [`EngineError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            EngineError::InstanceNotFound(_)
            | EngineError::UnknownWorkflow(_)
            | EngineError::UnknownAction { .. } => StatusCode::NOT_FOUND,
            EngineError::Scheduling { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::DomainExecution { .. } => StatusCode::BAD_GATEWAY,
            EngineError::StateCorruption(_)
            | EngineError::InvalidTransition { .. }
            | EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
