//! Collaborator error type.

use thiserror::Error;

/// Errors returned by an external collaborator.
///
/// The engine does not retry either variant; the distinction is kept so the
/// failure recorded on the action says whether a later re-trigger could help.
#[derive(Debug, Error, Clone)]
pub enum CollaboratorError {
    /// Network or availability problem on the other side.
    #[error("transient collaborator error: {0}")]
    Transient(String),

    /// The request can never succeed as issued.
    #[error("fatal collaborator error: {0}")]
    Fatal(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.status().is_some_and(|s| s.is_server_error()) {
            Self::Transient(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}
