//! Test doubles for the collaborator traits.
//!
//! Each mock records every call it receives and returns a
//! programmer-specified result.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{ClinicalData, CollaboratorError, DataRetrieval, DocumentGenerator, DocumentValidator};

/// Behaviour injected into a mock at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour<T> {
    Return(T),
    FailTransient(String),
    FailFatal(String),
}

impl<T: Clone> MockBehaviour<T> {
    fn result(&self) -> Result<T, CollaboratorError> {
        match self {
            Self::Return(v)         => Ok(v.clone()),
            Self::FailTransient(m)  => Err(CollaboratorError::Transient(m.clone())),
            Self::FailFatal(m)      => Err(CollaboratorError::Fatal(m.clone())),
        }
    }
}

/// Mock [`DataRetrieval`]; records the requested windows.
pub struct MockRetrieval {
    pub behaviour: MockBehaviour<ClinicalData>,
    pub calls: Arc<Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>>,
}

impl MockRetrieval {
    /// Always succeeds with `data`.
    pub fn returning(data: ClinicalData) -> Self {
        Self { behaviour: MockBehaviour::Return(data), calls: Arc::default() }
    }

    pub fn failing_transient(msg: impl Into<String>) -> Self {
        Self { behaviour: MockBehaviour::FailTransient(msg.into()), calls: Arc::default() }
    }

    pub fn failing_fatal(msg: impl Into<String>) -> Self {
        Self { behaviour: MockBehaviour::FailFatal(msg.into()), calls: Arc::default() }
    }

    /// Number of times `fetch` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Windows passed to `fetch`, in call order.
    pub fn windows(&self) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataRetrieval for MockRetrieval {
    async fn fetch(
        &self,
        _context: &Value,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ClinicalData, CollaboratorError> {
        self.calls.lock().unwrap().push((start, end));
        self.behaviour.result()
    }
}

/// Mock [`DocumentGenerator`].
pub struct MockGenerator {
    pub behaviour: MockBehaviour<String>,
    pub calls: Arc<Mutex<Vec<ClinicalData>>>,
}

impl MockGenerator {
    pub fn returning(document: impl Into<String>) -> Self {
        Self { behaviour: MockBehaviour::Return(document.into()), calls: Arc::default() }
    }

    pub fn failing_fatal(msg: impl Into<String>) -> Self {
        Self { behaviour: MockBehaviour::FailFatal(msg.into()), calls: Arc::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentGenerator for MockGenerator {
    async fn generate(&self, data: &ClinicalData, _context: &Value) -> Result<String, CollaboratorError> {
        self.calls.lock().unwrap().push(data.clone());
        self.behaviour.result()
    }
}

/// Mock [`DocumentValidator`].
pub struct MockValidator {
    pub behaviour: MockBehaviour<bool>,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockValidator {
    pub fn accepting() -> Self {
        Self { behaviour: MockBehaviour::Return(true), calls: Arc::default() }
    }

    pub fn rejecting() -> Self {
        Self { behaviour: MockBehaviour::Return(false), calls: Arc::default() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentValidator for MockValidator {
    async fn validate(&self, document: &str) -> Result<bool, CollaboratorError> {
        self.calls.lock().unwrap().push(document.to_owned());
        self.behaviour.result()
    }
}
