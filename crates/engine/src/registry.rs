//! Workflow definitions and collaborator handles the engine is built from.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use collaborators::{DataRetrieval, DocumentGenerator, DocumentValidator};

use crate::{EngineError, dag::validate_workflow, models::WorkflowDefinition};

/// A validated workflow together with its dependency order.
#[derive(Debug, Clone)]
pub struct RegisteredWorkflow {
    pub definition: WorkflowDefinition,
    /// Action ids, each after the actions it runs `after`.
    pub order: Vec<String>,
}

/// Validated workflow definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, RegisteredWorkflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a definition, replacing any with the same name.
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), EngineError> {
        let order = validate_workflow(&definition)?;
        for action in &definition.actions {
            action.describe();
        }
        info!(workflow = %definition.name, actions = order.len(), "workflow registered");
        self.workflows
            .insert(definition.name.clone(), RegisteredWorkflow { definition, order });
        Ok(())
    }

    /// Load one JSON definition file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Definition(format!("cannot read {}: {e}", path.display())))?;
        let definition: WorkflowDefinition = serde_json::from_str(&content)
            .map_err(|e| EngineError::Definition(format!("invalid JSON in {}: {e}", path.display())))?;
        self.register(definition)
    }

    /// Load every `*.json` file in `dir`, or `dir` itself when it is a file.
    pub fn load_path(&mut self, path: &Path) -> Result<usize, EngineError> {
        if path.is_file() {
            self.load_file(path)?;
            return Ok(1);
        }

        let entries = std::fs::read_dir(path)
            .map_err(|e| EngineError::Definition(format!("cannot list {}: {e}", path.display())))?;
        let mut files: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for file in &files {
            self.load_file(file)?;
        }
        Ok(files.len())
    }

    pub fn get(&self, name: &str) -> Result<&RegisteredWorkflow, EngineError> {
        self.workflows
            .get(name)
            .ok_or_else(|| EngineError::UnknownWorkflow(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workflows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

/// External services an action's domain work delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub retrieval: Arc<dyn DataRetrieval>,
    pub generator: Arc<dyn DocumentGenerator>,
    /// Required only by actions that ask for validation.
    pub validator: Option<Arc<dyn DocumentValidator>>,
}
