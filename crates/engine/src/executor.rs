//! The event-condition-action engine.
//!
//! `Engine` runs one action of one workflow instance at a time:
//! 1. Loads the instance and decodes its execution state.
//! 2. Checks every precondition against the instance context.
//! 3. Checks that every `after` predecessor has completed.
//! 4. If the action has a timing spec and has not started, books a deferred
//!    job, persists `SCHEDULED` and returns.
//! 5. Otherwise performs the domain work and persists `COMPLETED` or `FAILED`.
//!
//! The whole cycle holds a per-instance lock, so concurrent triggers for the
//! same instance never interleave their read-modify-write of the state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use db::{models::{ReportRow, WorkflowInstanceRow}, DbError, InstanceStore};
use queue::{JobHandler, ScheduledJob};

use crate::{
    EngineError,
    action::{self, DomainError},
    models::{ActionDefinition, TimingSpec},
    registry::{Collaborators, WorkflowRegistry},
    resolver,
    scheduler::TimingScheduler,
    state::{ActionStatus, ExecutionState},
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of deferred jobs handled at the same time.
    pub max_concurrent_jobs: usize,
    /// Upper bound on one action's domain work; `None` waits indefinitely.
    pub domain_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
            domain_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why an invocation stopped before scheduling or domain work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum BlockReason {
    /// Kinds of the preconditions that did not hold.
    Preconditions { unmet: Vec<String> },
    /// `after` predecessors that have not completed.
    Dependencies { waiting_on: Vec<String> },
}

/// What one invocation of an action did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecuteOutcome {
    /// A gate is closed; nothing changed.
    Blocked { reason: BlockReason },
    /// A deferred job was booked and `SCHEDULED` persisted.
    Scheduled { job: ScheduledJob },
    /// A job is already booked and not yet due; nothing changed.
    Pending { due: Option<DateTime<Utc>> },
    /// Domain work succeeded.
    Completed,
    /// The action had already reached a terminal status.
    AlreadyFinished { status: ActionStatus },
    /// A timer fired for a job the state no longer refers to.
    StaleJob,
}

/// Per-action result of [`Engine::trigger`].
#[derive(Debug)]
pub struct ActionResult {
    pub action_id: String,
    pub outcome: Result<ExecuteOutcome, EngineError>,
}

/// Who asked for the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// An external clinical event.
    Event,
    /// The timer of the given job.
    Timer(Uuid),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs the execute protocol for workflow instances.
///
/// Everything the engine needs is injected at construction; share it behind
/// an `Arc` between the API and the job worker.
pub struct Engine {
    store: Arc<dyn InstanceStore>,
    scheduler: Arc<dyn TimingScheduler>,
    registry: WorkflowRegistry,
    collaborators: Collaborators,
    config: EngineConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        store: Arc<dyn InstanceStore>,
        scheduler: Arc<dyn TimingScheduler>,
        registry: WorkflowRegistry,
        collaborators: Collaborators,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            scheduler,
            registry,
            collaborators,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a new reporting episode for `workflow`.
    #[instrument(skip(self, context))]
    pub async fn create_instance(
        &self,
        workflow: &str,
        context: Value,
        fhir_version: &str,
    ) -> Result<WorkflowInstanceRow, EngineError> {
        self.registry.get(workflow)?;
        let row = self
            .store
            .create_instance(WorkflowInstanceRow::new(workflow, context, fhir_version))
            .await?;
        info!(instance_id = %row.id, "workflow instance created");
        Ok(row)
    }

    pub async fn instance(&self, instance_id: Uuid) -> Result<WorkflowInstanceRow, EngineError> {
        self.store.get_instance(instance_id).await.map_err(|e| match e {
            DbError::NotFound { .. } => EngineError::InstanceNotFound(instance_id),
            other => other.into(),
        })
    }

    /// Current execution state of an instance.
    pub async fn state(&self, instance_id: Uuid) -> Result<ExecutionState, EngineError> {
        ExecutionState::decode(&self.instance(instance_id).await?.state)
    }

    /// Every instance, newest first.
    pub async fn instances(&self) -> Result<Vec<WorkflowInstanceRow>, EngineError> {
        Ok(self.store.list_instances().await?)
    }

    pub async fn reports(&self, instance_id: Uuid) -> Result<Vec<ReportRow>, EngineError> {
        Ok(self.store.list_reports(instance_id).await?)
    }

    /// Run one action in response to an external event.
    ///
    /// Re-running an action that is already scheduled (and not yet due) or
    /// finished only re-checks its gates.
    #[instrument(skip(self))]
    pub async fn execute(&self, instance_id: Uuid, action_id: &str) -> Result<ExecuteOutcome, EngineError> {
        self.run_locked(instance_id, action_id, Origin::Event).await
    }

    /// Run the action a deferred job was booked for, against freshly loaded state.
    #[instrument(skip(self, job), fields(job_id = %job.id, instance_id = %job.instance_id, action_id = %job.action_id))]
    pub async fn fire(&self, job: &ScheduledJob) -> Result<ExecuteOutcome, EngineError> {
        info!("deferred job fired");
        self.run_locked(job.instance_id, &job.action_id, Origin::Timer(job.id)).await
    }

    /// Offer a clinical event to every action of the instance, in dependency
    /// order.  One action's error does not stop the others.
    #[instrument(skip(self))]
    pub async fn trigger(&self, instance_id: Uuid) -> Result<Vec<ActionResult>, EngineError> {
        let instance = self.instance(instance_id).await?;
        let workflow = self.registry.get(&instance.workflow)?;

        let mut results = Vec::with_capacity(workflow.order.len());
        for action_id in &workflow.order {
            let outcome = self.run_locked(instance_id, action_id, Origin::Event).await;
            if let Err(e) = &outcome {
                warn!(%action_id, error = %e, "action invocation failed");
            }
            results.push(ActionResult { action_id: action_id.clone(), outcome });
        }

        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Internal: per-instance exclusion.
    // -----------------------------------------------------------------------

    async fn run_locked(
        &self,
        instance_id: Uuid,
        action_id: &str,
        origin: Origin,
    ) -> Result<ExecuteOutcome, EngineError> {
        let lock = self.locks.entry(instance_id).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            self.run_protocol(instance_id, action_id, origin).await
        };

        drop(lock);
        self.locks.remove_if(&instance_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    // -----------------------------------------------------------------------
    // Internal: the execute protocol.
    // -----------------------------------------------------------------------

    async fn run_protocol(
        &self,
        instance_id: Uuid,
        action_id: &str,
        origin: Origin,
    ) -> Result<ExecuteOutcome, EngineError> {
        let instance = self.instance(instance_id).await?;
        let workflow = self.registry.get(&instance.workflow)?;
        let action = workflow
            .definition
            .action(action_id)
            .ok_or_else(|| EngineError::UnknownAction {
                workflow: instance.workflow.clone(),
                action_id: action_id.to_owned(),
            })?;

        let mut state = ExecutionState::decode(&instance.state).inspect_err(|e| {
            error!(error = %e, "cannot trust execution state; aborting");
        })?;
        let status = state.status_of(action_id);

        if status.is_terminal() {
            debug!(%status, "action already finished");
            return Ok(ExecuteOutcome::AlreadyFinished { status });
        }

        if let Origin::Timer(job_id) = origin {
            let booked = state.entry(action_id).and_then(|e| e.job_id);
            if status != ActionStatus::Scheduled || booked != Some(job_id) {
                warn!(%job_id, %status, "ignoring job the state does not refer to");
                return Ok(ExecuteOutcome::StaleJob);
            }
        }

        // Preconditions (all must hold).
        let unmet = unmet_preconditions(action, &instance.context);
        if !unmet.is_empty() {
            info!(?unmet, "preconditions not met; waiting for a later event");
            return Ok(ExecuteOutcome::Blocked { reason: BlockReason::Preconditions { unmet } });
        }

        // Related actions (all `after` predecessors completed).
        let waiting_on = resolver::unmet_dependencies(&action.related_actions, &state);
        if !waiting_on.is_empty() {
            info!(?waiting_on, "predecessors not completed; action has to wait");
            return Ok(ExecuteOutcome::Blocked {
                reason: BlockReason::Dependencies {
                    waiting_on: waiting_on.into_iter().map(str::to_owned).collect(),
                },
            });
        }

        // Timing.
        match (status, action.timing.first()) {
            (ActionStatus::NotStarted, Some(spec)) => {
                if action.timing.len() > 1 {
                    debug!(ignored = action.timing.len() - 1, "only the first timing spec is honoured");
                }
                return self.schedule(&instance, action, spec, state).await;
            }
            (ActionStatus::Scheduled, _) if origin == Origin::Event => {
                let due = state.entry(action_id).and_then(|e| e.scheduled_for);
                if matches!(due, Some(at) if at > Utc::now()) {
                    debug!(?due, "job already booked; nothing to do");
                    return Ok(ExecuteOutcome::Pending { due });
                }
                info!(?due, "booked job is overdue; running now");
            }
            _ => {}
        }

        self.run_domain_work(&instance, action, state).await
    }

    async fn schedule(
        &self,
        instance: &WorkflowInstanceRow,
        action: &ActionDefinition,
        spec: &TimingSpec,
        mut state: ExecutionState,
    ) -> Result<ExecuteOutcome, EngineError> {
        let job = self.scheduler.book(instance.id, &action.id, spec).await.inspect_err(|e| {
            warn!(error = %e, "scheduling failed; state left unchanged");
        })?;

        let persisted = match state.mark_scheduled(&action.id, job.id, job.fire_at) {
            Ok(()) => self.save(instance.id, &state).await,
            Err(e) => Err(e),
        };
        if let Err(e) = persisted {
            if let Err(discard) = self.scheduler.discard(&job).await {
                warn!(job_id = %job.id, error = %discard, "could not discard booked job");
            }
            return Err(e);
        }

        self.scheduler.arm(job.clone()).await;
        Ok(ExecuteOutcome::Scheduled { job })
    }

    async fn run_domain_work(
        &self,
        instance: &WorkflowInstanceRow,
        action: &ActionDefinition,
        mut state: ExecutionState,
    ) -> Result<ExecuteOutcome, EngineError> {
        info!(kind = action.kind.name(), "running domain work");
        let work = action::perform(&action.kind, instance, &self.collaborators);
        let result = match self.config.domain_timeout {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .unwrap_or(Err(DomainError::TimedOut(limit))),
            None => work.await,
        };

        match result {
            Ok(report) => {
                state.mark_completed(&action.id)?;
                let row = report.map(|r| report_row(instance.id, &action.id, r.document, r.valid));
                self.store.record_outcome(instance.id, &state.encode()?, row).await?;
                info!("action completed");
                Ok(ExecuteOutcome::Completed)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "domain work failed");
                state.mark_failed(&action.id, &message)?;
                let row = match e {
                    DomainError::Rejected { document } => {
                        Some(report_row(instance.id, &action.id, document, Some(false)))
                    }
                    _ => None,
                };
                self.store.record_outcome(instance.id, &state.encode()?, row).await?;
                Err(EngineError::DomainExecution { action_id: action.id.clone(), message })
            }
        }
    }

    async fn save(&self, instance_id: Uuid, state: &ExecutionState) -> Result<(), EngineError> {
        self.store.save_state(instance_id, &state.encode()?).await?;
        Ok(())
    }
}

fn report_row(instance_id: Uuid, action_id: &str, document: String, valid: Option<bool>) -> ReportRow {
    ReportRow {
        id: Uuid::new_v4(),
        instance_id,
        action_id: action_id.to_owned(),
        document,
        valid,
        created_at: Utc::now(),
    }
}

/// Kinds of the preconditions that do not hold.  A precondition that cannot
/// be evaluated counts as unmet.
fn unmet_preconditions(action: &ActionDefinition, context: &Value) -> Vec<String> {
    action
        .preconditions
        .iter()
        .filter(|cond| match cond.evaluate(context) {
            Ok(met) => !met,
            Err(e) => {
                warn!(condition = cond.kind(), error = %e, "precondition could not be evaluated");
                true
            }
        })
        .map(|cond| cond.kind().to_owned())
        .collect()
}

#[async_trait]
impl JobHandler for Engine {
    type Error = EngineError;

    async fn handle(&self, job: &ScheduledJob) -> Result<(), EngineError> {
        let outcome = self.fire(job).await?;
        debug!(job_id = %job.id, ?outcome, "deferred job handled");
        Ok(())
    }
}
