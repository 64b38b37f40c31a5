//! `api` crate: HTTP surface of the engine.
//!
//! Exposes:
//!   GET    /health
//!   GET    /api/v1/workflows
//!   GET    /api/v1/instances
//!   POST   /api/v1/instances
//!   GET    /api/v1/instances/{id}
//!   POST   /api/v1/instances/{id}/trigger
//!   POST   /api/v1/instances/{id}/actions/{action_id}

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use engine::Engine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/workflows", get(handlers::workflows::list))
        .route(
            "/api/v1/instances",
            get(handlers::instances::list).post(handlers::instances::create),
        )
        .route("/api/v1/instances/{id}", get(handlers::instances::get))
        .route("/api/v1/instances/{id}/trigger", post(handlers::instances::trigger))
        .route(
            "/api/v1/instances/{id}/actions/{action_id}",
            post(handlers::instances::execute_action),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { engine })
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, engine: Arc<Engine>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API listening");
    axum::serve(listener, router(engine)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use collaborators::{mock::{MockGenerator, MockRetrieval}, ClinicalData, DataRetrieval};
    use db::{JobStore, MemoryStore};
    use engine::{
        ActionDefinition, ActionKind, Collaborators, EngineConfig, Precondition, QueueScheduler,
        RelatedAction, TimingSpec, WorkflowDefinition, WorkflowRegistry,
    };
    use queue::{QueueConfig, TimerQueue};

    fn app() -> Router {
        app_with(Arc::new(MockRetrieval::returning(ClinicalData::default())), QueueConfig::default())
    }

    fn app_with(retrieval: Arc<dyn DataRetrieval>, queue_config: QueueConfig) -> Router {
        let store = Arc::new(MemoryStore::new());
        let job_store: Arc<dyn JobStore> = store.clone();
        let (queue, _due_rx) = TimerQueue::new(job_store, queue_config);

        let mut registry = WorkflowRegistry::new();
        registry
            .register(WorkflowDefinition::new(
                "ecr",
                vec![
                    ActionDefinition::new("match-trigger", ActionKind::Checkpoint).with_precondition(
                        Precondition::Present { pointer: "/trigger/code".into() },
                    ),
                    ActionDefinition::new("create-eicr", ActionKind::CreateReport { lookback_hours: 24, validate: false })
                        .with_related(RelatedAction::after("match-trigger")),
                    ActionDefinition::new("follow-up", ActionKind::Checkpoint)
                        .with_timing(TimingSpec::Delay { seconds: 3600 }),
                ],
            ))
            .unwrap();

        let engine = Engine::new(
            store,
            Arc::new(QueueScheduler::new(Arc::new(queue))),
            registry,
            Collaborators {
                retrieval,
                generator: Arc::new(MockGenerator::returning("<ClinicalDocument/>")),
                validator: None,
            },
            EngineConfig::default(),
        );
        router(Arc::new(engine))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn lists_registered_workflows_in_dependency_order() {
        let app = app();
        let (status, body) = send(&app, "GET", "/api/v1/workflows", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["name"], "ecr");
        assert_eq!(body[0]["actions"], json!(["match-trigger", "follow-up", "create-eicr"]));
    }

    #[tokio::test]
    async fn trigger_runs_the_chain_and_exposes_state() {
        let app = app();
        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/instances",
            Some(json!({ "workflow": "ecr", "context": { "trigger": { "code": "840539006" } } })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, results) = send(&app, "POST", &format!("/api/v1/instances/{id}/trigger"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let outcomes: Vec<_> = results.as_array().unwrap().iter().map(|r| r["outcome"]["outcome"].clone()).collect();
        assert_eq!(outcomes, vec![json!("completed"), json!("scheduled"), json!("completed")]);

        let (status, view) = send(&app, "GET", &format!("/api/v1/instances/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["reports"].as_array().unwrap().len(), 1);
        let statuses: Vec<_> = view["actions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| (a["action_id"].as_str().unwrap().to_owned(), a["status"].as_str().unwrap().to_owned()))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("create-eicr".to_owned(), "COMPLETED".to_owned()),
                ("follow-up".to_owned(), "SCHEDULED".to_owned()),
                ("match-trigger".to_owned(), "COMPLETED".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn blocked_action_reports_the_closed_gate() {
        let app = app();
        let (_, created) = send(&app, "POST", "/api/v1/instances", Some(json!({ "workflow": "ecr" }))).await;
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, outcome) =
            send(&app, "POST", &format!("/api/v1/instances/{id}/actions/create-eicr"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(outcome["outcome"], "blocked");
        assert_eq!(outcome["reason"]["gate"], "dependencies");
    }

    #[tokio::test]
    async fn unknown_things_are_not_found() {
        let app = app();
        let (status, _) = send(&app, "POST", "/api/v1/instances", Some(json!({ "workflow": "nope" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = uuid::Uuid::new_v4();
        let (status, body) = send(&app, "GET", &format!("/api/v1/instances/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn created_instances_are_listed() {
        let app = app();
        let (_, created) = send(&app, "POST", "/api/v1/instances", Some(json!({ "workflow": "ecr" }))).await;

        let (status, listed) = send(&app, "GET", "/api/v1/instances", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], created["id"]);
    }

    #[tokio::test]
    async fn refused_booking_is_service_unavailable() {
        let app = app_with(
            Arc::new(MockRetrieval::returning(ClinicalData::default())),
            QueueConfig { max_pending: 0, ..QueueConfig::default() },
        );
        let (_, created) = send(&app, "POST", "/api/v1/instances", Some(json!({ "workflow": "ecr" }))).await;
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, body) =
            send(&app, "POST", &format!("/api/v1/instances/{id}/actions/follow-up"), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("could not schedule"));
    }

    #[tokio::test]
    async fn failed_domain_work_is_bad_gateway() {
        let app = app_with(Arc::new(MockRetrieval::failing_fatal("EHR refused")), QueueConfig::default());
        let (_, created) = send(
            &app,
            "POST",
            "/api/v1/instances",
            Some(json!({ "workflow": "ecr", "context": { "trigger": { "code": "840539006" } } })),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_owned();

        let (status, _) = send(&app, "POST", &format!("/api/v1/instances/{id}/actions/match-trigger"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) =
            send(&app, "POST", &format!("/api/v1/instances/{id}/actions/create-eicr"), None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("EHR refused"));
    }
}
