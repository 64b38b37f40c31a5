//! `ecr-orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: load workflows, recover deferred jobs and start the API.
//! - `migrate`: run pending database migrations.
//! - `validate`: validate a workflow JSON file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use collaborators::http::{HttpGenerator, HttpRetrieval, HttpValidator};
use collaborators::DocumentValidator;
use db::{InstanceStore, JobStore, MemoryStore, PgStore};
use engine::{Collaborators, Engine, EngineConfig, QueueScheduler, WorkflowDefinition, WorkflowRegistry};
use queue::{run_worker, QueueConfig, TimerQueue};

#[derive(Parser)]
#[command(
    name = "ecr-orchestrator",
    about = "Event-condition-action engine for electronic case reporting workflows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the engine, its job worker and the REST API.
    Serve(ServeArgs),
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, env = "ECR_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// Postgres connection string; without it state lives in memory only.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Workflow definition file, or a directory of `*.json` definitions.
    #[arg(long, env = "ECR_WORKFLOWS", default_value = "workflows")]
    workflows: PathBuf,

    #[arg(long, env = "ECR_RETRIEVAL_URL")]
    retrieval_url: String,

    #[arg(long, env = "ECR_GENERATOR_URL")]
    generator_url: String,

    #[arg(long, env = "ECR_VALIDATOR_URL")]
    validator_url: Option<String>,

    /// Per-request timeout for collaborator calls.
    #[arg(long, env = "ECR_COLLABORATOR_TIMEOUT_SECS", default_value_t = 30)]
    collaborator_timeout_secs: u64,

    #[arg(long, env = "ECR_MAX_CONCURRENT_JOBS", default_value_t = 8)]
    max_concurrent_jobs: usize,

    /// Upper bound on one action's domain work.
    #[arg(long, env = "ECR_DOMAIN_TIMEOUT_SECS")]
    domain_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Migrate { database_url } => {
            info!("running migrations");
            let pool = db::pool::create_pool(&database_url, 2).await?;
            db::pool::run_migrations(&pool).await?;
            info!("migrations applied successfully");
            Ok(())
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;
            let definition: WorkflowDefinition =
                serde_json::from_str(&content).context("invalid workflow JSON")?;

            match engine::validate_workflow(&definition) {
                Ok(order) => {
                    println!("✅ Workflow '{}' is valid. Action order: {order:?}", definition.name);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let (instances, jobs): (Arc<dyn InstanceStore>, Arc<dyn JobStore>) = match &args.database_url {
        Some(url) => {
            let pool = db::pool::create_pool(url, 10).await?;
            db::pool::run_migrations(&pool).await?;
            let store = Arc::new(PgStore::new(pool));
            (store.clone() as Arc<dyn InstanceStore>, store as Arc<dyn JobStore>)
        }
        None => {
            warn!("no DATABASE_URL set; state and jobs will not survive a restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone() as Arc<dyn InstanceStore>, store as Arc<dyn JobStore>)
        }
    };

    let mut registry = WorkflowRegistry::new();
    let loaded = registry
        .load_path(&args.workflows)
        .with_context(|| format!("cannot load workflows from {}", args.workflows.display()))?;
    if loaded == 0 {
        warn!(path = %args.workflows.display(), "no workflow definitions found");
    }

    let timeout = Duration::from_secs(args.collaborator_timeout_secs);
    let collaborators = Collaborators {
        retrieval: Arc::new(HttpRetrieval::new(&args.retrieval_url, timeout)),
        generator: Arc::new(HttpGenerator::new(&args.generator_url, timeout)),
        validator: args
            .validator_url
            .as_deref()
            .map(|url| Arc::new(HttpValidator::new(url, timeout)) as Arc<dyn DocumentValidator>),
    };

    let config = EngineConfig {
        max_concurrent_jobs: args.max_concurrent_jobs,
        domain_timeout: args.domain_timeout_secs.map(Duration::from_secs),
    };

    let (queue, due_rx) = TimerQueue::new(Arc::clone(&jobs), QueueConfig::default());
    let queue = Arc::new(queue);
    let engine = Arc::new(Engine::new(
        instances,
        Arc::new(QueueScheduler::new(Arc::clone(&queue))),
        registry,
        collaborators,
        config,
    ));

    tokio::spawn(run_worker(
        due_rx,
        jobs,
        Arc::clone(&engine),
        engine.config().max_concurrent_jobs,
    ));

    let recovered = queue.recover().await?;
    info!(recovered, "deferred jobs re-armed");

    api::serve(&args.bind, engine).await?;
    Ok(())
}
