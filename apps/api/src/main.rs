mod applications;
mod config;
mod db;
mod errors;
mod ledger;
mod llm_client;
mod matching;
mod models;
mod pipeline;
mod queue;
mod resume;
mod routes;
mod state;
mod store;

#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::ApplicationRegistrar;
use crate::config::Config;
use crate::db::create_pool;
use crate::ledger::CreditLedger;
use crate::llm_client::{LlmClient, TextGenerator};
use crate::matching::MatchScorer;
use crate::pipeline::{Pipeline, Triggers, WorkerPool, WorkerSettings};
use crate::queue::{RedisTaskQueue, RetryPolicy, TaskQueue};
use crate::resume::ResumeCustomizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("reach_api={},tower_http={}", config.rust_log, config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reach API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db.clone()));

    // Initialize Redis task queue
    let redis = redis::Client::open(config.redis_url.clone())?;
    let max_attempts = u32::try_from(config.max_retries).unwrap_or(1);
    let redis_queue = RedisTaskQueue::connect(
        &redis,
        &config.queue_prefix,
        RetryPolicy::new(max_attempts, config.queue_backoff),
    )
    .await?;
    redis_queue.requeue_orphans().await?;
    let queue: Arc<dyn TaskQueue> = Arc::new(redis_queue);
    info!("Redis task queue ready (prefix: {})", config.queue_prefix);

    // Initialize LLM client
    let llm: Arc<dyn TextGenerator> = Arc::new(LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_timeout,
    )?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Components
    let ledger = CreditLedger::new(store.clone());
    let scorer = MatchScorer::new(
        llm.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        config.llm_timeout,
    );
    let customizer = ResumeCustomizer::new(llm, store.clone(), store.clone(), config.llm_timeout);
    let registrar = ApplicationRegistrar::new(store.clone(), config.max_retries);
    let triggers = Triggers::new(
        scorer.clone(),
        registrar.clone(),
        queue.clone(),
        store.clone(),
        store.clone(),
    );
    let pipeline = Arc::new(Pipeline::new(
        customizer.clone(),
        registrar.clone(),
        queue,
    ));

    // Background work
    let workers = WorkerPool::spawn(
        pipeline,
        WorkerSettings {
            resume_workers: config.resume_workers,
            submit_workers: config.submit_workers,
            poll_interval: config.queue_poll_interval,
        },
    );
    let (stop_scheduler, scheduler_stop) = watch::channel(false);
    let scheduler = (!config.auto_apply_interval.is_zero()).then(|| {
        Arc::new(triggers.clone()).spawn_scheduler(config.auto_apply_interval, scheduler_stop)
    });

    // Build app state
    let state = AppState {
        ledger,
        scorer,
        customizer,
        registrar,
        triggers,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the dashboard domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining workers");
    let _ = stop_scheduler.send(true);
    if let Some(scheduler) = scheduler {
        let _ = scheduler.await;
    }
    workers.shutdown().await;
    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
