mod config;
mod credentials;
mod db;
mod errors;
mod generation;
mod intake;
mod llm_client;
mod models;
mod queue;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;
mod workers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::credentials::secrets::SecretCipher;
use crate::credentials::StoredCredentialProvider;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::queue::{MemoryQueue, MessageQueue, RedisQueue};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::PgItemTable;
use crate::store::EntityStore;
use crate::workers::{
    run_consumer, BrandSummaryWorker, ConsumerSettings, ContentGenerationWorker, WorkerContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting contentflow v{}", env!("CARGO_PKG_VERSION"));

    // Entity store: PostgreSQL when configured, in-memory otherwise
    let store = match &config.database_url {
        Some(url) => EntityStore::new(Arc::new(PgItemTable::new(create_pool(url).await?))),
        None => {
            info!("DATABASE_URL not set, using in-memory entity store");
            EntityStore::in_memory()
        }
    };

    let (brand_summary_queue, content_request_queue) = build_queues(&config).await?;

    let cipher = SecretCipher::from_base64_key(&config.credential_encryption_key)
        .map_err(|e| anyhow::anyhow!("CREDENTIAL_ENCRYPTION_KEY is invalid: {e}"))?;
    let credentials = Arc::new(StoredCredentialProvider::new(store.clone(), cipher.clone()));

    let llm = Arc::new(LlmClient::new(config.llm_api_url.clone()).context("building LLM client")?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Workers
    let ctx = WorkerContext {
        store: store.clone(),
        llm: llm.clone(),
        credentials: credentials.clone(),
    };
    let settings = ConsumerSettings {
        batch_size: config.worker_batch_size,
        poll_interval: config.worker_poll_interval,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let brand_consumer = tokio::spawn(run_consumer(
        brand_summary_queue.clone(),
        Arc::new(BrandSummaryWorker::new(ctx.clone())),
        settings,
        shutdown_rx.clone(),
    ));
    let content_consumer = tokio::spawn(run_consumer(
        content_request_queue.clone(),
        Arc::new(ContentGenerationWorker::new(ctx)),
        settings,
        shutdown_rx,
    ));

    // Build app state
    let state = AppState {
        store,
        brand_summary_queue,
        content_request_queue,
        llm,
        credentials,
        cipher,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Let each consumer settle the batch it is holding.
    let _ = tokio::join!(brand_consumer, content_consumer);
    info!("Shutdown complete");

    Ok(())
}

/// Redis-backed queues when `REDIS_URL` is set, in-process queues otherwise.
async fn build_queues(config: &Config) -> Result<(Arc<dyn MessageQueue>, Arc<dyn MessageQueue>)> {
    let policy = config.redelivery_policy();
    let Some(url) = &config.redis_url else {
        info!("REDIS_URL not set, using in-process queues");
        return Ok((
            Arc::new(MemoryQueue::new(&config.brand_summary_queue, policy)),
            Arc::new(MemoryQueue::new(&config.content_request_queue, policy)),
        ));
    };

    let client = redis::Client::open(url.as_str()).context("opening Redis client")?;
    let mut queues = Vec::with_capacity(2);
    for name in [&config.brand_summary_queue, &config.content_request_queue] {
        let queue = RedisQueue::connect(&client, name.as_str(), policy).await?;
        queue.recover().await?;
        queues.push(queue);
    }
    info!("Redis queues initialized");

    let content = queues.pop().context("content request queue")?;
    let brand = queues.pop().context("brand summary queue")?;
    Ok((Arc::new(brand), Arc::new(content)))
}
