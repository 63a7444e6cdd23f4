//! Queue-driven workers: brand-summary writing and content generation.
//!
//! Both workers run a batch in two phases. Phase one validates each message,
//! checks idempotency, builds the prompt and starts the LLM call without
//! waiting on it. Phase two awaits the calls in order and persists results.
//! A failure at any point marks only that message as failed.

pub mod brand_summary;
pub mod content_generation;
pub mod events;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::credentials::{CredentialError, CredentialProvider};
use crate::generation::parsing::ResponseParsingError;
use crate::llm_client::{LlmError, LlmService};
use crate::queue::{BatchResponse, MessageQueue, QueueMessage};
use crate::store::{EntityStore, StoreError};

pub use self::brand_summary::BrandSummaryWorker;
pub use self::content_generation::ContentGenerationWorker;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid event: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Response parsing error: {0}")]
    ResponseParsing(#[from] ResponseParsingError),

    #[error("User profile {user_id} not found")]
    MissingProfile { user_id: String },

    #[error("User {user_id} has no brand summary yet")]
    MissingBrandSummary { user_id: String },

    #[error("Content request {request_id} of user {user_id} not found")]
    MissingRequest { user_id: String, request_id: Uuid },

    #[error("LLM task aborted: {0}")]
    Aborted(String),
}

impl WorkerError {
    /// Whether a redelivery could plausibly succeed. Both kinds are reported
    /// as item failures; the queue's receive limit bounds permanent ones.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Store(_) | WorkerError::Aborted(_) => true,
            WorkerError::Llm(e) => !e.is_authentication(),
            WorkerError::Validation(_)
            | WorkerError::Credential(_)
            | WorkerError::ResponseParsing(_)
            | WorkerError::MissingProfile { .. }
            | WorkerError::MissingBrandSummary { .. }
            | WorkerError::MissingRequest { .. } => false,
        }
    }
}

/// Collaborators shared by both workers.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: EntityStore,
    pub llm: Arc<dyn LlmService>,
    pub credentials: Arc<dyn CredentialProvider>,
}

impl WorkerContext {
    /// Starts an extended-reasoning completion on its own task.
    pub(crate) fn dispatch(&self, api_key: String, prompt: String) -> JoinHandle<Result<String, LlmError>> {
        let llm = Arc::clone(&self.llm);
        tokio::spawn(async move { llm.complete(&api_key, &prompt, true).await })
    }
}

/// Awaits a dispatched LLM call.
pub(crate) async fn join_llm(handle: JoinHandle<Result<String, LlmError>>) -> Result<String, WorkerError> {
    handle
        .await
        .map_err(|e| WorkerError::Aborted(e.to_string()))?
        .map_err(WorkerError::from)
}

#[async_trait]
pub trait BatchWorker: Send + Sync {
    fn name(&self) -> &'static str;

    /// Processes one batch and reports the messages that failed.
    async fn process_batch(&self, batch: &[QueueMessage]) -> BatchResponse;
}

// ────────────────────────────────────────────────────────────────────────────
// Batch bookkeeping
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub(crate) struct BatchStats {
    received: usize,
    skipped: usize,
    succeeded: usize,
    response: BatchResponse,
}

impl BatchStats {
    pub fn new(received: usize) -> Self {
        Self {
            received,
            ..Self::default()
        }
    }

    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    pub fn succeed(&mut self) {
        self.succeeded += 1;
    }

    pub fn fail(&mut self, worker: &str, message_id: &str, err: &WorkerError) {
        error!(
            worker,
            message_id,
            retryable = err.is_retryable(),
            "Batch item failed: {err}"
        );
        self.response.fail(message_id);
    }

    pub fn finish(self, worker: &str) -> BatchResponse {
        let failed = self.response.batch_item_failures.len();
        info!(
            worker,
            received = self.received,
            skipped = self.skipped,
            succeeded = self.succeeded,
            failed,
            "Batch processed"
        );
        self.response
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Consumer loop
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ConsumerSettings {
    pub batch_size: usize,
    pub poll_interval: Duration,
}

/// Receives, processes and settles batches until `shutdown` flips to true
/// (or its sender is dropped). The batch in hand is always settled first.
pub async fn run_consumer(
    queue: Arc<dyn MessageQueue>,
    worker: Arc<dyn BatchWorker>,
    settings: ConsumerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        worker = worker.name(),
        queue = queue.name(),
        batch_size = settings.batch_size,
        "Consumer started"
    );

    while !*shutdown.borrow() {
        let batch = match queue.receive(settings.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(worker = worker.name(), "Receive failed: {e}");
                Vec::new()
            }
        };

        if batch.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let response = worker.process_batch(&batch).await;

        match queue.settle(&batch, &response).await {
            Ok(summary) => debug!(
                worker = worker.name(),
                acked = summary.acked,
                retried = summary.retried,
                dead_lettered = summary.dead_lettered,
                "Batch settled"
            ),
            Err(e) => error!(worker = worker.name(), "Settling batch failed: {e}"),
        }
    }

    info!(worker = worker.name(), "Consumer stopped");
}
