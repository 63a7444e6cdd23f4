use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::generation::prompts::build_brand_summary_prompt;
use crate::llm_client::LlmError;
use crate::queue::{BatchResponse, QueueMessage};
use crate::workers::events::BrandSummaryRequested;
use crate::workers::{join_llm, BatchStats, BatchWorker, WorkerContext, WorkerError};

const WORKER: &str = "brand_summary";

/// Writes the brand summary for each newly created profile.
pub struct BrandSummaryWorker {
    ctx: WorkerContext,
}

struct PendingSummary<'a> {
    message_id: &'a str,
    user_id: String,
    handle: JoinHandle<Result<String, LlmError>>,
}

impl BrandSummaryWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Phase one for a single message. `None` means the message is a no-op.
    async fn dispatch<'a>(&self, message: &'a QueueMessage) -> Result<Option<PendingSummary<'a>>, WorkerError> {
        let event = BrandSummaryRequested::decode(&message.body)?;
        let user_id = event.user_id;

        let profile = self
            .ctx
            .store
            .get_user_profile(&user_id)
            .await?
            .ok_or_else(|| WorkerError::MissingProfile {
                user_id: user_id.clone(),
            })?;

        if profile.has_brand_summary() {
            info!(user_id = %user_id, message_id = %message.message_id, "Brand summary exists, skipping");
            return Ok(None);
        }

        let api_key = self.ctx.credentials.resolve_api_key(&user_id).await?;
        let prompt = build_brand_summary_prompt(&event.brand_details, &event.existing_content);
        debug!(user_id = %user_id, "Dispatching brand summary prompt");

        Ok(Some(PendingSummary {
            message_id: &message.message_id,
            user_id,
            handle: self.ctx.dispatch(api_key, prompt),
        }))
    }

    /// Phase two for a single dispatched message.
    async fn persist(&self, pending: PendingSummary<'_>) -> Result<(), WorkerError> {
        let summary = join_llm(pending.handle).await?;
        self.ctx
            .store
            .update_brand_summary(&pending.user_id, &summary)
            .await?;
        info!(user_id = %pending.user_id, "Brand summary stored");
        Ok(())
    }
}

#[async_trait]
impl BatchWorker for BrandSummaryWorker {
    fn name(&self) -> &'static str {
        WORKER
    }

    async fn process_batch(&self, batch: &[QueueMessage]) -> BatchResponse {
        let mut stats = BatchStats::new(batch.len());
        let mut pending = Vec::with_capacity(batch.len());

        for message in batch {
            match self.dispatch(message).await {
                Ok(Some(p)) => pending.push(p),
                Ok(None) => stats.skip(),
                Err(e) => stats.fail(WORKER, &message.message_id, &e),
            }
        }

        for p in pending {
            let message_id = p.message_id;
            match self.persist(p).await {
                Ok(()) => stats.succeed(),
                Err(e) => stats.fail(WORKER, message_id, &e),
            }
        }

        stats.finish(WORKER)
    }
}
