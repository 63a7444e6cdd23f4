use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::generation::content_selector::select_exemplars;
use crate::generation::parsing::extract_content_pieces;
use crate::generation::prompts::build_content_generation_prompt;
use crate::llm_client::LlmError;
use crate::models::request::ContentRequestDetails;
use crate::queue::{BatchResponse, QueueMessage};
use crate::workers::events::ContentRequested;
use crate::workers::{join_llm, BatchStats, BatchWorker, WorkerContext, WorkerError};

const WORKER: &str = "content_generation";

/// Generates content pieces for each pending content request.
pub struct ContentGenerationWorker {
    ctx: WorkerContext,
}

struct PendingGeneration<'a> {
    message_id: &'a str,
    user_id: String,
    request_id: Uuid,
    details: ContentRequestDetails,
    handle: JoinHandle<Result<String, LlmError>>,
}

impl ContentGenerationWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Phase one for a single message. `None` means the request was
    /// already processed.
    async fn dispatch<'a>(
        &self,
        message: &'a QueueMessage,
    ) -> Result<Option<PendingGeneration<'a>>, WorkerError> {
        let event = ContentRequested::decode(&message.body)?;
        let user_id = event.user_id;
        let request_id = event.content_request_id;
        let store = &self.ctx.store;

        let request = store
            .get_content_request(&user_id, request_id)
            .await?
            .ok_or_else(|| WorkerError::MissingRequest {
                user_id: user_id.clone(),
                request_id,
            })?;

        if request.is_request_processed {
            info!(user_id = %user_id, request_id = %request_id, "Request already processed, skipping");
            return Ok(None);
        }

        let api_key = self.ctx.credentials.resolve_api_key(&user_id).await?;

        let (profile, posted) = tokio::try_join!(
            store.get_user_profile(&user_id),
            store.get_posted_content(&user_id),
        )?;

        let profile = profile.ok_or_else(|| WorkerError::MissingProfile {
            user_id: user_id.clone(),
        })?;
        let brand_summary = profile
            .brand_summary
            .ok_or_else(|| WorkerError::MissingBrandSummary {
                user_id: user_id.clone(),
            })?;

        // The stored request is authoritative over the copy in the event.
        let details = request.details();
        let exemplars = select_exemplars(posted, &details.content_format);
        debug!(
            user_id = %user_id,
            request_id = %request_id,
            exemplars = exemplars.len(),
            "Dispatching content generation prompt"
        );
        let prompt = build_content_generation_prompt(&brand_summary, &exemplars, &details);

        Ok(Some(PendingGeneration {
            message_id: &message.message_id,
            user_id,
            request_id,
            details,
            handle: self.ctx.dispatch(api_key, prompt),
        }))
    }

    /// Phase two for a single dispatched message.
    async fn persist(&self, pending: PendingGeneration<'_>) -> Result<(), WorkerError> {
        let response = join_llm(pending.handle).await?;
        let pieces = extract_content_pieces(&response);

        let requested = usize::from(pending.details.content_pieces_count);
        if pieces.len() < requested {
            warn!(
                user_id = %pending.user_id,
                request_id = %pending.request_id,
                requested,
                recovered = pieces.len(),
                "Fewer content pieces recovered than requested"
            );
        }

        self.ctx
            .store
            .create_generated_pieces(
                &pending.user_id,
                pending.request_id,
                &pending.details.content_format,
                &pieces,
            )
            .await?;
        self.ctx
            .store
            .mark_request_processed(&pending.user_id, pending.request_id)
            .await?;

        info!(
            user_id = %pending.user_id,
            request_id = %pending.request_id,
            pieces = pieces.len(),
            "Content request processed"
        );
        Ok(())
    }
}

#[async_trait]
impl BatchWorker for ContentGenerationWorker {
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
