use std::sync::Arc;

use crate::credentials::secrets::SecretCipher;
use crate::credentials::CredentialProvider;
use crate::llm_client::LlmService;
use crate::queue::MessageQueue;
use crate::store::EntityStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub brand_summary_queue: Arc<dyn MessageQueue>,
    pub content_request_queue: Arc<dyn MessageQueue>,
    pub llm: Arc<dyn LlmService>,
    pub credentials: Arc<dyn CredentialProvider>,
    /// Seals API keys submitted through the credentials route.
    pub cipher: SecretCipher,
}
