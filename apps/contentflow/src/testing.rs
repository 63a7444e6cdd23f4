//! Test doubles for the LLM and credential seams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::credentials::{CredentialError, CredentialProvider};
use crate::llm_client::{LlmError, LlmService};

type Responder = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// Scripted `LlmService`: answers every prompt with `respond(prompt)` and
/// records what it was asked.
pub struct FakeLlm {
    respond: Box<Responder>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(respond: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing_auth() -> Arc<Self> {
        Self::new(|_| {
            Err(LlmError::Authentication {
                message: "invalid x-api-key".into(),
            })
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for FakeLlm {
    async fn complete(
        &self,
        _api_key: &str,
        prompt: &str,
        _extended_reasoning: bool,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

/// Hands every user the same key, or reports none stored.
pub struct StaticCredentials(pub Option<String>);

impl StaticCredentials {
    pub fn key(key: &str) -> Arc<Self> {
        Arc::new(Self(Some(key.to_string())))
    }

    pub fn missing() -> Arc<Self> {
        Arc::new(Self(None))
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn resolve_api_key(&self, user_id: &str) -> Result<String, CredentialError> {
        self.0.clone().ok_or_else(|| CredentialError::NotFound {
            user_id: user_id.to_string(),
        })
    }
}

/// An LLM reply holding `n` well-formed content pieces.
pub fn content_reply(n: usize) -> String {
    let blocks: String = (1..=n)
        .map(|i| {
            format!("<content_piece>\n<idea>\nIdea {i}\n</idea>\n<content>\nBody {i}\n</content>\n</content_piece>\n")
        })
        .collect();
    format!("<new_content>\n{blocks}</new_content>")
}
