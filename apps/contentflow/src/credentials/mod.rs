//! Credential provider: resolves a user's LLM API key on demand.

pub mod secrets;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::credentials::secrets::{SecretCipher, SecretError};
use crate::store::{EntityStore, StoreError};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No API key stored for user {user_id}")]
    NotFound { user_id: String },

    #[error("Stored API key for user {user_id} could not be decrypted: {source}")]
    Decryption {
        user_id: String,
        #[source]
        source: SecretError,
    },

    #[error("Credential lookup failed: {0}")]
    Store(#[from] StoreError),
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve_api_key(&self, user_id: &str) -> Result<String, CredentialError>;
}

/// Reads the sealed `UserApiCredential` record and opens it.
pub struct StoredCredentialProvider {
    store: EntityStore,
    cipher: SecretCipher,
}

impl StoredCredentialProvider {
    pub fn new(store: EntityStore, cipher: SecretCipher) -> Self {
        Self { store, cipher }
    }
}

#[async_trait]
impl CredentialProvider for StoredCredentialProvider {
    async fn resolve_api_key(&self, user_id: &str) -> Result<String, CredentialError> {
        let credential = self
            .store
            .get_api_credential(user_id)
            .await?
            .ok_or_else(|| CredentialError::NotFound {
                user_id: user_id.to_string(),
            })?;

        self.cipher
            .open(&credential.encrypted_api_key)
            .map_err(|source| {
                warn!(user_id, "Stored API key failed to open: {source}");
                CredentialError::Decryption {
                    user_id: user_id.to_string(),
                    source,
                }
            })
    }
}
