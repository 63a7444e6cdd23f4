//! Entity Store: typed access to every domain record, all housed in one
//! keyed table (see `keys` for the composite key scheme).
//!
//! Backends implement the raw `ItemTable`; this layer owns key composition,
//! attribute encoding and strict decoding. A record that fails to decode is
//! surfaced as `StoreError::Decode`, never skipped.

pub mod keys;
pub mod memory;
pub mod postgres;
pub mod table;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::content::{
    ContentPiece, GeneratedContentPiece, ParsedContentPiece, PostedContentPiece,
};
use crate::models::request::{ContentRequest, ContentRequestDetails};
use crate::models::user::{BrandDetails, UserApiCredential, UserProfile};
use crate::store::keys::ItemKey;
use crate::store::memory::MemoryItemTable;
use crate::store::table::{Item, ItemTable};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to decode {entity} item {pk}/{sk}: {reason}")]
    Decode {
        entity: &'static str,
        pk: String,
        sk: String,
        reason: String,
    },

    #[error("Failed to encode {entity}: {reason}")]
    Encode { entity: &'static str, reason: String },

    #[error("Conditional update failed: item {pk}/{sk} does not exist")]
    ConditionFailed { pk: String, sk: String },

    #[error("Index key {key} matched {count} items, expected at most one")]
    AmbiguousIndex { key: String, count: usize },
}

// ────────────────────────────────────────────────────────────────────────────
// Stored attribute shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    full_name: String,
    brand_themes: String,
    tone_of_voice: String,
    target_audience: String,
    content_goals: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    brand_summary: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PostedRecord {
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestRecord {
    idea_context: String,
    content_format: String,
    content_pieces_count: u8,
    concise_title: String,
    is_request_processed: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedRecord {
    format: String,
    idea: String,
    current_content: String,
    original_llm_content: String,
    marked_as_posted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    encrypted_api_key: String,
}

fn encode<T: Serialize>(entity: &'static str, record: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Encode {
            entity,
            reason: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(StoreError::Encode {
            entity,
            reason: e.to_string(),
        }),
    }
}

fn decode<T: DeserializeOwned>(entity: &'static str, item: &Item) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(item.attributes.clone()))
        .map_err(|e| decode_error(entity, item, e.to_string()))
}

fn decode_error(entity: &'static str, item: &Item, reason: impl Into<String>) -> StoreError {
    StoreError::Decode {
        entity,
        pk: item.pk.clone(),
        sk: item.sk.clone(),
        reason: reason.into(),
    }
}

fn changes(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// EntityStore
// ────────────────────────────────────────────────────────────────────────────

/// Typed entity store. Cheap to clone; all clones share one table.
#[derive(Clone)]
pub struct EntityStore {
    table: Arc<dyn ItemTable>,
}

impl EntityStore {
    pub fn new(table: Arc<dyn ItemTable>) -> Self {
        Self { table }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryItemTable::new()))
    }

    // ── User profile ──────────────────────────────────────────────────────

    pub async fn create_user_profile(
        &self,
        user_id: &str,
        full_name: &str,
        brand_details: &BrandDetails,
    ) -> Result<UserProfile, StoreError> {
        let key = ItemKey::profile(user_id);
        let record = ProfileRecord {
            full_name: full_name.to_string(),
            brand_themes: brand_details.brand_themes.clone(),
            tone_of_voice: brand_details.tone_of_voice.clone(),
            target_audience: brand_details.target_audience.clone(),
            content_goals: brand_details.content_goals.clone(),
            brand_summary: None,
        };
        let item = Item {
            pk: key.pk,
            sk: key.sk,
            index_key: None,
            attributes: encode("user profile", &record)?,
        };
        self.table.put(item.clone()).await?;
        info!(user_id, "Created user profile");
        map_profile(&item)
    }

    pub async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let key = ItemKey::profile(user_id);
        self.table
            .get(&key.pk, &key.sk)
            .await?
            .map(|item| map_profile(&item))
            .transpose()
    }

    /// Sets the brand summary on an existing profile. Fails with
    /// `ConditionFailed` if the profile does not exist.
    pub async fn update_brand_summary(
        &self,
        user_id: &str,
        brand_summary: &str,
    ) -> Result<UserProfile, StoreError> {
        let key = ItemKey::profile(user_id);
        let item = self
            .table
            .update(&key.pk, &key.sk, changes(json!({ "brandSummary": brand_summary })))
            .await?;
        map_profile(&item)
    }

    // ── Posted content ────────────────────────────────────────────────────

    pub async fn create_posted_content(
        &self,
        user_id: &str,
        pieces: &[ContentPiece],
    ) -> Result<Vec<PostedContentPiece>, StoreError> {
        if pieces.is_empty() {
            return Ok(Vec::new());
        }

        let items = pieces
            .iter()
            .map(|piece| {
                let key = ItemKey::posted(user_id, &piece.format, Uuid::new_v4());
                let record = PostedRecord {
                    content: piece.content.clone(),
                };
                Ok(Item {
                    pk: key.pk,
                    sk: key.sk,
                    index_key: None,
                    attributes: encode("posted content piece", &record)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.table.put_batch(items.clone()).await?;
        debug!(user_id, count = items.len(), "Created posted content pieces");
        items.iter().map(map_posted).collect()
    }

    pub async fn get_posted_content(
        &self,
        user_id: &str,
    ) -> Result<Vec<PostedContentPiece>, StoreError> {
        let items = self
            .table
            .query(&keys::posted_partition(user_id), keys::POSTED_SORT_PREFIX)
            .await?;
        items.iter().map(map_posted).collect()
    }

    // ── Content requests ──────────────────────────────────────────────────

    pub async fn create_content_request(
        &self,
        user_id: &str,
        details: &ContentRequestDetails,
        concise_title: &str,
    ) -> Result<ContentRequest, StoreError> {
        let request_id = Uuid::new_v4();
        let key = ItemKey::content_request(user_id, request_id);
        let record = RequestRecord {
            idea_context: details.idea_context.clone(),
            content_format: details.content_format.clone(),
            content_pieces_count: details.content_pieces_count,
            concise_title: concise_title.to_string(),
            is_request_processed: false,
            created_at: Utc::now(),
        };
        let item = Item {
            pk: key.pk,
            sk: key.sk,
            index_key: None,
            attributes: encode("content request", &record)?,
        };
        self.table.put(item.clone()).await?;
        info!(user_id, %request_id, "Created content request");
        map_request(&item)
    }

    pub async fn get_content_request(
        &self,
        user_id: &str,
        request_id: Uuid,
    ) -> Result<Option<ContentRequest>, StoreError> {
        let key = ItemKey::content_request(user_id, request_id);
        self.table
            .get(&key.pk, &key.sk)
            .await?
            .map(|item| map_request(&item))
            .transpose()
    }

    /// All of a user's requests, newest first.
    pub async fn list_content_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<ContentRequest>, StoreError> {
        let items = self
            .table
            .query(&keys::requests_partition(user_id), keys::REQUEST_SORT_PREFIX)
            .await?;
        let mut requests = items.iter().map(map_request).collect::<Result<Vec<_>, _>>()?;
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    /// Flips `isRequestProcessed` to true on an existing request.
    pub async fn mark_request_processed(
        &self,
        user_id: &str,
        request_id: Uuid,
    ) -> Result<ContentRequest, StoreError> {
        let key = ItemKey::content_request(user_id, request_id);
        let item = self
            .table
            .update(&key.pk, &key.sk, changes(json!({ "isRequestProcessed": true })))
            .await?;
        map_request(&item)
    }

    // ── Generated content ─────────────────────────────────────────────────

    /// Writes one generated piece per parsed block, all or nothing.
    /// `currentContent` and `originalLlmContent` both start as the LLM text.
    pub async fn create_generated_pieces(
        &self,
        user_id: &str,
        request_id: Uuid,
        format: &str,
        pieces: &[ParsedContentPiece],
    ) -> Result<Vec<GeneratedContentPiece>, StoreError> {
        if pieces.is_empty() {
            return Ok(Vec::new());
        }

        let items = pieces
            .iter()
            .map(|piece| {
                let generated_id = Uuid::new_v4();
                let key = ItemKey::generated(user_id, request_id, generated_id);
                let record = GeneratedRecord {
                    format: format.to_string(),
                    idea: piece.idea.clone(),
                    current_content: piece.content.clone(),
                    original_llm_content: piece.content.clone(),
                    marked_as_posted: false,
                };
                Ok(Item {
                    pk: key.pk,
                    sk: key.sk,
                    index_key: Some(keys::generated_index_key(generated_id)),
                    attributes: encode("generated content piece", &record)?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.table.put_batch(items.clone()).await?;
        items.iter().map(map_generated).collect()
    }

    pub async fn list_generated_pieces(
        &self,
        user_id: &str,
        request_id: Uuid,
    ) -> Result<Vec<GeneratedContentPiece>, StoreError> {
        let items = self
            .table
            .query(
                &keys::generated_partition(user_id, request_id),
                keys::GENERATED_SORT_PREFIX,
            )
            .await?;
        items.iter().map(map_generated).collect()
    }

    /// Looks a generated piece up by bare id through the secondary index.
    pub async fn get_generated_piece(
        &self,
        generated_id: Uuid,
    ) -> Result<Option<GeneratedContentPiece>, StoreError> {
        let index_key = keys::generated_index_key(generated_id);
        let items = self.table.query_index(&index_key).await?;
        match items.as_slice() {
            [] => Ok(None),
            [item] => map_generated(item).map(Some),
            _ => Err(StoreError::AmbiguousIndex {
                key: index_key,
                count: items.len(),
            }),
        }
    }

    /// Replaces `currentContent`; `originalLlmContent` is never touched.
    pub async fn update_generated_content(
        &self,
        piece: &GeneratedContentPiece,
        content: &str,
    ) -> Result<GeneratedContentPiece, StoreError> {
        let key = ItemKey::generated(&piece.user_id, piece.content_request_id, piece.id);
        let item = self
            .table
            .update(&key.pk, &key.sk, changes(json!({ "currentContent": content })))
            .await?;
        map_generated(&item)
    }

    pub async fn update_marked_as_posted(
        &self,
        piece: &GeneratedContentPiece,
        marked_as_posted: bool,
    ) -> Result<GeneratedContentPiece, StoreError> {
        let key = ItemKey::generated(&piece.user_id, piece.content_request_id, piece.id);
        let item = self
            .table
            .update(
                &key.pk,
                &key.sk,
                changes(json!({ "markedAsPosted": marked_as_posted })),
            )
            .await?;
        map_generated(&item)
    }

    // ── API credentials ───────────────────────────────────────────────────

    pub async fn put_api_credential(
        &self,
        user_id: &str,
        encrypted_api_key: &str,
    ) -> Result<(), StoreError> {
        let key = ItemKey::credential(user_id);
        let record = CredentialRecord {
            encrypted_api_key: encrypted_api_key.to_string(),
        };
        self.table
            .put(Item {
                pk: key.pk,
                sk: key.sk,
                index_key: None,
                attributes: encode("api credential", &record)?,
            })
            .await?;
        info!(user_id, "Stored API credential");
        Ok(())
    }

    pub async fn get_api_credential(
        &self,
        user_id: &str,
    ) -> Result<Option<UserApiCredential>, StoreError> {
        let key = ItemKey::credential(user_id);
        let Some(item) = self.table.get(&key.pk, &key.sk).await? else {
            return Ok(None);
        };
        let record: CredentialRecord = decode("api credential", &item)?;
        Ok(Some(UserApiCredential {
            user_id: user_id.to_string(),
            encrypted_api_key: record.encrypted_api_key,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Item → domain mapping
// ────────────────────────────────────────────────────────────────────────────

fn map_profile(item: &Item) -> Result<UserProfile, StoreError> {
    const ENTITY: &str = "user profile";
    let user_id = keys::parse_user_partition(&item.pk)
        .ok_or_else(|| decode_error(ENTITY, item, "malformed partition key"))?;
    let record: ProfileRecord = decode(ENTITY, item)?;
    Ok(UserProfile {
        user_id: user_id.to_string(),
        full_name: record.full_name,
        brand_details: BrandDetails {
            brand_themes: record.brand_themes,
            tone_of_voice: record.tone_of_voice,
            target_audience: record.target_audience,
            content_goals: record.content_goals,
        },
        brand_summary: record.brand_summary,
    })
}

fn map_posted(item: &Item) -> Result<PostedContentPiece, StoreError> {
    const ENTITY: &str = "posted content piece";
    let (format, id) = keys::parse_posted_sort_key(&item.sk)
        .ok_or_else(|| decode_error(ENTITY, item, "malformed sort key"))?;
    let record: PostedRecord = decode(ENTITY, item)?;
    Ok(PostedContentPiece {
        id,
        format: format.to_string(),
        content: record.content,
    })
}

fn map_request(item: &Item) -> Result<ContentRequest, StoreError> {
    const ENTITY: &str = "content request";
    let id = keys::parse_request_sort_key(&item.sk)
        .ok_or_else(|| decode_error(ENTITY, item, "malformed sort key"))?;
    let record: RequestRecord = decode(ENTITY, item)?;
    Ok(ContentRequest {
        id,
        idea_context: record.idea_context,
        content_format: record.content_format,
        content_pieces_count: record.content_pieces_count,
        concise_title: record.concise_title,
        is_request_processed: record.is_request_processed,
        created_at: record.created_at,
    })
}

fn map_generated(item: &Item) -> Result<GeneratedContentPiece, StoreError> {
    const ENTITY: &str = "generated content piece";
    let (user_id, content_request_id) = keys::parse_generated_partition(&item.pk)
        .ok_or_else(|| decode_error(ENTITY, item, "malformed partition key"))?;
    let id = keys::parse_generated_sort_key(&item.sk)
        .ok_or_else(|| decode_error(ENTITY, item, "malformed sort key"))?;
    let record: GeneratedRecord = decode(ENTITY, item)?;
    Ok(GeneratedContentPiece {
        id,
        user_id: user_id.to_string(),
        content_request_id,
        format: record.format,
        idea: record.idea,
        current_content: record.current_content,
        original_llm_content: record.original_llm_content,
        marked_as_posted: record.marked_as_posted,
    })
}
