//! Axum route handlers for the intake API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::parsing::extract_title;
use crate::generation::prompts::build_title_prompt;
use crate::intake::{require_text, UserId};
use crate::models::content::{ContentPiece, GeneratedContentPiece, PostedContentPiece};
use crate::models::request::{clamp_pieces_count, ContentRequest, ContentRequestDetails};
use crate::models::user::{BrandDetails, UserProfile};
use crate::queue::send_json;
use crate::state::AppState;
use crate::workers::events::{BrandSummaryRequested, ContentRequested};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileBody {
    pub full_name: String,
    pub brand_details: BrandDetails,
    #[serde(default)]
    pub existing_content: Vec<ContentPiece>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileResponse {
    pub profile: UserProfile,
    pub existing_content: Vec<PostedContentPiece>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutCredentialBody {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentRequestBody {
    pub idea_context: String,
    pub content_format: String,
    /// Fractional values are floored and values above the cap are clamped.
    pub content_pieces_count: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditContentBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMarkedAsPostedBody {
    pub marked_as_posted: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Profile
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/profile
///
/// Stores the profile and the user's existing content, then queues the
/// brand summary. Existing-content entries with a blank format or body are
/// dropped.
pub async fn handle_create_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    payload: Result<Json<CreateProfileBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateProfileResponse>), AppError> {
    let Json(body) = payload?;
    require_text("fullName", &body.full_name)?;
    if let Some(field) = body.brand_details.first_blank_field() {
        return Err(AppError::Validation(format!(
            "Required field '{field}' is missing or blank"
        )));
    }

    if state.store.get_user_profile(&user_id).await?.is_some() {
        return Err(AppError::Conflict(format!("Profile for user {user_id} already exists")));
    }

    let existing_content: Vec<ContentPiece> = body
        .existing_content
        .into_iter()
        .filter(|p| !p.format.trim().is_empty() && !p.content.trim().is_empty())
        .collect();

    let (profile, posted) = tokio::try_join!(
        state
            .store
            .create_user_profile(&user_id, body.full_name.trim(), &body.brand_details),
        state.store.create_posted_content(&user_id, &existing_content),
    )?;

    let event = BrandSummaryRequested {
        user_id: user_id.clone(),
        brand_details: body.brand_details,
        existing_content,
    };
    let message_id = send_json(state.brand_summary_queue.as_ref(), &event).await?;
    info!(user_id = %user_id, message_id = %message_id, posted = posted.len(), "Profile created");

    Ok((
        StatusCode::CREATED,
        Json(CreateProfileResponse {
            profile,
            existing_content: posted,
        }),
    ))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<UserProfile>, AppError> {
    let profile = state
        .store
        .get_user_profile(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;
    Ok(Json(profile))
}

/// PUT /api/v1/credentials
pub async fn handle_put_credentials(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    payload: Result<Json<PutCredentialBody>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(body) = payload?;
    require_text("apiKey", &body.api_key)?;

    let sealed = state
        .cipher
        .seal(body.api_key.trim())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("sealing API key: {e}")))?;
    state.store.put_api_credential(&user_id, &sealed).await?;

    info!(user_id = %user_id, "API key stored");
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Content requests
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/content-requests
///
/// Titles the idea with a quick LLM call, stores the request unprocessed and
/// queues it for generation.
pub async fn handle_create_content_request(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    payload: Result<Json<CreateContentRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ContentRequest>), AppError> {
    let Json(body) = payload?;
    require_text("ideaContext", &body.idea_context)?;
    require_text("contentFormat", &body.content_format)?;
    let count = clamp_pieces_count(body.content_pieces_count).ok_or_else(|| {
        AppError::Validation("Required field 'contentPiecesCount' must be a positive number".to_string())
    })?;

    let details = ContentRequestDetails {
        idea_context: body.idea_context,
        content_format: body.content_format,
        content_pieces_count: count,
    };

    let api_key = state.credentials.resolve_api_key(&user_id).await?;
    let response = state
        .llm
        .complete(&api_key, &build_title_prompt(&details.idea_context), false)
        .await?;
    let title = extract_title(&response)?;

    let request = state
        .store
        .create_content_request(&user_id, &details, &title)
        .await?;

    let event = ContentRequested {
        user_id: user_id.clone(),
        content_request_id: request.id,
        content_request: details,
    };
    let message_id = send_json(state.content_request_queue.as_ref(), &event).await?;
    info!(
        user_id = %user_id,
        request_id = %request.id,
        message_id = %message_id,
        count,
        "Content request queued"
    );

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/content-requests
pub async fn handle_list_content_requests(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Result<Json<Vec<ContentRequest>>, AppError> {
    Ok(Json(state.store.list_content_requests(&user_id).await?))
}

/// GET /api/v1/content-requests/:id
pub async fn handle_get_content_request(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(request_id): Path<Uuid>,
) -> Result<Json<ContentRequest>, AppError> {
    let request = state
        .store
        .get_content_request(&user_id, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Content request {request_id} not found")))?;
    Ok(Json(request))
}

/// GET /api/v1/content-requests/:id/generated
pub async fn handle_list_generated(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<GeneratedContentPiece>>, AppError> {
    if state
        .store
        .get_content_request(&user_id, request_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("Content request {request_id} not found")));
    }
    Ok(Json(state.store.list_generated_pieces(&user_id, request_id).await?))
}

// ────────────────────────────────────────────────────────────────────────────
// Generated pieces
// ────────────────────────────────────────────────────────────────────────────

/// Looks a piece up by id and hides other users' pieces.
async fn owned_piece(
    state: &AppState,
    user_id: &str,
    piece_id: Uuid,
) -> Result<GeneratedContentPiece, AppError> {
    state
        .store
        .get_generated_piece(piece_id)
        .await?
        .filter(|piece| piece.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Generated piece {piece_id} not found")))
}

/// GET /api/v1/generated/:id
pub async fn handle_get_generated(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(piece_id): Path<Uuid>,
) -> Result<Json<GeneratedContentPiece>, AppError> {
    Ok(Json(owned_piece(&state, &user_id, piece_id).await?))
}

/// PATCH /api/v1/generated/:id
///
/// Edits `currentContent`; the original LLM output is never touched.
pub async fn handle_edit_generated(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(piece_id): Path<Uuid>,
    payload: Result<Json<EditContentBody>, JsonRejection>,
) -> Result<Json<GeneratedContentPiece>, AppError> {
    let Json(body) = payload?;
    require_text("content", &body.content)?;

    let piece = owned_piece(&state, &user_id, piece_id).await?;
    let updated = state
        .store
        .update_generated_content(&piece, &body.content)
        .await?;
    Ok(Json(updated))
}

/// PATCH /api/v1/generated/:id/posted
pub async fn handle_mark_posted(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(piece_id): Path<Uuid>,
    payload: Result<Json<EditMarkedAsPostedBody>, JsonRejection>,
) -> Result<Json<GeneratedContentPiece>, AppError> {
    let Json(body) = payload?;

    let piece = owned_piece(&state, &user_id, piece_id).await?;
    let updated = state
        .store
        .update_marked_as_posted(&piece, body.marked_as_posted)
        .await?;
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::credentials::secrets::SecretCipher;
    use crate::credentials::StoredCredentialProvider;
    use crate::models::content::ParsedContentPiece;
    use crate::queue::{MemoryQueue, MessageQueue};
    use crate::routes::build_router;
    use crate::store::EntityStore;
    use crate::testing::{FakeLlm, StaticCredentials};

    struct Harness {
        router: Router,
        store: EntityStore,
        brand_queue: MemoryQueue,
        content_queue: MemoryQueue,
        llm: Arc<FakeLlm>,
    }

    fn harness_with(llm: Arc<FakeLlm>, credentials: Arc<StaticCredentials>) -> Harness {
        let store = EntityStore::in_memory();
        let brand_queue = MemoryQueue::immediate("brand", 3);
        let content_queue = MemoryQueue::immediate("content", 3);
        let state = AppState {
            store: store.clone(),
            brand_summary_queue: Arc::new(brand_queue.clone()),
            content_request_queue: Arc::new(content_queue.clone()),
            llm: llm.clone(),
            credentials,
            cipher: SecretCipher::new([5u8; 32]),
        };
        Harness {
            router: build_router(state),
            store,
            brand_queue,
            content_queue,
            llm,
        }
    }

    fn harness() -> Harness {
        harness_with(
            FakeLlm::replying("<title_creation_process>...</title_creation_process>\n<final_title>\nAsync Standups Win\n</final_title>"),
            StaticCredentials::key("sk-test"),
        )
    }

    async fn call(router: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn profile_body() -> Value {
        json!({
            "fullName": "Ada Lovelace",
            "brandDetails": {
                "brandThemes": "Remote teams",
                "toneOfVoice": "Warm",
                "targetAudience": "Team leads",
                "contentGoals": "Newsletter signups"
            },
            "existingContent": [
                { "format": "Tweet", "content": "Write it down." },
                { "format": "", "content": "dropped" }
            ]
        })
    }

    #[tokio::test]
    async fn test_missing_user_header_is_unauthorized() {
        let h = harness();
        let (status, body) = call(&h.router, Method::GET, "/api/v1/profile", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_create_profile_stores_and_queues_summary() {
        let h = harness();
        let (status, body) =
            call(&h.router, Method::POST, "/api/v1/profile", Some("u1"), Some(profile_body())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["profile"]["fullName"], "Ada Lovelace");
        assert_eq!(body["existingContent"].as_array().unwrap().len(), 1);
        assert_eq!(h.store.get_posted_content("u1").await.unwrap().len(), 1);

        let queued = h.brand_queue.pending_bodies().await;
        assert_eq!(queued.len(), 1);
        let event = BrandSummaryRequested::decode(&queued[0]).unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.existing_content.len(), 1);

        let (again, _) =
            call(&h.router, Method::POST, "/api/v1/profile", Some("u1"), Some(profile_body())).await;
        assert_eq!(again, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_profile_rejects_blank_brand_field() {
        let h = harness();
        let mut body = profile_body();
        body["brandDetails"]["toneOfVoice"] = json!("  ");

        let (status, response) = call(&h.router, Method::POST, "/api/v1/profile", Some("u1"), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"]["message"].as_str().unwrap().contains("toneOfVoice"));
        assert_eq!(h.brand_queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_create_content_request_titles_clamps_and_queues() {
        let h = harness();
        let body = json!({
            "ideaContext": "Why async standups beat meetings",
            "contentFormat": "LinkedIn post",
            "contentPiecesCount": 42.7
        });

        let (status, response) =
            call(&h.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response["conciseTitle"], "Async Standups Win");
        assert_eq!(response["contentPiecesCount"], 20);
        assert_eq!(response["isRequestProcessed"], false);
        assert_eq!(h.llm.calls(), 1);

        let queued = h.content_queue.pending_bodies().await;
        let event = ContentRequested::decode(&queued[0]).unwrap();
        assert_eq!(event.content_request.content_pieces_count, 20);
        assert_eq!(event.content_request_id.to_string(), response["id"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_create_content_request_floors_fractional_count() {
        let h = harness();
        let body = json!({ "ideaContext": "x", "contentFormat": "Tweet", "contentPiecesCount": 2.9 });
        let (status, response) =
            call(&h.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response["contentPiecesCount"], 2);
    }

    #[tokio::test]
    async fn test_create_content_request_rejects_non_positive_count() {
        let h = harness();
        for count in [0.0, -3.0, 0.5] {
            let body = json!({ "ideaContext": "x", "contentFormat": "Tweet", "contentPiecesCount": count });
            let (status, _) =
                call(&h.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(h.llm.calls(), 0);
        assert_eq!(h.content_queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_untitled_llm_reply_stores_nothing() {
        let h = harness_with(FakeLlm::replying("Here is a title: Async"), StaticCredentials::key("k"));
        let body = json!({ "ideaContext": "x", "contentFormat": "Tweet", "contentPiecesCount": 1 });

        let (status, response) =
            call(&h.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(response["error"]["code"], "LLM_RESPONSE_UNPARSEABLE");
        assert!(h.store.list_content_requests("u1").await.unwrap().is_empty());
        assert_eq!(h.content_queue.pending().await, 0);
    }

    #[tokio::test]
    async fn test_missing_api_key_and_rejected_key_are_client_errors() {
        let body = json!({ "ideaContext": "x", "contentFormat": "Tweet", "contentPiecesCount": 1 });

        let no_key = harness_with(FakeLlm::replying("unused"), StaticCredentials::missing());
        let (status, response) =
            call(&no_key.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "MISSING_API_KEY");

        let bad_key = harness_with(FakeLlm::failing_auth(), StaticCredentials::key("sk-wrong"));
        let (status, response) =
            call(&bad_key.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "LLM_AUTHENTICATION_FAILED");
    }

    #[tokio::test]
    async fn test_put_credentials_seals_key() {
        let store = EntityStore::in_memory();
        let cipher = SecretCipher::new([5u8; 32]);
        let state = AppState {
            store: store.clone(),
            brand_summary_queue: Arc::new(MemoryQueue::immediate("b", 3)),
            content_request_queue: Arc::new(MemoryQueue::immediate("c", 3)),
            llm: FakeLlm::replying("unused"),
            credentials: Arc::new(StoredCredentialProvider::new(store.clone(), cipher.clone())),
            cipher: cipher.clone(),
        };
        let router = build_router(state);

        let (status, _) = call(
            &router,
            Method::PUT,
            "/api/v1/credentials",
            Some("u1"),
            Some(json!({ "apiKey": "sk-ant-user" })),
        )
        .await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        let stored = store.get_api_credential("u1").await.unwrap().unwrap();
        assert_ne!(stored.encrypted_api_key, "sk-ant-user");
        assert_eq!(cipher.open(&stored.encrypted_api_key).unwrap(), "sk-ant-user");
    }

    #[tokio::test]
    async fn test_generated_piece_routes_are_scoped_to_owner() {
        let h = harness();
        let request = h
            .store
            .create_content_request(
                "u1",
                &ContentRequestDetails {
                    idea_context: "x".into(),
                    content_format: "Tweet".into(),
                    content_pieces_count: 1,
                },
                "Title",
            )
            .await
            .unwrap();
        let pieces = h
            .store
            .create_generated_pieces(
                "u1",
                request.id,
                "Tweet",
                &[ParsedContentPiece {
                    idea: "Idea".into(),
                    content: "Original".into(),
                }],
            )
            .await
            .unwrap();
        let uri = format!("/api/v1/generated/{}", pieces[0].id);

        let (status, _) = call(&h.router, Method::GET, &uri, Some("intruder"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, edited) =
            call(&h.router, Method::PATCH, &uri, Some("u1"), Some(json!({ "content": "Edited" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["currentContent"], "Edited");
        assert_eq!(edited["originalLlmContent"], "Original");

        let (status, posted) = call(
            &h.router,
            Method::PATCH,
            &format!("{uri}/posted"),
            Some("u1"),
            Some(json!({ "markedAsPosted": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["markedAsPosted"], true);
        assert_eq!(posted["currentContent"], "Edited");

        let (status, listed) = call(
            &h.router,
            Method::GET,
            &format!("/api/v1/content-requests/{}/generated", request.id),
            Some("u1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(
            &h.router,
            Method::GET,
            &format!("/api/v1/content-requests/{}/generated", request.id),
            Some("intruder"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_request_is_not_found() {
        let h = harness();
        let (status, _) = call(
            &h.router,
            Method::GET,
            &format!("/api/v1/content-requests/{}", Uuid::new_v4()),
            Some("u1"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_brand_queue_is_untouched_by_content_routes() {
        let h = harness();
        let body = json!({ "ideaContext": "x", "contentFormat": "Tweet", "contentPiecesCount": 1 });
        call(&h.router, Method::POST, "/api/v1/content-requests", Some("u1"), Some(body)).await;
        assert_eq!(h.brand_queue.pending().await, 0);
        assert_eq!(h.brand_queue.name(), "brand");
    }
}
