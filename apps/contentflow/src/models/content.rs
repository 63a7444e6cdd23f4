use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A format/body pair: what the user submits as existing content, and what
/// the selector hands to the prompt builder as an exemplar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentPiece {
    pub format: String,
    pub content: String,
}

/// A historical piece of the user's own content. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostedContentPiece {
    pub id: Uuid,
    pub format: String,
    pub content: String,
}

impl From<PostedContentPiece> for ContentPiece {
    fn from(piece: PostedContentPiece) -> Self {
        ContentPiece {
            format: piece.format,
            content: piece.content,
        }
    }
}

/// One `<content_piece>` block recovered from an LLM response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContentPiece {
    pub idea: String,
    pub content: String,
}

/// A piece produced by the content-generation worker for one request.
///
/// `original_llm_content` is the write-once snapshot of what the model
/// returned; `current_content` starts equal to it and is the only body the
/// user may edit afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContentPiece {
    pub id: Uuid,
    pub user_id: String,
    pub content_request_id: Uuid,
    pub format: String,
    pub idea: String,
    pub current_content: String,
    pub original_llm_content: String,
    pub marked_as_posted: bool,
}
