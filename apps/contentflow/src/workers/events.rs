use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::content::ContentPiece;
use crate::models::request::ContentRequestDetails;
use crate::models::user::BrandDetails;
use crate::workers::WorkerError;

/// Enqueued by profile creation; consumed by the brand-summary worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrandSummaryRequested {
    pub user_id: String,
    pub brand_details: BrandDetails,
    #[serde(default)]
    pub existing_content: Vec<ContentPiece>,
}

impl BrandSummaryRequested {
    pub fn decode(body: &str) -> Result<Self, WorkerError> {
        let event: Self = serde_json::from_str(body)
            .map_err(|e| WorkerError::Validation(format!("malformed brand summary event: {e}")))?;
        require_user_id(&event.user_id)?;
        Ok(event)
    }
}

/// Enqueued by content-request creation; consumed by the generation worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentRequested {
    pub user_id: String,
    pub content_request_id: Uuid,
    pub content_request: ContentRequestDetails,
}

impl ContentRequested {
    pub fn decode(body: &str) -> Result<Self, WorkerError> {
        let event: Self = serde_json::from_str(body)
            .map_err(|e| WorkerError::Validation(format!("malformed content request event: {e}")))?;
        require_user_id(&event.user_id)?;
        if !event.content_request.has_valid_count() {
            return Err(WorkerError::Validation(format!(
                "contentPiecesCount {} is out of range",
                event.content_request.content_pieces_count
            )));
        }
        Ok(event)
    }
}

fn require_user_id(user_id: &str) -> Result<(), WorkerError> {
    if user_id.trim().is_empty() {
        return Err(WorkerError::Validation("userId is empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content_event(count: u8) -> serde_json::Value {
        json!({
            "userId": "u1",
            "contentRequestId": Uuid::new_v4(),
            "contentRequest": {
                "ideaContext": "Async standups",
                "contentFormat": "LinkedIn post",
                "contentPiecesCount": count
            }
        })
    }

    #[test]
    fn test_decode_brand_summary_event() {
        let body = json!({
            "userId": "u1",
            "brandDetails": {
                "brandThemes": "a", "toneOfVoice": "b",
                "targetAudience": "c", "contentGoals": "d"
            },
            "existingContent": [{ "format": "Tweet", "content": "hi" }]
        })
        .to_string();

        let event = BrandSummaryRequested::decode(&body).unwrap();
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.existing_content.len(), 1);
    }

    #[test]
    fn test_decode_rejects_unknown_fields_and_garbage() {
        let mut body = content_event(3);
        body["extra"] = json!(true);
        assert!(matches!(
            ContentRequested::decode(&body.to_string()),
            Err(WorkerError::Validation(_))
        ));
        assert!(matches!(
            ContentRequested::decode("not json"),
            Err(WorkerError::Validation(_))
        ));
    }

    #[test]
    fn test_decode_rejects_blank_user_and_bad_count() {
        let mut blank = content_event(3);
        blank["userId"] = json!("  ");
        assert!(ContentRequested::decode(&blank.to_string()).is_err());

        assert!(ContentRequested::decode(&content_event(0).to_string()).is_err());
        assert!(ContentRequested::decode(&content_event(21).to_string()).is_err());
        assert!(ContentRequested::decode(&content_event(20).to_string()).is_ok());
    }
}
