use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_CONTENT_PIECES: u8 = 1;
pub const MAX_CONTENT_PIECES: u8 = 20;

/// What the user asked for. Carried in the content-request event and stored
/// on the request record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContentRequestDetails {
    pub idea_context: String,
    pub content_format: String,
    pub content_pieces_count: u8,
}

impl ContentRequestDetails {
    pub fn has_valid_count(&self) -> bool {
        (MIN_CONTENT_PIECES..=MAX_CONTENT_PIECES).contains(&self.content_pieces_count)
    }
}

/// Clamps a raw requested count into `[1, 20]`, flooring fractional input.
///
/// Returns `None` for counts that are not positive (or not finite); those are
/// rejected at the boundary rather than clamped up.
pub fn clamp_pieces_count(raw: f64) -> Option<u8> {
    if !raw.is_finite() {
        return None;
    }
    let floored = raw.floor();
    if floored < f64::from(MIN_CONTENT_PIECES) {
        return None;
    }
    if floored >= f64::from(MAX_CONTENT_PIECES) {
        return Some(MAX_CONTENT_PIECES);
    }
    Some(floored as u8)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub id: Uuid,
    pub idea_context: String,
    pub content_format: String,
    pub content_pieces_count: u8,
    pub concise_title: String,
    /// Flips false → true exactly once, when generated pieces are persisted.
    pub is_request_processed: bool,
    pub created_at: DateTime<Utc>,
}

impl ContentRequest {
    pub fn details(&self) -> ContentRequestDetails {
        ContentRequestDetails {
            idea_context: self.idea_context.clone(),
            content_format: self.content_format.clone(),
            content_pieces_count: self.content_pieces_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_caps_at_twenty() {
        assert_eq!(clamp_pieces_count(21.0), Some(20));
        assert_eq!(clamp_pieces_count(1_000.0), Some(20));
    }

    #[test]
    fn test_clamp_floors_fractional_counts() {
        assert_eq!(clamp_pieces_count(3.9), Some(3));
        assert_eq!(clamp_pieces_count(20.5), Some(20));
    }

    #[test]
    fn test_clamp_rejects_non_positive() {
        assert_eq!(clamp_pieces_count(0.0), None);
        assert_eq!(clamp_pieces_count(0.7), None);
        assert_eq!(clamp_pieces_count(-4.0), None);
        assert_eq!(clamp_pieces_count(f64::NAN), None);
    }

    #[test]
    fn test_valid_count_bounds() {
        let mut details = ContentRequestDetails {
            idea_context: "ctx".to_string(),
            content_format: "linkedin post".to_string(),
            content_pieces_count: 1,
        };
        assert!(details.has_valid_count());
        details.content_pieces_count = 20;
        assert!(details.has_valid_count());
        details.content_pieces_count = 0;
        assert!(!details.has_valid_count());
        details.content_pieces_count = 21;
        assert!(!details.has_valid_count());
    }
}
