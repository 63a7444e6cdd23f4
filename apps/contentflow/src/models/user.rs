use serde::{Deserialize, Serialize};

/// The four free-text brand attributes a user submits at signup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrandDetails {
    pub brand_themes: String,
    pub tone_of_voice: String,
    pub target_audience: String,
    pub content_goals: String,
}

impl BrandDetails {
    /// Returns the name of the first blank field, if any.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("brandThemes", &self.brand_themes),
            ("toneOfVoice", &self.tone_of_voice),
            ("targetAudience", &self.target_audience),
            ("contentGoals", &self.content_goals),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub full_name: String,
    pub brand_details: BrandDetails,
    /// Absent until the brand-summary worker has run.
    pub brand_summary: Option<String>,
}

impl UserProfile {
    pub fn has_brand_summary(&self) -> bool {
        self.brand_summary.is_some()
    }
}

/// A user's LLM API key, sealed by `credentials::SecretCipher`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserApiCredential {
    pub user_id: String,
    pub encrypted_api_key: String,
}
