//! JSON bodies of the Android Publisher v3 API.

use serde::{Deserialize, Serialize};

/// `AppEdit` resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    /// Edit identifier
    pub id: String,
    /// Expiry as Unix seconds, encoded as a string
    #[serde(default)]
    pub expiry_time_seconds: Option<String>,
}

/// `Bundle` resource returned by the upload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Version code of the bundle
    #[serde(default)]
    pub version_code: Option<i64>,
    /// SHA-256 of the bundle
    #[serde(default)]
    pub sha256: Option<String>,
}

/// `Track` resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackBody {
    /// Track name
    pub track: String,
    /// Releases on the track
    #[serde(default)]
    pub releases: Vec<ReleaseBody>,
}

/// `TrackRelease` resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBody {
    /// Version codes; int64 values travel as strings
    #[serde(default)]
    pub version_codes: Vec<String>,
    /// Release status
    pub status: String,
    /// Localized release notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub release_notes: Vec<LocalizedText>,
}

/// `LocalizedText` resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// BCP-47 language tag
    pub language: String,
    /// Text in that language
    pub text: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Human-readable message from a Google API error body, or the raw body
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => match error.status {
            Some(status) if !error.message.is_empty() => format!("{} ({})", error.message, status),
            Some(status) => status,
            None => error.message,
        },
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        }
    }
}
