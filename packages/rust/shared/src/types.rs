//! Core domain types shared by the collaborator clients and the pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error marker stored when no website was discovered.
pub const NO_WEBSITE_FOUND: &str = "No website found";

/// Error marker stored when no videos were discovered.
pub const NO_VIDEOS_FOUND: &str = "No videos found";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Collaborator payloads
// ---------------------------------------------------------------------------

/// One organic result returned by the search service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL.
    #[serde(default)]
    pub link: String,
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Text snippet shown under the result.
    #[serde(default)]
    pub snippet: String,
}

/// One timed caption fragment of a video transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    /// Caption text.
    pub text: String,
    /// Start offset in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

// ---------------------------------------------------------------------------
// Stage output slots
// ---------------------------------------------------------------------------

/// The `{"error": "..."}` value stored in a slot whose stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorMarker {
    pub error: String,
}

/// Contents of a data-gathering stage's output slot.
///
/// Serializes untagged, so a failed slot is exactly `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageData<T> {
    /// The stage failed or found nothing to analyse.
    Failed(ErrorMarker),
    /// The stage produced data.
    Ready(T),
}

impl<T> StageData<T> {
    /// Build an error-marked slot.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(ErrorMarker {
            error: message.into(),
        })
    }

    /// The data, if the slot is not error-marked.
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(data) => Some(data),
            Self::Failed(_) => None,
        }
    }

    /// The error message, if the slot is error-marked.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(marker) => Some(&marker.error),
            Self::Ready(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Signals extracted from the company website.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteData {
    /// Text of the page `<title>`.
    pub title: Option<String>,
    /// Visible text, whitespace-collapsed and capped.
    pub content: String,
    /// Product/service mentions (at most 5, unique).
    pub products: Vec<String>,
    /// Career/job mentions (at most 3, unique).
    pub careers: Vec<String>,
}

/// Transcript-derived signals for one video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoData {
    pub url: String,
    pub transcript: String,
    /// Long alphabetic words from the transcript (at most 5, unique).
    pub key_topics: Vec<String>,
}

/// Signals bucketed from professional-network search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInData {
    pub hiring_trends: Vec<String>,
    pub recent_updates: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let s = id.to_string();
        let parsed: RunId = s.parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn failed_slot_serializes_as_bare_error_object() {
        let slot: StageData<WebsiteData> = StageData::failed(NO_WEBSITE_FOUND);
        let json = serde_json::to_value(&slot).expect("serialize");
        assert_eq!(json, serde_json::json!({"error": "No website found"}));
    }

    #[test]
    fn ready_slot_serializes_as_record() {
        let slot = StageData::Ready(WebsiteData {
            title: Some("Acme".into()),
            content: "We make anvils".into(),
            products: vec!["Anvils".into()],
            careers: vec![],
        });
        let json = serde_json::to_value(&slot).expect("serialize");
        assert_eq!(json["title"], "Acme");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn slots_deserialize_to_the_right_variant() {
        let failed: StageData<Vec<VideoData>> =
            serde_json::from_str(r#"{"error":"No videos found"}"#).expect("failed slot");
        assert_eq!(failed.error(), Some(NO_VIDEOS_FOUND));

        let ready: StageData<Vec<VideoData>> = serde_json::from_str(
            r#"[{"url":"https://www.youtube.com/watch?v=abc","transcript":"hi","key_topics":[]}]"#,
        )
        .expect("ready slot");
        assert_eq!(ready.ready().map(Vec::len), Some(1));
    }

    #[test]
    fn search_hit_tolerates_missing_fields() {
        let hit: SearchHit = serde_json::from_str(r#"{"link":"https://acme.test"}"#).expect("hit");
        assert_eq!(hit.link, "https://acme.test");
        assert!(hit.title.is_empty());
        assert!(hit.snippet.is_empty());
    }
}
