//! Standalone request/response operations served next to the full pipeline.
//!
//! Each operation takes a deserializable request and returns a serializable
//! response. [`ToolReply`] folds a fault into the `{"error": "..."}` shape the
//! HTTP surface returns.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use duediligence_crawler::{
    PageFetcher, TranscriptSource, join_fragments, select_texts, video_id_from_url,
};
use duediligence_shared::text::truncate_chars;
use duediligence_shared::{DueDiligenceError, ErrorMarker, LinkedInData, Result};

use crate::llm::LanguageModel;
use crate::pipeline::Pipeline;

// ---------------------------------------------------------------------------
// Reply envelope
// ---------------------------------------------------------------------------

/// Either the operation's response or `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolReply<T> {
    Ok(T),
    Error(ErrorMarker),
}

impl<T> From<Result<T>> for ToolReply<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(e) => Self::Error(ErrorMarker {
                error: e.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

/// Optional CSS selectors applied to the scraped page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub products: Option<String>,
    #[serde(default)]
    pub careers: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default)]
    pub extract_rules: Option<ExtractRules>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub careers: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub title: Option<String>,
    pub links: Vec<String>,
    pub text_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<ExtractedData>,
}

/// Fetch a page and return its surface, plus texts for any custom selectors.
#[instrument(skip_all, fields(url = %request.url))]
pub async fn scrape(
    fetcher: &dyn PageFetcher,
    request: &ScrapeRequest,
    text_char_limit: usize,
) -> Result<ScrapeResponse> {
    let page = fetcher.fetch(&request.url).await?;

    let extracted_data = match &request.extract_rules {
        Some(rules) => Some(ExtractedData {
            products: rules
                .products
                .as_deref()
                .map(|sel| select_texts(&page.html, sel))
                .transpose()?,
            careers: rules
                .careers
                .as_deref()
                .map(|sel| select_texts(&page.html, sel))
                .transpose()?,
        }),
        None => None,
    };

    Ok(ScrapeResponse {
        title: page.title,
        links: page.links,
        text_content: truncate_chars(&page.text, text_char_limit).to_string(),
        extracted_data,
    })
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    pub video_url: String,
    /// Accepted for compatibility; visual analysis is not performed.
    #[serde(default)]
    pub analyze_visuals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResponse {
    pub transcript: String,
    pub key_frames: Vec<String>,
    pub sentiment: String,
}

/// Transcript of one video with fixed frame and sentiment placeholders.
#[instrument(skip_all, fields(video_url = %request.video_url))]
pub async fn analyze_video(
    transcripts: &dyn TranscriptSource,
    request: &VideoRequest,
) -> Result<VideoResponse> {
    let fragments = transcripts
        .fetch_transcript(video_id_from_url(&request.video_url))
        .await?;

    Ok(VideoResponse {
        transcript: join_fragments(&fragments),
        key_frames: Vec::new(),
        sentiment: "positive".to_string(),
    })
}

// ---------------------------------------------------------------------------
// Professional-network data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedInRequest {
    pub company_name: String,
}

/// Canned hiring and activity data; no network access.
pub fn simulated_linkedin(request: &LinkedInRequest) -> LinkedInData {
    LinkedInData {
        hiring_trends: vec![
            "Increased hiring in AI/ML roles".to_string(),
            "5 new job postings in engineering".to_string(),
        ],
        recent_updates: vec![
            format!("{} announced new cloud product", request.company_name),
            "CEO spoke at recent tech conference".to_string(),
        ],
    }
}

// ---------------------------------------------------------------------------
// Summarize
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRequest {
    pub text: String,
    #[serde(default = "default_focus_areas")]
    pub focus_areas: Vec<String>,
}

impl SummaryRequest {
    /// Request with the default focus areas.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            focus_areas: default_focus_areas(),
        }
    }
}

fn default_focus_areas() -> Vec<String> {
    vec!["strategy".into(), "products".into(), "hiring".into()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

/// The fixed strategic-summary prompt.
pub fn summary_prompt(text: &str, focus_areas: &[String]) -> String {
    format!(
        "Analyze this text focusing on {}:\n\
         {text}\n\
         \n\
         Generate a strategic summary highlighting:\n\
         - Key initiatives\n\
         - Product developments\n\
         - Hiring trends\n\
         - Competitive positioning",
        focus_areas.join(", ")
    )
}

#[instrument(skip_all, fields(chars = request.text.len()))]
pub async fn summarize(
    llm: &dyn LanguageModel,
    request: &SummaryRequest,
) -> Result<SummaryResponse> {
    let summary = llm
        .complete(&summary_prompt(&request.text, &request.focus_areas))
        .await?;
    Ok(SummaryResponse { summary })
}

// ---------------------------------------------------------------------------
// Full analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub report: String,
}

/// Run the whole pipeline for one query. A blank query is rejected before
/// any search is made.
pub async fn analyze(pipeline: &Pipeline, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
    require_non_empty("query", &request.query)?;
    let outcome = pipeline.run(&request.query).await?;
    info!(run_id = %outcome.run_id, "analysis served");
    Ok(AnalyzeResponse {
        report: outcome.report,
    })
}

/// Reject blank identifiers before any network work.
pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DueDiligenceError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, FakeModel, FakeSearch, FakeTranscripts, Fakes};
    use duediligence_shared::AppConfig;

    const PAGE: &str = r#"<html><head><title>Acme</title></head><body>
        <script>trackVisitor()</script>
        <ul><li class="plan">Basic</li><li class="plan">Pro</li></ul>
        <a href="/jobs/1" class="job">Welder</a>
        </body></html>"#;

    #[tokio::test]
    async fn scrape_applies_custom_selectors() {
        let fetcher = FakeFetcher::default().with("https://www.acme.test/", PAGE);
        let request: ScrapeRequest = serde_json::from_value(serde_json::json!({
            "url": "https://www.acme.test/",
            "extract_rules": {"products": "li.plan", "careers": "a.job"}
        }))
        .unwrap();

        let response = scrape(&fetcher, &request, 5000).await.unwrap();
        let extracted = response.extracted_data.unwrap();
        assert_eq!(extracted.products.unwrap(), vec!["Basic", "Pro"]);
        assert_eq!(extracted.careers.unwrap(), vec!["Welder"]);
    }

    #[tokio::test]
    async fn scrape_without_rules_omits_extracted_data() {
        let fetcher = FakeFetcher::default().with("https://www.acme.test/", PAGE);
        let request = ScrapeRequest {
            url: "https://www.acme.test/".into(),
            extract_rules: None,
        };

        let response = scrape(&fetcher, &request, 5000).await.unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("extracted_data").is_none());
        assert!(json.get("text_content").is_some());
    }

    #[tokio::test]
    async fn scrape_fault_becomes_error_reply() {
        let fetcher = FakeFetcher::default().failing("https://www.acme.test/", "HTTP 500");
        let request = ScrapeRequest {
            url: "https://www.acme.test/".into(),
            extract_rules: None,
        };

        let reply: ToolReply<ScrapeResponse> = scrape(&fetcher, &request, 5000).await.into();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json, serde_json::json!({"error": "network error: HTTP 500"}));
    }

    #[tokio::test]
    async fn invalid_selector_is_a_fault() {
        let fetcher = FakeFetcher::default().with("https://www.acme.test/", PAGE);
        let request = ScrapeRequest {
            url: "https://www.acme.test/".into(),
            extract_rules: Some(ExtractRules {
                products: Some("li[".into()),
                careers: None,
            }),
        };
        assert!(scrape(&fetcher, &request, 5000).await.is_err());
    }

    #[tokio::test]
    async fn video_reply_has_fixed_placeholders() {
        let transcripts = FakeTranscripts::default().with("abc", &["Hello", "world"]);
        let request: VideoRequest = serde_json::from_value(serde_json::json!({
            "video_url": "https://www.youtube.com/watch?v=abc&t=3"
        }))
        .unwrap();
        assert!(!request.analyze_visuals);

        let response = analyze_video(&transcripts, &request).await.unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({
                "transcript": "Hello world",
                "key_frames": [],
                "sentiment": "positive"
            })
        );
    }

    #[test]
    fn simulated_linkedin_mentions_company() {
        let data = simulated_linkedin(&LinkedInRequest {
            company_name: "Acme Corp".into(),
        });
        assert_eq!(data.hiring_trends.len(), 2);
        assert_eq!(data.recent_updates[0], "Acme Corp announced new cloud product");
    }

    #[tokio::test]
    async fn summarize_uses_default_focus_areas() {
        let llm = FakeModel::replying("SUMMARY");
        let request: SummaryRequest =
            serde_json::from_value(serde_json::json!({"text": "Acme builds anvils."})).unwrap();

        let response = summarize(&llm, &request).await.unwrap();
        assert_eq!(response.summary, "SUMMARY");

        let prompt = llm.last_prompt();
        assert!(prompt.starts_with(
            "Analyze this text focusing on strategy, products, hiring:\nAcme builds anvils.\n\n"
        ));
        assert!(prompt.ends_with("- Competitive positioning"));
    }

    #[tokio::test]
    async fn analyze_rejects_blank_query_before_searching() {
        let fakes = Fakes::new(
            FakeSearch::default(),
            FakeFetcher::default(),
            FakeTranscripts::default(),
            FakeModel::replying("REPORT"),
        );
        let pipeline = Pipeline::with_defaults(fakes.clients(), &AppConfig::default()).unwrap();

        let blank = AnalyzeRequest { query: "  ".into() };
        assert!(analyze(&pipeline, &blank).await.is_err());
        assert!(fakes.search.calls.lock().unwrap().is_empty());

        let padded = AnalyzeRequest {
            query: "Acme Corp ".into(),
        };
        let response = analyze(&pipeline, &padded).await.unwrap();
        assert_eq!(response.report, "REPORT");
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(require_non_empty("url", "  ").is_err());
        assert!(require_non_empty("url", "https://acme.test").is_ok());
    }
}
