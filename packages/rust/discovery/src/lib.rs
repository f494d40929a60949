//! External search client and organic-result helpers.
//!
//! Resource discovery and social insights both go through the [`WebSearch`]
//! trait. [`SerpApiSearch`] is the production implementation: it queries a
//! SerpApi-compatible Google search endpoint and returns the organic results
//! in rank order.

mod resources;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use duediligence_shared::{DueDiligenceError, Result, SearchConfig, SearchHit, read_api_key};

pub use resources::{
    SOCIAL_DOMAIN, channel_query, first_organic_link, is_video_link, social_query, video_links,
    website_query,
};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("DueDiligence/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow when calling the search API.
const MAX_REDIRECTS: usize = 3;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A text search service returning ranked organic results.
///
/// Implementations hold no per-run state and are shared across pipeline runs.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Run `query` scoped to `region` and return organic results in rank order.
    async fn search(&self, query: &str, region: &str) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// SerpApi client
// ---------------------------------------------------------------------------

/// Response body of the search API. Only the fields we use are modelled.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<SearchHit>,
    #[serde(default)]
    error: Option<String>,
}

/// Google search through a SerpApi-compatible JSON endpoint.
pub struct SerpApiSearch {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SerpApiSearch {
    /// Create a client with an explicit API key.
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                DueDiligenceError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: api_key.into(),
        })
    }

    /// Create a client reading the API key from the configured env var.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env)?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl WebSearch for SerpApiSearch {
    #[instrument(skip(self), fields(query = %query, region = %region))]
    async fn search(&self, query: &str, region: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("location", region),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DueDiligenceError::Search(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DueDiligenceError::Search(format!("HTTP {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| DueDiligenceError::Search(format!("invalid response body: {e}")))?;

        // The API reports "no results" as an error string rather than an empty list.
        if body.organic_results.is_empty() {
            if let Some(error) = body.error {
                if error.contains("any results") {
                    debug!(%error, "search returned no results");
                    return Ok(Vec::new());
                }
                return Err(DueDiligenceError::Search(error));
            }
        }

        debug!(count = body.organic_results.len(), "search results received");
        Ok(body.organic_results)
    }
}
