//! Resource discovery: find the company website and up to two videos.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use duediligence_discovery::{
    WebSearch, channel_query, first_organic_link, video_links, website_query,
};
use duediligence_shared::{Result, SearchHit};

use crate::stage::{Containment, Stage};
use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

/// Maximum number of video links handed to video analysis.
pub const MAX_VIDEOS: usize = 2;

pub struct ResourceDiscovery {
    search: Arc<dyn WebSearch>,
    region: String,
}

impl ResourceDiscovery {
    pub fn new(search: Arc<dyn WebSearch>, region: impl Into<String>) -> Self {
        Self {
            search,
            region: region.into(),
        }
    }

    /// A failed search counts as an empty one.
    async fn search_or_empty(&self, query: &str) -> Vec<SearchHit> {
        match self.search.search(query, &self.region).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(%query, error = %e, "search failed, treating as no results");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Stage for ResourceDiscovery {
    fn name(&self) -> &'static str {
        "resource_discovery"
    }

    fn reads(&self) -> &'static [StateKey] {
        &[StateKey::Query]
    }

    fn writes(&self) -> &'static [StateKey] {
        &[StateKey::CompanyName, StateKey::WebsiteUrl, StateKey::YoutubeUrls]
    }

    fn containment(&self) -> Containment {
        Containment::Skip
    }

    #[instrument(skip_all, fields(query = %state.query()))]
    async fn run(&self, state: &PipelineState) -> Result<StatePatch> {
        let company = state.query();

        let website_hits = self.search_or_empty(&website_query(company)).await;
        let video_hits = self.search_or_empty(&channel_query(company)).await;

        let website_url = first_organic_link(&website_hits);
        let youtube_urls = video_links(&video_hits, MAX_VIDEOS);

        info!(
            website = website_url.as_deref().unwrap_or("-"),
            videos = youtube_urls.len(),
            "resources discovered"
        );

        Ok(StatePatch::new()
            .with(StateUpdate::CompanyName(company.to_string()))
            .with(StateUpdate::WebsiteUrl(website_url))
            .with(StateUpdate::YoutubeUrls(youtube_urls)))
    }
}
