//! Website analysis: fetch the discovered homepage and extract signals.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use duediligence_crawler::{PageFetcher, analyze_website};
use duediligence_shared::{NO_WEBSITE_FOUND, Result, StageData};

use crate::stage::{Containment, Stage};
use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

pub struct WebsiteAnalysis {
    fetcher: Arc<dyn PageFetcher>,
    content_char_limit: usize,
}

impl WebsiteAnalysis {
    pub fn new(fetcher: Arc<dyn PageFetcher>, content_char_limit: usize) -> Self {
        Self {
            fetcher,
            content_char_limit,
        }
    }
}

#[async_trait]
impl Stage for WebsiteAnalysis {
    fn name(&self) -> &'static str {
        "website_analysis"
    }

    fn reads(&self) -> &'static [StateKey] {
        &[StateKey::WebsiteUrl]
    }

    fn writes(&self) -> &'static [StateKey] {
        &[StateKey::WebsiteData]
    }

    fn containment(&self) -> Containment {
        Containment::ErrorMarker(StateKey::WebsiteData)
    }

    #[instrument(skip_all, fields(url = state.website_url.as_deref().unwrap_or("")))]
    async fn run(&self, state: &PipelineState) -> Result<StatePatch> {
        let Some(url) = state.website_url.as_deref() else {
            return Ok(StateUpdate::WebsiteData(StageData::failed(NO_WEBSITE_FOUND)).into());
        };

        let page = self.fetcher.fetch(url).await?;
        let data = analyze_website(&page, self.content_char_limit);

        debug!(
            products = data.products.len(),
            careers = data.careers.len(),
            chars = data.content.chars().count(),
            "website analysed"
        );

        Ok(StateUpdate::WebsiteData(StageData::Ready(data)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFetcher;

    fn state_with_url(url: Option<&str>) -> PipelineState {
        let mut state = PipelineState::new("Acme Corp");
        state.merge(StateUpdate::WebsiteUrl(url.map(String::from)).into());
        state
    }

    #[tokio::test]
    async fn missing_url_is_marked_not_fetched() {
        let stage = WebsiteAnalysis::new(Arc::new(FakeFetcher::default()), 5000);
        let patch = stage.run(&state_with_url(None)).await.unwrap();
        assert_eq!(
            patch.updates(),
            &[StateUpdate::WebsiteData(StageData::failed("No website found"))]
        );
    }

    #[tokio::test]
    async fn extracts_signals_from_fetched_page() {
        let html = std::fs::read_to_string("../../../fixtures/html/acme-home.html")
            .expect("read html fixture");
        let fetcher = FakeFetcher::default().with("https://www.acme.test/", &html);
        let stage = WebsiteAnalysis::new(Arc::new(fetcher), 5000);

        let mut state = state_with_url(Some("https://www.acme.test/"));
        state.merge(stage.run(&state).await.unwrap());

        let data = state.website_data.as_ref().and_then(|d| d.ready()).unwrap();
        assert_eq!(data.title.as_deref(), Some("Acme Corp | Industrial Anvils"));
        assert!(data.products.len() <= 5);
        assert!(data.careers.len() <= 3);
        assert!(!data.content.contains("trackVisitor"));
    }

    #[tokio::test]
    async fn fetch_fault_is_returned_for_containment() {
        let fetcher =
            FakeFetcher::default().failing("https://www.acme.test/", "operation timed out");
        let stage = WebsiteAnalysis::new(Arc::new(fetcher), 5000);

        let err = stage
            .run(&state_with_url(Some("https://www.acme.test/")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert_eq!(stage.containment(), Containment::ErrorMarker(StateKey::WebsiteData));
    }
}
