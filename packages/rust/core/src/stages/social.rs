//! Social insights: hiring and activity signals from professional-network results.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use duediligence_discovery::{WebSearch, social_query};
use duediligence_shared::text::contains_any;
use duediligence_shared::{LinkedInData, Result, SearchHit, StageData};

use crate::stage::{Containment, Stage};
use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

/// Placeholder used when no hiring result matched.
pub const NO_HIRING_INFO: &str = "No hiring information found";

/// Placeholder used when no activity result matched.
pub const NO_RECENT_UPDATES: &str = "No recent updates found";

/// Maximum entries per bucket.
const MAX_BUCKET: usize = 3;

const HIRING_MARKERS: &[&str] = &["career", "job"];
const UPDATE_MARKERS: &[&str] = &["post", "update"];

pub struct SocialInsights {
    search: Arc<dyn WebSearch>,
    region: String,
}

impl SocialInsights {
    pub fn new(search: Arc<dyn WebSearch>, region: impl Into<String>) -> Self {
        Self {
            search,
            region: region.into(),
        }
    }
}

/// Sort results into hiring and activity buckets. A result may land in both.
pub fn bucket_social_hits(hits: &[SearchHit]) -> LinkedInData {
    let mut hiring_trends: Vec<String> = hits
        .iter()
        .filter(|hit| contains_any(&hit.link, HIRING_MARKERS))
        .map(|hit| hit.title.clone())
        .take(MAX_BUCKET)
        .collect();

    let mut recent_updates: Vec<String> = hits
        .iter()
        .filter(|hit| {
            contains_any(&hit.link, UPDATE_MARKERS) || contains_any(&hit.snippet, UPDATE_MARKERS)
        })
        .map(|hit| hit.snippet.clone())
        .take(MAX_BUCKET)
        .collect();

    if hiring_trends.is_empty() {
        hiring_trends.push(NO_HIRING_INFO.to_string());
    }
    if recent_updates.is_empty() {
        recent_updates.push(NO_RECENT_UPDATES.to_string());
    }

    LinkedInData {
        hiring_trends,
        recent_updates,
    }
}

#[async_trait]
impl Stage for SocialInsights {
    fn name(&self) -> &'static str {
        "social_insights"
    }

    fn reads(&self) -> &'static [StateKey] {
        &[StateKey::CompanyName]
    }

    fn writes(&self) -> &'static [StateKey] {
        &[StateKey::LinkedinData]
    }

    fn containment(&self) -> Containment {
        Containment::ErrorMarker(StateKey::LinkedinData)
    }

    #[instrument(skip_all, fields(company = %state.company()))]
    async fn run(&self, state: &PipelineState) -> Result<StatePatch> {
        let hits = self
            .search
            .search(&social_query(state.company()), &self.region)
            .await?;
        let data = bucket_social_hits(&hits);

        debug!(
            results = hits.len(),
            hiring = data.hiring_trends.len(),
            updates = data.recent_updates.len(),
            "social results bucketed"
        );

        Ok(StateUpdate::LinkedinData(StageData::Ready(data)).into())
    }
}
