//! Per-run pipeline state and the patches stages return.
//!
//! A run starts from a query and accumulates one slot per stage output.
//! Stages never mutate the state directly: they return a [`StatePatch`]
//! listing the slots they computed, and the engine merges it by whole-slot
//! replacement.

use std::fmt;

use serde::{Deserialize, Serialize};

use duediligence_shared::{LinkedInData, StageData, VideoData, WebsiteData};

/// A top-level slot of [`PipelineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
    Query,
    CompanyName,
    WebsiteUrl,
    YoutubeUrls,
    WebsiteData,
    YoutubeData,
    LinkedinData,
    Report,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::CompanyName => "company_name",
            Self::WebsiteUrl => "website_url",
            Self::YoutubeUrls => "youtube_urls",
            Self::WebsiteData => "website_data",
            Self::YoutubeData => "youtube_data",
            Self::LinkedinData => "linkedin_data",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record flowing through one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default)]
    pub youtube_urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_data: Option<StageData<WebsiteData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_data: Option<StageData<Vec<VideoData>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_data: Option<StageData<LinkedInData>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
}

impl PipelineState {
    /// Fresh state holding only the query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// The query the run was started with.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Company name if discovery ran, otherwise the raw query.
    pub fn company(&self) -> &str {
        self.company_name.as_deref().unwrap_or(&self.query)
    }

    /// Apply every update in `patch`, replacing the affected slots.
    pub fn merge(&mut self, patch: StatePatch) {
        for update in patch.updates {
            match update {
                StateUpdate::CompanyName(v) => self.company_name = Some(v),
                StateUpdate::WebsiteUrl(v) => self.website_url = v,
                StateUpdate::YoutubeUrls(v) => self.youtube_urls = v,
                StateUpdate::WebsiteData(v) => self.website_data = Some(v),
                StateUpdate::YoutubeData(v) => self.youtube_data = Some(v),
                StateUpdate::LinkedinData(v) => self.linkedin_data = Some(v),
                StateUpdate::Report(v) => self.report = Some(v),
            }
        }
    }
}

/// A single slot replacement. There is no variant for the query.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    CompanyName(String),
    /// `None` records that no website was found.
    WebsiteUrl(Option<String>),
    YoutubeUrls(Vec<String>),
    WebsiteData(StageData<WebsiteData>),
    YoutubeData(StageData<Vec<VideoData>>),
    LinkedinData(StageData<LinkedInData>),
    Report(String),
}

impl StateUpdate {
    pub fn key(&self) -> StateKey {
        match self {
            Self::CompanyName(_) => StateKey::CompanyName,
            Self::WebsiteUrl(_) => StateKey::WebsiteUrl,
            Self::YoutubeUrls(_) => StateKey::YoutubeUrls,
            Self::WebsiteData(_) => StateKey::WebsiteData,
            Self::YoutubeData(_) => StateKey::YoutubeData,
            Self::LinkedinData(_) => StateKey::LinkedinData,
            Self::Report(_) => StateKey::Report,
        }
    }
}

/// The partial result of one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    updates: Vec<StateUpdate>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with(mut self, update: StateUpdate) -> Self {
        self.updates.push(update);
        self
    }

    pub fn push(&mut self, update: StateUpdate) {
        self.updates.push(update);
    }

    /// Keys written by this patch, in update order.
    pub fn keys(&self) -> Vec<StateKey> {
        self.updates.iter().map(StateUpdate::key).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn updates(&self) -> &[StateUpdate] {
        &self.updates
    }
}

impl From<StateUpdate> for StatePatch {
    fn from(update: StateUpdate) -> Self {
        Self::new().with(update)
    }
}
