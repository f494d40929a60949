//! In-memory collaborators for engine and stage tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use duediligence_crawler::{FetchedPage, PageFetcher, TranscriptSource};
use duediligence_discovery::WebSearch;
use duediligence_shared::{DueDiligenceError, Result, SearchHit, TranscriptFragment};

use crate::llm::LanguageModel;
use crate::pipeline::Clients;

pub(crate) fn hit(link: &str, title: &str, snippet: &str) -> SearchHit {
    SearchHit {
        link: link.into(),
        title: title.into(),
        snippet: snippet.into(),
    }
}

pub(crate) fn fragments(texts: &[&str]) -> Vec<TranscriptFragment> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| TranscriptFragment {
            text: (*text).into(),
            start: i as f64,
            duration: 1.0,
        })
        .collect()
}

/// Search results keyed by exact query; unknown queries return nothing.
#[derive(Default)]
pub(crate) struct FakeSearch {
    results: HashMap<String, std::result::Result<Vec<SearchHit>, String>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FakeSearch {
    pub fn with(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.results.insert(query.into(), Ok(hits));
        self
    }

    pub fn failing(mut self, query: &str, message: &str) -> Self {
        self.results.insert(query.into(), Err(message.into()));
        self
    }
}

#[async_trait]
impl WebSearch for FakeSearch {
    async fn search(&self, query: &str, region: &str) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), region.to_string()));
        match self.results.get(query) {
            Some(Ok(hits)) => Ok(hits.clone()),
            Some(Err(message)) => Err(DueDiligenceError::Search(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Pages keyed by URL; unknown URLs are a network fault.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    pages: HashMap<String, std::result::Result<String, String>>,
}

impl FakeFetcher {
    pub fn with(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.into(), Ok(html.into()));
        self
    }

    pub fn failing(mut self, url: &str, message: &str) -> Self {
        self.pages.insert(url.into(), Err(message.into()));
        self
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        match self.pages.get(url) {
            Some(Ok(html)) => Ok(FetchedPage::from_html(url, 200, html.clone())),
            Some(Err(message)) => Err(DueDiligenceError::Network(message.clone())),
            None => Err(DueDiligenceError::Network(format!("{url}: connection refused"))),
        }
    }
}

/// Transcripts keyed by video id; unknown ids have captions disabled.
#[derive(Default)]
pub(crate) struct FakeTranscripts {
    videos: HashMap<String, Vec<TranscriptFragment>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTranscripts {
    pub fn with(mut self, video_id: &str, texts: &[&str]) -> Self {
        self.videos.insert(video_id.into(), fragments(texts));
        self
    }
}

#[async_trait]
impl TranscriptSource for FakeTranscripts {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptFragment>> {
        self.calls.lock().unwrap().push(video_id.to_string());
        self.videos.get(video_id).cloned().ok_or_else(|| {
            DueDiligenceError::Transcript(format!("{video_id}: transcripts are disabled"))
        })
    }
}

/// Echoes a fixed completion and records every prompt.
pub(crate) struct FakeModel {
    reply: std::result::Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .clone()
            .map_err(DueDiligenceError::Synthesis)
    }
}

/// A full set of fakes, kept as concrete `Arc`s so tests can inspect them.
pub(crate) struct Fakes {
    pub search: Arc<FakeSearch>,
    pub fetcher: Arc<FakeFetcher>,
    pub transcripts: Arc<FakeTranscripts>,
    pub llm: Arc<FakeModel>,
}

impl Fakes {
    pub fn new(
        search: FakeSearch,
        fetcher: FakeFetcher,
        transcripts: FakeTranscripts,
        llm: FakeModel,
    ) -> Self {
        Self {
            search: Arc::new(search),
            fetcher: Arc::new(fetcher),
            transcripts: Arc::new(transcripts),
            llm: Arc::new(llm),
        }
    }

    pub fn clients(&self) -> Clients {
        Clients {
            search: self.search.clone(),
            fetcher: self.fetcher.clone(),
            transcripts: self.transcripts.clone(),
            llm: self.llm.clone(),
        }
    }
}
