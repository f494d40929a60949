//! Video analysis: transcripts and topic words for each discovered video.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use duediligence_crawler::{TranscriptSource, join_fragments, video_id_from_url};
use duediligence_shared::text::dedup_capped;
use duediligence_shared::{NO_VIDEOS_FOUND, Result, StageData, VideoData};

use crate::stage::{Containment, Stage};
use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

/// Maximum number of topic words per video.
pub const MAX_KEY_TOPICS: usize = 5;

/// Topic words need more than this many characters.
const MIN_TOPIC_CHARS: usize = 5;

pub struct VideoAnalysis {
    transcripts: Arc<dyn TranscriptSource>,
}

impl VideoAnalysis {
    pub fn new(transcripts: Arc<dyn TranscriptSource>) -> Self {
        Self { transcripts }
    }
}

/// Long, purely alphabetic words of a transcript, lowercased, first-seen order.
pub fn key_topics(transcript: &str) -> Vec<String> {
    let words = transcript
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_TOPIC_CHARS && w.chars().all(char::is_alphabetic))
        .map(String::from)
        .collect::<Vec<_>>();

    dedup_capped(words, MAX_KEY_TOPICS)
}

#[async_trait]
impl Stage for VideoAnalysis {
    fn name(&self) -> &'static str {
        "video_analysis"
    }

    fn reads(&self) -> &'static [StateKey] {
        &[StateKey::YoutubeUrls]
    }

    fn writes(&self) -> &'static [StateKey] {
        &[StateKey::YoutubeData]
    }

    fn containment(&self) -> Containment {
        Containment::ErrorMarker(StateKey::YoutubeData)
    }

    #[instrument(skip_all, fields(videos = state.youtube_urls.len()))]
    async fn run(&self, state: &PipelineState) -> Result<StatePatch> {
        if state.youtube_urls.is_empty() {
            return Ok(StateUpdate::YoutubeData(StageData::failed(NO_VIDEOS_FOUND)).into());
        }

        // One failed video fails the whole stage.
        let mut videos = Vec::with_capacity(state.youtube_urls.len());
        for url in &state.youtube_urls {
            let video_id = video_id_from_url(url);
            let fragments = self.transcripts.fetch_transcript(video_id).await?;
            let transcript = join_fragments(&fragments);

            debug!(%video_id, fragments = fragments.len(), "transcript analysed");

            videos.push(VideoData {
                url: url.clone(),
                key_topics: key_topics(&transcript),
                transcript,
            });
        }

        Ok(StateUpdate::YoutubeData(StageData::Ready(videos)).into())
    }
}
