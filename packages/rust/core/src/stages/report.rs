//! Report synthesis: one prompt built from every usable slot, one completion.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use duediligence_shared::text::truncate_chars;
use duediligence_shared::{DueDiligenceError, LinkedInData, Result, VideoData, WebsiteData};

use crate::llm::LanguageModel;
use crate::stage::{Containment, Stage};
use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

/// Characters of website content quoted in the prompt.
const DESCRIPTION_CHARS: usize = 300;

/// Characters of each transcript quoted in the prompt.
const TRANSCRIPT_CHARS: usize = 100;

pub struct ReportSynthesis {
    llm: Arc<dyn LanguageModel>,
}

impl ReportSynthesis {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

/// The fixed report prompt.
pub fn report_prompt(company: &str, sections: &str) -> String {
    format!(
        "Create a professional competitive intelligence report about {company} using these data:\n\
         {sections}\n\
         \n\
         Structure it with:\n\
         1. Executive Summary\n\
         2. Key Findings\n\
         3. Strategic Recommendations"
    )
}

/// Prompt sections for every present, non-failed slot, in website, video,
/// social order.
pub fn build_sections(state: &PipelineState) -> Vec<String> {
    let website = state
        .website_data
        .as_ref()
        .and_then(|d| d.ready())
        .map(website_section);
    let videos = state
        .youtube_data
        .as_ref()
        .and_then(|d| d.ready())
        .filter(|videos| !videos.is_empty())
        .map(|videos| video_section(videos));
    let social = state
        .linkedin_data
        .as_ref()
        .and_then(|d| d.ready())
        .map(social_section);

    [website, videos, social].into_iter().flatten().collect()
}

fn website_section(data: &WebsiteData) -> String {
    format!(
        "\n### Website Analysis\n\
         - **Company Description**: {}...\n\
         - **Key Products**: {}\n\
         - **Career Opportunities**: {}\n",
        truncate_chars(&data.content, DESCRIPTION_CHARS),
        data.products.join(", "),
        data.careers.join(", "),
    )
}

fn video_section(videos: &[VideoData]) -> String {
    let lines = videos
        .iter()
        .enumerate()
        .map(|(i, video)| {
            format!(
                "- Video {}: Topics - {}\n  {}...",
                i + 1,
                video.key_topics.join(", "),
                truncate_chars(&video.transcript, TRANSCRIPT_CHARS),
            )
        })
        .collect::<Vec<_>>();

    format!("\n### YouTube Analysis\n{}", lines.join("\n"))
}

fn social_section(data: &LinkedInData) -> String {
    format!(
        "\n### LinkedIn Insights\n\
         - **Hiring Trends**: {}\n\
         - **Recent Activity**: {}\n",
        data.hiring_trends.join(", "),
        data.recent_updates.join(", "),
    )
}

#[async_trait]
impl Stage for ReportSynthesis {
    fn name(&self) -> &'static str {
        "report_synthesis"
    }

    fn reads(&self) -> &'static [StateKey] {
        &[
            StateKey::CompanyName,
            StateKey::WebsiteData,
            StateKey::YoutubeData,
            StateKey::LinkedinData,
        ]
    }

    fn writes(&self) -> &'static [StateKey] {
        &[StateKey::Report]
    }

    fn containment(&self) -> Containment {
        Containment::Fatal
    }

    #[instrument(skip_all, fields(company = %state.company()))]
    async fn run(&self, state: &PipelineState) -> Result<StatePatch> {
        let sections = build_sections(state);
        let prompt = report_prompt(state.company(), &sections.join("\n"));

        info!(sections = sections.len(), "requesting report");

        let report = self.llm.complete(&prompt).await.map_err(|e| match e {
            DueDiligenceError::Synthesis(_) => e,
            other => DueDiligenceError::Synthesis(other.to_string()),
        })?;

        Ok(StateUpdate::Report(report).into())
    }
}
