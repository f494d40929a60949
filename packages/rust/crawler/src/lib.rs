//! Page fetching, website signal extraction, and video transcripts.
//!
//! This crate provides:
//! - [`PageFetcher`] / [`HttpPageFetcher`]: single-page download with redirect and target checks
//! - [`extract`]: title, visible text, product and career mentions
//! - [`TranscriptSource`] / [`YouTubeTranscripts`]: caption fragments for a video id

pub mod extract;
pub mod fetch;
pub mod transcript;

pub use extract::{
    MAX_CAREERS, MAX_PRODUCTS, analyze_website, career_mentions, page_title, product_mentions,
    select_texts, visible_text,
};
pub use fetch::{FetchedPage, HttpPageFetcher, PageFetcher, is_ssrf_target};
pub use transcript::{TranscriptSource, YouTubeTranscripts, join_fragments, video_id_from_url};
