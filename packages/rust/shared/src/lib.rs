//! Shared types, error model, and configuration for the due-diligence pipeline.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`DueDiligenceError`]: the unified error type
//! - Domain types ([`SearchHit`], [`TranscriptFragment`], [`StageData`], [`WebsiteData`], ...)
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - Text helpers ([`text`])

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ExecutionMode, FetchConfig, LlmConfig, PipelineConfig, SearchConfig, ServerConfig,
    TranscriptConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    read_api_key, validate_api_keys,
};
pub use error::{DueDiligenceError, Result};
pub use types::{
    ErrorMarker, LinkedInData, NO_VIDEOS_FOUND, NO_WEBSITE_FOUND, RunId, SearchHit, StageData,
    TranscriptFragment, VideoData, WebsiteData,
};
