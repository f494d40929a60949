//! The default stage graph: discovery, three independent analyses, synthesis.

pub mod discovery;
pub mod report;
pub mod social;
pub mod video;
pub mod website;

pub use discovery::{MAX_VIDEOS, ResourceDiscovery};
pub use report::{ReportSynthesis, build_sections, report_prompt};
pub use social::{NO_HIRING_INFO, NO_RECENT_UPDATES, SocialInsights, bucket_social_hits};
pub use video::{MAX_KEY_TOPICS, VideoAnalysis, key_topics};
pub use website::WebsiteAnalysis;
