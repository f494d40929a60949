//! Core orchestration: the staged due-diligence pipeline.
//!
//! - [`pipeline`]: graph validation, scheduling, and fault containment
//! - [`state`]: per-run state record and stage patches
//! - [`stage`]: the [`Stage`] trait and containment policies
//! - [`stages`]: the five default stages
//! - [`llm`]: language model client
//! - [`tools`]: standalone scrape/video/summary operations

pub mod llm;
pub mod pipeline;
pub mod stage;
pub mod stages;
pub mod state;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use llm::{ChatCompletionsClient, LanguageModel};
pub use pipeline::{
    AnalysisOutcome, Clients, Pipeline, PipelineBuilder, ProgressReporter, SilentProgress,
};
pub use stage::{Containment, Stage};
pub use state::{PipelineState, StateKey, StatePatch, StateUpdate};
