//! The unit of work the engine schedules.

use async_trait::async_trait;

use duediligence_shared::{Result, StageData};

use crate::state::{PipelineState, StateKey, StatePatch, StateUpdate};

/// What the engine does when a stage returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Store `{"error": <message>}` in the given slot and continue.
    ErrorMarker(StateKey),
    /// Log the fault, merge nothing, and continue.
    Skip,
    /// Abort the run with the fault.
    Fatal,
}

impl Containment {
    /// The patch standing in for a failed stage, if the fault is contained.
    pub(crate) fn patch_for(&self, message: &str) -> Option<StatePatch> {
        match self {
            Self::ErrorMarker(key) => error_marker(*key, message).map(StatePatch::from),
            Self::Skip => Some(StatePatch::new()),
            Self::Fatal => None,
        }
    }
}

/// The error-marker update for a data slot, or `None` for slots that have no
/// error representation.
fn error_marker(key: StateKey, message: &str) -> Option<StateUpdate> {
    match key {
        StateKey::WebsiteData => Some(StateUpdate::WebsiteData(StageData::failed(message))),
        StateKey::YoutubeData => Some(StateUpdate::YoutubeData(StageData::failed(message))),
        StateKey::LinkedinData => Some(StateUpdate::LinkedinData(StageData::failed(message))),
        _ => None,
    }
}

/// Whether a slot can hold an error marker.
pub(crate) fn accepts_error_marker(key: StateKey) -> bool {
    error_marker(key, "").is_some()
}

/// One node in the pipeline graph.
///
/// A stage reads the accumulated state and returns only the slots it
/// computed. It must write exactly the keys it declares in [`writes`](Stage::writes).
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique, stable stage name used in logs and progress output.
    fn name(&self) -> &'static str;

    /// Keys this stage reads.
    fn reads(&self) -> &'static [StateKey];

    /// Keys this stage writes.
    fn writes(&self) -> &'static [StateKey];

    fn containment(&self) -> Containment;

    async fn run(&self, state: &PipelineState) -> Result<StatePatch>;
}
