//! Pipeline engine: graph validation, scheduling, and fault containment.
//!
//! A [`Pipeline`] is built once from a set of [`Stage`]s and can then run any
//! number of independent analyses. Each run owns a fresh [`PipelineState`];
//! the pipeline itself only holds shared, stateless stages.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use duediligence_crawler::{HttpPageFetcher, PageFetcher, TranscriptSource, YouTubeTranscripts};
use duediligence_discovery::{SerpApiSearch, WebSearch};
use duediligence_shared::{
    AppConfig, DueDiligenceError, ExecutionMode, Result, RunId, validate_api_keys,
};

use crate::llm::{ChatCompletionsClient, LanguageModel};
use crate::stage::{Containment, Stage, accepts_error_marker};
use crate::stages::{
    ReportSynthesis, ResourceDiscovery, SocialInsights, VideoAnalysis, WebsiteAnalysis,
};
use crate::state::{PipelineState, StateKey, StatePatch};

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external clients the default stages are built from.
#[derive(Clone)]
pub struct Clients {
    pub search: Arc<dyn WebSearch>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub transcripts: Arc<dyn TranscriptSource>,
    pub llm: Arc<dyn LanguageModel>,
}

impl Clients {
    /// Build the production clients. Fails before any network work if an API
    /// key is missing.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        validate_api_keys(config)?;

        Ok(Self {
            search: Arc::new(SerpApiSearch::from_config(&config.search)?),
            fetcher: Arc::new(HttpPageFetcher::new(&config.fetch)?),
            transcripts: Arc::new(YouTubeTranscripts::new(&config.transcript)?),
            llm: Arc::new(ChatCompletionsClient::from_config(&config.llm)?),
        })
    }

    /// Build the production clients with explicit API keys.
    pub fn with_keys(config: &AppConfig, search_key: &str, llm_key: &str) -> Result<Self> {
        Ok(Self {
            search: Arc::new(SerpApiSearch::new(&config.search, search_key)?),
            fetcher: Arc::new(HttpPageFetcher::new(&config.fetch)?),
            transcripts: Arc::new(YouTubeTranscripts::new(&config.transcript)?),
            llm: Arc::new(ChatCompletionsClient::new(&config.llm, llm_key)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Progress & outcome
// ---------------------------------------------------------------------------

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub run_id: RunId,
    pub report: String,
    /// Final state, including every intermediate slot.
    pub state: PipelineState,
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage runs. `index` is 1-based.
    fn stage_started(&self, name: &str, index: usize, total: usize);
    /// Called after a stage's patch was merged.
    fn stage_finished(&self, name: &str, elapsed: Duration);
    /// Called when a stage fault was converted into data.
    fn stage_contained(&self, name: &str, error: &str);
    /// Called when the run completes.
    fn done(&self, outcome: &AnalysisOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn stage_finished(&self, _name: &str, _elapsed: Duration) {}
    fn stage_contained(&self, _name: &str, _error: &str) {}
    fn done(&self, _outcome: &AnalysisOutcome) {}
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects stages and validates the graph they form.
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
    mode: ExecutionMode,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage. Registration order breaks ties between independent stages.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_arc(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validate the graph and fix the execution order.
    ///
    /// Rejects duplicate stage names, keys with more than one writer, writes
    /// to `query`, reads nobody writes, error markers aimed at slots the stage
    /// does not own, and dependency cycles.
    pub fn build(self) -> Result<Pipeline> {
        if self.stages.is_empty() {
            return Err(DueDiligenceError::pipeline("pipeline has no stages"));
        }

        let mut names = HashSet::new();
        let mut writers: HashMap<StateKey, usize> = HashMap::new();

        for (idx, stage) in self.stages.iter().enumerate() {
            if !names.insert(stage.name()) {
                return Err(DueDiligenceError::pipeline(format!(
                    "duplicate stage name '{}'",
                    stage.name()
                )));
            }

            for &key in stage.writes() {
                if key == StateKey::Query {
                    return Err(DueDiligenceError::pipeline(format!(
                        "stage '{}' writes '{key}', which is fixed at run start",
                        stage.name()
                    )));
                }
                if let Some(&other) = writers.get(&key) {
                    return Err(DueDiligenceError::pipeline(format!(
                        "key '{key}' is written by both '{}' and '{}'",
                        self.stages[other].name(),
                        stage.name()
                    )));
                }
                writers.insert(key, idx);
            }

            if let Containment::ErrorMarker(key) = stage.containment() {
                if !stage.writes().contains(&key) || !accepts_error_marker(key) {
                    return Err(DueDiligenceError::pipeline(format!(
                        "stage '{}' cannot store an error marker in '{key}'",
                        stage.name()
                    )));
                }
            }
        }

        // deps[i] = stages whose output stage i reads
        let mut deps: Vec<BTreeSet<usize>> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let mut stage_deps = BTreeSet::new();
            for &key in stage.reads() {
                if key == StateKey::Query {
                    continue;
                }
                match writers.get(&key) {
                    Some(&writer) => {
                        stage_deps.insert(writer);
                    }
                    None => {
                        return Err(DueDiligenceError::pipeline(format!(
                            "stage '{}' reads '{key}', which no stage writes",
                            stage.name()
                        )));
                    }
                }
            }
            deps.push(stage_deps);
        }

        let order = topological_order(&deps).ok_or_else(|| {
            let names = self.stages.iter().map(|s| s.name()).collect::<Vec<_>>();
            DueDiligenceError::pipeline(format!(
                "stage graph contains a cycle among: {}",
                names.join(", ")
            ))
        })?;
        let layers = layer_order(&order, &deps);

        debug!(
            stages = self.stages.len(),
            layers = layers.len(),
            mode = ?self.mode,
            "pipeline built"
        );

        Ok(Pipeline {
            stages: self.stages,
            order,
            layers,
            mode: self.mode,
        })
    }
}

/// Kahn's algorithm, always taking the lowest-indexed ready stage.
fn topological_order(deps: &[BTreeSet<usize>]) -> Option<Vec<usize>> {
    let mut remaining: Vec<usize> = deps.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..deps.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(deps.len());

    while let Some(next) = ready.pop_first() {
        order.push(next);
        for (i, stage_deps) in deps.iter().enumerate() {
            if stage_deps.contains(&next) {
                remaining[i] -= 1;
                if remaining[i] == 0 {
                    ready.insert(i);
                }
            }
        }
    }

    (order.len() == deps.len()).then_some(order)
}

/// Group stages by dependency depth, keeping topological order inside each layer.
fn layer_order(order: &[usize], deps: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let mut depth = vec![0usize; deps.len()];
    let mut layers: Vec<Vec<usize>> = Vec::new();

    for &idx in order {
        let d = deps[idx].iter().map(|&dep| depth[dep] + 1).max().unwrap_or(0);
        depth[idx] = d;
        if layers.len() <= d {
            layers.resize_with(d + 1, Vec::new);
        }
        layers[d].push(idx);
    }

    layers
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A validated stage graph.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    order: Vec<usize>,
    layers: Vec<Vec<usize>>,
    mode: ExecutionMode,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// The standard five-stage graph wired to the given clients.
    pub fn with_defaults(clients: Clients, config: &AppConfig) -> Result<Self> {
        let region = config.search.region.clone();

        Self::builder()
            .mode(config.pipeline.execution)
            .stage(ResourceDiscovery::new(clients.search.clone(), region.clone()))
            .stage(WebsiteAnalysis::new(
                clients.fetcher,
                config.fetch.content_char_limit,
            ))
            .stage(VideoAnalysis::new(clients.transcripts))
            .stage(SocialInsights::new(clients.search, region))
            .stage(ReportSynthesis::new(clients.llm))
            .build()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.order.iter().map(|&i| self.stages[i].name()).collect()
    }

    /// Stage names grouped into the layers used by [`ExecutionMode::Layered`].
    pub fn layer_names(&self) -> Vec<Vec<&'static str>> {
        self.layers
            .iter()
            .map(|layer| layer.iter().map(|&i| self.stages[i].name()).collect())
            .collect()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run the pipeline and return only the report.
    pub async fn analyze(&self, query: &str) -> Result<String> {
        self.run(query).await.map(|outcome| outcome.report)
    }

    /// Run the pipeline without progress output.
    pub async fn run(&self, query: &str) -> Result<AnalysisOutcome> {
        self.run_with_progress(query, &SilentProgress).await
    }

    /// Run the pipeline for one query. The query is stored exactly as given.
    pub async fn run_with_progress(
        &self,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalysisOutcome> {
        self.execute(RunId::new(), query, progress).await
    }

    #[instrument(skip_all, fields(run_id = %run_id, query = %query, mode = ?self.mode))]
    async fn execute(
        &self,
        run_id: RunId,
        query: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<AnalysisOutcome> {
        let start = Instant::now();
        let mut state = PipelineState::new(query);

        info!("starting analysis");

        match self.mode {
            ExecutionMode::Sequential => self.run_sequential(&mut state, progress).await?,
            ExecutionMode::Layered => self.run_layered(&mut state, progress).await?,
        }

        let report = state.report.clone().ok_or_else(|| {
            DueDiligenceError::pipeline("pipeline finished without producing a report")
        })?;

        let outcome = AnalysisOutcome {
            run_id,
            report,
            state,
            elapsed: start.elapsed(),
            completed_at: Utc::now(),
        };

        info!(elapsed_ms = outcome.elapsed.as_millis() as u64, "analysis complete");
        progress.done(&outcome);

        Ok(outcome)
    }

    async fn run_sequential(
        &self,
        state: &mut PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let total = self.order.len();

        for (pos, &idx) in self.order.iter().enumerate() {
            let stage = self.stages[idx].as_ref();
            progress.stage_started(stage.name(), pos + 1, total);

            let started = Instant::now();
            let result = stage.run(state).await;
            let patch = settle(stage, result, progress)?;
            state.merge(patch);

            progress.stage_finished(stage.name(), started.elapsed());
        }

        Ok(())
    }

    async fn run_layered(
        &self,
        state: &mut PipelineState,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let total = self.order.len();
        let mut started_count = 0;

        for layer in &self.layers {
            let started = Instant::now();
            for &idx in layer {
                started_count += 1;
                progress.stage_started(self.stages[idx].name(), started_count, total);
            }

            // Every stage in a layer sees the same state; patches merge afterwards.
            let shared: &PipelineState = state;
            let results = join_all(layer.iter().map(|&idx| self.stages[idx].run(shared))).await;

            let mut patches = Vec::with_capacity(layer.len());
            for (&idx, result) in layer.iter().zip(results) {
                let stage = self.stages[idx].as_ref();
                patches.push((stage.name(), settle(stage, result, progress)?));
            }

            let elapsed = started.elapsed();
            for (name, patch) in patches {
                state.merge(patch);
                progress.stage_finished(name, elapsed);
            }
        }

        Ok(())
    }
}

/// Turn a stage result into the patch to merge, applying its containment policy.
fn settle(
    stage: &dyn Stage,
    result: Result<StatePatch>,
    progress: &dyn ProgressReporter,
) -> Result<StatePatch> {
    match result {
        Ok(patch) => {
            if let Some(key) = patch.keys().into_iter().find(|k| !stage.writes().contains(k)) {
                return Err(DueDiligenceError::pipeline(format!(
                    "stage '{}' wrote undeclared key '{key}'",
                    stage.name()
                )));
            }
            Ok(patch)
        }
        Err(e) => {
            let message = e.to_string();
            match stage.containment().patch_for(&message) {
                Some(patch) => {
                    warn!(stage = stage.name(), error = %message, "stage fault contained");
                    progress.stage_contained(stage.name(), &message);
                    Ok(patch)
                }
                None => Err(e),
            }
        }
    }
}
