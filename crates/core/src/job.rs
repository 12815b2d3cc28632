//! Job coordination: the estimate and slice pipelines.
//!
//! Both operations share one skeleton:
//!
//! ```text
//! Created -> WorkspaceAcquired -> InputFetched -> ProcessRan
//!         -> (Parsed | FetchFailed | ProcessFailed | TimedOut)
//!         -> WorkspaceReleased
//! ```
//!
//! `WorkspaceReleased` is reached on every path once a workspace has been
//! acquired. Jobs share no mutable state; isolation comes from the unique
//! per-job directory.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::SlicerConfig;
use crate::engine::command::CommandBuilder;
use crate::engine::{parser, subprocess};
use crate::error::SliceError;
use crate::fetch::{HttpFetcher, InputFetcher};
use crate::types::{storage_key, JobResult, JobSpec, Operation, SliceArtifact};
use crate::workspace::{Workspace, WorkspaceManager};

/// Lifecycle states of a job, logged as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    WorkspaceAcquired,
    InputFetched,
    ProcessRan,
    Parsed,
    FetchFailed,
    ProcessFailed,
    TimedOut,
    WorkspaceReleased,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::WorkspaceAcquired => "workspace_acquired",
            Self::InputFetched => "input_fetched",
            Self::ProcessRan => "process_ran",
            Self::Parsed => "parsed",
            Self::FetchFailed => "fetch_failed",
            Self::ProcessFailed => "process_failed",
            Self::TimedOut => "timed_out",
            Self::WorkspaceReleased => "workspace_released",
        }
    }

    /// Terminal outcome state for a failed job, by error kind.
    fn for_error(err: &SliceError) -> Self {
        match err {
            SliceError::FetchFailed { .. } | SliceError::PayloadTooLarge { .. } => {
                Self::FetchFailed
            }
            SliceError::Timeout { .. } => Self::TimedOut,
            _ => Self::ProcessFailed,
        }
    }
}

fn transition(state: JobState) {
    tracing::debug!(state = state.as_str(), "Job state");
}

/// Runs slicing jobs end to end.
#[derive(Debug)]
pub struct JobCoordinator<F = HttpFetcher> {
    config: Arc<SlicerConfig>,
    workspaces: WorkspaceManager,
    commands: CommandBuilder,
    fetcher: F,
}

impl JobCoordinator<HttpFetcher> {
    /// Build a coordinator that fetches inputs over HTTP.
    pub fn new(config: Arc<SlicerConfig>) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        Ok(Self::with_fetcher(config, fetcher))
    }
}

impl<F: InputFetcher> JobCoordinator<F> {
    pub fn with_fetcher(config: Arc<SlicerConfig>, fetcher: F) -> Self {
        Self {
            workspaces: WorkspaceManager::new(config.workspace_root.clone()),
            commands: CommandBuilder::new(config.binary.clone(), config.profiles_dir.clone()),
            config,
            fetcher,
        }
    }

    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }

    /// Slice for metrics only. The artifact is produced (the header
    /// strategy needs it) but discarded with the workspace.
    pub async fn estimate(&self, spec: &JobSpec) -> Result<JobResult, SliceError> {
        self.run(Operation::Estimate, spec).await
    }

    /// Slice and return the artifact alongside its metrics.
    pub async fn slice(&self, spec: &JobSpec) -> Result<JobResult, SliceError> {
        self.run(Operation::Slice, spec).await
    }

    async fn run(&self, op: Operation, spec: &JobSpec) -> Result<JobResult, SliceError> {
        spec.validate()?;
        let job_id = spec.resolve_job_id();
        let span = tracing::info_span!("job", job_id = %job_id, operation = op.as_str());

        async move {
            transition(JobState::Created);
            let workspace = self.workspaces.acquire(&job_id).await?;
            transition(JobState::WorkspaceAcquired);

            let result = self.execute(op, spec, &workspace).await;

            match &result {
                Ok(job) => {
                    transition(JobState::Parsed);
                    tracing::info!(
                        grams = job.metrics.mass_grams,
                        print_time_seconds = job.metrics.print_duration_seconds,
                        layers = ?job.metrics.layer_count,
                        artifact_bytes = ?job.artifact.as_ref().map(|a| a.size_bytes),
                        "Job complete"
                    );
                }
                Err(e) => {
                    transition(JobState::for_error(e));
                    tracing::warn!(kind = e.kind(), error = %e, "Job failed");
                }
            }

            workspace.release().await;
            transition(JobState::WorkspaceReleased);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        op: Operation,
        spec: &JobSpec,
        workspace: &Workspace,
    ) -> Result<JobResult, SliceError> {
        let input = workspace.input_path();
        let output = workspace.output_path();

        self.fetcher
            .fetch(&spec.source_url, &input, self.config.max_input_bytes)
            .await?;
        transition(JobState::InputFetched);

        let invocation = self.commands.build(spec, &input, &output);
        let timeout = match op {
            Operation::Estimate => self.config.estimate_timeout,
            Operation::Slice => self.config.slice_timeout,
        };
        tracing::info!(command = %invocation, timeout_secs = timeout.as_secs(), "Running slicer");

        let outcome = subprocess::run(&invocation, timeout).await?;
        transition(JobState::ProcessRan);
        let elapsed_ms = outcome.wall_clock.as_millis() as u64;

        if outcome.timed_out {
            tracing::error!(elapsed_ms, output = %outcome.combined_output, "Slicer timed out");
            return Err(SliceError::timed_out(elapsed_ms, &outcome.combined_output));
        }
        if outcome.exit_code != 0 {
            tracing::error!(
                exit_code = outcome.exit_code,
                elapsed_ms,
                output = %outcome.combined_output,
                "Slicer failed"
            );
            return Err(SliceError::execution_failed(
                outcome.exit_code,
                &outcome.combined_output,
            ));
        }
        tracing::debug!(elapsed_ms, "Slicer finished");

        if op == Operation::Slice && !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(SliceError::ArtifactMissing(format!(
                "expected output at {}",
                output.display()
            )));
        }

        let parsed = parser::parse(&outcome.combined_output, &output).await;
        for miss in &parsed.misses {
            tracing::debug!(%miss, "Metric not extracted");
        }

        let artifact = match op {
            Operation::Estimate => None,
            Operation::Slice => {
                let bytes = tokio::fs::read(&output).await?;
                Some(SliceArtifact {
                    size_bytes: bytes.len() as u64,
                    storage_key: storage_key(workspace.job_id()),
                    bytes,
                })
            }
        };

        Ok(JobResult {
            job_id: workspace.job_id().to_string(),
            metrics: parsed.metrics,
            artifact,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
