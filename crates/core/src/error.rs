//! Error taxonomy for slicing jobs.
//!
//! Every failure a job can surface maps to exactly one [`SliceError`]
//! variant, and every variant has a stable machine-readable [`kind`](SliceError::kind)
//! code. Diagnostics carried by the variants are bounded so an error payload
//! never grows with the engine's output.

/// Maximum number of characters of engine output carried in an error.
pub const DIAGNOSTIC_CHAR_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    /// The job specification failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The input could not be retrieved. `status` is the upstream HTTP
    /// status when one was received, `None` for transport-level failures.
    #[error("Failed to fetch input ({}): {message}", status.map_or_else(|| "transport error".to_string(), |s| format!("HTTP {s}")))]
    FetchFailed { status: Option<u16>, message: String },

    /// The fetched input exceeded the configured size limit.
    #[error("File too large: {size_bytes} bytes (max {limit_bytes} bytes)")]
    PayloadTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// A workspace for this job id already exists.
    #[error("Workspace already exists for job {0}")]
    WorkspaceConflict(String),

    /// The engine binary is missing or cannot be executed.
    #[error("Failed to start slicing engine {binary}: {reason}")]
    EngineSpawnFailed { binary: String, reason: String },

    /// The engine ran but exited with a non-zero code.
    #[error("Slicer failed (exit code {exit_code}): {output}")]
    EngineExecutionFailed { exit_code: i32, output: String },

    /// The engine exceeded its wall-clock bound and was killed.
    #[error("Slicer timed out after {elapsed_ms}ms: {output}")]
    Timeout { elapsed_ms: u64, output: String },

    /// The engine reported success but produced no output artifact.
    #[error("G-code file was not produced: {0}")]
    ArtifactMissing(String),

    /// Workspace or artifact I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SliceError {
    /// Stable, machine-readable code for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::FetchFailed { .. } => "FETCH_FAILED",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::WorkspaceConflict(_) => "WORKSPACE_CONFLICT",
            Self::EngineSpawnFailed { .. } => "ENGINE_SPAWN_FAILED",
            Self::EngineExecutionFailed { .. } => "ENGINE_EXECUTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ArtifactMissing(_) => "ARTIFACT_MISSING",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Build an [`SliceError::EngineExecutionFailed`] with a truncated
    /// capture of the engine output.
    pub fn execution_failed(exit_code: i32, output: &str) -> Self {
        Self::EngineExecutionFailed {
            exit_code,
            output: truncate_diagnostic(output),
        }
    }

    /// Build an [`SliceError::Timeout`] with a truncated capture of
    /// whatever output the engine produced before it was killed.
    pub fn timed_out(elapsed_ms: u64, output: &str) -> Self {
        Self::Timeout {
            elapsed_ms,
            output: truncate_diagnostic(output),
        }
    }
}

/// Return at most the first [`DIAGNOSTIC_CHAR_LIMIT`] characters of `text`.
pub fn truncate_diagnostic(text: &str) -> String {
    match text.char_indices().nth(DIAGNOSTIC_CHAR_LIMIT) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
