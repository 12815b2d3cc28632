//! Job specification, extracted metrics, and job results.

use serde::Serialize;

use crate::error::SliceError;

/// Prefix of the storage key under which a produced artifact is persisted.
pub const STORAGE_KEY_PREFIX: &str = "gcode/";

/// Extension of the produced artifact.
pub const ARTIFACT_EXTENSION: &str = ".gcode";

/// Length of generated job ids (leading hex characters of a UUID v4).
pub const GENERATED_JOB_ID_LEN: usize = 8;

/// Maximum length of a caller-supplied job id.
pub const MAX_JOB_ID_LEN: usize = 64;

/// Maximum infill percentage.
pub const MAX_INFILL_PERCENT: u32 = 100;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The two operations a job can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Metrics only; the artifact is discarded with the workspace.
    Estimate,
    /// Metrics plus the produced artifact.
    Slice,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Estimate => "estimate",
            Self::Slice => "slice",
        }
    }
}

// ---------------------------------------------------------------------------
// JobSpec
// ---------------------------------------------------------------------------

/// Immutable description of one slicing job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Where to fetch the input model from (`http://` or `https://`).
    pub source_url: String,
    /// Layer height in millimetres. Must be positive.
    pub layer_height: f64,
    /// Infill density, 0 to 100 inclusive.
    pub infill_percent: u32,
    pub supports: bool,
    /// Printer profile file name, relative to the profiles directory.
    pub printer_profile: Option<String>,
    /// Material profile file name, relative to the profiles directory.
    pub material_profile: Option<String>,
    /// Caller-supplied job id; one is generated when absent.
    pub job_id: Option<String>,
}

impl JobSpec {
    /// Job parameters with the service defaults: 0.2 mm layers, 20% infill, no supports.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            layer_height: 0.2,
            infill_percent: 20,
            supports: false,
            printer_profile: None,
            material_profile: None,
            job_id: None,
        }
    }

    /// Reject parameters the engine cannot be trusted with.
    pub fn validate(&self) -> Result<(), SliceError> {
        let url = self.source_url.trim();
        if url.is_empty() {
            return Err(SliceError::Validation(
                "Source URL must not be empty".to_string(),
            ));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SliceError::Validation(format!(
                "Source URL must start with http:// or https://, got: '{url}'"
            )));
        }
        if !self.layer_height.is_finite() || self.layer_height <= 0.0 {
            return Err(SliceError::Validation(format!(
                "Layer height must be a positive number of millimetres, got: {}",
                self.layer_height
            )));
        }
        if self.infill_percent > MAX_INFILL_PERCENT {
            return Err(SliceError::Validation(format!(
                "Infill percent must be between 0 and {MAX_INFILL_PERCENT}, got: {}",
                self.infill_percent
            )));
        }
        if let Some(id) = &self.job_id {
            validate_job_id(id)?;
        }
        Ok(())
    }

    /// The caller-supplied job id, or a freshly generated one.
    pub fn resolve_job_id(&self) -> String {
        match &self.job_id {
            Some(id) => id.clone(),
            None => generate_job_id(),
        }
    }
}

/// Generate a short random job id.
pub fn generate_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(GENERATED_JOB_ID_LEN);
    id
}

/// A job id names a workspace directory, so it must be a single safe
/// path segment.
pub fn validate_job_id(id: &str) -> Result<(), SliceError> {
    if id.is_empty() || id.len() > MAX_JOB_ID_LEN {
        return Err(SliceError::Validation(format!(
            "Job id must be between 1 and {MAX_JOB_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(SliceError::Validation(format!(
            "Job id may only contain letters, digits, '-' and '_', got: '{id}'"
        )));
    }
    Ok(())
}

/// Storage key under which the artifact for `job_id` should be persisted.
pub fn storage_key(job_id: &str) -> String {
    format!("{STORAGE_KEY_PREFIX}{job_id}{ARTIFACT_EXTENSION}")
}

// ---------------------------------------------------------------------------
// Metrics and results
// ---------------------------------------------------------------------------

/// Metrics extracted from the engine's output.
///
/// Best effort: `mass_grams == 0.0` and `print_duration_seconds == 0` mean
/// "unknown", as does `None` for the optional fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SliceMetrics {
    #[serde(rename = "grams_used")]
    pub mass_grams: f64,
    #[serde(rename = "print_time_seconds")]
    pub print_duration_seconds: u64,
    #[serde(rename = "layers")]
    pub layer_count: Option<u32>,
    pub filament_length_mm: Option<f64>,
}

impl SliceMetrics {
    /// Whether the mass is still at its "unknown" sentinel.
    pub fn mass_unknown(&self) -> bool {
        self.mass_grams == 0.0
    }
}

/// The artifact produced by a full slice, handed off to the caller.
#[derive(Debug, Clone)]
pub struct SliceArtifact {
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
    pub storage_key: String,
}

/// Outcome of a successful job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub metrics: SliceMetrics,
    /// Present only for [`Operation::Slice`].
    pub artifact: Option<SliceArtifact>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
