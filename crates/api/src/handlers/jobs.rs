//! Handlers for the estimate and slice endpoints.
//!
//! Both translate the request body into a [`JobSpec`] and hand it to the
//! job coordinator; all pipeline logic lives in `slicer_core`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use slicer_core::types::{JobSpec, SliceMetrics};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

fn default_layer_height() -> f64 {
    0.2
}

fn default_infill_percent() -> u32 {
    20
}

/// Slicing parameters shared by both endpoints.
#[derive(Debug, Deserialize)]
pub struct JobParams {
    /// Signed URL of the input model.
    #[serde(alias = "source_url")]
    pub stl_url: String,
    #[serde(default = "default_layer_height")]
    pub layer_height: f64,
    #[serde(default = "default_infill_percent")]
    pub infill_percent: u32,
    #[serde(default)]
    pub supports: bool,
    /// Printer profile file name inside the profiles directory.
    #[serde(default, alias = "printer_ini")]
    pub printer_profile_id: Option<String>,
    /// Material profile file name inside the profiles directory.
    #[serde(default, alias = "filament_ini")]
    pub material_profile_id: Option<String>,
}

impl JobParams {
    fn into_spec(self, job_id: Option<String>) -> JobSpec {
        JobSpec {
            source_url: self.stl_url,
            layer_height: self.layer_height,
            infill_percent: self.infill_percent,
            supports: self.supports,
            printer_profile: self.printer_profile_id,
            material_profile: self.material_profile_id,
            job_id,
        }
    }
}

/// Request body for `POST /estimate`.
pub type EstimateRequest = JobParams;

/// Request body for `POST /slice`.
#[derive(Debug, Deserialize)]
pub struct SliceRequest {
    #[serde(flatten)]
    pub params: JobParams,
    /// Caller-supplied job id; used as the workspace and storage key name.
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Response body for `POST /slice`.
#[derive(Debug, Serialize)]
pub struct SliceResponse {
    pub success: bool,
    pub job_id: String,
    pub estimate: SliceMetrics,
    pub gcode_size_bytes: u64,
    pub gcode_storage_key: String,
}

fn reject(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /estimate
///
/// Slice for metrics only; the G-code is discarded.
pub async fn estimate(
    State(state): State<AppState>,
    payload: Result<Json<EstimateRequest>, JsonRejection>,
) -> AppResult<Json<SliceMetrics>> {
    let Json(request) = payload.map_err(reject)?;
    let spec = request.into_spec(None);

    let result = state.jobs.estimate(&spec).await?;
    Ok(Json(result.metrics))
}

/// POST /slice
///
/// Full slice. The G-code bytes go to the upload collaborator; the response
/// carries only their size and storage key.
pub async fn slice(
    State(state): State<AppState>,
    payload: Result<Json<SliceRequest>, JsonRejection>,
) -> AppResult<Json<SliceResponse>> {
    let Json(request) = payload.map_err(reject)?;
    let spec = request.params.into_spec(request.order_id);

    let result = state.jobs.slice(&spec).await?;
    let artifact = result
        .artifact
        .ok_or_else(|| AppError::InternalError("slice finished without an artifact".into()))?;

    tracing::info!(
        job_id = %result.job_id,
        storage_key = %artifact.storage_key,
        bytes = artifact.size_bytes,
        "G-code ready for upload"
    );

    Ok(Json(SliceResponse {
        success: true,
        job_id: result.job_id,
        estimate: result.metrics,
        gcode_size_bytes: artifact.size_bytes,
        gcode_storage_key: artifact.storage_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_request_defaults() {
        let req: EstimateRequest =
            serde_json::from_str(r#"{"stl_url": "https://x.test/a.stl"}"#).expect("parse");
        let spec = req.into_spec(None);
        assert_eq!(spec.layer_height, 0.2);
        assert_eq!(spec.infill_percent, 20);
        assert!(!spec.supports);
        assert_eq!(spec.printer_profile, None);
        assert_eq!(spec.job_id, None);
    }

    #[test]
    fn slice_request_accepts_ini_aliases() {
        let req: SliceRequest = serde_json::from_str(
            r#"{
                "stl_url": "https://x.test/a.stl",
                "order_id": "order-1",
                "infill_percent": 35,
                "supports": true,
                "printer_ini": "mk4.ini",
                "filament_ini": "pla.ini"
            }"#,
        )
        .expect("parse");
        let spec = req.params.into_spec(req.order_id);
        assert_eq!(spec.job_id.as_deref(), Some("order-1"));
        assert_eq!(spec.infill_percent, 35);
        assert!(spec.supports);
        assert_eq!(spec.printer_profile.as_deref(), Some("mk4.ini"));
        assert_eq!(spec.material_profile.as_deref(), Some("pla.ini"));
    }

    #[test]
    fn source_url_alias() {
        let req: EstimateRequest =
            serde_json::from_str(r#"{"source_url": "https://x.test/a.stl"}"#).expect("parse");
        assert_eq!(req.stl_url, "https://x.test/a.stl");
    }
}
