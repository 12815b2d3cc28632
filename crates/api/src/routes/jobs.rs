//! Route definitions for slicing jobs.

use axum::routing::post;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at the root.
///
/// ```text
/// POST   /estimate        -> estimate
/// POST   /slice           -> slice
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/estimate", post(jobs::estimate))
        .route("/slice", post(jobs::slice))
}
