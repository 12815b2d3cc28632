use std::sync::Arc;

use slicer_core::job::JobCoordinator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration, read-only after start-up.
    pub config: Arc<ServerConfig>,
    /// Runs estimate and slice jobs.
    pub jobs: Arc<JobCoordinator>,
}
