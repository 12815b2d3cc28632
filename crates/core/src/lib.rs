//! Slicing job orchestration.
//!
//! Turns an uploaded 3D model into G-code by driving an external slicing
//! engine in an isolated per-job workspace, then extracts print metrics from
//! what the engine produced. Transport concerns live in `slicer-api`; this
//! crate has no HTTP server and reads no environment variables.

pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod job;
pub mod types;
pub mod workspace;
