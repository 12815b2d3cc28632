//! Process-wide slicing configuration.
//!
//! Built once at start-up and shared read-only (behind an `Arc`) with every
//! component that needs it. Nothing in this crate reads the environment.

use std::path::PathBuf;
use std::time::Duration;

/// Default engine binary, resolved through `PATH`.
pub const DEFAULT_BINARY: &str = "prusa-slicer";

/// Default root under which per-job workspaces are created.
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tmp/slicer-workdir";

/// Default directory holding printer/material profile files.
pub const DEFAULT_PROFILES_DIR: &str = "/profiles";

/// Default maximum input size in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;

/// Timeout for retrieving the input file.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Wall-clock bound for an estimate run.
pub const DEFAULT_ESTIMATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Wall-clock bound for a full slice run.
pub const DEFAULT_SLICE_TIMEOUT: Duration = Duration::from_secs(600);

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SlicerConfig {
    /// Path (or `PATH`-resolved name) of the slicing engine.
    pub binary: String,
    /// Directory under which one subdirectory per job is created.
    pub workspace_root: PathBuf,
    /// Directory against which profile references are resolved.
    pub profiles_dir: PathBuf,
    /// Inputs larger than this are rejected.
    pub max_input_bytes: u64,
    pub fetch_timeout: Duration,
    pub estimate_timeout: Duration,
    pub slice_timeout: Duration,
}

impl SlicerConfig {
    /// Convert a megabyte limit into bytes.
    pub fn megabytes(mb: u64) -> u64 {
        mb.saturating_mul(BYTES_PER_MB)
    }
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            profiles_dir: PathBuf::from(DEFAULT_PROFILES_DIR),
            max_input_bytes: Self::megabytes(DEFAULT_MAX_FILE_SIZE_MB),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            estimate_timeout: DEFAULT_ESTIMATE_TIMEOUT,
            slice_timeout: DEFAULT_SLICE_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit_is_100_mb() {
        assert_eq!(SlicerConfig::default().max_input_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn slice_timeout_exceeds_estimate_timeout() {
        let config = SlicerConfig::default();
        assert!(config.slice_timeout > config.estimate_timeout);
    }

    #[test]
    fn megabytes_saturates() {
        assert_eq!(SlicerConfig::megabytes(u64::MAX), u64::MAX);
    }
}
