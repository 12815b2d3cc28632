//! Per-job workspace directories.
//!
//! [`WorkspaceManager::acquire`] creates `{root}/{job_id}` exclusively; a
//! second acquire for the same id fails with
//! [`SliceError::WorkspaceConflict`] until the first is released.
//! [`Workspace::release`] removes the tree. A workspace that is dropped
//! without being released (early return, panic, cancelled task) removes its
//! tree in `Drop`, so cleanup runs exactly once on every exit path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SliceError;

/// File name of the fetched input model inside a workspace.
pub const INPUT_FILE_NAME: &str = "model.stl";

/// File name of the engine's output artifact inside a workspace.
pub const OUTPUT_FILE_NAME: &str = "model.gcode";

/// Allocates isolated per-job directories under a fixed root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace directory for `job_id`.
    ///
    /// The root is created on demand; the job directory itself must not
    /// already exist.
    pub async fn acquire(&self, job_id: &str) -> Result<Workspace, SliceError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let dir = self.root.join(job_id);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SliceError::WorkspaceConflict(job_id.to_string()));
            }
            Err(e) => return Err(SliceError::Io(e)),
        }

        tracing::debug!(job_id, dir = %dir.display(), "Workspace acquired");
        Ok(Workspace {
            job_id: job_id.to_string(),
            dir,
            released: false,
        })
    }
}

/// A directory tree owned by exactly one job.
#[derive(Debug)]
pub struct Workspace {
    job_id: String,
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the fetched input model is written.
    pub fn input_path(&self) -> PathBuf {
        self.dir.join(INPUT_FILE_NAME)
    }

    /// Where the engine is told to write its artifact.
    pub fn output_path(&self) -> PathBuf {
        self.dir.join(OUTPUT_FILE_NAME)
    }

    /// Remove the workspace tree.
    ///
    /// Best effort: failures are logged, never returned, so cleanup cannot
    /// mask the job's own outcome.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::debug!(job_id = %self.job_id, "Workspace released");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove workspace"
                );
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(job_id = %self.job_id, "Workspace released on drop");
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    job_id = %self.job_id,
                    dir = %self.dir.display(),
                    error = %e,
                    "Failed to remove workspace on drop"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn acquire_creates_directory_under_root() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path().join("jobs"));

        let ws = manager.acquire("job-1").await.expect("acquire");
        assert!(ws.dir().is_dir());
        assert_eq!(ws.dir(), root.path().join("jobs").join("job-1"));
        assert_eq!(ws.input_path(), ws.dir().join(INPUT_FILE_NAME));
        assert_eq!(ws.output_path(), ws.dir().join(OUTPUT_FILE_NAME));
        ws.release().await;
    }

    #[tokio::test]
    async fn duplicate_job_id_conflicts() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path());

        let first = manager.acquire("dup").await.expect("acquire");
        let second = manager.acquire("dup").await;
        assert_matches!(second, Err(SliceError::WorkspaceConflict(id)) if id == "dup");

        first.release().await;
        let third = manager.acquire("dup").await.expect("reacquire after release");
        third.release().await;
    }

    #[tokio::test]
    async fn release_removes_tree_with_contents() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path());

        let ws = manager.acquire("full").await.expect("acquire");
        tokio::fs::write(ws.input_path(), b"solid").await.expect("write");
        tokio::fs::create_dir(ws.dir().join("nested")).await.expect("mkdir");
        let dir = ws.dir().to_path_buf();

        ws.release().await;
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_directory() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path());

        let ws = manager.acquire("gone").await.expect("acquire");
        std::fs::remove_dir_all(ws.dir()).expect("remove early");
        ws.release().await;
    }

    #[tokio::test]
    async fn drop_without_release_cleans_up() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path());

        let ws = manager.acquire("dropped").await.expect("acquire");
        let dir = ws.dir().to_path_buf();
        drop(ws);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn workspaces_are_isolated() {
        let root = tempfile::tempdir().expect("create temp dir");
        let manager = WorkspaceManager::new(root.path());

        let a = manager.acquire("a").await.expect("acquire a");
        let b = manager.acquire("b").await.expect("acquire b");
        tokio::fs::write(a.input_path(), b"a").await.expect("write");

        assert!(!b.input_path().exists());
        a.release().await;
        assert!(b.dir().is_dir());
        b.release().await;
    }
}
