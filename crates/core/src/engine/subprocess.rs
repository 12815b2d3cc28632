//! Engine process execution.
//!
//! [`run`] spawns the engine, captures stdout and stderr into one combined
//! stream, and enforces a wall-clock timeout. A timeout is not an error here:
//! the child is killed and the outcome is returned with `timed_out` set and
//! whatever output was captured. A non-zero exit is likewise reported, not
//! raised. Only a failure to start the process is an error.

use std::os::unix::fs::PermissionsExt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use super::command::Invocation;
use crate::error::SliceError;

/// Maximum combined output captured per run (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to keep draining output after the child has exited or been
/// killed. Grandchildren that inherited the pipes can hold them open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Result of one engine run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    /// Stdout and stderr interleaved in arrival order.
    pub combined_output: String,
    pub timed_out: bool,
    pub wall_clock: Duration,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Run `invocation`, killing it if it exceeds `timeout`.
pub async fn run(invocation: &Invocation, timeout: Duration) -> Result<ProcessOutcome, SliceError> {
    preflight(&invocation.program).await?;

    let mut cmd = invocation.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| SliceError::EngineSpawnFailed {
        binary: invocation.program.clone(),
        reason: e.to_string(),
    })?;

    // Both streams feed one channel so the capture preserves arrival order.
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let stdout_task = tokio::spawn(forward_stream(child.stdout.take(), tx.clone()));
    let stderr_task = tokio::spawn(forward_stream(child.stderr.take(), tx));

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    let (exit_code, timed_out) = match waited {
        Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
        Ok(Err(e)) => return Err(SliceError::Io(e)),
        Err(_elapsed) => {
            tracing::warn!(
                program = %invocation.program,
                timeout_secs = timeout.as_secs(),
                "Engine exceeded its time limit, killing"
            );
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill engine process");
            }
            (-1, true)
        }
    };
    let wall_clock = start.elapsed();

    for task in [stdout_task, stderr_task] {
        let abort = task.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, task).await.is_err() {
            abort.abort();
        }
    }

    let mut buf = Vec::new();
    while let Ok(chunk) = rx.try_recv() {
        let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    Ok(ProcessOutcome {
        exit_code,
        combined_output: String::from_utf8_lossy(&buf).into_owned(),
        timed_out,
        wall_clock,
    })
}

/// Reject programs given as a path that is missing or not executable, so
/// the failure is reported as a spawn failure with a precise reason.
/// Bare names are resolved through `PATH` by the spawn itself.
async fn preflight(program: &str) -> Result<(), SliceError> {
    if !program.contains('/') {
        return Ok(());
    }

    let metadata = tokio::fs::metadata(program)
        .await
        .map_err(|_| SliceError::EngineSpawnFailed {
            binary: program.to_string(),
            reason: "binary not found".to_string(),
        })?;

    let mode = metadata.permissions().mode();
    if !metadata.is_file() || mode & 0o111 == 0 {
        return Err(SliceError::EngineSpawnFailed {
            binary: program.to_string(),
            reason: format!("not an executable file (mode {mode:#o})"),
        });
    }
    Ok(())
}

/// Forward a stream into the shared channel until EOF.
///
/// Bytes past the cap are read and discarded so the engine never blocks on,
/// or dies writing to, a pipe nobody reads.
async fn forward_stream<R: AsyncRead + Unpin>(handle: Option<R>, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let Some(mut h) = handle else {
        return;
    };
    let mut total = 0usize;
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let keep = n.min(MAX_OUTPUT_BYTES.saturating_sub(total));
                total += keep;
                if keep > 0 {
                    // Receiver gone means nobody wants the output; keep draining.
                    let _ = tx.send(chunk[..keep].to_vec());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
