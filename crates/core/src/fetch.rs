//! Input retrieval into a job workspace.
//!
//! [`InputFetcher`] is the seam the job coordinator fetches through;
//! [`HttpFetcher`] is the production implementation. Every implementation
//! must leave no file behind when it fails, and must finish with
//! [`verify_size`] so the limit is checked against the bytes actually on disk.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::error::SliceError;

/// Retrieves a remote input file into the workspace.
pub trait InputFetcher: Send + Sync {
    /// Fetch `url` into `dest`, rejecting inputs larger than `max_bytes`.
    ///
    /// Returns the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        max_bytes: u64,
    ) -> impl std::future::Future<Output = Result<u64, SliceError>> + Send;
}

/// Streams an HTTP(S) response body to disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher whose requests are bounded by `timeout` end to end.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Create a fetcher reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn download(&self, url: &str, dest: &Path, max_bytes: u64) -> Result<u64, SliceError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SliceError::FetchFailed {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        // Reject early when the server announces an oversized body. The
        // on-disk check below still runs because the header may be absent
        // or wrong.
        if let Some(announced) = response.content_length() {
            if announced > max_bytes {
                return Err(SliceError::PayloadTooLarge {
                    size_bytes: announced,
                    limit_bytes: max_bytes,
                });
            }
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| self.transport_error(e))? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(SliceError::PayloadTooLarge {
                    size_bytes: written,
                    limit_bytes: max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        verify_size(dest, max_bytes).await
    }

    fn transport_error(&self, err: reqwest::Error) -> SliceError {
        let message = if err.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs())
        } else {
            err.to_string()
        };
        SliceError::FetchFailed {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

impl InputFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path, max_bytes: u64) -> Result<u64, SliceError> {
        match self.download(url, dest, max_bytes).await {
            Ok(bytes) => {
                tracing::info!(bytes, dest = %dest.display(), "Downloaded input");
                Ok(bytes)
            }
            Err(e) => {
                remove_partial(dest).await;
                Err(e)
            }
        }
    }
}

/// Check the size of a fetched file against `max_bytes`.
///
/// An oversized file is deleted before [`SliceError::PayloadTooLarge`] is
/// returned. On success returns the file size.
pub async fn verify_size(path: &Path, max_bytes: u64) -> Result<u64, SliceError> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > max_bytes {
        remove_partial(path).await;
        return Err(SliceError::PayloadTooLarge {
            size_bytes: size,
            limit_bytes: max_bytes,
        });
    }
    Ok(size)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
