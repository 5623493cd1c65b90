//! HTTP Transport Abstraction
//!
//! Provides async HTTP operations for catalog/manifest fetches and observed
//! background file downloads.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;

/// Failure of a single HTTP exchange.
///
/// Mirrors the distinctions the rest of the core relies on: transient
/// conditions are retryable with a bounded count, caller-initiated
/// cancellation is never treated as a failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The host could not be reached (DNS, connect or TLS failure).
    #[error("URL unreachable: {0}")]
    Unreachable(String),

    /// The server returned no usable response (including HTTP 500).
    #[error("no response from server")]
    NoResponse,

    /// The server answered with a status other than 200.
    #[error("unexpected response status: {0}")]
    UnexpectedStatus(u16),

    /// The exchange was aborted by the caller. Callers treat this as a
    /// silent no-op, never as a failure to report.
    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns `true` when the exchange was aborted by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }

    /// Returns `true` if re-attempting the exchange could succeed.
    pub fn is_retryable(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Bounded re-attempt policy for transient transport failures.
///
/// One operation makes `1 + max_retries` attempts at most, sleeping `delay`
/// between attempts. Parse failures never consume an attempt; only
/// retryable [`TransportError`]s do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of re-attempts after the initial try.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Receives transfer notifications for one file download.
///
/// Byte counts are cumulative and non-decreasing. Implementations must not
/// block; no call is made after the download future has resolved.
pub trait DownloadObserver: Send + Sync {
    /// Called as bytes arrive. `bytes_total` is `None` when the server did
    /// not announce a content length.
    fn transferred(&self, bytes_written: u64, bytes_total: Option<u64>);
}

/// Async HTTP client trait.
///
/// Abstracts the platform networking stack so the core never touches it
/// directly. Implementations map their native error surface onto
/// [`TransportError`]: task cancellation must stay distinguishable from
/// genuine failure.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET request and return the response body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the host is unreachable, the server
    /// does not answer usefully, or answers with a non-200 status.
    async fn get(&self, url: Url) -> std::result::Result<Bytes, TransportError>;

    /// Download `url` into `destination`, reporting cumulative progress to
    /// `observer` while the transfer runs.
    ///
    /// The body is staged next to `destination` and only moved into place
    /// once complete; a failed move is a failure, not a success.
    /// Triggering `cancel` resolves the future with
    /// [`TransportError::Cancelled`] and removes the staged file.
    async fn download_file(
        &self,
        url: Url,
        destination: PathBuf,
        observer: Arc<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> Result<()>;
}
