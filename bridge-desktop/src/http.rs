//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{DownloadObserver, HttpClient, TransportError},
};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Reqwest-based HTTP client implementation.
///
/// Provides:
/// - Connection pooling via reqwest
/// - TLS support by default
/// - The transport error mapping the core expects: HTTP 500 counts as "no
///   response", any other non-200 status as an unexpected status
/// - Streamed file downloads staged as `<name>.part` and moved into place
///   only when complete
pub struct ReqwestHttpClient {
    client: Client,
    request_timeout: Duration,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with a custom per-request timeout.
    ///
    /// The timeout applies to plain GET requests only; file downloads are
    /// bounded by cancellation, not wall-clock time.
    pub fn with_timeout(request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("mds-client-core/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            request_timeout,
        }
    }

    /// Map a reqwest send-phase error onto the transport taxonomy.
    fn classify_send_error(error: &reqwest::Error) -> TransportError {
        if error.is_connect() || error.is_timeout() {
            TransportError::Unreachable(error.to_string())
        } else {
            TransportError::NoResponse
        }
    }

    /// Map a response status onto the transport taxonomy. `None` means the
    /// status is acceptable.
    fn classify_status(status: u16) -> Option<TransportError> {
        match status {
            200 => None,
            500 => Some(TransportError::NoResponse),
            other => Some(TransportError::UnexpectedStatus(other)),
        }
    }

    fn check_status(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let status = response.status().as_u16();
        match Self::classify_status(status) {
            None => Ok(response),
            Some(err) => {
                warn!(status, url = %response.url(), "request rejected by server");
                Err(err)
            }
        }
    }

    /// Staging location used while a download body is incomplete.
    fn staging_path(destination: &Path) -> PathBuf {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "download".into());
        name.push(".part");
        destination.with_file_name(name)
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: Url) -> std::result::Result<Bytes, TransportError> {
        debug!(url = %url, "issuing GET");

        let response = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let response = Self::check_status(response)?;

        response
            .bytes()
            .await
            .map_err(|_| TransportError::NoResponse)
    }

    async fn download_file(
        &self,
        url: Url,
        destination: PathBuf,
        observer: Arc<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> Result<()> {
        debug!(url = %url, destination = %destination.display(), "starting file download");

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            result = self.client.get(url).send() => {
                result.map_err(|e| Self::classify_send_error(&e))?
            }
        };
        let response = Self::check_status(response).map_err(BridgeError::from)?;

        let total = response.content_length();
        let staging = Self::staging_path(&destination);
        let mut file = tokio::fs::File::create(&staging).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        let outcome: Result<()> = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Err(TransportError::Cancelled.into()),
                chunk = stream.next() => match chunk {
                    Some(Ok(bytes)) => {
                        if let Err(e) = file.write_all(&bytes).await {
                            break Err(e.into());
                        }
                        written += bytes.len() as u64;
                        observer.transferred(written, total);
                    }
                    Some(Err(e)) => {
                        break Err(TransportError::Unreachable(e.to_string()).into());
                    }
                    None => break Ok(()),
                }
            }
        };

        if let Err(error) = outcome {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                debug!(path = %staging.display(), error = %cleanup, "staging cleanup failed");
            }
            return Err(error);
        }

        file.flush().await?;
        drop(file);

        // Move into place only once the body is complete. A failed move is
        // a failed download, never a silent success.
        tokio::fs::rename(&staging, &destination)
            .await
            .map_err(|e| {
                warn!(
                    from = %staging.display(),
                    to = %destination.display(),
                    error = %e,
                    "could not move downloaded file into place"
                );
                BridgeError::Io(e)
            })?;

        debug!(bytes = written, destination = %destination.display(), "download complete");
        Ok(())
    }
}
