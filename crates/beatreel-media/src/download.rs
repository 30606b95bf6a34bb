//! Streaming HTTP download of remote audio assets.

use futures_util::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_quietly;
use crate::metrics;

/// Default bound on a whole download, connect to last byte.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads remote assets to local files.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    timeout: Duration,
}

impl Downloader {
    /// Create a downloader whose downloads are bounded by `timeout`.
    pub fn new(timeout: Duration) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .user_agent(concat!("beatreel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Use an existing client (shared pools, custom TLS).
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// On any failure, timeout or cancellation the partial file is removed.
    pub async fn download(
        &self,
        url: &str,
        dest: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> MediaResult<u64> {
        let dest = dest.as_ref();
        let started = Instant::now();

        info!(url = %url, dest = %dest.display(), "Downloading audio");

        let result = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.stream_to_file(url, dest)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(MediaError::DownloadTimeout(self.timeout)),
                }
            }
            _ = cancel.cancelled() => Err(MediaError::Cancelled),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match result {
            Ok(bytes) => {
                metrics::record_download(true, bytes, elapsed);
                info!(url = %url, bytes, elapsed_secs = elapsed, "Download complete");
                Ok(bytes)
            }
            Err(e) => {
                metrics::record_download(false, 0, elapsed);
                warn!(url = %url, error = %e, "Download failed, removing partial file");
                remove_quietly(dest).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(&self, url: &str, dest: &Path) -> MediaResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::download_failed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            debug!(url = %url, content_length = len, "Download started");
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = File::create(dest).await?;
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| MediaError::download_failed(format!("{}: {}", url, e)))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(MediaError::download_failed(format!(
                "{} returned an empty body",
                url
            )));
        }

        Ok(written)
    }
}
