// Chunked media downloader with progress reporting and cancellation

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::REFERER;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::build_http_client;
use super::errors::DownloadError;
use super::models::{DownloadOutcome, DownloadProgress, DownloadResult, NetworkConfig, ResolvedStream};
use super::traits::ProgressReporter;

/// Largest slice written (and reported) at once
pub const CHUNK_SIZE: usize = 8192;

/// Destination of a download, exclusively owned by one in-flight transfer
pub struct DownloadTarget<W> {
    writer: W,
    destination: String,
}

impl<W> DownloadTarget<W> {
    pub fn new(writer: W, destination: impl Into<String>) -> Self {
        Self {
            writer,
            destination: destination.into(),
        }
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl DownloadTarget<File> {
    /// Create (or truncate) a file at `path`.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, DownloadError> {
        let path = path.as_ref();
        let file = File::create(path)
            .await
            .map_err(|e| DownloadError::Io(format!("Failed to create {}: {}", path.display(), e)))?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

/// A download running on its own task
pub struct DownloadHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<DownloadOutcome, DownloadError>>,
}

impl DownloadHandle {
    /// Ask the transfer to stop after the chunk in hand.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<DownloadOutcome, DownloadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(DownloadError::Stream(format!("download task failed: {}", e))),
        }
    }
}

/// Streams resolved media URLs into writers.
///
/// Cloning is cheap and clones share the same worker pool: at most
/// `max_concurrent_downloads` spawned transfers run at once, the rest wait
/// for a permit.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: reqwest::Client,
    config: NetworkConfig,
    permits: Arc<Semaphore>,
}

impl Downloader {
    pub fn new(config: NetworkConfig) -> Result<Self, DownloadError> {
        let http = build_http_client(&config)?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));
        Ok(Self {
            http,
            config,
            permits,
        })
    }

    /// Run `download` on a worker task, gated by the pool.
    pub fn spawn<W>(
        &self,
        stream: ResolvedStream,
        target: DownloadTarget<W>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> DownloadHandle
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let this = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    return Ok(DownloadOutcome::Cancelled {
                        bytes_written: 0,
                        destination: target.destination,
                    });
                }
                permit = this.permits.clone().acquire_owned() => permit
                    .map_err(|e| DownloadError::Stream(format!("download pool closed: {}", e)))?,
            };

            this.download(stream, target, reporter.as_ref(), &token).await
        });

        DownloadHandle { cancel, task }
    }

    /// Stream `stream.source_url` into `target`, one progress event per chunk.
    ///
    /// No retries. On error or cancellation whatever was written stays in
    /// the target.
    pub async fn download<W>(
        &self,
        stream: ResolvedStream,
        mut target: DownloadTarget<W>,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        info!(
            url = %stream.source_url,
            tier = %stream.selected_tier,
            destination = %target.destination,
            "[Downloader] Starting download"
        );

        let request = self
            .http
            .get(&stream.source_url)
            .header(REFERER, self.config.site_referer());

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(cancelled(target, 0).await);
            }
            sent = tokio::time::timeout(timeout, request.send()) => {
                sent.map_err(|_| stalled(timeout))?.map_err(DownloadError::media)?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::transport(status.as_u16(), "media"));
        }

        // Read once; a missing or zero length means byte counts only
        let total = response.content_length().filter(|len| *len > 0);
        debug!(?total, "[Downloader] Declared content length");

        let mut body = response.bytes_stream();
        let mut written: u64 = 0;
        let mut reported = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(cancelled(target, written).await);
                }
                next = tokio::time::timeout(timeout, body.next()) => {
                    next.map_err(|_| stalled(timeout))?
                }
            };

            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    warn!(written, error = %e, "[Downloader] Stream broke");
                    return Err(DownloadError::Stream(e.to_string()));
                }
                None => break,
            };

            for chunk in bytes.chunks(CHUNK_SIZE) {
                if cancel.is_cancelled() {
                    return Ok(cancelled(target, written).await);
                }
                target.writer.write_all(chunk).await?;
                written += chunk.len() as u64;
                if cancel.is_cancelled() {
                    // Raised while the write was pending; keep the bytes, skip the event
                    return Ok(cancelled(target, written).await);
                }
                reporter.report(DownloadProgress::new(written, total));
                reported = true;
            }
        }

        target.writer.flush().await?;

        if !reported {
            reporter.report(DownloadProgress::new(0, total));
        }

        if let Some(expected) = total {
            if expected != written {
                warn!(expected, written, "[Downloader] Body length differs from Content-Length");
            }
        }

        info!(bytes = written, destination = %target.destination, "[Downloader] ✓ Download complete");

        Ok(DownloadOutcome::Completed(DownloadResult {
            bytes_written: written,
            destination: target.destination,
            selected_tier: stream.selected_tier,
        }))
    }
}

fn stalled(timeout: Duration) -> DownloadError {
    DownloadError::Stream(format!("no data from media server for {}s", timeout.as_secs()))
}

async fn cancelled<W>(mut target: DownloadTarget<W>, written: u64) -> DownloadOutcome
where
    W: AsyncWrite + Unpin,
{
    // Keep whatever made it to the writer; the caller decides what to do with it
    if let Err(e) = target.writer.flush().await {
        warn!(error = %e, "[Downloader] Flush after cancel failed");
    }
    info!(bytes = written, destination = %target.destination, "[Downloader] Cancelled");

    DownloadOutcome::Cancelled {
        bytes_written: written,
        destination: target.destination,
    }
}
