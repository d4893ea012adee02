// Pipeline orchestrator: extract -> metadata -> playurl -> download
//
// Each stage fails fast; the first error is returned as-is and later stages
// never run. Resolution runs on the caller's task, the transfer on a worker.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::ApiClient;
use super::engine::{DownloadHandle, DownloadTarget, Downloader};
use super::errors::DownloadError;
use super::extractor::extract;
use super::metadata::MetadataClient;
use super::models::{DownloadOutcome, NetworkConfig, QualityTier, ResolvedStream, StreamMetadata};
use super::resolver::StreamResolver;
use super::traits::{MetadataProvider, ProgressReporter, StreamProvider};

/// Everything learned about a link before downloading it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub metadata: StreamMetadata,
    pub stream: ResolvedStream,
}

pub struct Pipeline {
    metadata: Arc<dyn MetadataProvider>,
    streams: Arc<dyn StreamProvider>,
    downloader: Downloader,
}

impl Pipeline {
    /// Pipeline talking to the real API described by `config`.
    pub fn new(config: NetworkConfig) -> Result<Self, DownloadError> {
        let api = ApiClient::new(config.clone())?;
        Ok(Self::with_providers(
            Arc::new(MetadataClient::new(api.clone())),
            Arc::new(StreamResolver::new(api)),
            Downloader::new(config)?,
        ))
    }

    pub fn with_providers(
        metadata: Arc<dyn MetadataProvider>,
        streams: Arc<dyn StreamProvider>,
        downloader: Downloader,
    ) -> Self {
        Self {
            metadata,
            streams,
            downloader,
        }
    }

    /// Turn a video link into a downloadable stream for `tier`.
    pub async fn resolve(&self, raw_url: &str, tier: QualityTier) -> Result<Resolution, DownloadError> {
        let id = extract(raw_url)?;
        info!(bvid = %id, requested = %tier, "[Pipeline] Resolving");

        let metadata = self.metadata.fetch_metadata(&id).await.map_err(|e| {
            warn!(provider = self.metadata.name(), error = %e, "[Pipeline] ✗ Metadata lookup failed");
            e
        })?;

        let stream = self.streams.resolve(&id, &metadata, tier).await.map_err(|e| {
            warn!(provider = self.streams.name(), error = %e, "[Pipeline] ✗ Stream negotiation failed");
            e
        })?;

        Ok(Resolution { metadata, stream })
    }

    /// Start transferring an already resolved stream on a worker task.
    pub fn start_download<W>(
        &self,
        stream: ResolvedStream,
        target: DownloadTarget<W>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> DownloadHandle
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.downloader.spawn(stream, target, reporter, cancel)
    }

    /// Resolve `raw_url` and download it into `target`.
    ///
    /// Returns `DownloadOutcome::Cancelled` when `cancel` fires during the
    /// transfer; resolution itself is not interrupted.
    pub async fn resolve_and_download<W>(
        &self,
        raw_url: &str,
        tier: QualityTier,
        target: DownloadTarget<W>,
        reporter: Arc<dyn ProgressReporter>,
        cancel: CancellationToken,
    ) -> Result<DownloadOutcome, DownloadError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let resolution = self.resolve(raw_url, tier).await?;
        self.start_download(resolution.stream, target, reporter, cancel)
            .wait()
            .await
    }
}
