pub mod downloader;

pub use downloader::{
    extract, ChannelReporter, DownloadError, DownloadOptions, DownloadOutcome, DownloadProgress,
    DownloadTarget, NetworkConfig, Pipeline, ProgressReporter, QualityTier,
};

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

/// Resolve a bilibili link and download the selected stream into `target`
/// with the default network settings.
pub async fn resolve_and_download<W>(
    url: &str,
    tier: QualityTier,
    target: DownloadTarget<W>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
) -> Result<DownloadOutcome, DownloadError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let pipeline = Pipeline::new(NetworkConfig::from_env())?;
    pipeline
        .resolve_and_download(url, tier, target, reporter, cancel)
        .await
}
