// Seams between pipeline stages

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::DownloadError;
use super::models::{ContentIdentifier, DownloadProgress, QualityTier, ResolvedStream, StreamMetadata};

/// Looks up stream metadata for a video
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    async fn fetch_metadata(&self, id: &ContentIdentifier) -> Result<StreamMetadata, DownloadError>;
}

/// Negotiates a concrete media URL for a tier
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        id: &ContentIdentifier,
        metadata: &StreamMetadata,
        tier: QualityTier,
    ) -> Result<ResolvedStream, DownloadError>;
}

/// Receives progress events from the downloader's worker task.
///
/// Called from whatever thread runs the download; implementations hand the
/// event over to their own context.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: DownloadProgress);
}

impl<F> ProgressReporter for F
where
    F: Fn(DownloadProgress) + Send + Sync,
{
    fn report(&self, progress: DownloadProgress) {
        self(progress)
    }
}

/// Forwards progress events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<DownloadProgress>,
}

impl ChannelReporter {
    pub fn new(tx: mpsc::UnboundedSender<DownloadProgress>) -> Self {
        Self { tx }
    }

    /// Reporter plus the receiving end for the owner's context
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DownloadProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, progress: DownloadProgress) {
        // Receiver gone means nobody is watching anymore
        let _ = self.tx.send(progress);
    }
}
