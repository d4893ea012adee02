// Downloader module - bilibili link resolution and stream download

pub mod client;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod extractor;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod tier_selector;
pub mod traits;

pub use diagnostics::ApiRejection;
pub use engine::{DownloadHandle, DownloadTarget, Downloader, CHUNK_SIZE};
pub use errors::DownloadError;
pub use extractor::extract;
pub use models::{
    ContentIdentifier, DownloadOptions, DownloadOutcome, DownloadProgress, DownloadResult,
    NetworkConfig, QualityTier, ResolvedStream, StreamMetadata,
};
pub use orchestrator::{Pipeline, Resolution};
pub use traits::{ChannelReporter, MetadataProvider, ProgressReporter, StreamProvider};
