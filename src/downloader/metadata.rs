// Metadata lookup via the video view endpoint

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::client::ApiClient;
use super::errors::DownloadError;
use super::models::{ContentIdentifier, QualityTier, StreamMetadata};
use super::traits::MetadataProvider;

#[derive(Debug, Deserialize)]
struct ViewData {
    cid: u64,
    title: Option<String>,
}

/// Queries `/x/web-interface/view` for the stream component id.
///
/// Single attempt, no retries; errors go straight back to the pipeline.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    api: ApiClient,
}

impl MetadataClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetadataProvider for MetadataClient {
    fn name(&self) -> &'static str {
        "view-api"
    }

    async fn fetch_metadata(&self, id: &ContentIdentifier) -> Result<StreamMetadata, DownloadError> {
        let url = self
            .api
            .endpoint(&format!("/x/web-interface/view?bvid={}", id));
        let referer = self.api.config().video_referer(id);

        let data: ViewData = self.api.get_data(&url, &referer, "metadata").await?;
        info!(bvid = %id, cid = data.cid, "[Metadata] Resolved stream component");

        // The view endpoint does not list tiers; playurl narrows them later
        Ok(StreamMetadata {
            content_id: id.clone(),
            stream_component_id: data.cid,
            title: data.title,
            available_tiers: QualityTier::ALL.into_iter().collect(),
        })
    }
}
