// Stream URL negotiation via the playurl endpoint

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::client::ApiClient;
use super::errors::DownloadError;
use super::models::{ContentIdentifier, QualityTier, ResolvedStream, StreamMetadata};
use super::tier_selector::TierSelector;
use super::traits::StreamProvider;

#[derive(Debug, Deserialize)]
struct PlayUrlData {
    /// Tier actually served, may differ from the requested `qn`
    quality: Option<u32>,
    #[serde(default)]
    accept_quality: Vec<u32>,
    #[serde(default)]
    durl: Vec<DurlEntry>,
}

#[derive(Debug, Deserialize)]
struct DurlEntry {
    url: String,
    size: Option<u64>,
}

/// Queries `/x/player/playurl` for a time-limited media URL.
///
/// When several `durl` entries come back only the first one is used. The
/// others may be mirrors, but nothing here relies on that.
#[derive(Debug, Clone)]
pub struct StreamResolver {
    api: ApiClient,
}

impl StreamResolver {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StreamProvider for StreamResolver {
    fn name(&self) -> &'static str {
        "playurl-api"
    }

    async fn resolve(
        &self,
        id: &ContentIdentifier,
        metadata: &StreamMetadata,
        tier: QualityTier,
    ) -> Result<ResolvedStream, DownloadError> {
        let url = self.api.endpoint(&format!(
            "/x/player/playurl?bvid={}&cid={}&qn={}&type=&otype=json",
            id,
            metadata.stream_component_id,
            tier.code()
        ));
        let referer = self.api.config().video_referer(id);

        let data: PlayUrlData = self.api.get_data(&url, &referer, "playurl").await?;
        let stream = select_stream(tier, metadata, data)?;

        if stream.is_substituted() {
            warn!(
                bvid = %id,
                requested = %stream.requested_tier,
                selected = %stream.selected_tier,
                "[Resolver] Requested tier unavailable, service substituted another"
            );
        } else {
            info!(bvid = %id, tier = %stream.selected_tier, "[Resolver] Stream resolved");
        }

        Ok(stream)
    }
}

fn select_stream(
    requested: QualityTier,
    metadata: &StreamMetadata,
    data: PlayUrlData,
) -> Result<ResolvedStream, DownloadError> {
    let first = data
        .durl
        .into_iter()
        .next()
        .filter(|entry| !entry.url.trim().is_empty())
        .ok_or_else(|| DownloadError::malformed("playurl response lists no stream URL"))?;

    let served = data
        .quality
        .and_then(QualityTier::from_code)
        .filter(|t| metadata.available_tiers.contains(t));

    let selected_tier = match served {
        Some(tier) => tier,
        None => {
            // No usable report of what was served; pick the nearest tier ourselves
            let accepted = TierSelector::from_codes(&data.accept_quality);
            let mut candidates: BTreeSet<QualityTier> = if accepted.is_empty() {
                metadata.available_tiers.clone()
            } else {
                metadata.available_tiers.intersection(&accepted).copied().collect()
            };
            // A reported code we cannot map still says the request was not honoured
            if data.quality.map_or(false, |code| code != requested.code()) {
                candidates.remove(&requested);
            }
            TierSelector::nearest(requested, &candidates)
                .ok_or_else(|| DownloadError::malformed("no quality tier is available for this video"))?
        }
    };

    Ok(ResolvedStream {
        source_url: first.url,
        expected_byte_length: first.size.filter(|s| *s > 0),
        requested_tier: requested,
        selected_tier,
    })
}
