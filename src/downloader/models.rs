// Common data models for the resolution pipeline and downloader

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical video identifier (`BV` followed by alphanumerics).
///
/// Only the extractor creates these, so holding one means the token was
/// validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentIdentifier(String);

impl ContentIdentifier {
    pub(crate) fn new(token: String) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stream quality tiers, ordered from lowest to highest.
///
/// The discriminants are the `qn` codes the API understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum QualityTier {
    P360 = 16,
    P480 = 32,
    P720 = 64,
    P1080 = 80,
    P1080Plus = 112,
    P1080Hfr = 116,
}

impl QualityTier {
    pub const ALL: [QualityTier; 6] = [
        Self::P360,
        Self::P480,
        Self::P720,
        Self::P1080,
        Self::P1080Plus,
        Self::P1080Hfr,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::P360 => "360P",
            Self::P480 => "480P",
            Self::P720 => "720P",
            Self::P1080 => "1080P",
            Self::P1080Plus => "1080P+",
            Self::P1080Hfr => "1080P 60FPS",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<QualityTier> for u32 {
    fn from(tier: QualityTier) -> Self {
        tier.code()
    }
}

impl TryFrom<u32> for QualityTier {
    type Error = String;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("Unknown quality code: {}", code))
    }
}

impl FromStr for QualityTier {
    type Err = String;

    /// Accepts labels ("720P", "1080P+", "1080P 60FPS", "1080p60") or raw codes ("64").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();

        if let Ok(code) = normalized.parse::<u32>() {
            return Self::try_from(code);
        }

        match normalized.as_str() {
            "360P" => Ok(Self::P360),
            "480P" => Ok(Self::P480),
            "720P" => Ok(Self::P720),
            "1080P" => Ok(Self::P1080),
            "1080P+" => Ok(Self::P1080Plus),
            "1080P60" | "1080P60FPS" => Ok(Self::P1080Hfr),
            _ => Err(format!("Unknown quality: {}", s)),
        }
    }
}

/// Result of the metadata lookup, scoped to one resolution attempt
#[derive(Debug, Clone, Serialize)]
pub struct StreamMetadata {
    pub content_id: ContentIdentifier,
    /// `cid` of the first page, required to negotiate a stream
    pub stream_component_id: u64,
    pub title: Option<String>,
    pub available_tiers: BTreeSet<QualityTier>,
}

/// A concrete, time-limited media URL ready for download
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedStream {
    pub source_url: String,
    pub expected_byte_length: Option<u64>,
    pub requested_tier: QualityTier,
    pub selected_tier: QualityTier,
}

impl ResolvedStream {
    /// True when the service substituted a different tier than requested.
    pub fn is_substituted(&self) -> bool {
        self.requested_tier != self.selected_tier
    }
}

/// Download progress information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub bytes_transferred: u64,
    /// `None` when the response declared no (or a zero) length
    pub total_bytes: Option<u64>,
    /// Floor of the completed fraction; 0 when the total is unknown
    pub percent_complete: u8,
}

impl DownloadProgress {
    pub fn new(bytes_transferred: u64, total_bytes: Option<u64>) -> Self {
        let total_bytes = total_bytes.filter(|t| *t > 0);
        let percent_complete = match total_bytes {
            Some(total) => {
                let pct = (u128::from(bytes_transferred) * 100) / u128::from(total);
                pct.min(100) as u8
            }
            None => 0,
        };

        Self {
            bytes_transferred,
            total_bytes,
            percent_complete,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_bytes == Some(self.bytes_transferred)
    }
}

/// Summary of a finished download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub bytes_written: u64,
    pub destination: String,
    pub selected_tier: QualityTier,
}

/// How a download attempt ended when no error occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DownloadOutcome {
    Completed(DownloadResult),
    /// Caller raised the cancellation signal; the partial file is left in place
    Cancelled { bytes_written: u64, destination: String },
}

impl DownloadOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Completed(result) => result.bytes_written,
            Self::Cancelled { bytes_written, .. } => *bytes_written,
        }
    }
}

/// Download options chosen by the front-end
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub quality: QualityTier,
    pub output_dir: PathBuf,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: QualityTier::P1080,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl DownloadOptions {
    /// Default file for a video: `<dir>/<id>.mp4`
    pub fn output_path_for(&self, id: &ContentIdentifier) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", id))
    }
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Network configuration shared by every outbound request
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub user_agent: String,

    /// API host, e.g. "https://api.bilibili.com"
    pub api_base: String,

    /// Site root used to build referers, e.g. "https://www.bilibili.com"
    pub site_root: String,

    /// Timeout in seconds for API requests and for each media chunk
    pub timeout_secs: u64,

    /// HTTP or SOCKS5 proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,

    /// Upper bound on downloads running at the same time
    pub max_concurrent_downloads: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_base: "https://api.bilibili.com".to_string(),
            site_root: "https://www.bilibili.com".to_string(),
            timeout_secs: 30,
            proxy: None,
            max_concurrent_downloads: 1,
        }
    }
}

impl NetworkConfig {
    /// Defaults overridden by `BILI_PROXY` and `BILI_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(proxy) = std::env::var("BILI_PROXY") {
            if !proxy.trim().is_empty() {
                config.proxy = Some(proxy);
            }
        }
        if let Some(secs) = std::env::var("BILI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            config.timeout_secs = secs;
        }
        config
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_site_root(mut self, root: impl Into<String>) -> Self {
        self.site_root = root.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }

    /// Referer expected by the API for a given video
    pub fn video_referer(&self, id: &ContentIdentifier) -> String {
        format!("{}/video/{}", self.site_root, id)
    }

    /// Referer expected by the CDN
    pub fn site_referer(&self) -> String {
        format!("{}/", self.site_root)
    }
}
